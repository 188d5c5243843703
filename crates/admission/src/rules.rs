//! Create/update/delete validation rules. Each rule short-circuits.

use std::collections::BTreeSet;

use grid_core::constants::{NODE_PORT_MAX, NODE_PORT_MIN};
use grid_core::{GridCluster, GridJob, OperatorConfig, Workload};
use grid_synth::{job::job, stateful::stateful_set, ChildResources};
use k8s_openapi::api::apps::v1::StatefulSetSpec;
use k8s_openapi::api::batch::v1::JobSpec;
use k8s_openapi::api::core::v1::Container;
use metrics::counter;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::image::parse_reference;
use crate::{AdmissionError, Warnings};

/// Kind-specific admission hooks.
pub trait Admissible: ChildResources + Clone {
    /// Kind name as it appears in admission reviews.
    const KIND: &'static str;

    /// Rejection when the derived principal changes in a way the
    /// orchestrator would refuse.
    fn principal_update_violation(&self, previous: &Self, cfg: &OperatorConfig) -> Option<AdmissionError>;

    /// Defaults that only apply to this kind.
    fn apply_kind_defaults(&mut self) {}
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> AdmissionError {
    AdmissionError::StructuralInvalid { field: field.into(), reason: reason.into() }
}

fn immutable(field: impl Into<String>, reason: impl Into<String>) -> AdmissionError {
    AdmissionError::ImmutabilityViolation { field: field.into(), reason: reason.into() }
}

fn validate_replicas<W: Workload>(w: &W) -> Result<(), AdmissionError> {
    let replicas = w.replicas();
    if replicas < 0 {
        return Err(invalid("spec.replicas", format!("invalid value {replicas}: must be greater than or equal to 0")));
    }
    Ok(())
}

fn container_image(c: &Container) -> &str { c.image.as_deref().unwrap_or("") }

fn validate_images<W: Workload>(w: &W) -> Result<(), AdmissionError> {
    let spec = w.common_spec();
    if let Some(img) = spec.image.as_deref() {
        parse_reference(img).map_err(|e| invalid("spec.image", e.to_string()))?;
    }
    if let Some(img) = spec.utils_image() {
        parse_reference(img).map_err(|e| invalid("spec.utils.image", e.to_string()))?;
    }
    for c in &spec.init_containers {
        parse_reference(container_image(c))
            .map_err(|e| invalid(format!("spec.initContainers[{}].image", c.name), format!("invalid image name in init-container {}, {e}", c.name)))?;
    }
    for c in &spec.side_cars {
        parse_reference(container_image(c))
            .map_err(|e| invalid(format!("spec.sideCars[{}].image", c.name), format!("invalid image name in side-car container {}, {e}", c.name)))?;
    }
    Ok(())
}

fn validate_ports<W: Workload>(w: &W) -> Result<(), AdmissionError> {
    let ports = &w.common_spec().ports;

    let mut names = BTreeSet::new();
    let duplicated: Vec<&str> = ports.iter().filter(|p| !names.insert(p.name.as_str())).map(|p| p.name.as_str()).collect();
    if !duplicated.is_empty() {
        return Err(invalid("spec.ports", format!("duplicate port names {duplicated:?}")));
    }

    let out_of_range: Vec<&str> = ports
        .iter()
        .filter(|p| p.node_port.map(|n| !(NODE_PORT_MIN..=NODE_PORT_MAX).contains(&n)).unwrap_or(false))
        .map(|p| p.name.as_str())
        .collect();
    if !out_of_range.is_empty() {
        return Err(invalid(
            "spec.ports.nodePort",
            format!("the following NodePort values are invalid, valid port range is {NODE_PORT_MIN}-{NODE_PORT_MAX} - {out_of_range:?}"),
        ));
    }

    let mut seen = BTreeSet::new();
    let reused: Vec<i32> = ports.iter().filter_map(|p| p.node_port).filter(|n| !seen.insert(*n)).collect();
    if !reused.is_empty() {
        return Err(invalid("spec.ports.nodePort", format!("NodePort values are used more than once {reused:?}")));
    }
    Ok(())
}

fn either_scaled_to_zero<W: Workload>(current: &W, previous: &W) -> bool {
    current.replicas() == 0 || previous.replicas() == 0
}

fn validate_persistence<W: Workload>(current: &W, previous: &W) -> Result<(), AdmissionError> {
    if either_scaled_to_zero(current, previous) {
        return Ok(());
    }
    if current.common_spec().persistence() != previous.common_spec().persistence() {
        return Err(immutable(
            "spec.runtime.persistence",
            "changes cannot be made unless spec.replicas == 0 or the previous instance has spec.replicas == 0",
        ));
    }
    Ok(())
}

fn validate_claim_templates<W: Workload>(current: &W, previous: &W) -> Result<(), AdmissionError> {
    if either_scaled_to_zero(current, previous) {
        return Ok(());
    }
    if current.common_spec().volume_claim_templates != previous.common_spec().volume_claim_templates {
        return Err(immutable(
            "spec.volumeClaimTemplates",
            "changes cannot be made unless spec.replicas == 0 or the previous instance has spec.replicas == 0",
        ));
    }
    Ok(())
}

fn outcome(op: &'static str, name: &str, result: Result<(), AdmissionError>) -> (Warnings, Result<(), AdmissionError>) {
    match &result {
        Ok(()) => {
            debug!(op, workload = %name, "admitted");
            counter!("admission_allowed", 1, "op" => op);
        }
        Err(e) => {
            warn!(op, workload = %name, error = %e, "rejected");
            counter!("admission_rejections", 1, "op" => op);
        }
    }
    (Warnings::new(), result)
}

pub fn validate_create<W: Admissible>(w: &W) -> (Warnings, Result<(), AdmissionError>) {
    let result = validate_replicas(w).and_then(|_| validate_images(w)).and_then(|_| validate_ports(w));
    outcome("create", w.name(), result)
}

pub fn validate_update<W: Admissible>(previous: &W, current: &W) -> (Warnings, Result<(), AdmissionError>) {
    validate_update_with(previous, current, grid_core::operator_config())
}

pub fn validate_update_with<W: Admissible>(previous: &W, current: &W, cfg: &OperatorConfig) -> (Warnings, Result<(), AdmissionError>) {
    let result = validate_replicas(current)
        .and_then(|_| validate_images(current))
        .and_then(|_| validate_ports(current))
        .and_then(|_| validate_persistence(current, previous))
        .and_then(|_| validate_claim_templates(current, previous))
        .and_then(|_| current.principal_update_violation(previous, cfg).map_or(Ok(()), Err));
    outcome("update", current.name(), result)
}

pub fn validate_delete<W: Admissible>(w: &W) -> (Warnings, Result<(), AdmissionError>) { outcome("delete", w.name(), Ok(())) }

/// Top-level keys whose serialized values differ between `old` and `new`.
fn changed_fields<T: Serialize>(old: &T, new: &T) -> Vec<String> {
    let as_map = |v: &T| match serde_json::to_value(v) {
        Ok(Json::Object(m)) => m,
        _ => Default::default(),
    };
    let (old, new) = (as_map(old), as_map(new));
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter().filter(|k| old.get(*k) != new.get(*k)).cloned().collect()
}

fn principal_violation(kind: &str, mutable: &str, changed: Vec<String>) -> Option<AdmissionError> {
    if changed.is_empty() {
        return None;
    }
    let field = changed.iter().map(|k| format!("{}.spec.{k}", kind.to_lowercase())).collect::<Vec<_>>().join(", ");
    Some(immutable(field, format!("updates to {kind} spec may only change {mutable}; changed {changed:?}")))
}

/// StatefulSet fields left after masking everything an update may touch.
/// Claim templates are masked too when scaled to zero.
fn stateful_set_drift(old: &StatefulSetSpec, new: &StatefulSetSpec, scaled_to_zero: bool) -> Vec<String> {
    let mut new = new.clone();
    new.replicas = old.replicas;
    new.template = old.template.clone();
    new.update_strategy = old.update_strategy.clone();
    new.min_ready_seconds = old.min_ready_seconds;
    new.persistent_volume_claim_retention_policy = old.persistent_volume_claim_retention_policy.clone();
    if scaled_to_zero {
        new.volume_claim_templates = old.volume_claim_templates.clone();
    }
    changed_fields(old, &new)
}

/// Job fields left after masking everything an update may touch; in
/// practice only the selector.
fn job_drift(old: &JobSpec, new: &JobSpec) -> Vec<String> {
    let mut new = new.clone();
    new.active_deadline_seconds = old.active_deadline_seconds;
    new.backoff_limit = old.backoff_limit;
    new.completion_mode = old.completion_mode.clone();
    new.parallelism = old.parallelism;
    new.completions = old.completions;
    new.suspend = old.suspend;
    new.template = old.template.clone();
    new.ttl_seconds_after_finished = old.ttl_seconds_after_finished;
    new.pod_failure_policy = old.pod_failure_policy.clone();
    changed_fields(old, &new)
}

impl Admissible for GridCluster {
    const KIND: &'static str = "GridCluster";

    fn principal_update_violation(&self, previous: &Self, cfg: &OperatorConfig) -> Option<AdmissionError> {
        let old = stateful_set(previous, cfg).spec.unwrap_or_default();
        let new = stateful_set(self, cfg).spec.unwrap_or_default();
        principal_violation(
            "StatefulSet",
            "replicas, template, updateStrategy, persistentVolumeClaimRetentionPolicy and minReadySeconds",
            stateful_set_drift(&old, &new, either_scaled_to_zero(self, previous)),
        )
    }
}

impl Admissible for GridJob {
    const KIND: &'static str = "GridJob";

    fn principal_update_violation(&self, previous: &Self, cfg: &OperatorConfig) -> Option<AdmissionError> {
        let old = job(previous, cfg).spec.unwrap_or_default();
        let new = job(self, cfg).spec.unwrap_or_default();
        principal_violation("Job", "fields other than selector and manualSelector", job_drift(&old, &new))
    }

    fn apply_kind_defaults(&mut self) {
        let runtime = self.spec.common.runtime.get_or_insert_with(Default::default);
        runtime.storage_enabled.get_or_insert(false);
        self.spec.restart_policy.get_or_insert_with(|| "Never".to_string());
    }
}
