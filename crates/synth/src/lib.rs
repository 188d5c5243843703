//! Grid synth (Milestone 1): workload spec to the ordered set of child resources.

#![forbid(unsafe_code)]

use grid_core::constants::{LABEL_COMPONENT, LABEL_HASH};
use grid_core::{hash_workload, operator_config, GridCluster, GridJob, Labels, OperatorConfig, Workload};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use metrics::counter;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{debug, warn};

pub mod diff;
pub mod env;
pub mod job;
pub mod persistence;
pub mod pod;
pub mod ports;
pub mod stateful;

pub use diff::{plan, ChangeAction, DiffSummary, ResourceChange};

/// A managed child resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Service(Service),
    StatefulSet(StatefulSet),
    Job(Job),
    ConfigMap(ConfigMap),
    Secret(Secret),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Service(_) => "Service",
            Resource::StatefulSet(_) => "StatefulSet",
            Resource::Job(_) => "Job",
            Resource::ConfigMap(_) => "ConfigMap",
            Resource::Secret(_) => "Secret",
        }
    }

    pub fn name(&self) -> &str {
        let meta = match self {
            Resource::Service(r) => &r.metadata,
            Resource::StatefulSet(r) => &r.metadata,
            Resource::Job(r) => &r.metadata,
            Resource::ConfigMap(r) => &r.metadata,
            Resource::Secret(r) => &r.metadata,
        };
        meta.name.as_deref().unwrap_or("")
    }

    /// Canonical JSON of the payload alone.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Resource::Service(r) => serde_json::to_value(r),
            Resource::StatefulSet(r) => serde_json::to_value(r),
            Resource::Job(r) => serde_json::to_value(r),
            Resource::ConfigMap(r) => serde_json::to_value(r),
            Resource::Secret(r) => serde_json::to_value(r),
        }
    }
}

/// Serialized as `{kind, name, spec}`.
impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Resource", 3)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("name", self.name())?;
        match self {
            Resource::Service(r) => s.serialize_field("spec", r)?,
            Resource::StatefulSet(r) => s.serialize_field("spec", r)?,
            Resource::Job(r) => s.serialize_field("spec", r)?,
            Resource::ConfigMap(r) => s.serialize_field("spec", r)?,
            Resource::Secret(r) => s.serialize_field("spec", r)?,
        }
        s.end()
    }
}

/// Ordered child resources: discovery services, port services, principal.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct ResourceSet(pub Vec<Resource>);

impl ResourceSet {
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> std::slice::Iter<'_, Resource> { self.0.iter() }

    pub fn get(&self, kind: &str, name: &str) -> Option<&Resource> {
        self.0.iter().find(|r| r.kind() == kind && r.name() == name)
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.0.iter().filter(move |r| r.kind() == kind)
    }

    /// The StatefulSet or Job, always last.
    pub fn principal(&self) -> Option<&Resource> {
        self.0.last().filter(|r| matches!(r, Resource::StatefulSet(_) | Resource::Job(_)))
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// Labels of the principal: common labels, component, and the fingerprint
/// when the spec can be hashed.
pub(crate) fn principal_labels<W: Workload>(w: &W, component: &str) -> Labels {
    let mut labels = w.common_labels();
    labels.insert(LABEL_COMPONENT.into(), component.into());
    match hash_workload(w, None) {
        Ok(h) => { labels.insert(LABEL_HASH.into(), h); }
        Err(e) => warn!(workload = %w.name(), error = %e, "fingerprint unavailable; principal left unlabelled"),
    }
    labels
}

fn services<W: Workload>(w: &W) -> Vec<Resource> {
    let mut out = Vec::new();
    if w.common_spec().requires_wka_service() {
        out.push(Resource::Service(ports::discovery_service(w)));
    }
    out.push(Resource::Service(ports::headless_service(w)));
    out.extend(ports::port_services(w).into_iter().map(Resource::Service));
    out
}

fn finish<W: Workload>(w: &W, resources: Vec<Resource>) -> ResourceSet {
    let kinds: Vec<&str> = resources.iter().map(Resource::kind).collect();
    debug!(workload = %w.name(), namespace = %w.namespace(), count = resources.len(), kinds = ?kinds, "synthesized child resources");
    counter!("synth_resources_total", resources.len() as u64);
    ResourceSet(resources)
}

/// Synthesis of the complete child resource set.
pub trait ChildResources: Workload {
    fn create_child_resources_with(&self, cfg: &OperatorConfig) -> ResourceSet;

    fn create_child_resources(&self) -> ResourceSet { self.create_child_resources_with(operator_config()) }
}

impl ChildResources for GridCluster {
    fn create_child_resources_with(&self, cfg: &OperatorConfig) -> ResourceSet {
        if self.replicas() <= 0 {
            debug!(workload = %self.name(), "zero replicas; nothing to run");
            return ResourceSet::default();
        }
        let mut out = services(self);
        out.push(Resource::StatefulSet(stateful::stateful_set(self, cfg)));
        finish(self, out)
    }
}

impl ChildResources for GridJob {
    fn create_child_resources_with(&self, cfg: &OperatorConfig) -> ResourceSet {
        if self.replicas() <= 0 {
            debug!(workload = %self.name(), "zero replicas; nothing to run");
            return ResourceSet::default();
        }
        let mut out = services(self);
        out.push(Resource::Job(job::job(self, cfg)));
        finish(self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_serializes_kind_name_spec() {
        let svc = Service {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("a-wka".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let v = serde_json::to_value(Resource::Service(svc)).unwrap();
        assert_eq!(v["kind"], "Service");
        assert_eq!(v["name"], "a-wka");
        assert_eq!(v["spec"]["metadata"]["name"], "a-wka");
    }

    #[test]
    fn zero_replicas_yield_nothing() {
        let mut c = GridCluster::default();
        c.metadata.name = Some("idle".into());
        c.spec.common.replicas = Some(0);
        assert!(c.create_child_resources_with(&OperatorConfig::default()).is_empty());
    }
}
