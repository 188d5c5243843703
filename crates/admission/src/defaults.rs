//! Mutating defaults applied before validation.

use grid_core::constants::{ANNOTATION_OPERATOR_VERSION, DEFAULT_UNICAST_PORT, DEFAULT_UNICAST_PORT_ADJUST};
use grid_core::{ensure_hash_label, FingerprintError, ImageSpec, OperatorConfig, Workload};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;

use crate::Admissible;

/// A workload the API server has not persisted yet.
fn is_new<W: Workload>(w: &W) -> bool { w.metadata().resource_version.is_none() }

pub fn default_workload<W: Admissible>(w: &mut W) -> Result<String, FingerprintError> {
    default_workload_with(w, grid_core::operator_config())
}

/// Fill unset fields, stamp the operator version and finally the
/// fingerprint label. Returns the fingerprint.
pub fn default_workload_with<W: Admissible>(w: &mut W, cfg: &OperatorConfig) -> Result<String, FingerprintError> {
    let replicas = w.default_replicas();
    let new = is_new(w);
    let spec = w.common_spec_mut();
    spec.replicas.get_or_insert(replicas);

    if new {
        let runtime = spec.runtime.get_or_insert_with(Default::default);
        runtime.local_port.get_or_insert(DEFAULT_UNICAST_PORT);
        runtime.local_port_adjust.get_or_insert(IntOrString::Int(DEFAULT_UNICAST_PORT_ADJUST));
        spec.image.get_or_insert_with(|| cfg.grid_image.clone());
        let utils = spec.utils.get_or_insert_with(ImageSpec::default);
        utils.image.get_or_insert_with(|| cfg.utils_image.clone());
        w.apply_kind_defaults();
    }

    w.metadata_mut()
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION_OPERATOR_VERSION.to_string(), cfg.version.clone());

    let (hash, applied) = ensure_hash_label(w)?;
    debug!(workload = %w.name(), new, hash = %hash, relabelled = applied, "defaults applied");
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_core::constants::LABEL_HASH;
    use grid_core::{GridCluster, GridJob};

    #[test]
    fn new_cluster_gets_runtime_and_images() {
        let cfg = OperatorConfig::default();
        let mut c = GridCluster::default();
        c.metadata.name = Some("storage".into());
        let hash = default_workload_with(&mut c, &cfg).unwrap();
        let spec = &c.spec.common;
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.image.as_deref(), Some(cfg.grid_image.as_str()));
        assert_eq!(spec.utils_image(), Some(cfg.utils_image.as_str()));
        let runtime = spec.runtime.as_ref().unwrap();
        assert_eq!(runtime.local_port, Some(DEFAULT_UNICAST_PORT));
        assert_eq!(runtime.local_port_adjust, Some(IntOrString::Int(DEFAULT_UNICAST_PORT_ADJUST)));
        assert_eq!(c.metadata.labels.as_ref().unwrap().get(LABEL_HASH), Some(&hash));
        assert_eq!(c.metadata.annotations.as_ref().unwrap().get(ANNOTATION_OPERATOR_VERSION), Some(&cfg.version));
    }

    #[test]
    fn existing_workload_keeps_unset_runtime() {
        let mut c = GridCluster::default();
        c.metadata.resource_version = Some("17".into());
        default_workload_with(&mut c, &OperatorConfig::default()).unwrap();
        assert!(c.spec.common.runtime.is_none());
        assert!(c.spec.common.image.is_none());
        assert_eq!(c.spec.common.replicas, Some(3));
    }

    #[test]
    fn new_job_disables_storage() {
        let mut j = GridJob::default();
        default_workload_with(&mut j, &OperatorConfig::default()).unwrap();
        assert_eq!(j.spec.common.replicas, Some(1));
        assert_eq!(j.spec.common.runtime.as_ref().unwrap().storage_enabled, Some(false));
        assert_eq!(j.spec.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn explicit_values_survive() {
        let mut c = GridCluster::default();
        c.spec.common.replicas = Some(0);
        c.spec.common.image = Some("mine:1".into());
        default_workload_with(&mut c, &OperatorConfig::default()).unwrap();
        assert_eq!(c.spec.common.replicas, Some(0));
        assert_eq!(c.spec.common.image.as_deref(), Some("mine:1"));
    }
}
