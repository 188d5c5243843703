//! Capability interface implemented by both workload kinds.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

use crate::constants::*;
use crate::model::{CommonSpec, GridCluster, GridJob, WorkloadType};

pub type Labels = BTreeMap<String, String>;

/// Identity and derived names of a workload.
///
/// Implementors only supply the accessors; names, labels and selectors are
/// derived here so both kinds agree on them.
pub trait Workload {
    /// The serializable spec the fingerprint is computed over.
    type Spec: Serialize;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
    fn spec(&self) -> &Self::Spec;
    fn common_spec(&self) -> &CommonSpec;
    fn common_spec_mut(&mut self) -> &mut CommonSpec;
    fn workload_type(&self) -> WorkloadType;
    /// Replica count used when `replicas` is unset.
    fn default_replicas(&self) -> i32;
    /// Annotation map that replaces the copied workload annotations, if any.
    fn annotation_overrides(&self) -> Option<&BTreeMap<String, String>>;

    fn name(&self) -> &str { self.metadata().name.as_deref().unwrap_or("") }

    fn namespace(&self) -> &str { self.metadata().namespace.as_deref().unwrap_or("") }

    fn replicas(&self) -> i32 { self.common_spec().replicas.unwrap_or_else(|| self.default_replicas()) }

    fn cluster_name(&self) -> String {
        match self.common_spec().cluster.as_deref() {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => self.name().to_string(),
        }
    }

    fn role_name(&self) -> String {
        match self.common_spec().role.as_deref() {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => self.name().to_string(),
        }
    }

    fn discovery_service_name(&self) -> String { format!("{}{}", self.name(), DISCOVERY_SERVICE_SUFFIX) }

    fn headless_service_name(&self) -> String { format!("{}{}", self.name(), HEADLESS_SERVICE_SUFFIX) }

    /// Host name members use to find the discovery service.
    fn wka_address(&self) -> String {
        let ns = self.namespace();
        match self.common_spec().runtime.as_ref().and_then(|r| r.wka.as_ref()) {
            Some(w) if !w.workload.is_empty() => {
                let wns = w.namespace.as_deref().filter(|n| !n.is_empty()).unwrap_or(ns);
                format!("{}{}.{}.{}", w.workload, DISCOVERY_SERVICE_SUFFIX, wns, CLUSTER_DNS_SUFFIX)
            }
            _ => format!("{}.{}.{}", self.discovery_service_name(), ns, CLUSTER_DNS_SUFFIX),
        }
    }

    fn common_labels(&self) -> Labels {
        let spec = self.common_spec();
        let mut labels = Labels::new();
        labels.insert(LABEL_WORKLOAD.into(), self.name().to_string());
        labels.insert(LABEL_CLUSTER.into(), self.cluster_name());
        labels.insert(LABEL_ROLE.into(), self.role_name());
        if let Some(app) = &spec.app_label { labels.insert(LABEL_APP.into(), app.clone()); }
        if let Some(version) = &spec.version_label { labels.insert(LABEL_VERSION.into(), version.clone()); }
        labels
    }

    fn pod_selector_labels(&self) -> Labels {
        let mut labels = self.common_labels();
        labels.insert(LABEL_COMPONENT.into(), COMPONENT_POD.into());
        labels
    }

    /// Annotations for the principal resource: a present override map, even
    /// an empty one, replaces the workload's own annotations entirely.
    fn workload_annotations(&self) -> Option<Labels> {
        match self.annotation_overrides() {
            Some(overrides) => Some(overrides.clone()),
            None => self.metadata().annotations.clone().filter(|a| !a.is_empty()),
        }
    }

    fn status_selector(&self) -> String {
        format!("{}={},{}={}", LABEL_CLUSTER, self.cluster_name(), LABEL_WORKLOAD, self.name())
    }
}

impl Workload for GridCluster {
    type Spec = crate::model::GridClusterSpec;

    fn metadata(&self) -> &ObjectMeta { &self.metadata }
    fn metadata_mut(&mut self) -> &mut ObjectMeta { &mut self.metadata }
    fn spec(&self) -> &Self::Spec { &self.spec }
    fn common_spec(&self) -> &CommonSpec { &self.spec.common }
    fn common_spec_mut(&mut self) -> &mut CommonSpec { &mut self.spec.common }
    fn workload_type(&self) -> WorkloadType { WorkloadType::StatefulSet }
    fn default_replicas(&self) -> i32 { DEFAULT_REPLICAS }
    fn annotation_overrides(&self) -> Option<&BTreeMap<String, String>> { self.spec.stateful_set_annotations.as_ref() }
}

impl Workload for GridJob {
    type Spec = crate::model::GridJobSpec;

    fn metadata(&self) -> &ObjectMeta { &self.metadata }
    fn metadata_mut(&mut self) -> &mut ObjectMeta { &mut self.metadata }
    fn spec(&self) -> &Self::Spec { &self.spec }
    fn common_spec(&self) -> &CommonSpec { &self.spec.common }
    fn common_spec_mut(&mut self) -> &mut CommonSpec { &mut self.spec.common }
    fn workload_type(&self) -> WorkloadType { WorkloadType::Job }
    fn default_replicas(&self) -> i32 { DEFAULT_JOB_REPLICAS }
    fn annotation_overrides(&self) -> Option<&BTreeMap<String, String>> { self.spec.job_annotations.as_ref() }
}
