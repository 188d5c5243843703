//! Declarative workload model.
//!
//! `CommonSpec` is shared by value between the two workload kinds:
//! [`GridClusterSpec`] (long-running, backed by a StatefulSet) and
//! [`GridJobSpec`] (run-to-completion, backed by a Job).

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, Container, EnvVar, LocalObjectReference, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    ResourceRequirements, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};

/// Image reference plus pull policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
}

/// Either a claim template or a plain volume. A volume wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentStorageSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSpec>,
    /// Volume source; the `name` is replaced when the volume is synthesized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
}

impl PersistentStorageSpec {
    pub fn is_configured(&self) -> bool { self.volume.is_some() || self.persistent_volume_claim.is_some() }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSpec {
    /// One of "on-demand", "active", "active-async".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub storage: PersistentStorageSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<PersistentStorageSpec>,
}

/// Toggle for an endpoint served by the runtime (metrics, management).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl EndpointSpec {
    pub fn is_enabled(&self) -> bool { self.enabled.unwrap_or(false) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<Quantity>,
}

/// Use the discovery service of another workload instead of this one's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WkaSpec {
    pub workload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Tuning knobs of the embedded data-grid runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_port_adjust: Option<IntOrString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_enabled: Option<bool>,
    #[serde(rename = "enableIpMonitor", skip_serializing_if = "Option::is_none")]
    pub enable_ip_monitor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_version_check: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_endangered: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EndpointSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management: Option<EndpointSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_from_wka: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wka: Option<WkaSpec>,
}

impl RuntimeSpec {
    /// Members join the discovery service unless excluded or pointed elsewhere.
    pub fn is_wka_member(&self) -> bool {
        !self.exclude_from_wka.unwrap_or(false) && !self.uses_external_wka()
    }

    pub fn uses_external_wka(&self) -> bool {
        self.wka.as_ref().map(|w| !w.workload.is_empty()).unwrap_or(false)
    }

    pub fn metrics_port(&self) -> i32 {
        self.metrics.as_ref().and_then(|m| m.port).unwrap_or(crate::constants::DEFAULT_METRICS_PORT)
    }

    pub fn management_port(&self) -> i32 {
        self.management.as_ref().and_then(|m| m.port).unwrap_or(crate::constants::DEFAULT_MANAGEMENT_PORT)
    }
}

/// Service exposing a single declared port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_not_ready_addresses: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_affinity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_traffic_policy: Option<String>,
    #[serde(rename = "loadBalancerIP", skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,
}

/// A declared container port, optionally exposed through its own service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedPort {
    pub name: String,
    /// Zero selects the well-known default for `metrics` and `management`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<i32>,
    #[serde(rename = "hostIP", skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<PortService>,
}

fn is_zero(v: &i32) -> bool { *v == 0 }

impl NamedPort {
    pub fn is_service_enabled(&self) -> bool {
        self.service.as_ref().and_then(|s| s.enabled).unwrap_or(true)
    }

    pub fn protocol(&self) -> &str { self.protocol.as_deref().unwrap_or("TCP") }
}

/// Fields shared by both workload kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utils: Option<ImageSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_cars: Vec<Container>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<NamedPort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Extra pod labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Pod annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_request_timeout: Option<i32>,
}

impl CommonSpec {
    pub fn persistence(&self) -> Option<&PersistenceSpec> {
        self.runtime.as_ref().and_then(|r| r.persistence.as_ref())
    }

    pub fn utils_image(&self) -> Option<&str> {
        self.utils.as_ref().and_then(|u| u.image.as_deref())
    }

    pub fn health_port(&self) -> i32 { self.health_port.unwrap_or(crate::constants::DEFAULT_HEALTH_PORT) }

    pub fn metrics_port(&self) -> i32 {
        self.runtime.as_ref().map(|r| r.metrics_port()).unwrap_or(crate::constants::DEFAULT_METRICS_PORT)
    }

    pub fn management_port(&self) -> i32 {
        self.runtime.as_ref().map(|r| r.management_port()).unwrap_or(crate::constants::DEFAULT_MANAGEMENT_PORT)
    }

    pub fn is_wka_member(&self) -> bool { self.runtime.as_ref().map(|r| r.is_wka_member()).unwrap_or(true) }

    pub fn requires_wka_service(&self) -> bool {
        !self.runtime.as_ref().map(|r| r.uses_external_wka()).unwrap_or(false)
    }
}

/// Spec of a long-running data-grid cluster member set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridClusterSpec {
    #[serde(flatten)]
    pub common: CommonSpec,
    /// Replaces (not merges) the annotations copied onto the StatefulSet,
    /// even when present but empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_set_annotations: Option<BTreeMap<String, String>>,
}

/// Spec of a run-to-completion data-grid workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridJobSpec {
    #[serde(flatten)]
    pub common: CommonSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_completions_to_replicas: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    /// Replaces (not merges) the annotations copied onto the Job, even when
    /// present but empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_annotations: Option<BTreeMap<String, String>>,
}

impl GridJobSpec {
    pub fn is_sync_completions(&self) -> bool { self.sync_completions_to_replicas.unwrap_or(false) }

    pub fn restart_policy(&self) -> &str { self.restart_policy.as_deref().unwrap_or("Never") }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridCluster {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GridClusterSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridJob {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GridJobSpec,
}

/// Which principal resource a workload is backed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadType {
    #[default]
    StatefulSet,
    Job,
}
