//! Environment variables injected into grid containers.
//!
//! User-declared variables always win: derived ones are only appended when
//! no variable of the same name exists yet.

use grid_core::constants::*;
use grid_core::model::{EndpointSpec, RuntimeSpec};
use grid_core::Workload;
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub fn var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.into()), value_from: None }
}

fn field_ref(name: &str, path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector { field_path: path.to_string(), api_version: None }),
            ..Default::default()
        }),
    }
}

/// Append each of `extra` whose name is not already present.
pub fn merge_missing(env: &mut Vec<EnvVar>, extra: impl IntoIterator<Item = EnvVar>) {
    for e in extra {
        if !env.iter().any(|x| x.name == e.name) {
            env.push(e);
        }
    }
}

/// Pod identity variables every container in the pod receives.
pub fn common_env<W: Workload>(w: &W) -> Vec<EnvVar> {
    vec![
        field_ref(ENV_MACHINE_NAME, "spec.nodeName"),
        field_ref(ENV_MEMBER_NAME, "metadata.name"),
        field_ref(ENV_POD_UID, "metadata.uid"),
        var(ENV_CLUSTER_NAME, w.cluster_name()),
        var(ENV_ROLE, w.role_name()),
    ]
}

fn default_env<W: Workload>(w: &W) -> Vec<EnvVar> {
    let spec = w.common_spec();
    vec![
        var(ENV_WKA, w.wka_address()),
        var(ENV_UTIL_DIR, VOLUME_MOUNT_PATH_UTILS),
        var(ENV_REQUEST_TIMEOUT, spec.operator_request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS).to_string()),
        var(ENV_HEALTH_PORT, spec.health_port().to_string()),
    ]
}

fn int_or_string(v: &IntOrString) -> String {
    match v {
        IntOrString::Int(i) => i.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

fn endpoint_env(out: &mut Vec<EnvVar>, prefix: &str, endpoint: Option<&EndpointSpec>, port: i32) {
    match endpoint {
        Some(e) if e.is_enabled() => {
            out.push(var(&format!("{prefix}{ENV_ENABLED_SUFFIX}"), "true"));
            out.push(var(&format!("{prefix}{ENV_PORT_SUFFIX}"), port.to_string()));
        }
        _ => out.push(var(&format!("{prefix}{ENV_ENABLED_SUFFIX}"), "false")),
    }
}

/// Tuning variables derived from the runtime section.
pub fn runtime_env(runtime: Option<&RuntimeSpec>) -> Vec<EnvVar> {
    let mut out = Vec::new();
    let Some(r) = runtime else {
        out.push(var(&format!("{ENV_MGMT_PREFIX}{ENV_ENABLED_SUFFIX}"), "false"));
        out.push(var(&format!("{ENV_METRICS_PREFIX}{ENV_ENABLED_SUFFIX}"), "false"));
        return out;
    };

    if let Some(v) = &r.cache_config { out.push(var(ENV_CACHE_CONFIG, v.clone())); }
    if let Some(v) = &r.override_config { out.push(var(ENV_OVERRIDE_CONFIG, v.clone())); }
    if let Some(v) = r.local_port { out.push(var(ENV_LOCAL_PORT, v.to_string())); }
    if let Some(v) = &r.local_port_adjust { out.push(var(ENV_LOCAL_PORT_ADJUST, int_or_string(v))); }
    if let Some(v) = r.log_level { out.push(var(ENV_LOG_LEVEL, v.to_string())); }
    if let Some(v) = r.storage_enabled { out.push(var(ENV_STORAGE_ENABLED, v.to_string())); }
    if let Some(v) = r.skip_version_check { out.push(var(ENV_SKIP_VERSION_CHECK, v.to_string())); }
    if let Some(q) = r.tracing.as_ref().and_then(|t| t.ratio.as_ref()) { out.push(var(ENV_TRACING_RATIO, q.0.clone())); }
    if !r.allow_endangered.is_empty() { out.push(var(ENV_ALLOW_ENDANGERED, r.allow_endangered.join(","))); }
    if r.enable_ip_monitor == Some(true) { out.push(var(ENV_ENABLE_IP_MONITOR, "TRUE")); }

    endpoint_env(&mut out, ENV_MGMT_PREFIX, r.management.as_ref(), r.management_port());
    endpoint_env(&mut out, ENV_METRICS_PREFIX, r.metrics.as_ref(), r.metrics_port());

    if let Some(mode) = r.persistence.as_ref().and_then(|p| p.mode.as_deref()) {
        out.push(var(ENV_PERSISTENCE_MODE, mode));
    }
    out
}

/// Full environment of the main grid container: user variables first, then
/// the derived ones that are not shadowed.
pub fn grid_container_env<W: Workload>(w: &W) -> Vec<EnvVar> {
    let spec = w.common_spec();
    let mut env = spec.env.clone();
    merge_missing(&mut env, common_env(w));
    merge_missing(&mut env, default_env(w));
    merge_missing(&mut env, runtime_env(spec.runtime.as_ref()));
    env
}
