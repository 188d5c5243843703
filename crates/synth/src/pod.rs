//! Pod template shared by the StatefulSet and Job principals.

use grid_core::constants::*;
use grid_core::{OperatorConfig, Workload};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, EmptyDirVolumeSource, HTTPGetAction, PodAffinityTerm, PodAntiAffinity, PodSpec,
    PodTemplateSpec, Probe, Volume, VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::env::{common_env, grid_container_env, merge_missing, var};
use crate::persistence::{self, StorageBacking};
use crate::ports::container_port;

const READINESS_PATH: &str = "/ready";
const LIVENESS_PATH: &str = "/healthz";
const TOPOLOGY_KEY: &str = "topology.kubernetes.io/zone";

fn utils_mount() -> VolumeMount {
    VolumeMount { name: VOLUME_NAME_UTILS.into(), mount_path: VOLUME_MOUNT_PATH_UTILS.into(), ..Default::default() }
}

fn push_mount_if_missing(mounts: &mut Vec<VolumeMount>, m: VolumeMount) {
    if !mounts.iter().any(|x| x.name == m.name) {
        mounts.push(m);
    }
}

fn probe(port: i32, path: &str, initial_delay: i32, failure_threshold: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port),
            scheme: Some("HTTP".into()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(60),
        timeout_seconds: Some(30),
        success_threshold: Some(1),
        failure_threshold: Some(failure_threshold),
        ..Default::default()
    }
}

fn tcp_port(name: &str, number: i32) -> ContainerPort {
    ContainerPort { name: Some(name.into()), container_port: number, protocol: Some("TCP".into()), ..Default::default() }
}

/// The main grid container.
pub fn grid_container<W: Workload>(w: &W, cfg: &OperatorConfig, backing: StorageBacking) -> Container {
    let spec = w.common_spec();
    let health = spec.health_port();

    let mut ports = vec![tcp_port(PORT_NAME_GRID, DISCOVERY_PORT), tcp_port(PORT_NAME_HEALTH, health)];
    ports.extend(spec.ports.iter().map(|p| ContainerPort {
        name: Some(p.name.clone()),
        container_port: container_port(w, p),
        protocol: Some(p.protocol().to_string()),
        host_port: p.host_port,
        host_ip: p.host_ip.clone(),
    }));

    let (storage_mounts, storage_env) = persistence::mounts_and_env(spec.persistence(), backing);
    let mut env = grid_container_env(w);
    merge_missing(&mut env, storage_env);

    let mut mounts = vec![utils_mount()];
    mounts.extend(storage_mounts);
    mounts.extend(spec.volume_mounts.iter().cloned());

    Container {
        name: CONTAINER_NAME_GRID.into(),
        image: Some(spec.image.clone().unwrap_or_else(|| cfg.grid_image.clone())),
        image_pull_policy: spec.image_pull_policy.clone(),
        command: Some(vec![RUNNER_COMMAND.into(), "server".into()]),
        env: Some(env),
        ports: Some(ports),
        volume_mounts: Some(mounts),
        resources: spec.resources.clone(),
        readiness_probe: Some(probe(health, READINESS_PATH, 30, 50)),
        liveness_probe: Some(probe(health, LIVENESS_PATH, 60, 5)),
        ..Default::default()
    }
}

/// Init container that stages the runner into the shared utils volume.
pub fn utils_container<W: Workload>(w: &W, cfg: &OperatorConfig, backing: StorageBacking) -> Container {
    let spec = w.common_spec();
    let (storage_mounts, storage_env) = persistence::mounts_and_env(spec.persistence(), backing);

    let mut env = vec![var(ENV_UTIL_DIR, VOLUME_MOUNT_PATH_UTILS), var(ENV_CLUSTER_NAME, w.cluster_name())];
    env.extend(storage_env);
    let mut mounts = vec![utils_mount()];
    mounts.extend(storage_mounts);

    Container {
        name: CONTAINER_NAME_UTILS.into(),
        image: Some(spec.utils_image().map(str::to_string).unwrap_or_else(|| cfg.utils_image.clone())),
        image_pull_policy: spec.utils.as_ref().and_then(|u| u.image_pull_policy.clone()),
        command: Some(vec![UTILS_INIT_COMMAND.into(), "init".into()]),
        env: Some(env),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

/// User init containers and sidecars get the pod identity variables and
/// the utils mount unless they already declare them.
fn user_container<W: Workload>(w: &W, c: &Container) -> Container {
    let mut c = c.clone();
    let mut env = c.env.take().unwrap_or_default();
    merge_missing(&mut env, common_env(w));
    let mut mounts = c.volume_mounts.take().unwrap_or_default();
    push_mount_if_missing(&mut mounts, utils_mount());
    mounts.extend(w.common_spec().volume_mounts.iter().cloned());
    c.env = Some(env);
    c.volume_mounts = Some(mounts);
    c
}

/// Spread members of one workload across zones unless affinity is given.
fn default_affinity<W: Workload>(w: &W) -> Affinity {
    let term = PodAffinityTerm {
        topology_key: TOPOLOGY_KEY.into(),
        label_selector: Some(LabelSelector {
            match_expressions: Some(vec![
                LabelSelectorRequirement { key: LABEL_CLUSTER.into(), operator: "In".into(), values: Some(vec![w.cluster_name()]) },
                LabelSelectorRequirement { key: LABEL_WORKLOAD.into(), operator: "In".into(), values: Some(vec![w.name().to_string()]) },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    };
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![WeightedPodAffinityTerm { weight: 1, pod_affinity_term: term }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> { if v.is_empty() { None } else { Some(v) } }

/// Pod template for the principal resource. `restart_policy` is only set
/// for Jobs.
pub fn pod_template<W: Workload>(
    w: &W,
    cfg: &OperatorConfig,
    backing: StorageBacking,
    restart_policy: Option<String>,
) -> PodTemplateSpec {
    let spec = w.common_spec();

    let mut labels = w.pod_selector_labels();
    labels.insert(LABEL_WKA_MEMBER.into(), spec.is_wka_member().to_string());
    labels.extend(spec.labels.clone());

    let mut init_containers = vec![utils_container(w, cfg, backing)];
    init_containers.extend(spec.init_containers.iter().map(|c| user_container(w, c)));
    let mut containers = vec![grid_container(w, cfg, backing)];
    containers.extend(spec.side_cars.iter().map(|c| user_container(w, c)));

    let mut volumes = vec![Volume { name: VOLUME_NAME_UTILS.into(), empty_dir: Some(EmptyDirVolumeSource::default()), ..Default::default() }];
    volumes.extend(persistence::volumes(spec.persistence()));
    volumes.extend(spec.volumes.iter().cloned());

    let service_account_name = spec.service_account_name.clone().filter(|s| !s.is_empty() && s != "default");

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            annotations: Some(spec.annotations.clone()).filter(|a| !a.is_empty()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            image_pull_secrets: non_empty(spec.image_pull_secrets.clone()),
            service_account_name,
            tolerations: non_empty(spec.tolerations.clone()),
            affinity: Some(spec.affinity.clone().unwrap_or_else(|| default_affinity(w))),
            node_selector: Some(spec.node_selector.clone()).filter(|m| !m.is_empty()),
            init_containers: Some(init_containers),
            containers,
            volumes: Some(volumes),
            restart_policy,
            ..Default::default()
        }),
    }
}
