//! Job principal of a run-to-completion workload.

use grid_core::constants::*;
use grid_core::{GridJob, OperatorConfig, Workload};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::persistence::StorageBacking;
use crate::pod::pod_template;
use crate::principal_labels;

pub fn job(w: &GridJob, cfg: &OperatorConfig) -> Job {
    let spec = &w.spec;
    let replicas = w.replicas();
    let completions = if spec.is_sync_completions() { Some(replicas) } else { spec.completions };

    Job {
        metadata: ObjectMeta {
            name: Some(w.name().to_string()),
            namespace: Some(w.namespace().to_string()),
            labels: Some(principal_labels(w, COMPONENT_JOB)),
            annotations: w.workload_annotations(),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(replicas),
            completions,
            backoff_limit: spec.backoff_limit,
            active_deadline_seconds: spec.active_deadline_seconds,
            ttl_seconds_after_finished: spec.ttl_seconds_after_finished,
            completion_mode: spec.completion_mode.clone(),
            suspend: spec.suspend,
            template: pod_template(w, cfg, StorageBacking::VolumesOnly, Some(spec.restart_policy().to_string())),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_job(replicas: i32) -> GridJob {
        let mut j = GridJob::default();
        j.metadata.name = Some("loader".into());
        j.metadata.namespace = Some("ns".into());
        j.spec.common.replicas = Some(replicas);
        j.spec.completions = Some(10);
        j
    }

    #[test]
    fn completions_follow_replicas_when_synced() {
        let mut j = grid_job(3);
        let spec = job(&j, &OperatorConfig::default()).spec.unwrap();
        assert_eq!((spec.parallelism, spec.completions), (Some(3), Some(10)));

        j.spec.sync_completions_to_replicas = Some(true);
        let spec = job(&j, &OperatorConfig::default()).spec.unwrap();
        assert_eq!((spec.parallelism, spec.completions), (Some(3), Some(3)));
    }

    #[test]
    fn restart_policy_defaults_to_never() {
        let j = grid_job(1);
        let out = job(&j, &OperatorConfig::default());
        let labels = out.metadata.labels.unwrap();
        assert_eq!(labels.get(LABEL_COMPONENT).map(String::as_str), Some(COMPONENT_JOB));
        let pod = out.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
    }
}
