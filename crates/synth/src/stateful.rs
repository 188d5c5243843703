//! StatefulSet principal of a long-running cluster.

use grid_core::constants::*;
use grid_core::{OperatorConfig, Workload};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::persistence::{self, StorageBacking};
use crate::pod::pod_template;
use crate::principal_labels;

pub fn stateful_set<W: Workload>(w: &W, cfg: &OperatorConfig) -> StatefulSet {
    let spec = w.common_spec();

    let mut claims = persistence::claim_templates(w, spec.persistence());
    claims.extend(spec.volume_claim_templates.iter().cloned());

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(w.name().to_string()),
            namespace: Some(w.namespace().to_string()),
            labels: Some(principal_labels(w, COMPONENT_STATEFUL_SET)),
            annotations: w.workload_annotations(),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(w.replicas()),
            pod_management_policy: Some("Parallel".into()),
            update_strategy: Some(StatefulSetUpdateStrategy { type_: Some("RollingUpdate".into()), rolling_update: None }),
            revision_history_limit: Some(5),
            service_name: w.headless_service_name(),
            selector: LabelSelector { match_labels: Some(w.pod_selector_labels()), match_expressions: None },
            template: pod_template(w, cfg, StorageBacking::ClaimsOrVolumes, None),
            volume_claim_templates: if claims.is_empty() { None } else { Some(claims) },
            ..Default::default()
        }),
        ..Default::default()
    }
}
