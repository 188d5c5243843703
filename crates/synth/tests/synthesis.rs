#![forbid(unsafe_code)]

use grid_core::constants::{LABEL_HASH, VOLUME_NAME_PERSISTENCE};
use grid_core::{hash_workload, GridCluster, GridJob, OperatorConfig};
use grid_synth::{plan, ChangeAction, ChildResources, Resource};

const CLUSTER: &str = r#"
metadata:
  name: storage
  namespace: grid
spec:
  replicas: 3
  image: ghcr.io/skelops/grid:1.2.0
  ports:
    - name: rest
      port: 8080
    - name: extend
      port: 20000
      nodePort: 30100
      service:
        type: NodePort
    - name: metrics
  runtime:
    logLevel: 5
    metrics:
      enabled: true
    persistence:
      mode: active
      persistentVolumeClaim:
        accessModes: ["ReadWriteOnce"]
        resources:
          requests:
            storage: 2Gi
"#;

fn cluster() -> GridCluster { serde_yaml::from_str(CLUSTER).unwrap() }

fn names(set: &grid_synth::ResourceSet) -> Vec<String> {
    set.iter().map(|r| format!("{}/{}", r.kind(), r.name())).collect()
}

#[test]
fn services_then_sorted_ports_then_principal() {
    let set = cluster().create_child_resources_with(&OperatorConfig::default());
    assert_eq!(
        names(&set),
        vec![
            "Service/storage-wka",
            "Service/storage-sts",
            "Service/storage-extend",
            "Service/storage-metrics",
            "Service/storage-rest",
            "StatefulSet/storage",
        ]
    );
    assert!(matches!(set.principal(), Some(Resource::StatefulSet(_))));
}

#[test]
fn synthesis_is_deterministic() {
    let cfg = OperatorConfig::default();
    let a = serde_json::to_string(&cluster().create_child_resources_with(&cfg)).unwrap();
    let b = serde_json::to_string(&cluster().create_child_resources_with(&cfg)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn principal_carries_fingerprint_and_claims() {
    let c = cluster();
    let set = c.create_child_resources_with(&OperatorConfig::default());
    let Some(Resource::StatefulSet(sts)) = set.principal() else { panic!("expected a StatefulSet") };
    let labels = sts.metadata.labels.as_ref().unwrap();
    assert_eq!(labels.get(LABEL_HASH), Some(&hash_workload(&c, None).unwrap()));
    let claims = sts.spec.as_ref().unwrap().volume_claim_templates.as_ref().unwrap();
    assert_eq!(claims[0].metadata.name.as_deref(), Some(VOLUME_NAME_PERSISTENCE));
}

#[test]
fn external_discovery_omits_own_wka_service() {
    let mut c = cluster();
    c.spec.common.runtime.as_mut().unwrap().wka =
        Some(grid_core::model::WkaSpec { workload: "primary".into(), namespace: None });
    let set = c.create_child_resources_with(&OperatorConfig::default());
    assert!(set.get("Service", "storage-wka").is_none());
    assert!(set.get("Service", "storage-sts").is_some());
}

#[test]
fn job_workload_ends_with_job() {
    let mut j = GridJob::default();
    j.metadata.name = Some("loader".into());
    j.metadata.namespace = Some("grid".into());
    j.spec.common.replicas = Some(2);
    let set = j.create_child_resources_with(&OperatorConfig::default());
    assert_eq!(names(&set), vec!["Service/loader-wka", "Service/loader-sts", "Job/loader"]);
}

#[test]
fn scaling_only_updates_the_principal() {
    let cfg = OperatorConfig::default();
    let before = cluster().create_child_resources_with(&cfg);
    let mut scaled = cluster();
    scaled.spec.common.replicas = Some(5);
    let after = scaled.create_child_resources_with(&cfg);
    let changed: Vec<_> = plan(&before, &after)
        .into_iter()
        .filter(|c| c.action != ChangeAction::Unchanged)
        .map(|c| (c.kind, c.name))
        .collect();
    assert_eq!(changed, vec![("StatefulSet".to_string(), "storage".to_string())]);
}
