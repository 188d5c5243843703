#![forbid(unsafe_code)]

use grid_core::{FixedClock, GridCluster, GridJob};
use grid_status::{update, Phase, PrincipalObservation, WorkloadStatus};
use k8s_openapi::api::apps::v1::StatefulSetStatus;
use k8s_openapi::api::batch::v1::JobStatus;

const EXCLUSIVE: [Phase; 5] = [Phase::Ready, Phase::Scaling, Phase::RollingUpgrade, Phase::Waiting, Phase::Stopped];

fn cluster(replicas: i32) -> GridCluster {
    let mut c = GridCluster::default();
    c.metadata.name = Some("storage".into());
    c.metadata.namespace = Some("grid".into());
    c.spec.common.replicas = Some(replicas);
    c
}

fn sts(current: i32, ready: i32, rev: &str, update_rev: &str) -> PrincipalObservation {
    PrincipalObservation::StatefulSet(StatefulSetStatus {
        replicas: current,
        current_replicas: Some(current),
        ready_replicas: Some(ready),
        current_revision: Some(rev.into()),
        update_revision: Some(update_rev.into()),
        ..Default::default()
    })
}

fn created(c: &GridCluster, clock: &FixedClock) -> WorkloadStatus {
    let mut s = WorkloadStatus::default();
    update(&mut s, c, None, clock);
    s.mark_created(clock).unwrap();
    s
}

fn exclusive_true(s: &WorkloadStatus) -> usize {
    EXCLUSIVE.iter().filter(|p| s.conditions.is_true_for(p.as_str())).count()
}

#[test]
fn becomes_ready_when_counts_match() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = created(&c, &clock);
    assert!(update(&mut s, &c, Some(&sts(3, 2, "r1", "r1")), &clock));
    assert_eq!(s.phase, Some(Phase::Created));
    assert!(update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock));
    assert_eq!(s.phase, Some(Phase::Ready));
    assert_eq!((s.current_replicas, s.ready_replicas), (3, 3));
}

#[test]
fn re_entering_a_phase_is_idempotent() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = created(&c, &clock);
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock);
    let snapshot = s.clone();
    let later = FixedClock::at_secs(99);
    assert!(!update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &later));
    assert_eq!(s, snapshot);
}

#[test]
fn rolling_upgrade_and_back_keeps_one_exclusive_true() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = created(&c, &clock);
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock);
    assert_eq!(exclusive_true(&s), 1);

    update(&mut s, &c, Some(&sts(3, 3, "r1", "r2")), &clock);
    assert_eq!(s.phase, Some(Phase::RollingUpgrade));
    assert!(s.conditions.is_false_for("Ready"));
    assert_eq!(exclusive_true(&s), 1);

    update(&mut s, &c, Some(&sts(3, 3, "r2", "r2")), &clock);
    assert_eq!(s.phase, Some(Phase::Ready));
    assert!(s.conditions.is_false_for("RollingUpgrade"));
    assert_eq!(exclusive_true(&s), 1);
}

#[test]
fn zero_replicas_force_stopped() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = created(&c, &clock);
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock);
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r2")), &clock);
    assert_eq!(s.phase, Some(Phase::RollingUpgrade));

    let stopped = cluster(0);
    assert!(update(&mut s, &stopped, Some(&sts(0, 0, "r1", "r2")), &clock));
    assert_eq!(s.phase, Some(Phase::Stopped));
    assert_eq!(s.replicas, 0);
    assert_eq!(exclusive_true(&s), 1);
}

#[test]
fn zero_replicas_stop_a_fresh_workload_without_observation() {
    let clock = FixedClock::at_secs(10);
    let mut s = WorkloadStatus::default();
    assert!(update(&mut s, &cluster(0), None, &clock));
    assert_eq!(s.phase, Some(Phase::Stopped));
    assert!(s.conditions.is_true_for("Initialized"));
    assert_eq!(exclusive_true(&s), 1);
}

#[test]
fn zero_replicas_override_matching_counts() {
    let clock = FixedClock::at_secs(10);
    let idle = cluster(0);
    let mut s = created(&idle, &clock);
    assert!(update(&mut s, &idle, Some(&sts(0, 0, "r1", "r1")), &clock));
    assert_eq!(s.phase, Some(Phase::Stopped));
    assert!(!s.conditions.is_true_for("Ready"));
    assert_eq!(exclusive_true(&s), 1);
}

#[test]
fn zero_replicas_stop_a_ready_workload_that_vanished() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = created(&c, &clock);
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock);
    assert_eq!(s.phase, Some(Phase::Ready));
    assert!(update(&mut s, &cluster(0), None, &clock));
    assert_eq!(s.phase, Some(Phase::Stopped));
    assert!(s.conditions.is_false_for("Ready"));
    assert_eq!(exclusive_true(&s), 1);
}

#[test]
fn zero_replica_job_stops_whatever_the_job_reports() {
    let clock = FixedClock::at_secs(10);
    let mut j = GridJob::default();
    j.metadata.name = Some("loader".into());
    j.spec.common.replicas = Some(0);

    let idle = PrincipalObservation::Job(JobStatus::default());
    let mut s = WorkloadStatus::default();
    assert!(update(&mut s, &j, Some(&idle), &clock));
    assert_eq!(s.phase, Some(Phase::Stopped));
    assert_eq!(exclusive_true(&s), 1);

    s.mark_created(&clock).unwrap();
    let obs = PrincipalObservation::Job(JobStatus { active: Some(2), ready: Some(1), ..Default::default() });
    assert!(update(&mut s, &j, Some(&obs), &clock));
    assert_eq!(s.phase, Some(Phase::Stopped));
    assert_eq!(s.active, 2);
    assert!(!s.conditions.is_true_for("Ready"));
    assert_eq!(exclusive_true(&s), 1);
}

#[test]
fn off_table_transition_is_skipped() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = WorkloadStatus::default();
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock);
    assert_eq!(s.phase, Some(Phase::Initialized));
    assert_eq!(s.ready_replicas, 3);
}

#[test]
fn missing_observation_zeroes_counts() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let mut s = created(&c, &clock);
    update(&mut s, &c, Some(&sts(3, 3, "r1", "r1")), &clock);
    assert!(update(&mut s, &c, None, &clock));
    assert_eq!((s.current_replicas, s.ready_replicas), (0, 0));
}

#[test]
fn job_counts_drive_ready() {
    let clock = FixedClock::at_secs(10);
    let mut j = GridJob::default();
    j.metadata.name = Some("loader".into());
    j.spec.common.replicas = Some(2);
    let mut s = WorkloadStatus::default();
    update(&mut s, &j, None, &clock);
    s.mark_created(&clock).unwrap();

    let obs = PrincipalObservation::Job(JobStatus { active: Some(1), succeeded: Some(1), ready: Some(2), failed: Some(1), ..Default::default() });
    assert!(update(&mut s, &j, Some(&obs), &clock));
    assert_eq!(s.phase, Some(Phase::Ready));
    assert_eq!((s.active, s.succeeded, s.failed), (1, 1, 1));
    assert_eq!(s.current_replicas, 2);
}

#[test]
fn ledger_serializes_sorted() {
    let clock = FixedClock::at_secs(10);
    let c = cluster(3);
    let s = created(&c, &clock);
    let v = serde_json::to_value(&s).unwrap();
    let types: Vec<_> = v["conditions"].as_array().unwrap().iter().map(|c| c["type"].as_str().unwrap().to_string()).collect();
    assert_eq!(types, vec!["Created", "Initialized"]);
    assert_eq!(v["phase"], "Created");
}
