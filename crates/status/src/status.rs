//! Observed status of a workload and the update driven by its principal.

use grid_core::constants::LABEL_HASH;
use grid_core::{hash_workload, Clock, Condition, ConditionStatus, Conditions, Workload, WorkloadType};
use k8s_openapi::api::apps::v1::StatefulSetStatus;
use k8s_openapi::api::batch::v1::JobStatus;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Phase, StatusError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<WorkloadType>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub current_replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub active: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub succeeded: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failed: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

fn is_zero(v: &i32) -> bool { *v == 0 }

/// Status of the principal resource as last read from the cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum PrincipalObservation {
    StatefulSet(StatefulSetStatus),
    Job(JobStatus),
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value { return false; }
    *slot = value;
    true
}

impl WorkloadStatus {
    pub fn phase_str(&self) -> &'static str { self.phase.map(Phase::as_str).unwrap_or("") }

    /// Move to `next` unconditionally: vacate the old exclusive condition,
    /// then mark `next` true.
    fn apply(&mut self, next: Phase, cond: Condition, clock: &dyn Clock) -> bool {
        if self.phase == Some(next) {
            return self.conditions.set(cond, clock);
        }
        if let Some(prev) = self.phase.filter(|p| p.is_exclusive()) {
            self.conditions.set(Condition::new(prev.as_str(), ConditionStatus::False), clock);
        }
        info!(cluster = %self.cluster, from = %self.phase_str(), to = %next, "phase changed");
        counter!("status_phase_transitions", 1, "phase" => next.as_str());
        self.phase = Some(next);
        self.conditions.set(cond, clock);
        true
    }

    fn check(&self, next: Phase) -> Result<(), StatusError> {
        let permitted = match self.phase {
            Some(from) => from.allows(next),
            None => next == Phase::Initialized,
        };
        if permitted {
            Ok(())
        } else {
            Err(StatusError::IllegalTransition { from: self.phase_str().to_string(), to: next })
        }
    }

    /// Enter `next` if the lifecycle permits it. Re-entering the current
    /// phase is a no-op returning `Ok(false)`.
    pub fn set_phase(&mut self, next: Phase, clock: &dyn Clock) -> Result<bool, StatusError> {
        if self.phase == Some(next) {
            return Ok(false);
        }
        self.check(next)?;
        Ok(self.apply(next, Condition::new(next.as_str(), ConditionStatus::True), clock))
    }

    /// Phase entry used by `update`: off-table moves are logged and skipped,
    /// Stopped and Failed are always applied.
    fn enter(&mut self, next: Phase, clock: &dyn Clock) -> bool {
        if self.phase == Some(next) {
            return false;
        }
        let forced = matches!(next, Phase::Stopped | Phase::Failed);
        if let Err(e) = self.check(next).or_else(|e| if forced { Ok(()) } else { Err(e) }) {
            warn!(cluster = %self.cluster, error = %e, "transition skipped");
            counter!("status_transitions_skipped", 1, "to" => next.as_str());
            return false;
        }
        self.apply(next, Condition::new(next.as_str(), ConditionStatus::True), clock)
    }

    pub fn mark_created(&mut self, clock: &dyn Clock) -> Result<bool, StatusError> { self.set_phase(Phase::Created, clock) }

    pub fn mark_waiting(&mut self, clock: &dyn Clock) -> Result<bool, StatusError> { self.set_phase(Phase::Waiting, clock) }

    pub fn mark_scaling(&mut self, clock: &dyn Clock) -> Result<bool, StatusError> { self.set_phase(Phase::Scaling, clock) }

    /// Failed is reachable from every phase; the reason and message land on
    /// the Failed condition.
    pub fn mark_failed(&mut self, reason: &str, message: &str, clock: &dyn Clock) -> bool {
        let cond = Condition::new(Phase::Failed.as_str(), ConditionStatus::True).with_reason(reason, message);
        self.apply(Phase::Failed, cond, clock)
    }

    /// Backfill identity fields and enter Initialized on first sight.
    fn ensure_initialized<W: Workload>(&mut self, w: &W, clock: &dyn Clock) -> bool {
        let hash = match w.metadata().labels.as_ref().and_then(|l| l.get(LABEL_HASH)) {
            Some(h) => h.clone(),
            None => hash_workload(w, None).unwrap_or_default(),
        };
        let mut updated = assign(&mut self.hash, hash);
        updated |= assign(&mut self.replicas, w.replicas());
        updated |= assign(&mut self.cluster, w.cluster_name());
        if self.conditions.get(Phase::Initialized.as_str()).is_none() {
            updated |= self.apply(Phase::Initialized, Condition::new(Phase::Initialized.as_str(), ConditionStatus::True), clock);
        }
        if self.selector.is_empty() {
            self.selector = w.status_selector();
            updated = true;
        }
        updated |= assign(&mut self.role, w.role_name());
        updated |= assign(&mut self.type_, Some(w.workload_type()));
        updated
    }

    fn observe_stateful_set(&mut self, sts: &StatefulSetStatus, clock: &dyn Clock) -> bool {
        let mut updated = assign(&mut self.current_replicas, sts.current_replicas.unwrap_or(0));
        updated |= assign(&mut self.ready_replicas, sts.ready_replicas.unwrap_or(0));
        if sts.current_revision == sts.update_revision {
            if self.phase != Some(Phase::Ready) && self.counts_match() {
                updated |= self.enter(Phase::Ready, clock);
            }
        } else if self.phase != Some(Phase::RollingUpgrade) {
            updated |= self.enter(Phase::RollingUpgrade, clock);
        }
        updated
    }

    fn observe_job(&mut self, job: &JobStatus, clock: &dyn Clock) -> bool {
        let active = job.active.unwrap_or(0);
        let succeeded = job.succeeded.unwrap_or(0);
        let mut updated = assign(&mut self.current_replicas, active + succeeded);
        if let Some(ready) = job.ready {
            updated |= assign(&mut self.ready_replicas, ready);
        }
        if self.phase != Some(Phase::Ready) && self.counts_match() {
            updated |= self.enter(Phase::Ready, clock);
        }
        updated |= assign(&mut self.active, active);
        updated |= assign(&mut self.succeeded, succeeded);
        updated |= assign(&mut self.failed, job.failed.unwrap_or(0));
        updated
    }

    fn counts_match(&self) -> bool { self.replicas == self.ready_replicas && self.replicas == self.current_replicas }

    fn clear_counts(&mut self) -> bool {
        let mut updated = assign(&mut self.current_replicas, 0);
        updated |= assign(&mut self.ready_replicas, 0);
        updated |= assign(&mut self.active, 0);
        updated |= assign(&mut self.succeeded, 0);
        updated |= assign(&mut self.failed, 0);
        updated
    }
}

/// Fold the latest observation of the principal into `status`. Returns
/// whether anything changed, so callers can skip a status write.
pub fn update<W: Workload>(
    status: &mut WorkloadStatus,
    w: &W,
    observed: Option<&PrincipalObservation>,
    clock: &dyn Clock,
) -> bool {
    let mut updated = status.ensure_initialized(w, clock);
    updated |= match observed {
        Some(PrincipalObservation::StatefulSet(s)) => status.observe_stateful_set(s, clock),
        Some(PrincipalObservation::Job(j)) => status.observe_job(j, clock),
        None => status.clear_counts(),
    };
    if w.replicas() == 0 {
        updated |= status.enter(Phase::Stopped, clock);
    }
    debug!(workload = %w.name(), phase = %status.phase_str(), updated, "status updated");
    updated
}
