//! Grid core (Milestone 1): workload model, condition ledger and fingerprint.
//!
//! Everything here is pure data plus deterministic functions over it; the
//! reconcile loop that persists results lives elsewhere.

#![forbid(unsafe_code)]

pub mod conditions;
pub mod config;
pub mod constants;
pub mod fingerprint;
pub mod model;
pub mod workload;

pub use conditions::{Clock, Condition, ConditionStatus, Conditions, FixedClock, SystemClock};
pub use config::{operator_config, OperatorConfig};
pub use fingerprint::{ensure_hash_label, hash, hash_workload, FingerprintError};
pub use model::*;
pub use workload::{Labels, Workload};

pub mod prelude {
    pub use super::{
        Clock, CommonSpec, Condition, ConditionStatus, Conditions, GridCluster, GridClusterSpec, GridJob, GridJobSpec,
        NamedPort, OperatorConfig, Workload, WorkloadType,
    };
}
