//! Grid status (Milestone 1): phase state machine over the condition ledger.

#![forbid(unsafe_code)]

mod phase;
mod status;

pub use phase::Phase;
pub use status::{update, PrincipalObservation, WorkloadStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("illegal phase transition from {from:?} to {to}")]
    IllegalTransition { from: String, to: Phase },
}
