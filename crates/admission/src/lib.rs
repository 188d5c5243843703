//! Grid admission (Milestone 1): validation and defaulting of workload specs.
//!
//! Rules run against the typed model; `review` adapts them to the
//! admission.k8s.io review envelope.

#![forbid(unsafe_code)]

pub mod defaults;
pub mod image;
pub mod review;
pub mod rules;

pub use defaults::{default_workload, default_workload_with};
pub use image::{parse_reference, ReferenceError};
pub use review::review;
pub use rules::{validate_create, validate_delete, validate_update, validate_update_with, Admissible};

/// Non-fatal notes returned alongside a verdict.
pub type Warnings = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("invalid {field}: {reason}")]
    StructuralInvalid { field: String, reason: String },
    #[error("{field} is immutable: {reason}")]
    ImmutabilityViolation { field: String, reason: String },
}

impl AdmissionError {
    pub fn field(&self) -> &str {
        match self {
            AdmissionError::StructuralInvalid { field, .. } | AdmissionError::ImmutabilityViolation { field, .. } => field,
        }
    }
}
