//! admission.k8s.io review envelope around the typed rules.

use grid_core::{GridCluster, GridJob};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::rules::{validate_create, validate_delete, validate_update, Admissible};
use crate::{AdmissionError, Warnings};

fn decode<W: DeserializeOwned>(obj: &DynamicObject) -> Result<W, String> {
    serde_json::to_value(obj).and_then(serde_json::from_value).map_err(|e| format!("cannot decode object: {e}"))
}

fn verdict(req: &AdmissionRequest<DynamicObject>, (warnings, result): (Warnings, Result<(), AdmissionError>)) -> AdmissionResponse {
    let mut resp = match result {
        Ok(()) => AdmissionResponse::from(req),
        Err(e) => AdmissionResponse::from(req).deny(e),
    };
    if !warnings.is_empty() {
        resp.warnings = Some(warnings);
    }
    resp
}

fn admit<W: Admissible + DeserializeOwned>(req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let object = req.object.as_ref().map(decode::<W>).transpose();
    let old_object = req.old_object.as_ref().map(decode::<W>).transpose();
    let outcome = match (req.operation.clone(), object, old_object) {
        (_, Err(e), _) | (_, _, Err(e)) => return AdmissionResponse::invalid(e),
        (Operation::Create, Ok(Some(w)), _) => validate_create(&w),
        (Operation::Update, Ok(Some(w)), Ok(Some(old))) => validate_update(&old, &w),
        (Operation::Delete, _, Ok(Some(old))) => validate_delete(&old),
        (Operation::Connect, _, _) | (Operation::Delete, _, Ok(None)) => (Warnings::new(), Ok(())),
        (op, _, _) => return AdmissionResponse::invalid(format!("{op:?} request for {} without required object", W::KIND)),
    };
    verdict(req, outcome)
}

/// Answer a validating admission review for GridCluster or GridJob.
/// Other kinds are allowed untouched.
pub fn review(review: AdmissionReview<DynamicObject>) -> AdmissionReview<DynamicObject> {
    let req: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "malformed admission review");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };
    debug!(kind = %req.kind.kind, name = %req.name, op = ?req.operation, "admission review");
    let kind = req.kind.kind.as_str();
    let resp = if kind == GridCluster::KIND {
        admit::<GridCluster>(&req)
    } else if kind == GridJob::KIND {
        admit::<GridJob>(&req)
    } else {
        AdmissionResponse::from(&req)
    };
    resp.into_review()
}
