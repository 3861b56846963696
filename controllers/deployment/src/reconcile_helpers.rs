//! Helper functions for common reconciliation patterns
//!
//! Comparisons between observed and desired state, used to decide whether a
//! write is needed at all.

use crate::names::DESIRED_STATE_ANNOTATION;
use cluster_client::ClusterObject;
use crds::{DeploymentPhase, DeploymentStatus};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Whether `observed` contains everything `desired` sets.
///
/// Objects match when every desired field is present in the observed object
/// with a matching value; extra observed fields (server defaults, status) are
/// ignored. Arrays must have the same length and match element by element.
/// Other values must be equal.
pub fn json_contains(observed: &Value, desired: &Value) -> bool {
    match (observed, desired) {
        (Value::Object(observed), Value::Object(desired)) => desired.iter().all(|(key, value)| {
            observed
                .get(key)
                .is_some_and(|observed| json_contains(observed, value))
        }),
        (Value::Array(observed), Value::Array(desired)) => {
            observed.len() == desired.len()
                && observed
                    .iter()
                    .zip(desired)
                    .all(|(observed, desired)| json_contains(observed, desired))
        }
        (observed, desired) => observed == desired,
    }
}

/// Digest of everything below the metadata of a desired object.
///
/// `serde_json` keeps object keys sorted, so equal objects always render to
/// the same text.
pub fn desired_state_digest(desired: &ClusterObject) -> String {
    let mut hasher = Sha256::new();
    hasher.update(desired.api_version.as_bytes());
    hasher.update(desired.kind.as_bytes());
    hasher.update(desired.data.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Record the digest of `desired` in its own annotations.
pub fn annotate_desired_state(desired: &mut ClusterObject) {
    let digest = desired_state_digest(desired);
    desired
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(DESIRED_STATE_ANNOTATION.to_string(), digest);
}

fn recorded_digest(object: &ClusterObject) -> Option<&str> {
    object
        .metadata
        .annotations
        .as_ref()?
        .get(DESIRED_STATE_ANNOTATION)
        .map(String::as_str)
}

/// Whether an observed child still matches an annotated desired child.
///
/// Labels and owner references belong to the operator and must be equal.
/// The body must contain every desired field, and the recorded digest must
/// match, so fields dropped from the desired state count as drift while
/// server defaults and status do not.
pub fn child_in_sync(observed: &ClusterObject, desired: &ClusterObject) -> bool {
    observed.labels() == desired.labels()
        && observed.metadata.owner_references.clone().unwrap_or_default()
            == desired.metadata.owner_references.clone().unwrap_or_default()
        && recorded_digest(observed) == recorded_digest(desired)
        && json_contains(&observed.data, &desired.data)
}

/// Check if status needs to be updated.
///
/// The timestamp is ignored: only a change of phase or reason is worth a
/// write, otherwise every pass would rewrite a converged Deployment.
pub fn status_needs_update(
    current: Option<&DeploymentStatus>,
    phase: DeploymentPhase,
    reason: Option<&str>,
) -> bool {
    match current {
        None => true,
        Some(status) => status.phase != phase || status.reason.as_deref() != reason,
    }
}
