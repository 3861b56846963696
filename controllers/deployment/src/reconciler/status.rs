//! Recording the outcome of a reconciliation on the Deployment.

use crate::error::ControllerError;
use crate::reconcile_helpers::status_needs_update;
use cluster_client::{ClusterClient, ClusterObject};
use crds::{DeploymentPhase, DeploymentStatus};
use tracing::{debug, info};

/// Status currently stored on a Deployment object. An unreadable status is
/// treated like a missing one.
pub fn current_status(object: &ClusterObject) -> Option<DeploymentStatus> {
    object
        .status()
        .and_then(|status| serde_json::from_value(status.clone()).ok())
}

/// Write phase and reason unless they are already recorded. Returns whether
/// a write happened.
pub async fn record(
    client: &dyn ClusterClient,
    object: &ClusterObject,
    phase: DeploymentPhase,
    reason: Option<&str>,
) -> Result<bool, ControllerError> {
    let current = current_status(object);
    if !status_needs_update(current.as_ref(), phase, reason) {
        debug!("Deployment {} status already {}", object.name(), phase);
        return Ok(false);
    }

    let status = DeploymentStatus {
        phase,
        reason: reason.map(str::to_string),
        last_updated: Some(chrono::Utc::now()),
    };
    let value = serde_json::to_value(&status)
        .map_err(|e| ControllerError::Internal(format!("failed to encode status: {e}")))?;
    let mut updated = object.clone();
    updated.set_status(Some(value));
    client.update_status(&updated).await?;

    match phase {
        DeploymentPhase::Running => info!("Deployment {} is running", object.name()),
        DeploymentPhase::Failed => info!(
            "Deployment {} failed: {}",
            object.name(),
            reason.unwrap_or_default()
        ),
        DeploymentPhase::New => info!("Deployment {} reset to new", object.name()),
    }
    Ok(true)
}
