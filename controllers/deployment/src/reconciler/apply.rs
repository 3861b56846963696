//! Create, update and prune child objects.

use crate::error::ControllerError;
use crate::manifest::ManagedType;
use crate::reconcile_helpers::{annotate_desired_state, child_in_sync};
use cluster_client::{ClusterClient, ClusterObject, ObjectKey};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// What applying a child did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The child did not exist
    Created,
    /// The child had drifted from the desired state
    Updated,
    /// The child already matched
    Unchanged,
}

/// Bring one child to its desired state.
///
/// The written object carries a digest of its desired state. An existing
/// child is rewritten when its labels or owners differ, when it lacks a
/// desired field or when the desired state changed since the last write.
/// The write replaces everything but the metadata, where only labels, owner
/// references and the digest annotation are replaced.
pub async fn apply(
    client: &dyn ClusterClient,
    desired: &ClusterObject,
) -> Result<Applied, ControllerError> {
    let key = desired.key();
    let mut desired = desired.clone();
    annotate_desired_state(&mut desired);

    let Some(observed) = client.get(&key).await? else {
        client.create(&desired).await?;
        info!("Created {}", key);
        return Ok(Applied::Created);
    };

    if child_in_sync(&observed, &desired) {
        debug!("{} is up to date", key);
        return Ok(Applied::Unchanged);
    }

    warn!("{} drifted from the desired state, updating", key);
    let mut metadata = observed.metadata;
    metadata.labels.clone_from(&desired.metadata.labels);
    metadata
        .owner_references
        .clone_from(&desired.metadata.owner_references);
    let annotations = metadata.annotations.get_or_insert_with(Default::default);
    annotations.extend(desired.metadata.annotations.take().unwrap_or_default());
    desired.metadata = metadata;

    client.update(&desired).await?;
    info!("Updated {}", key);
    Ok(Applied::Updated)
}

/// Delete children carrying `selector` that are not in `desired`.
///
/// Returns the number of deleted objects. Objects that vanish in between are
/// not an error.
pub async fn prune(
    client: &dyn ClusterClient,
    managed_types: &[ManagedType],
    namespace: &str,
    selector: &str,
    desired: &[ClusterObject],
) -> Result<usize, ControllerError> {
    let wanted: BTreeSet<ObjectKey> = desired.iter().map(ClusterObject::key).collect();
    let mut deleted = 0;

    for managed in managed_types {
        let namespace = managed.namespaced.then_some(namespace);
        let existing = client
            .list(&managed.object_type, namespace, Some(selector))
            .await?;
        for object in existing {
            let key = object.key();
            if wanted.contains(&key) {
                continue;
            }
            match client.delete(&key).await {
                Ok(()) => {
                    info!("Deleted stale {}", key);
                    deleted += 1;
                }
                Err(e) if e.is_not_found() => debug!("{} already gone", key),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(deleted)
}
