//! ClusterClient trait for mocking
//!
//! This trait abstracts access to the Kubernetes API so the reconciler can run
//! against a real cluster or against the in-memory mock in unit tests.

use crate::error::ClusterError;
use crate::object::{ClusterObject, ObjectKey, ObjectType};

/// Trait for cluster object operations
///
/// Calls may fail with transient errors (API server unreachable, conflicts)
/// and callers are expected to retry them on a later reconcile.
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch an object. Returns `Ok(None)` if it does not exist.
    async fn get(&self, key: &ObjectKey) -> Result<Option<ClusterObject>, ClusterError>;

    /// Create an object. Fails with [`ClusterError::AlreadyExists`] if the
    /// key is taken.
    async fn create(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError>;

    /// Replace an existing object. The status of the stored object is kept.
    ///
    /// When `metadata.resourceVersion` is set it must match the stored
    /// version, otherwise the update fails with [`ClusterError::Conflict`].
    async fn update(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError>;

    /// Replace only the status of an existing object
    async fn update_status(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError>;

    /// Delete an object. Fails with [`ClusterError::NotFound`] if it does not
    /// exist.
    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError>;

    /// List objects of a type, optionally restricted to a namespace and an
    /// equality label selector (`key=value,...`).
    async fn list(
        &self,
        object_type: &ObjectType,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ClusterObject>, ClusterError>;
}
