//! Mock ClusterClient for unit testing
//!
//! This module provides an in-memory implementation of [`ClusterClient`]
//! that behaves like a small API server: it assigns uids and resource
//! versions, rejects stale updates and keeps status separate from the rest of
//! the object. Failures can be injected per operation to exercise error paths.
//!
//! - `store.rs` - object storage and the CRUD semantics
//! - `failures.rs` - injected failures

mod failures;
mod store;

pub use failures::Operation;

use crate::cluster_trait::ClusterClient;
use crate::error::ClusterError;
use crate::object::{ClusterObject, ObjectKey, ObjectType};
use failures::Failures;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use store::Store;

/// Mock ClusterClient for testing
///
/// Clones share the same storage, so a test can hand one clone to the code
/// under test and inspect the cluster state through another.
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    pub(crate) store: Arc<Mutex<Store>>,
    pub(crate) failures: Arc<Mutex<Failures>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockClusterClient {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` fail with
    /// [`ClusterError::Unavailable`]. Calls queue up.
    pub fn fail_next(&self, operation: Operation) {
        lock(&self.failures).push(operation, 0);
    }

    /// Let `successes` calls of `operation` through, then fail one.
    pub fn fail_after(&self, operation: Operation, successes: usize) {
        lock(&self.failures).push(operation, successes);
    }

    /// Drop all pending injected failures
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Snapshot of a stored object
    pub fn object(&self, key: &ObjectKey) -> Option<ClusterObject> {
        lock(&self.store).get(key)
    }

    /// Snapshot of all stored objects, ordered by key
    pub fn objects(&self) -> Vec<ClusterObject> {
        lock(&self.store).all()
    }

    /// Stored objects of one type
    pub fn objects_of(&self, object_type: &ObjectType) -> Vec<ClusterObject> {
        lock(&self.store).list(object_type, None, None)
    }

    /// Number of writes that changed the stored state
    pub fn write_count(&self) -> u64 {
        lock(&self.store).writes()
    }

    /// Store an object directly, bypassing create semantics and failure
    /// injection. Existing objects with the same key are replaced.
    pub fn insert(&self, object: ClusterObject) -> ClusterObject {
        lock(&self.store).insert(object)
    }

    /// Remove an object directly. Returns whether it existed.
    pub fn remove(&self, key: &ObjectKey) -> bool {
        lock(&self.store).remove(key).is_some()
    }

    fn check(&self, operation: Operation, key: &ObjectKey) -> Result<(), ClusterError> {
        if lock(&self.failures).take(operation) {
            return Err(ClusterError::Unavailable(format!(
                "injected {operation} failure for {key}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterClient for MockClusterClient {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ClusterObject>, ClusterError> {
        self.check(Operation::Get, key)?;
        Ok(lock(&self.store).get(key))
    }

    async fn create(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        self.check(Operation::Create, &object.key())?;
        lock(&self.store).create(object)
    }

    async fn update(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        self.check(Operation::Update, &object.key())?;
        lock(&self.store).update(object)
    }

    async fn update_status(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        self.check(Operation::UpdateStatus, &object.key())?;
        lock(&self.store).update_status(object)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        self.check(Operation::Delete, key)?;
        lock(&self.store)
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))
    }

    async fn list(
        &self,
        object_type: &ObjectType,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ClusterObject>, ClusterError> {
        self.check(
            Operation::List,
            &ObjectKey::new(object_type.clone(), namespace, ""),
        )?;
        let selector = label_selector
            .map(crate::object::parse_label_selector)
            .transpose()?;
        Ok(lock(&self.store).list(object_type, namespace, selector.as_ref()))
    }
}
