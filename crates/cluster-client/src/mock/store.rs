//! In-memory object storage for MockClusterClient

use crate::error::ClusterError;
use crate::object::{ClusterObject, ObjectKey, ObjectType};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct Store {
    objects: BTreeMap<ObjectKey, ClusterObject>,
    revision: u64,
    writes: u64,
}

impl Store {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    pub(crate) fn writes(&self) -> u64 {
        self.writes
    }

    pub(crate) fn get(&self, key: &ObjectKey) -> Option<ClusterObject> {
        self.objects.get(key).cloned()
    }

    pub(crate) fn all(&self) -> Vec<ClusterObject> {
        self.objects.values().cloned().collect()
    }

    pub(crate) fn list(
        &self,
        object_type: &ObjectType,
        namespace: Option<&str>,
        selector: Option<&BTreeMap<String, String>>,
    ) -> Vec<ClusterObject> {
        self.objects
            .iter()
            .filter(|(key, _)| &key.object_type == object_type)
            .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
            .filter(|(_, object)| {
                selector.is_none_or(|selector| {
                    let labels = object.labels();
                    selector
                        .iter()
                        .all(|(k, v)| labels.get(k).is_some_and(|value| value == v))
                })
            })
            .map(|(_, object)| object.clone())
            .collect()
    }

    pub(crate) fn insert(&mut self, mut object: ClusterObject) -> ClusterObject {
        if object.metadata.uid.is_none() {
            object.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        object.metadata.resource_version = Some(self.next_revision());
        self.writes += 1;
        self.objects.insert(object.key(), object.clone());
        object
    }

    pub(crate) fn remove(&mut self, key: &ObjectKey) -> Option<ClusterObject> {
        let removed = self.objects.remove(key);
        if removed.is_some() {
            self.writes += 1;
        }
        removed
    }

    pub(crate) fn create(&mut self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        if object.name().is_empty() {
            return Err(ClusterError::InvalidRequest(format!(
                "{} object without metadata.name",
                object.kind
            )));
        }
        let key = object.key();
        if self.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists(key.to_string()));
        }
        let mut object = object.clone();
        object.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        Ok(self.insert(object))
    }

    fn existing(&self, object: &ClusterObject) -> Result<&ClusterObject, ClusterError> {
        let key = object.key();
        let stored = self
            .objects
            .get(&key)
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))?;
        if let Some(version) = &object.metadata.resource_version
            && stored.metadata.resource_version.as_ref() != Some(version)
        {
            return Err(ClusterError::Conflict(format!(
                "{key}: resource version {version} is stale"
            )));
        }
        Ok(stored)
    }

    /// Store `updated` unless it equals `stored`, in which case nothing
    /// changes and no new resource version is assigned.
    fn commit(&mut self, stored: ClusterObject, mut updated: ClusterObject) -> ClusterObject {
        updated
            .metadata
            .resource_version
            .clone_from(&stored.metadata.resource_version);
        if updated == stored {
            return stored;
        }
        updated.metadata.resource_version = Some(self.next_revision());
        self.writes += 1;
        self.objects.insert(updated.key(), updated.clone());
        updated
    }

    pub(crate) fn update(&mut self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        let stored = self.existing(object)?.clone();

        let mut updated = object.clone();
        updated.metadata.uid.clone_from(&stored.metadata.uid);
        updated
            .metadata
            .creation_timestamp
            .clone_from(&stored.metadata.creation_timestamp);
        updated.set_status(stored.status().cloned());
        Ok(self.commit(stored, updated))
    }

    pub(crate) fn update_status(
        &mut self,
        object: &ClusterObject,
    ) -> Result<ClusterObject, ClusterError> {
        let stored = self.existing(object)?.clone();

        let mut updated = stored.clone();
        updated.set_status(object.status().cloned());
        Ok(self.commit(stored, updated))
    }
}
