//! ClusterClient backed by a live API server

use crate::cluster_trait::ClusterClient;
use crate::error::ClusterError;
use crate::object::{ClusterObject, ObjectKey, ObjectType};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::debug;

/// Field manager recorded for status writes
pub const FIELD_MANAGER: &str = "pmem-csi-operator";

/// Cluster client using the dynamic Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wrap an existing Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the in-cluster or kubeconfig defaults
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Unavailable(format!("failed to create Kubernetes client: {e}")))?;
        Ok(Self::new(client))
    }

    fn api(&self, object_type: &ObjectType, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(object_type.group(), object_type.version(), &object_type.kind);
        let api_resource = ApiResource::from_gvk(&gvk);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }
}

fn to_dynamic(object: &ClusterObject) -> Result<DynamicObject, ClusterError> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

fn from_dynamic(object: DynamicObject) -> Result<ClusterObject, ClusterError> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Map API status codes onto the error kinds callers distinguish.
fn map_error(err: kube::Error, key: &ObjectKey, on_conflict: fn(String) -> ClusterError) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(key.to_string()),
        kube::Error::Api(ae) if ae.code == 409 => on_conflict(format!("{key}: {}", ae.message)),
        kube::Error::Api(ae) if ae.code == 429 || ae.code >= 500 => {
            ClusterError::Unavailable(format!("{key}: {}", ae.message))
        }
        other => ClusterError::Kube(other),
    }
}

fn require_name(object: &ClusterObject) -> Result<(), ClusterError> {
    if object.name().is_empty() {
        return Err(ClusterError::InvalidRequest(format!(
            "{} object without metadata.name",
            object.kind
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ClusterObject>, ClusterError> {
        let api = self.api(&key.object_type, key.namespace.as_deref());
        let object = api
            .get_opt(&key.name)
            .await
            .map_err(|e| map_error(e, key, ClusterError::Conflict))?;
        object.map(from_dynamic).transpose()
    }

    async fn create(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        require_name(object)?;
        let key = object.key();
        debug!("Creating {}", key);
        let api = self.api(&key.object_type, key.namespace.as_deref());
        let created = api
            .create(&PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|e| map_error(e, &key, ClusterError::AlreadyExists))?;
        from_dynamic(created)
    }

    async fn update(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        require_name(object)?;
        let key = object.key();
        debug!("Updating {}", key);
        let api = self.api(&key.object_type, key.namespace.as_deref());
        let updated = api
            .replace(&key.name, &PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|e| map_error(e, &key, ClusterError::Conflict))?;
        from_dynamic(updated)
    }

    async fn update_status(&self, object: &ClusterObject) -> Result<ClusterObject, ClusterError> {
        require_name(object)?;
        let key = object.key();
        debug!("Updating status of {}", key);
        let api = self.api(&key.object_type, key.namespace.as_deref());
        let body = serde_json::json!({
            "apiVersion": object.api_version,
            "kind": object.kind,
            "status": object.status().cloned().unwrap_or(serde_json::Value::Null),
        });
        let updated = api
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&body),
            )
            .await
            .map_err(|e| map_error(e, &key, ClusterError::Conflict))?;
        from_dynamic(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        debug!("Deleting {}", key);
        let api = self.api(&key.object_type, key.namespace.as_deref());
        api.delete(&key.name, &DeleteParams::background())
            .await
            .map_err(|e| map_error(e, key, ClusterError::Conflict))?;
        Ok(())
    }

    async fn list(
        &self,
        object_type: &ObjectType,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<ClusterObject>, ClusterError> {
        let api = self.api(object_type, namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let key = ObjectKey::new(object_type.clone(), namespace, "");
        let list = api
            .list(&params)
            .await
            .map_err(|e| map_error(e, &key, ClusterError::Conflict))?;

        // List items usually come without apiVersion/kind.
        list.items
            .into_iter()
            .map(|item| {
                let mut object = from_dynamic(item)?;
                object.api_version.clone_from(&object_type.api_version);
                object.kind.clone_from(&object_type.kind);
                Ok(object)
            })
            .collect()
    }
}
