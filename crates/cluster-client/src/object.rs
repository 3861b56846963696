//! Untyped Kubernetes objects and the keys that identify them

use crate::error::ClusterError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// API version and kind of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectType {
    /// `group/version`, or just `version` for the core group
    pub api_version: String,
    /// Object kind, e.g. `Secret`
    pub kind: String,
}

impl ObjectType {
    /// Create a type from its parts
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Type of a statically known resource
    pub fn of<K>() -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self::new(K::api_version(&()), K::kind(&()))
    }

    /// API group, empty for the core group
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or("", |(group, _)| group)
    }

    /// API version without the group
    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(self.api_version.as_str(), |(_, version)| version)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Identity of an object: type, namespace and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// API version and kind
    pub object_type: ObjectType,
    /// Namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Create a key from its parts
    pub fn new(object_type: ObjectType, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            object_type,
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    /// Key of a statically known resource
    pub fn of<K>(namespace: Option<&str>, name: impl Into<String>) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self::new(ObjectType::of::<K>(), namespace, name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {}/{}", self.object_type.kind, namespace, self.name),
            None => write!(f, "{} {}", self.object_type.kind, self.name),
        }
    }
}

/// A Kubernetes object of any kind
///
/// Everything except the type and metadata is kept as raw JSON in `data`,
/// including `spec` and `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterObject {
    /// `group/version` of the object
    #[serde(default)]
    pub api_version: String,
    /// Object kind
    #[serde(default)]
    pub kind: String,
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Remaining top-level fields
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl ClusterObject {
    /// Empty object of the given type and name
    pub fn new(object_type: &ObjectType, namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: object_type.api_version.clone(),
            kind: object_type.kind.clone(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: namespace.map(str::to_string),
                ..ObjectMeta::default()
            },
            data: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Convert a typed resource. The resource must serialize `apiVersion`
    /// and `kind`.
    pub fn from_resource<K: Serialize>(resource: &K) -> Result<Self, ClusterError> {
        let value = serde_json::to_value(resource)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Convert into a typed resource
    pub fn into_resource<K: DeserializeOwned>(self) -> Result<K, ClusterError> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }

    /// API version and kind
    pub fn object_type(&self) -> ObjectType {
        ObjectType::new(self.api_version.clone(), self.kind.clone())
    }

    /// Key under which the object is stored
    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            object_type: self.object_type(),
            namespace: self.metadata.namespace.clone(),
            name: self.name().to_string(),
        }
    }

    /// Object name, empty if unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Object labels
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata.labels.clone().unwrap_or_default()
    }

    /// The `status` field, if present
    pub fn status(&self) -> Option<&serde_json::Value> {
        self.data.get("status")
    }

    /// Replace or remove the `status` field
    pub fn set_status(&mut self, status: Option<serde_json::Value>) {
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(fields) = self.data.as_object_mut() {
            match status {
                Some(status) => {
                    fields.insert("status".to_string(), status);
                }
                None => {
                    fields.remove("status");
                }
            }
        }
    }

    /// Whether the object has an owner reference with the given uid
    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.metadata
            .owner_references
            .iter()
            .flatten()
            .any(|owner| owner.uid == uid)
    }
}

/// Parse a label selector of the form `key=value,key2=value2`.
///
/// Only equality requirements are supported.
pub fn parse_label_selector(selector: &str) -> Result<BTreeMap<String, String>, ClusterError> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let (key, value) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
                .ok_or_else(|| {
                    ClusterError::InvalidRequest(format!("unsupported label selector term '{term}'"))
                })?;
            if key.ends_with('!') {
                return Err(ClusterError::InvalidRequest(format!(
                    "unsupported label selector term '{term}'"
                )));
            }
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Render labels as an equality label selector
pub fn format_label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DaemonSet;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::api::storage::v1::CSIDriver;

    #[test]
    fn object_type_splits_group_and_version() {
        let secret = ObjectType::of::<Secret>();
        assert_eq!(secret.api_version, "v1");
        assert_eq!(secret.group(), "");
        assert_eq!(secret.version(), "v1");

        let daemon_set = ObjectType::of::<DaemonSet>();
        assert_eq!(daemon_set.group(), "apps");
        assert_eq!(daemon_set.version(), "v1");
        assert_eq!(daemon_set.kind, "DaemonSet");

        let driver = ObjectType::of::<CSIDriver>();
        assert_eq!(driver.api_version, "storage.k8s.io/v1");
    }

    #[test]
    fn typed_resource_round_trips() {
        let mut secret = Secret::default();
        secret.metadata.name = Some("pmem-csi-registry-secrets".to_string());
        secret.metadata.namespace = Some("default".to_string());
        secret.string_data = Some(BTreeMap::from([("ca.crt".to_string(), "x".to_string())]));

        let object = ClusterObject::from_resource(&secret).unwrap();
        assert_eq!(object.kind, "Secret");
        assert_eq!(
            object.key(),
            ObjectKey::of::<Secret>(Some("default"), "pmem-csi-registry-secrets")
        );
        assert!(object.data.get("stringData").is_some());

        let back: Secret = object.into_resource().unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn status_can_be_replaced_and_removed() {
        let mut object = ClusterObject::new(&ObjectType::new("v1", "ConfigMap"), None, "x");
        assert!(object.status().is_none());

        object.set_status(Some(serde_json::json!({"phase": "Running"})));
        assert_eq!(object.status().unwrap()["phase"], "Running");

        object.set_status(None);
        assert!(object.status().is_none());
    }

    #[test]
    fn label_selector_parsing() {
        let parsed = parse_label_selector("a=1, b==2").unwrap();
        assert_eq!(parsed.get("a").map(String::as_str), Some("1"));
        assert_eq!(parsed.get("b").map(String::as_str), Some("2"));

        assert!(parse_label_selector("").unwrap().is_empty());
        assert!(parse_label_selector("a!=1").is_err());
        assert!(parse_label_selector("a").is_err());

        let labels = BTreeMap::from([
            ("x".to_string(), "1".to_string()),
            ("y".to_string(), "2".to_string()),
        ]);
        assert_eq!(format_label_selector(&labels), "x=1,y=2");
    }
}
