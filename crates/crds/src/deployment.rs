//! Deployment CRD
//!
//! Declares one PMEM-CSI driver installation. The resource is cluster-scoped:
//! its name alone identifies it, while the child objects the operator derives
//! from it live in the operator namespace.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "pmem-csi.intel.com",
    version = "v1alpha1",
    kind = "Deployment",
    plural = "deployments",
    shortname = "pmemcsi",
    status = "DeploymentStatus",
    printcolumn = r#"{"name":"DeviceMode","type":"string","jsonPath":".spec.deviceMode"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Device mode for the driver ("lvm" or "direct", empty means "lvm")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_mode: String,

    /// Driver log verbosity (0 means the operator default)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub log_level: u16,

    /// PMEM-CSI driver image (empty means the operator default)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Image pull policy for all driver containers
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pull_policy: String,

    /// CSI external-provisioner sidecar image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provisioner_image: String,

    /// CSI node-driver-registrar sidecar image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_registrar_image: String,

    /// Resource requirements of the controller driver container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_resources: Option<ResourceRequirements>,

    /// Resource requirements of the node driver container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_resources: Option<ResourceRequirements>,

    /// PEM-encoded root CA certificate the supplied leaf certificates chain to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,

    /// PEM-encoded certificate of the registry server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_cert: Option<String>,

    /// PEM-encoded private key of the registry server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_private_key: Option<String>,

    /// PEM-encoded certificate of the node controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_controller_cert: Option<String>,

    /// PEM-encoded private key of the node controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_controller_private_key: Option<String>,

    /// Node labels selecting the nodes that run the node driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Percentage of PMEM space used for LVM volume groups (default 100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmem_percentage: Option<u16>,

    /// Additional labels added to every object created for this deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if passes a reference")]
fn is_zero(value: &u16) -> bool {
    *value == 0
}

/// Compute resources for a driver container.
///
/// Quantities are kept in their textual Kubernetes form ("1500m", "300Mi").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Minimum resources the container needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<BTreeMap<String, String>>,

    /// Maximum resources the container may use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<BTreeMap<String, String>>,
}

impl ResourceRequirements {
    /// Requirements with only CPU and memory requests set.
    pub fn requests(cpu: &str, memory: &str) -> Self {
        let requests = BTreeMap::from([
            ("cpu".to_string(), cpu.to_string()),
            ("memory".to_string(), memory.to_string()),
        ]);
        Self {
            requests: Some(requests),
            limits: None,
        }
    }
}

/// Operating mode of the storage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceMode {
    /// PMEM regions are managed as LVM volume groups
    #[default]
    Lvm,
    /// Volumes map directly onto PMEM namespaces
    Direct,
}

/// A device mode string outside the supported set
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported device mode \"{0}\", expected one of: lvm, direct")]
pub struct UnknownDeviceMode(pub String);

impl DeviceMode {
    /// Every supported device mode.
    pub const ALL: [DeviceMode; 2] = [DeviceMode::Lvm, DeviceMode::Direct];

    /// Name as used in the resource and on the driver command line.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceMode::Lvm => "lvm",
            DeviceMode::Direct => "direct",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceMode {
    type Err = UnknownDeviceMode;

    /// The empty string selects the default mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(DeviceMode::default());
        }
        DeviceMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownDeviceMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    /// Convergence phase of the most recent reconciliation
    pub phase: DeploymentPhase,

    /// Reason of the most recent failure, cleared once running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// When the status was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// Deployment phase
///
/// Serializes as PascalCase ("New", "Running", "Failed").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum DeploymentPhase {
    /// No reconciliation outcome recorded yet
    #[default]
    New,

    /// All driver objects are in place
    Running,

    /// The last reconciliation failed, see the status reason
    Failed,
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentPhase::New => "New",
            DeploymentPhase::Running => "Running",
            DeploymentPhase::Failed => "Failed",
        };
        f.write_str(name)
    }
}

impl Deployment {
    /// Recorded phase, `New` when no status has been written yet.
    pub fn phase(&self) -> DeploymentPhase {
        self.status
            .as_ref()
            .map(|status| status.phase)
            .unwrap_or_default()
    }

    /// Recorded failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.status.as_ref().and_then(|status| status.reason.as_deref())
    }
}
