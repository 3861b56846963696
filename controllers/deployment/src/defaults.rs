//! Operator defaults and the effective driver specification.
//!
//! Defaults are applied in memory only. The stored Deployment keeps what the
//! user wrote, so changing a default in a new operator release takes effect
//! on the next reconciliation.

use crate::config::ControllerOptions;
use crate::error::ControllerError;
use crds::{Deployment, DeviceMode, ResourceRequirements};
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Driver log verbosity
pub const DEFAULT_LOG_LEVEL: u16 = 3;

/// Image pull policy
pub const DEFAULT_PULL_POLICY: &str = "IfNotPresent";

/// CSI external-provisioner sidecar
pub const DEFAULT_PROVISIONER_IMAGE: &str = "quay.io/k8scsi/csi-provisioner:v1.2.1";

/// CSI node-driver-registrar sidecar
pub const DEFAULT_REGISTRAR_IMAGE: &str = "quay.io/k8scsi/csi-node-driver-registrar:v1.1.0";

/// CPU request of the driver containers
pub const DEFAULT_CPU: &str = "100m";

/// Memory request of the driver containers
pub const DEFAULT_MEMORY: &str = "250Mi";

/// Share of PMEM used for LVM volume groups
pub const DEFAULT_PMEM_PERCENTAGE: u16 = 100;

/// Default resource requirements of both driver containers
pub fn default_resources() -> ResourceRequirements {
    ResourceRequirements::requests(DEFAULT_CPU, DEFAULT_MEMORY)
}

/// A validated Deployment with every default filled in
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSpec {
    /// Deployment name
    pub name: String,
    /// Deployment uid, used in owner references
    pub uid: String,
    /// Parsed device mode
    pub device_mode: DeviceMode,
    /// Driver log verbosity
    pub log_level: u16,
    /// Driver image
    pub image: String,
    /// Pull policy of all containers
    pub pull_policy: String,
    /// External-provisioner image
    pub provisioner_image: String,
    /// Node-driver-registrar image
    pub node_registrar_image: String,
    /// Resources of the controller driver container
    pub controller_resources: ResourceRequirements,
    /// Resources of the node driver container
    pub node_resources: ResourceRequirements,
    /// Node selector of the node DaemonSet
    pub node_selector: BTreeMap<String, String>,
    /// Share of PMEM used in LVM mode
    pub pmem_percentage: u16,
    /// Extra labels for every child object
    pub labels: BTreeMap<String, String>,
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl DriverSpec {
    /// Fill in the defaults for `deployment`, whose device mode has already
    /// been parsed as `device_mode`.
    pub fn new(
        deployment: &Deployment,
        device_mode: DeviceMode,
        options: &ControllerOptions,
    ) -> Result<Self, ControllerError> {
        let uid = deployment.uid().ok_or_else(|| {
            ControllerError::Internal(format!("deployment {} has no uid", deployment.name_any()))
        })?;
        let spec = &deployment.spec;

        Ok(Self {
            name: deployment.name_any(),
            uid,
            device_mode,
            log_level: if spec.log_level == 0 {
                DEFAULT_LOG_LEVEL
            } else {
                spec.log_level
            },
            image: or_default(&spec.image, &options.driver_image),
            pull_policy: or_default(&spec.pull_policy, DEFAULT_PULL_POLICY),
            provisioner_image: or_default(&spec.provisioner_image, DEFAULT_PROVISIONER_IMAGE),
            node_registrar_image: or_default(&spec.node_registrar_image, DEFAULT_REGISTRAR_IMAGE),
            controller_resources: spec
                .controller_resources
                .clone()
                .unwrap_or_else(default_resources),
            node_resources: spec.node_resources.clone().unwrap_or_else(default_resources),
            node_selector: spec.node_selector.clone().unwrap_or_default(),
            pmem_percentage: spec.pmem_percentage.unwrap_or(DEFAULT_PMEM_PERCENTAGE),
            labels: spec.labels.clone().unwrap_or_default(),
        })
    }
}
