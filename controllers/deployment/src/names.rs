//! Names and labels of the objects derived from a Deployment.
//!
//! Everything here is a pure function of the Deployment name, so two
//! Deployments never share a child and a restarted operator finds the
//! children of an earlier run.

use std::collections::BTreeMap;

/// Label carrying the owning Deployment's name
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label marking objects created by the operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY: &str = "pmem-csi-operator";

/// Label distinguishing controller and node pods of one Deployment
pub const COMPONENT_LABEL: &str = "app.kubernetes.io/component";

/// Annotation holding a digest of the desired state the operator last wrote
pub const DESIRED_STATE_ANNOTATION: &str = "pmem-csi.intel.com/desired-state";

/// Label keys users may not override through the Deployment's labels
pub const RESERVED_LABELS: [&str; 3] = [INSTANCE_LABEL, MANAGED_BY_LABEL, COMPONENT_LABEL];

/// Port of the registry gRPC service
pub const REGISTRY_PORT: i32 = 10000;

/// Port of the node controller gRPC service
pub const NODE_CONTROLLER_PORT: i32 = 10001;

/// Secret with the registry server's TLS material
pub fn registry_secret(deployment: &str) -> String {
    format!("{deployment}-registry-secrets")
}

/// Secret with the node controller's TLS material
pub fn node_secret(deployment: &str) -> String {
    format!("{deployment}-node-secrets")
}

/// ServiceAccount, Service and StatefulSet of the controller
pub fn controller(deployment: &str) -> String {
    format!("{deployment}-controller")
}

/// DaemonSet running the node driver
pub fn node(deployment: &str) -> String {
    format!("{deployment}-node")
}

/// CSIDriver object, named after the Deployment (it is also the driver name)
pub fn csi_driver(deployment: &str) -> String {
    deployment.to_string()
}

/// Labels identifying every child of a Deployment
pub fn instance_labels(deployment: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (INSTANCE_LABEL.to_string(), deployment.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
    ])
}

/// Labels of the pods of one component
pub fn component_labels(deployment: &str, component: &str) -> BTreeMap<String, String> {
    let mut labels = instance_labels(deployment);
    labels.insert(COMPONENT_LABEL.to_string(), component.to_string());
    labels
}

/// Label selector matching every child of a Deployment
pub fn instance_selector(deployment: &str) -> String {
    cluster_client::format_label_selector(&instance_labels(deployment))
}
