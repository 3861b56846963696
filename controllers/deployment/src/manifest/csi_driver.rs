//! CSIDriver registration. Clusters before 1.18 only serve the beta API.

use super::{child_metadata, has_csi_driver_v1, to_object};
use crate::config::{ControllerOptions, KubernetesVersion};
use crate::defaults::DriverSpec;
use crate::error::ControllerError;
use crate::names;
use cluster_client::{ClusterObject, ObjectType};
use k8s_openapi::api::storage::v1::{CSIDriver, CSIDriverSpec};

/// CSIDriver API version from Kubernetes 1.18 on
pub const CSI_DRIVER_V1: &str = "storage.k8s.io/v1";

/// CSIDriver API version before Kubernetes 1.18
pub const CSI_DRIVER_V1BETA1: &str = "storage.k8s.io/v1beta1";

/// CSIDriver type served by a cluster of the given version
pub fn csi_driver_type(version: KubernetesVersion) -> ObjectType {
    let api_version = if has_csi_driver_v1(version) {
        CSI_DRIVER_V1
    } else {
        CSI_DRIVER_V1BETA1
    };
    ObjectType::new(api_version, "CSIDriver")
}

/// The beta API has the same schema for the fields set here, so the v1 type
/// is built and relabelled.
pub(super) fn csi_driver(
    spec: &DriverSpec,
    options: &ControllerOptions,
) -> Result<ClusterObject, ControllerError> {
    let driver = CSIDriver {
        metadata: child_metadata(spec, None, names::csi_driver(&spec.name)),
        spec: CSIDriverSpec {
            attach_required: Some(false),
            pod_info_on_mount: Some(true),
            volume_lifecycle_modes: Some(vec![
                "Persistent".to_string(),
                "Ephemeral".to_string(),
            ]),
            ..CSIDriverSpec::default()
        },
    };
    let mut object = to_object(&driver)?;
    object.api_version = csi_driver_type(options.kubernetes_version).api_version;
    Ok(object)
}
