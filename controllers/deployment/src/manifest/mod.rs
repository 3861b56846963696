//! Desired child objects of a Deployment.
//!
//! The builder is a pure function of the effective driver spec, the TLS
//! material and the operator options. It never talks to the cluster.

mod controller;
mod csi_driver;
mod node;
mod secrets;

use crate::config::{ControllerOptions, KubernetesVersion};
use crate::defaults::DriverSpec;
use crate::error::ControllerError;
use crate::materials::DriverMaterials;
use crate::names;
use cluster_client::{ClusterObject, ObjectType};
use crds::{Deployment, ResourceRequirements};
use k8s_openapi::api::apps::v1::{DaemonSet, StatefulSet};
use k8s_openapi::api::core::v1::{
    ResourceRequirements as ContainerResources, Secret, Service, ServiceAccount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use serde::Serialize;
use std::collections::BTreeMap;

pub use csi_driver::{CSI_DRIVER_V1, CSI_DRIVER_V1BETA1, csi_driver_type};

/// Directory the TLS Secret is mounted at in the driver containers
pub const CERTS_DIR: &str = "/certs";

/// A kind of child object and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedType {
    /// API version and kind
    pub object_type: ObjectType,
    /// Whether objects of this type live in the operator namespace
    pub namespaced: bool,
}

impl ManagedType {
    fn namespaced<K: kube::Resource<DynamicType = ()>>() -> Self {
        Self {
            object_type: ObjectType::of::<K>(),
            namespaced: true,
        }
    }
}

/// Translates a validated Deployment into its desired children
pub trait ManifestBuilder: Send + Sync {
    /// Desired children. The result must depend only on the arguments.
    fn build(
        &self,
        spec: &DriverSpec,
        materials: &DriverMaterials,
        options: &ControllerOptions,
    ) -> Result<Vec<ClusterObject>, ControllerError>;

    /// Every type `build` can produce, used to find stale children.
    fn managed_types(&self, options: &ControllerOptions) -> Vec<ManagedType>;
}

/// The driver installation: TLS Secrets, controller StatefulSet with its
/// Service and ServiceAccount, node DaemonSet and CSIDriver
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverManifests;

impl ManifestBuilder for DriverManifests {
    fn build(
        &self,
        spec: &DriverSpec,
        materials: &DriverMaterials,
        options: &ControllerOptions,
    ) -> Result<Vec<ClusterObject>, ControllerError> {
        Ok(vec![
            to_object(&secrets::registry_secret(spec, materials, options))?,
            to_object(&secrets::node_secret(spec, materials, options))?,
            to_object(&controller::service_account(spec, options))?,
            to_object(&controller::service(spec, options))?,
            to_object(&controller::stateful_set(spec, options))?,
            to_object(&node::daemon_set(spec, options))?,
            csi_driver::csi_driver(spec, options)?,
        ])
    }

    fn managed_types(&self, options: &ControllerOptions) -> Vec<ManagedType> {
        vec![
            ManagedType::namespaced::<Secret>(),
            ManagedType::namespaced::<ServiceAccount>(),
            ManagedType::namespaced::<Service>(),
            ManagedType::namespaced::<StatefulSet>(),
            ManagedType::namespaced::<DaemonSet>(),
            ManagedType {
                object_type: csi_driver_type(options.kubernetes_version),
                namespaced: false,
            },
        ]
    }
}

fn to_object<K: Serialize>(resource: &K) -> Result<ClusterObject, ControllerError> {
    ClusterObject::from_resource(resource)
        .map_err(|e| ControllerError::Internal(format!("failed to encode child object: {e}")))
}

/// Owner reference pointing at the Deployment
pub(crate) fn owner_reference(spec: &DriverSpec) -> OwnerReference {
    OwnerReference {
        api_version: Deployment::api_version(&()).into_owned(),
        kind: Deployment::kind(&()).into_owned(),
        name: spec.name.clone(),
        uid: spec.uid.clone(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Spec labels plus the operator's own labels, which win on conflict
pub(crate) fn child_labels(spec: &DriverSpec) -> BTreeMap<String, String> {
    let mut labels = spec.labels.clone();
    labels.extend(names::instance_labels(&spec.name));
    labels
}

/// Metadata shared by every child. Cluster-scoped children get no namespace.
pub(crate) fn child_metadata(
    spec: &DriverSpec,
    options: Option<&ControllerOptions>,
    name: String,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: options.map(|o| o.namespace.clone()),
        labels: Some(child_labels(spec)),
        owner_references: Some(vec![owner_reference(spec)]),
        ..ObjectMeta::default()
    }
}

/// Pod labels of one component
pub(crate) fn pod_labels(spec: &DriverSpec, component: &str) -> BTreeMap<String, String> {
    let mut labels = spec.labels.clone();
    labels.extend(names::component_labels(&spec.name, component));
    labels
}

pub(crate) fn container_resources(resources: &ResourceRequirements) -> ContainerResources {
    let quantities = |values: &Option<BTreeMap<String, String>>| {
        values.as_ref().map(|values| {
            values
                .iter()
                .map(|(name, quantity)| (name.clone(), Quantity(quantity.clone())))
                .collect()
        })
    };
    ContainerResources {
        requests: quantities(&resources.requests),
        limits: quantities(&resources.limits),
        ..ContainerResources::default()
    }
}

/// Whether CSIDriver is served as `storage.k8s.io/v1`
pub(crate) fn has_csi_driver_v1(version: KubernetesVersion) -> bool {
    version >= KubernetesVersion::new(1, 18)
}
