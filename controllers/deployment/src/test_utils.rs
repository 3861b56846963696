//! Test utilities for unit testing the reconciler
//!
//! Helpers for creating Deployments in the mock cluster and for checking
//! that the live state of a Deployment matches its declared spec.

use crate::config::{ControllerOptions, KubernetesVersion};
use crate::defaults::DriverSpec;
use crate::manifest::{
    CSI_DRIVER_V1, CSI_DRIVER_V1BETA1, child_labels, container_resources, csi_driver_type, pod_labels,
};
use crate::materials::{DriverMaterials, Role};
use crate::names;
use crate::reconciler::status::current_status;
use crate::validation;
use cluster_client::{ClusterClient, ClusterObject, MockClusterClient, ObjectKey, ObjectType};
use crds::{Deployment, DeploymentPhase, DeploymentSpec, DeviceMode};
use k8s_openapi::api::apps::v1::{DaemonSet, StatefulSet};
use k8s_openapi::api::core::v1::{Container, Secret, Service, ServiceAccount};
use pmem_tls::{same_key, validate};

/// Namespace the tests deploy the driver to
pub const TEST_NAMESPACE: &str = "pmem-csi";

/// Default driver image of the test operator
pub const TEST_DRIVER_IMAGE: &str = "fake-driver-image";

/// Options of a test operator on a cluster of the given version
pub fn test_options(version: KubernetesVersion) -> ControllerOptions {
    ControllerOptions {
        namespace: TEST_NAMESPACE.to_string(),
        kubernetes_version: version,
        driver_image: TEST_DRIVER_IMAGE.to_string(),
    }
}

/// Store a new Deployment. The mock assigns uid and resourceVersion.
pub fn create_deployment(client: &MockClusterClient, name: &str, spec: DeploymentSpec) -> Deployment {
    let object = ClusterObject::from_resource(&Deployment::new(name, spec)).unwrap();
    client.insert(object).into_resource().unwrap()
}

/// Current state of a Deployment
pub async fn get_deployment(client: &MockClusterClient, name: &str) -> Deployment {
    client
        .get(&ObjectKey::of::<Deployment>(None, name))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("Deployment {name} not found"))
        .into_resource()
        .unwrap()
}

/// Change the spec of a stored Deployment the way a user would
pub async fn update_deployment(
    client: &MockClusterClient,
    name: &str,
    mutate: impl FnOnce(&mut DeploymentSpec),
) {
    let mut deployment = get_deployment(client, name).await;
    mutate(&mut deployment.spec);
    client
        .update(&ClusterObject::from_resource(&deployment).unwrap())
        .await
        .unwrap();
}

/// Recorded phase of a Deployment
pub fn phase_of(client: &MockClusterClient, name: &str) -> Option<DeploymentPhase> {
    let object = client.object(&ObjectKey::of::<Deployment>(None, name))?;
    Some(current_status(&object).map(|s| s.phase).unwrap_or_default())
}

fn child<K>(client: &MockClusterClient, namespace: Option<&str>, name: &str) -> Result<K, String>
where
    K: kube::Resource<DynamicType = ()> + serde::de::DeserializeOwned,
{
    child_of(client, ObjectKey::of::<K>(namespace, name))
}

fn child_of<K: serde::de::DeserializeOwned>(client: &MockClusterClient, key: ObjectKey) -> Result<K, String> {
    client
        .object(&key)
        .ok_or_else(|| format!("{key} is missing"))?
        .into_resource()
        .map_err(|e| format!("{key} is malformed: {e}"))
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if condition { Ok(()) } else { Err(message()) }
}

fn container<'a>(containers: &'a [Container], name: &str) -> Result<&'a Container, String> {
    containers
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| format!("container {name} is missing"))
}

fn check_container(
    container: &Container,
    image: &str,
    pull_policy: &str,
    args: &[String],
) -> Result<(), String> {
    check(container.image.as_deref() == Some(image), || {
        format!("{}: image {:?}, expected {image}", container.name, container.image)
    })?;
    check(container.image_pull_policy.as_deref() == Some(pull_policy), || {
        format!(
            "{}: pull policy {:?}, expected {pull_policy}",
            container.name, container.image_pull_policy
        )
    })?;
    let actual = container.args.clone().unwrap_or_default();
    for arg in args {
        check(actual.contains(arg), || format!("{}: argument {arg} missing in {actual:?}", container.name))?;
    }
    Ok(())
}

/// Check that the live state of the named Deployment matches its spec.
///
/// The Deployment must be `Running` without a reason and every child must
/// exist, belong to the Deployment, carry exactly its labels and reflect the
/// spec with defaults applied. The TLS Secrets must hold a valid chain.
pub async fn validate_driver_deployment(
    client: &MockClusterClient,
    name: &str,
    options: &ControllerOptions,
) -> Result<(), String> {
    let deployment = get_deployment(client, name).await;
    check(deployment.phase() == DeploymentPhase::Running, || {
        format!("phase is {}, expected Running", deployment.phase())
    })?;
    check(deployment.reason().is_none(), || {
        format!("unexpected reason {:?}", deployment.reason())
    })?;

    let mode = validation::validate(&deployment.spec).map_err(|e| e.to_string())?;
    let spec = DriverSpec::new(&deployment, mode, options).map_err(|e| e.to_string())?;
    let namespace = Some(options.namespace.as_str());

    let keys = [
        ObjectKey::of::<Secret>(namespace, names::registry_secret(name)),
        ObjectKey::of::<Secret>(namespace, names::node_secret(name)),
        ObjectKey::of::<ServiceAccount>(namespace, names::controller(name)),
        ObjectKey::of::<Service>(namespace, names::controller(name)),
        ObjectKey::of::<StatefulSet>(namespace, names::controller(name)),
        ObjectKey::of::<DaemonSet>(namespace, names::node(name)),
        ObjectKey::new(csi_driver_type(options.kubernetes_version), None, names::csi_driver(name)),
    ];
    for key in &keys {
        let object = client.object(key).ok_or_else(|| format!("{key} is missing"))?;
        check(object.is_owned_by(&spec.uid), || format!("{key} is not owned by {}", spec.uid))?;
        let labels = object.labels();
        let expected = child_labels(&spec);
        check(labels == expected, || format!("{key}: labels {labels:?}, expected {expected:?}"))?;
    }

    let other_csi = if csi_driver_type(options.kubernetes_version).api_version == CSI_DRIVER_V1 {
        CSI_DRIVER_V1BETA1
    } else {
        CSI_DRIVER_V1
    };
    let other_key = ObjectKey::new(ObjectType::new(other_csi, "CSIDriver"), None, name);
    check(client.object(&other_key).is_none(), || format!("{other_key} must not exist"))?;

    // TLS material
    let registry: Secret = child(client, namespace, &names::registry_secret(name))?;
    let node: Secret = child(client, namespace, &names::node_secret(name))?;
    let materials = DriverMaterials::from_secrets(&registry, &node)
        .ok_or_else(|| "TLS Secrets are incomplete or disagree on the CA".to_string())?;
    for role in Role::ALL {
        let pair = materials.pair(role);
        let info = validate(&pair.cert, &pair.key, &materials.ca_cert)
            .map_err(|e| format!("{}: {e}", role.subject()))?;
        info.ensure_subject(role.subject()).map_err(|e| e.to_string())?;
    }
    if let Some(ca) = deployment.spec.ca_cert.as_ref().filter(|ca| !ca.is_empty()) {
        check(&materials.ca_cert == ca, || "CA differs from the supplied one".to_string())?;
    }
    for (role, key) in [
        (Role::Registry, &deployment.spec.registry_private_key),
        (Role::NodeController, &deployment.spec.node_controller_private_key),
    ] {
        if let Some(key) = key.as_ref().filter(|key| !key.is_empty()) {
            let same = same_key(key, &materials.pair(role).key).map_err(|e| e.to_string())?;
            check(same, || format!("{} does not use the supplied key", role.subject()))?;
        }
    }

    // Controller
    let stateful_set: StatefulSet = child(client, namespace, &names::controller(name))?;
    let pod = stateful_set
        .spec
        .and_then(|s| s.template.spec)
        .ok_or_else(|| "StatefulSet has no pod spec".to_string())?;
    let driver = container(&pod.containers, "pmem-driver")?;
    check_container(
        driver,
        &spec.image,
        &spec.pull_policy,
        &[
            format!("-v={}", spec.log_level),
            "-mode=controller".to_string(),
            format!("-drivername={name}"),
        ],
    )?;
    check(
        driver.resources.as_ref() == Some(&container_resources(&spec.controller_resources)),
        || format!("controller resources {:?}", driver.resources),
    )?;
    check_container(
        container(&pod.containers, "external-provisioner")?,
        &spec.provisioner_image,
        &spec.pull_policy,
        &[],
    )?;

    // Node
    let daemon_set: DaemonSet = child(client, namespace, &names::node(name))?;
    let template = daemon_set
        .spec
        .map(|s| s.template)
        .ok_or_else(|| "DaemonSet has no spec".to_string())?;
    let pod_labels_found = template
        .metadata
        .and_then(|m| m.labels)
        .unwrap_or_default();
    let expected = pod_labels(&spec, "node");
    check(pod_labels_found == expected, || {
        format!("node pod labels {pod_labels_found:?}, expected {expected:?}")
    })?;
    let pod = template
        .spec
        .ok_or_else(|| "DaemonSet has no pod spec".to_string())?;
    let mut node_args = vec![
        format!("-v={}", spec.log_level),
        "-mode=node".to_string(),
        format!("-deviceManager={}", spec.device_mode),
        format!(
            "-registryEndpoint=tcp://{}.{}:{}",
            names::controller(name),
            options.namespace,
            names::REGISTRY_PORT
        ),
    ];
    if spec.device_mode == DeviceMode::Lvm {
        node_args.push(format!("-pmemPercentage={}", spec.pmem_percentage));
    }
    let driver = container(&pod.containers, "pmem-driver")?;
    check_container(driver, &spec.image, &spec.pull_policy, &node_args)?;
    check(
        driver.resources.as_ref() == Some(&container_resources(&spec.node_resources)),
        || format!("node resources {:?}", driver.resources),
    )?;
    check_container(
        container(&pod.containers, "driver-registrar")?,
        &spec.node_registrar_image,
        &spec.pull_policy,
        &[],
    )?;
    let node_selector = pod.node_selector.unwrap_or_default();
    check(node_selector == spec.node_selector, || {
        format!("node selector {node_selector:?}, expected {:?}", spec.node_selector)
    })?;

    Ok(())
}
