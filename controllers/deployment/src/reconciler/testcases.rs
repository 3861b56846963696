//! Shared test data: supported cluster versions, base Deployments and the
//! spec changes a running operator must follow.

use crate::config::KubernetesVersion;
use crds::{DeploymentSpec, ResourceRequirements};
use pmem_tls::{CertificateAuthority, encode_cert, encode_key, new_private_key};
use std::collections::BTreeMap;

/// Every Kubernetes version the operator supports
pub fn kubernetes_versions() -> Vec<KubernetesVersion> {
    (17..=30).map(|minor| KubernetesVersion::new(1, minor)).collect()
}

/// Deployments the update tests start from
pub fn base_specs() -> Vec<(&'static str, DeploymentSpec)> {
    vec![
        ("default", DeploymentSpec::default()),
        ("explicit", explicit_spec()),
    ]
}

/// A spec with every optional field set
pub fn explicit_spec() -> DeploymentSpec {
    DeploymentSpec {
        device_mode: "direct".to_string(),
        log_level: 4,
        image: "test-driver:v0.0.0".to_string(),
        pull_policy: "Never".to_string(),
        provisioner_image: "test-provisioner-image:v0.0.0".to_string(),
        node_registrar_image: "test-driver-registrar-image:v.0.0.0".to_string(),
        controller_resources: Some(ResourceRequirements {
            limits: Some(BTreeMap::from([("memory".to_string(), "600Mi".to_string())])),
            ..ResourceRequirements::requests("1500m", "300Mi")
        }),
        node_resources: Some(ResourceRequirements::requests("1000m", "500Mi")),
        node_selector: Some(BTreeMap::from([("storage".to_string(), "pmem".to_string())])),
        pmem_percentage: Some(50),
        labels: Some(BTreeMap::from([("team".to_string(), "storage".to_string())])),
        ..DeploymentSpec::default()
    }
}

/// Supplied CA and certificates for both roles, issued with a fresh CA
pub fn provided_certificates() -> DeploymentSpec {
    let ca = CertificateAuthority::new(None, None).unwrap();
    let issue = |subject: &str| {
        let key = new_private_key().unwrap();
        let cert = ca.generate_certificate(subject, &key).unwrap();
        (encode_cert(&cert), encode_key(&key))
    };
    let (registry_cert, registry_key) = issue("pmem-registry");
    let (node_cert, node_key) = issue("pmem-node-controller");
    DeploymentSpec {
        ca_cert: Some(ca.encoded_certificate().to_string()),
        registry_cert: Some(registry_cert),
        registry_private_key: Some(registry_key),
        node_controller_cert: Some(node_cert),
        node_controller_private_key: Some(node_key),
        ..DeploymentSpec::default()
    }
}

/// One change to a Deployment spec
#[derive(Clone, Copy)]
pub struct UpdateTest {
    /// Test name
    pub name: &'static str,
    /// Applies the change
    pub mutate: fn(&mut DeploymentSpec),
}

impl std::fmt::Debug for UpdateTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Every spec change the operator must follow
pub fn update_tests() -> Vec<UpdateTest> {
    vec![
        UpdateTest {
            name: "device mode",
            mutate: |spec| {
                spec.device_mode = if spec.device_mode == "direct" { "lvm" } else { "direct" }.to_string();
            },
        },
        UpdateTest {
            name: "log level",
            mutate: |spec| spec.log_level = spec.log_level.max(3) + 1,
        },
        UpdateTest {
            name: "image",
            mutate: |spec| spec.image = "test-driver:v1.0.0".to_string(),
        },
        UpdateTest {
            name: "pull policy",
            mutate: |spec| spec.pull_policy = "Always".to_string(),
        },
        UpdateTest {
            name: "provisioner image",
            mutate: |spec| spec.provisioner_image = "still-no-such-provisioner-image".to_string(),
        },
        UpdateTest {
            name: "registrar image",
            mutate: |spec| spec.node_registrar_image = "still-no-such-registrar-image".to_string(),
        },
        UpdateTest {
            name: "controller resources",
            mutate: |spec| {
                spec.controller_resources = Some(ResourceRequirements::requests("201m", "101Mi"));
            },
        },
        UpdateTest {
            name: "node resources",
            mutate: |spec| spec.node_resources = Some(ResourceRequirements::requests("501m", "501Mi")),
        },
        UpdateTest {
            name: "node selector",
            mutate: |spec| {
                spec.node_selector = Some(BTreeMap::from([("pmem".to_string(), "yes".to_string())]));
            },
        },
        UpdateTest {
            name: "pmem percentage",
            mutate: |spec| {
                spec.device_mode = "lvm".to_string();
                spec.pmem_percentage = Some(42);
            },
        },
        UpdateTest {
            name: "labels",
            mutate: |spec| spec.labels = Some(BTreeMap::from([("tier".to_string(), "infra".to_string())])),
        },
        UpdateTest {
            name: "no node selector",
            mutate: |spec| spec.node_selector = None,
        },
        UpdateTest {
            name: "no labels",
            mutate: |spec| spec.labels = None,
        },
        UpdateTest {
            name: "no resource limits",
            mutate: |spec| {
                for resources in [&mut spec.controller_resources, &mut spec.node_resources] {
                    if let Some(resources) = resources.as_mut() {
                        resources.limits = None;
                    }
                }
            },
        },
        UpdateTest {
            name: "registry key",
            mutate: |spec| spec.registry_private_key = Some(encode_key(&new_private_key().unwrap())),
        },
        UpdateTest {
            name: "provided certificates",
            mutate: |spec| {
                let provided = provided_certificates();
                spec.ca_cert = provided.ca_cert;
                spec.registry_cert = provided.registry_cert;
                spec.registry_private_key = provided.registry_private_key;
                spec.node_controller_cert = provided.node_controller_cert;
                spec.node_controller_private_key = provided.node_controller_private_key;
            },
        },
    ]
}
