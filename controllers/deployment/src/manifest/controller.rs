//! Controller side of the driver: the registry and the external provisioner,
//! running as a single-replica StatefulSet behind a Service.

use super::{CERTS_DIR, child_metadata, container_resources, pod_labels};
use crate::config::ControllerOptions;
use crate::defaults::DriverSpec;
use crate::materials::{CA_CERT_KEY, TLS_CERT_KEY, TLS_KEY_KEY};
use crate::names;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, PodSpec, PodTemplateSpec, SecretVolumeSource,
    Service, ServiceAccount, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

const COMPONENT: &str = "controller";
const SOCKET_DIR: &str = "/csi";
const SOCKET: &str = "/csi/csi-controller.sock";

pub(super) fn service_account(spec: &DriverSpec, options: &ControllerOptions) -> ServiceAccount {
    ServiceAccount {
        metadata: child_metadata(spec, Some(options), names::controller(&spec.name)),
        ..ServiceAccount::default()
    }
}

pub(super) fn service(spec: &DriverSpec, options: &ControllerOptions) -> Service {
    Service {
        metadata: child_metadata(spec, Some(options), names::controller(&spec.name)),
        spec: Some(ServiceSpec {
            selector: Some(names::component_labels(&spec.name, COMPONENT)),
            ports: Some(vec![ServicePort {
                name: Some("registry".to_string()),
                port: names::REGISTRY_PORT,
                target_port: Some(IntOrString::Int(names::REGISTRY_PORT)),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

pub(super) fn stateful_set(spec: &DriverSpec, options: &ControllerOptions) -> StatefulSet {
    let name = names::controller(&spec.name);
    StatefulSet {
        metadata: child_metadata(spec, Some(options), name.clone()),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: name.clone().into(),
            selector: LabelSelector {
                match_labels: Some(names::component_labels(&spec.name, COMPONENT)),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels(spec, COMPONENT)),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(name),
                    containers: vec![driver_container(spec), provisioner_container(spec)],
                    volumes: Some(vec![
                        Volume {
                            name: "registry-cert".to_string(),
                            secret: Some(SecretVolumeSource {
                                secret_name: Some(names::registry_secret(&spec.name)),
                                ..SecretVolumeSource::default()
                            }),
                            ..Volume::default()
                        },
                        Volume {
                            name: "plugin-socket-dir".to_string(),
                            empty_dir: Some(EmptyDirVolumeSource::default()),
                            ..Volume::default()
                        },
                    ]),
                    ..PodSpec::default()
                }),
            },
            ..StatefulSetSpec::default()
        }),
        ..StatefulSet::default()
    }
}

fn driver_container(spec: &DriverSpec) -> Container {
    Container {
        name: "pmem-driver".to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.pull_policy.clone()),
        args: Some(vec![
            format!("-v={}", spec.log_level),
            "-mode=controller".to_string(),
            format!("-drivername={}", spec.name),
            format!("-endpoint=unix://{SOCKET}"),
            format!("-registryEndpoint=tcp://0.0.0.0:{}", names::REGISTRY_PORT),
            format!("-caFile={CERTS_DIR}/{CA_CERT_KEY}"),
            format!("-certFile={CERTS_DIR}/{TLS_CERT_KEY}"),
            format!("-keyFile={CERTS_DIR}/{TLS_KEY_KEY}"),
        ]),
        ports: Some(vec![ContainerPort {
            name: Some("registry".to_string()),
            container_port: names::REGISTRY_PORT,
            ..ContainerPort::default()
        }]),
        resources: Some(container_resources(&spec.controller_resources)),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "registry-cert".to_string(),
                mount_path: CERTS_DIR.to_string(),
                ..VolumeMount::default()
            },
            VolumeMount {
                name: "plugin-socket-dir".to_string(),
                mount_path: SOCKET_DIR.to_string(),
                ..VolumeMount::default()
            },
        ]),
        ..Container::default()
    }
}

fn provisioner_container(spec: &DriverSpec) -> Container {
    Container {
        name: "external-provisioner".to_string(),
        image: Some(spec.provisioner_image.clone()),
        image_pull_policy: Some(spec.pull_policy.clone()),
        args: Some(vec![
            format!("--v={}", spec.log_level),
            format!("--csi-address={SOCKET}"),
            "--feature-gates=Topology=true".to_string(),
            "--strict-topology=true".to_string(),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: "plugin-socket-dir".to_string(),
            mount_path: SOCKET_DIR.to_string(),
            ..VolumeMount::default()
        }]),
        ..Container::default()
    }
}
