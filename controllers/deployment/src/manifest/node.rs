//! Node side of the driver: one privileged driver pod per PMEM node plus the
//! kubelet registrar.

use super::{CERTS_DIR, child_metadata, container_resources, pod_labels};
use crate::config::ControllerOptions;
use crate::defaults::DriverSpec;
use crate::materials::{CA_CERT_KEY, TLS_CERT_KEY, TLS_KEY_KEY};
use crate::names;
use crds::DeviceMode;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, HostPathVolumeSource, ObjectFieldSelector, PodSpec,
    PodTemplateSpec, SecretVolumeSource, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

const COMPONENT: &str = "node";
const KUBELET_DIR: &str = "/var/lib/kubelet";

fn plugin_dir(spec: &DriverSpec) -> String {
    format!("{KUBELET_DIR}/plugins/{}", spec.name)
}

pub(super) fn daemon_set(spec: &DriverSpec, options: &ControllerOptions) -> DaemonSet {
    DaemonSet {
        metadata: child_metadata(spec, Some(options), names::node(&spec.name)),
        spec: Some(DaemonSetSpec {
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
                    node_selector: (!spec.node_selector.is_empty())
                        .then(|| spec.node_selector.clone()),
                    host_network: Some(true),
                    containers: vec![driver_container(spec, options), registrar_container(spec)],
                    volumes: Some(volumes(spec)),
                    ..PodSpec::default()
                }),
            },
            ..DaemonSetSpec::default()
        }),
        ..DaemonSet::default()
    }
}

fn field_env(name: &str, path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: path.to_string(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..VolumeMount::default()
    }
}

fn driver_container(spec: &DriverSpec, options: &ControllerOptions) -> Container {
    let plugin_dir = plugin_dir(spec);
    let mut args = vec![
        format!("-v={}", spec.log_level),
        "-mode=node".to_string(),
        format!("-drivername={}", spec.name),
        format!("-endpoint=unix://{plugin_dir}/csi.sock"),
        "-nodeid=$(KUBE_NODE_NAME)".to_string(),
        format!("-controllerEndpoint=tcp://$(KUBE_POD_IP):{}", names::NODE_CONTROLLER_PORT),
        format!(
            "-registryEndpoint=tcp://{}.{}:{}",
            names::controller(&spec.name),
            options.namespace,
            names::REGISTRY_PORT
        ),
        format!("-caFile={CERTS_DIR}/{CA_CERT_KEY}"),
        format!("-certFile={CERTS_DIR}/{TLS_CERT_KEY}"),
        format!("-keyFile={CERTS_DIR}/{TLS_KEY_KEY}"),
        format!("-statePath={plugin_dir}"),
        format!("-deviceManager={}", spec.device_mode),
    ];
    match spec.device_mode {
        DeviceMode::Lvm => args.push(format!("-pmemPercentage={}", spec.pmem_percentage)),
        DeviceMode::Direct => {}
    }

    let mut pods_mount = mount("mountpoint-dir", &format!("{KUBELET_DIR}/pods"));
    pods_mount.mount_propagation = Some("Bidirectional".to_string());

    Container {
        name: "pmem-driver".to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.pull_policy.clone()),
        args: Some(args),
        env: Some(vec![
            field_env("KUBE_NODE_NAME", "spec.nodeName"),
            field_env("KUBE_POD_IP", "status.podIP"),
        ]),
        resources: Some(container_resources(&spec.node_resources)),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..SecurityContext::default()
        }),
        volume_mounts: Some(vec![
            mount("node-cert", CERTS_DIR),
            mount("plugin-state-dir", &plugin_dir),
            pods_mount,
            mount("dev-dir", "/dev"),
            mount("sys-dir", "/sys"),
        ]),
        ..Container::default()
    }
}

fn registrar_container(spec: &DriverSpec) -> Container {
    Container {
        name: "driver-registrar".to_string(),
        image: Some(spec.node_registrar_image.clone()),
        image_pull_policy: Some(spec.pull_policy.clone()),
        args: Some(vec![
            format!("--v={}", spec.log_level),
            format!("--kubelet-registration-path={}/csi.sock", plugin_dir(spec)),
            "--csi-address=/pmem-csi/csi.sock".to_string(),
        ]),
        volume_mounts: Some(vec![
            mount("registration-dir", "/registration"),
            mount("plugin-state-dir", "/pmem-csi"),
        ]),
        ..Container::default()
    }
}

fn volumes(spec: &DriverSpec) -> Vec<Volume> {
    let host_path = |name: &str, path: String, kind: Option<&str>| Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path,
            type_: kind.map(str::to_string),
        }),
        ..Volume::default()
    };
    vec![
        Volume {
            name: "node-cert".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(names::node_secret(&spec.name)),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        },
        host_path(
            "registration-dir",
            format!("{KUBELET_DIR}/plugins_registry"),
            Some("DirectoryOrCreate"),
        ),
        host_path("plugin-state-dir", plugin_dir(spec), Some("DirectoryOrCreate")),
        host_path(
            "mountpoint-dir",
            format!("{KUBELET_DIR}/pods"),
            Some("DirectoryOrCreate"),
        ),
        host_path("dev-dir", "/dev".to_string(), Some("Directory")),
        host_path("sys-dir", "/sys".to_string(), Some("Directory")),
    ]
}
