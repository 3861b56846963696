//! Secrets carrying the TLS material of the two driver roles.

use super::child_metadata;
use crate::config::ControllerOptions;
use crate::defaults::DriverSpec;
use crate::materials::{CA_CERT_KEY, DriverMaterials, Role, TLS_CERT_KEY, TLS_KEY_KEY};
use crate::names;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;

pub(super) fn registry_secret(
    spec: &DriverSpec,
    materials: &DriverMaterials,
    options: &ControllerOptions,
) -> Secret {
    tls_secret(spec, materials, options, Role::Registry, names::registry_secret(&spec.name))
}

pub(super) fn node_secret(
    spec: &DriverSpec,
    materials: &DriverMaterials,
    options: &ControllerOptions,
) -> Secret {
    tls_secret(spec, materials, options, Role::NodeController, names::node_secret(&spec.name))
}

fn tls_secret(
    spec: &DriverSpec,
    materials: &DriverMaterials,
    options: &ControllerOptions,
    role: Role,
    name: String,
) -> Secret {
    let pair = materials.pair(role);
    let bytes = |value: &str| ByteString(value.as_bytes().to_vec());
    Secret {
        metadata: child_metadata(spec, Some(options), name),
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([
            (CA_CERT_KEY.to_string(), bytes(&materials.ca_cert)),
            (TLS_CERT_KEY.to_string(), bytes(&pair.cert)),
            (TLS_KEY_KEY.to_string(), bytes(&pair.key)),
        ])),
        ..Secret::default()
    }
}
