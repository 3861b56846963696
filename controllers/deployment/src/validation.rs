//! Validation of Deployment specifications.
//!
//! Everything rejected here is a permanent error: retrying cannot help until
//! the user edits the Deployment.

use crate::error::ControllerError;
use crate::names::RESERVED_LABELS;
use crds::{DeploymentSpec, DeviceMode, ResourceRequirements};

/// Accepted image pull policies
pub const PULL_POLICIES: [&str; 3] = ["Always", "Never", "IfNotPresent"];

/// Treat empty strings like absent values.
pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Validate a specification and return its parsed device mode.
///
/// The device mode is checked first so that its error wins when several
/// fields are wrong.
pub fn validate(spec: &DeploymentSpec) -> Result<DeviceMode, ControllerError> {
    let mode = validate_device_mode(&spec.device_mode)?;
    validate_pull_policy(&spec.pull_policy)?;
    validate_pmem_percentage(spec.pmem_percentage)?;
    validate_resources("controllerResources", spec.controller_resources.as_ref())?;
    validate_resources("nodeResources", spec.node_resources.as_ref())?;
    validate_labels(spec)?;
    validate_tls_fields(spec)?;
    Ok(mode)
}

/// Parse the device mode. Whether a mode is supported does not depend on
/// the Kubernetes version.
pub fn validate_device_mode(device_mode: &str) -> Result<DeviceMode, ControllerError> {
    device_mode
        .parse()
        .map_err(|e: crds::UnknownDeviceMode| ControllerError::Validation(e.to_string()))
}

fn validate_pull_policy(pull_policy: &str) -> Result<(), ControllerError> {
    if pull_policy.is_empty() || PULL_POLICIES.contains(&pull_policy) {
        return Ok(());
    }
    Err(ControllerError::Validation(format!(
        "unsupported image pull policy \"{pull_policy}\", expected one of: {}",
        PULL_POLICIES.join(", ")
    )))
}

fn validate_pmem_percentage(percentage: Option<u16>) -> Result<(), ControllerError> {
    match percentage {
        Some(p) if p > 100 => Err(ControllerError::Validation(format!(
            "pmemPercentage {p} is out of range 0-100"
        ))),
        _ => Ok(()),
    }
}

fn validate_resources(
    field: &str,
    resources: Option<&ResourceRequirements>,
) -> Result<(), ControllerError> {
    let Some(resources) = resources else {
        return Ok(());
    };
    for (kind, values) in [("requests", &resources.requests), ("limits", &resources.limits)] {
        for (resource, quantity) in values.iter().flatten() {
            if !is_quantity(quantity) {
                return Err(ControllerError::Validation(format!(
                    "{field}.{kind}.{resource}: invalid quantity \"{quantity}\""
                )));
            }
        }
    }
    Ok(())
}

fn validate_labels(spec: &DeploymentSpec) -> Result<(), ControllerError> {
    for key in spec.labels.iter().flat_map(|labels| labels.keys()) {
        if RESERVED_LABELS.contains(&key.as_str()) {
            return Err(ControllerError::Validation(format!(
                "label \"{key}\" is set by the operator and cannot be overridden"
            )));
        }
    }
    Ok(())
}

/// Check which TLS fields are set together.
///
/// Without a CA only bare private keys may be given; certificates are then
/// issued by a generated CA. With a CA both roles need certificate and key.
fn validate_tls_fields(spec: &DeploymentSpec) -> Result<(), ControllerError> {
    let ca = non_empty(spec.ca_cert.as_ref()).is_some();
    let roles = [
        (
            "registry",
            non_empty(spec.registry_cert.as_ref()).is_some(),
            non_empty(spec.registry_private_key.as_ref()).is_some(),
        ),
        (
            "nodeController",
            non_empty(spec.node_controller_cert.as_ref()).is_some(),
            non_empty(spec.node_controller_private_key.as_ref()).is_some(),
        ),
    ];

    for (role, cert, key) in roles {
        match (ca, cert, key) {
            (false, true, _) => {
                return Err(ControllerError::Validation(format!(
                    "{role}Cert requires caCert"
                )));
            }
            (true, false, _) | (true, _, false) => {
                return Err(ControllerError::Validation(format!(
                    "caCert requires both {role}Cert and {role}PrivateKey"
                )));
            }
            (false, false, _) | (true, true, true) => {}
        }
    }
    Ok(())
}

/// Whether `value` is a Kubernetes resource quantity such as `100m`, `1.5`,
/// `250Mi` or `1e3`.
pub fn is_quantity(value: &str) -> bool {
    const SUFFIXES: [&str; 15] = [
        "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E",
    ];
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);

    if let Some(number) = SUFFIXES.iter().find_map(|suffix| unsigned.strip_suffix(suffix))
        && is_decimal(number)
    {
        return true;
    }
    if let Some((number, exponent)) = unsigned.split_once(['e', 'E']) {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        return is_decimal(number) && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    }
    is_decimal(unsigned)
}

fn is_decimal(number: &str) -> bool {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}
