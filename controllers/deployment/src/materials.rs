//! TLS material for the driver's mutual authentication.
//!
//! The registry server and the node controllers authenticate each other with
//! certificates issued by one CA. The material either comes from the
//! Deployment, is read back from the Secrets of an earlier reconciliation, or
//! is generated.

use crate::error::ControllerError;
use crate::validation::non_empty;
use crds::DeploymentSpec;
use k8s_openapi::api::core::v1::Secret;
use pmem_tls::{
    CertificateAuthority, KeyPair, decode_key, encode_cert, encode_key, new_private_key,
    same_key, validate, validate_authority,
};
use tracing::{debug, info};

/// Secret key of the CA certificate
pub const CA_CERT_KEY: &str = "ca.crt";

/// Secret key of the leaf certificate
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret key of the leaf private key
pub const TLS_KEY_KEY: &str = "tls.key";

/// A driver component that needs its own certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Registry server in the controller pod
    Registry,
    /// Node controller in every node pod
    NodeController,
}

impl Role {
    /// Both roles
    pub const ALL: [Role; 2] = [Role::Registry, Role::NodeController];

    /// Common name the role's certificate must carry
    pub fn subject(self) -> &'static str {
        match self {
            Role::Registry => "pmem-registry",
            Role::NodeController => "pmem-node-controller",
        }
    }

    fn supplied_cert(self, spec: &DeploymentSpec) -> Option<&str> {
        match self {
            Role::Registry => non_empty(spec.registry_cert.as_ref()),
            Role::NodeController => non_empty(spec.node_controller_cert.as_ref()),
        }
    }

    fn supplied_key(self, spec: &DeploymentSpec) -> Option<&str> {
        match self {
            Role::Registry => non_empty(spec.registry_private_key.as_ref()),
            Role::NodeController => non_empty(spec.node_controller_private_key.as_ref()),
        }
    }
}

/// PEM certificate and private key of one role
#[derive(Clone, PartialEq, Eq)]
pub struct CertificatePair {
    /// PEM certificate
    pub cert: String,
    /// PEM PKCS#8 private key
    pub key: String,
}

impl std::fmt::Debug for CertificatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificatePair")
            .field("cert", &self.cert)
            .finish_non_exhaustive()
    }
}

/// Everything the driver needs for mutual TLS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverMaterials {
    /// PEM CA certificate both roles trust
    pub ca_cert: String,
    /// Registry server pair
    pub registry: CertificatePair,
    /// Node controller pair
    pub node_controller: CertificatePair,
}

impl DriverMaterials {
    /// Pair of one role
    pub fn pair(&self, role: Role) -> &CertificatePair {
        match role {
            Role::Registry => &self.registry,
            Role::NodeController => &self.node_controller,
        }
    }

    /// Read material back from the two driver Secrets. Returns `None` when a
    /// Secret lacks an entry, the entries are not UTF-8 or the Secrets
    /// disagree on the CA.
    pub fn from_secrets(registry: &Secret, node: &Secret) -> Option<Self> {
        let (registry_ca, registry) = read_secret(registry)?;
        let (node_ca, node_controller) = read_secret(node)?;
        if registry_ca != node_ca {
            return None;
        }
        Some(Self {
            ca_cert: registry_ca,
            registry,
            node_controller,
        })
    }
}

fn read_secret(secret: &Secret) -> Option<(String, CertificatePair)> {
    let data = secret.data.as_ref()?;
    let entry = |key: &str| {
        data.get(key)
            .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
    };
    Some((
        entry(CA_CERT_KEY)?,
        CertificatePair {
            cert: entry(TLS_CERT_KEY)?,
            key: entry(TLS_KEY_KEY)?,
        },
    ))
}

/// Determine the material for a validated specification.
///
/// - With a CA in the spec, the supplied pairs are validated and used.
/// - Otherwise `stored` material from an earlier pass is reused if it is still
///   valid and matches any supplied private keys.
/// - Otherwise a new CA is generated and certificates are issued for the
///   supplied keys or for fresh keys.
pub fn resolve(
    spec: &DeploymentSpec,
    stored: Option<&DriverMaterials>,
) -> Result<DriverMaterials, ControllerError> {
    if let Some(ca_cert) = non_empty(spec.ca_cert.as_ref()) {
        return supplied(spec, ca_cert);
    }

    if let Some(stored) = stored {
        match check_stored(spec, stored) {
            Ok(()) => {
                debug!("Reusing stored TLS material");
                return Ok(stored.clone());
            }
            Err(reason) => info!("Stored TLS material not reusable ({}), issuing new material", reason),
        }
    }

    generate(spec)
}

fn supplied(spec: &DeploymentSpec, ca_cert: &str) -> Result<DriverMaterials, ControllerError> {
    validate_authority(ca_cert).map_err(|e| ControllerError::from_tls("CA certificate", e))?;
    Ok(DriverMaterials {
        ca_cert: ca_cert.to_string(),
        registry: supplied_pair(spec, ca_cert, Role::Registry)?,
        node_controller: supplied_pair(spec, ca_cert, Role::NodeController)?,
    })
}

fn supplied_pair(
    spec: &DeploymentSpec,
    ca_cert: &str,
    role: Role,
) -> Result<CertificatePair, ControllerError> {
    let (Some(cert), Some(key)) = (role.supplied_cert(spec), role.supplied_key(spec)) else {
        return Err(ControllerError::Validation(format!(
            "caCert requires a certificate and private key for {}",
            role.subject()
        )));
    };
    let context = format!("{} certificate", role.subject());
    validate(cert, key, ca_cert)
        .and_then(|info| info.ensure_subject(role.subject()))
        .map_err(|e| ControllerError::from_tls(context, e))?;
    Ok(CertificatePair {
        cert: cert.to_string(),
        key: key.to_string(),
    })
}

/// Why stored material cannot be reused, as a log message.
fn check_stored(spec: &DeploymentSpec, stored: &DriverMaterials) -> Result<(), String> {
    validate_authority(&stored.ca_cert).map_err(|e| format!("CA: {e}"))?;

    for role in Role::ALL {
        let pair = stored.pair(role);
        validate(&pair.cert, &pair.key, &stored.ca_cert)
            .and_then(|info| info.ensure_subject(role.subject()))
            .map_err(|e| format!("{}: {e}", role.subject()))?;
        if let Some(key) = role.supplied_key(spec) {
            let matches = same_key(key, &pair.key).map_err(|e| format!("{}: {e}", role.subject()))?;
            if !matches {
                return Err(format!("{}: private key changed", role.subject()));
            }
        }
    }
    Ok(())
}

fn generate(spec: &DeploymentSpec) -> Result<DriverMaterials, ControllerError> {
    let ca = CertificateAuthority::new(None, None)
        .map_err(|e| ControllerError::from_tls("certificate authority", e))?;

    let issue = |role: Role| -> Result<CertificatePair, ControllerError> {
        let context = format!("{} private key", role.subject());
        let key: KeyPair = match role.supplied_key(spec) {
            Some(pem) => decode_key(pem),
            None => new_private_key(),
        }
        .map_err(|e| ControllerError::from_tls(&context, e))?;

        let cert = ca
            .generate_certificate(role.subject(), &key)
            .map_err(|e| ControllerError::from_tls(format!("{} certificate", role.subject()), e))?;
        Ok(CertificatePair {
            cert: encode_cert(&cert),
            key: encode_key(&key),
        })
    };

    let materials = DriverMaterials {
        ca_cert: ca.encoded_certificate().to_string(),
        registry: issue(Role::Registry)?,
        node_controller: issue(Role::NodeController)?,
    };
    info!("Issued new CA and driver certificates");
    Ok(materials)
}
