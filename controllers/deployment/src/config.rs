//! Operator configuration.
//!
//! Settings come from environment variables. The lookup is injectable so the
//! parsing can be tested without touching the process environment.

use crate::error::ControllerError;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Namespace used for child objects when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Address of the probe and metrics server when none is configured
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Kubernetes version assumed when none is configured
pub const DEFAULT_KUBERNETES_VERSION: KubernetesVersion = KubernetesVersion::new(1, 30);

/// `major.minor` version of the Kubernetes cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KubernetesVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl KubernetesVersion {
    /// Create a version
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for KubernetesVersion {
    type Err = ControllerError;

    /// Accepts `1.30`, `v1.30` and `1.30.2` (the patch level is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ControllerError::InvalidConfig(format!("invalid Kubernetes version '{s}'"));
        let trimmed = s.trim().trim_start_matches('v');
        let mut parts = trimmed.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        Ok(Self::new(major, minor))
    }
}

/// Settings the reconciler needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Namespace for the namespaced child objects
    pub namespace: String,
    /// Version of the cluster the driver is deployed to
    pub kubernetes_version: KubernetesVersion,
    /// Driver image used when a Deployment does not name one
    pub driver_image: String,
}

impl ControllerOptions {
    /// Fail with [`ControllerError::InvalidConfig`] if a required value is
    /// empty.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.namespace.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "operator namespace must not be empty".to_string(),
            ));
        }
        if self.driver_image.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "default driver image must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full operator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Reconciler settings
    pub options: ControllerOptions,
    /// Listen address of the probe and metrics server
    pub metrics_addr: SocketAddr,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// - `WATCH_NAMESPACE` or `OPERATOR_NAMESPACE`: namespace for children
    /// - `PMEM_CSI_DRIVER_IMAGE`: default driver image (required)
    /// - `KUBERNETES_VERSION`: cluster version, e.g. `1.30`
    /// - `METRICS_ADDR`: probe and metrics listen address
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let namespace = non_empty("WATCH_NAMESPACE")
            .or_else(|| non_empty("OPERATOR_NAMESPACE"))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let driver_image = non_empty("PMEM_CSI_DRIVER_IMAGE").ok_or_else(|| {
            ControllerError::InvalidConfig(
                "PMEM_CSI_DRIVER_IMAGE environment variable is required".to_string(),
            )
        })?;
        let kubernetes_version = non_empty("KUBERNETES_VERSION")
            .map(|v| v.parse::<KubernetesVersion>())
            .transpose()?
            .unwrap_or(DEFAULT_KUBERNETES_VERSION);
        let metrics_addr = non_empty("METRICS_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_addr.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!("invalid METRICS_ADDR '{metrics_addr}': {e}"))
        })?;

        let options = ControllerOptions {
            namespace,
            kubernetes_version,
            driver_image,
        };
        options.validate()?;
        Ok(Self {
            options,
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_kubernetes_version_parsing() {
        assert_eq!("1.30".parse::<KubernetesVersion>().unwrap(), KubernetesVersion::new(1, 30));
        assert_eq!("v1.17".parse::<KubernetesVersion>().unwrap(), KubernetesVersion::new(1, 17));
        assert_eq!("1.18.3".parse::<KubernetesVersion>().unwrap(), KubernetesVersion::new(1, 18));
        assert!("1".parse::<KubernetesVersion>().is_err());
        assert!("one.two".parse::<KubernetesVersion>().is_err());
        assert!(KubernetesVersion::new(1, 17) < KubernetesVersion::new(1, 18));
        assert_eq!(KubernetesVersion::new(1, 9).to_string(), "1.9");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("PMEM_CSI_DRIVER_IMAGE", "pmem-csi-driver:test")]))
            .unwrap();
        assert_eq!(config.options.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.options.kubernetes_version, DEFAULT_KUBERNETES_VERSION);
        assert_eq!(config.options.driver_image, "pmem-csi-driver:test");
        assert_eq!(config.metrics_addr.port(), 8080);
    }

    #[test]
    fn test_config_explicit_values() {
        let config = Config::from_lookup(lookup(&[
            ("PMEM_CSI_DRIVER_IMAGE", "pmem-csi-driver:test"),
            ("OPERATOR_NAMESPACE", "pmem-csi"),
            ("KUBERNETES_VERSION", "1.17"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
        ]))
        .unwrap();
        assert_eq!(config.options.namespace, "pmem-csi");
        assert_eq!(config.options.kubernetes_version, KubernetesVersion::new(1, 17));
        assert_eq!(config.metrics_addr.port(), 9090);
    }

    #[test]
    fn test_watch_namespace_wins() {
        let config = Config::from_lookup(lookup(&[
            ("PMEM_CSI_DRIVER_IMAGE", "pmem-csi-driver:test"),
            ("WATCH_NAMESPACE", "watched"),
            ("OPERATOR_NAMESPACE", "pmem-csi"),
        ]))
        .unwrap();
        assert_eq!(config.options.namespace, "watched");
    }

    #[test]
    fn test_config_requires_driver_image() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[
            ("PMEM_CSI_DRIVER_IMAGE", "x"),
            ("KUBERNETES_VERSION", "latest"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("PMEM_CSI_DRIVER_IMAGE", "x"),
            ("METRICS_ADDR", "nowhere"),
        ]))
        .is_err());
    }
}
