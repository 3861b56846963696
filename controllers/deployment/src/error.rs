//! Controller-specific error types.
//!
//! Every failure of a reconciliation is classified here. The class decides
//! whether the request is retried and which phase the Deployment records.

use cluster_client::ClusterError;
use crds::DeploymentPhase;
use kube::Error as KubeError;
use pmem_tls::TlsError;
use thiserror::Error;

/// Errors that can occur in the Deployment controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Operator configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The Deployment specification can never succeed as written
    #[error("Invalid deployment specification: {0}")]
    Validation(String),

    /// Supplied or stored TLS material is unusable
    #[error("{context}: {source}")]
    Certificate {
        /// Which material was being processed
        context: String,
        /// Classified certificate failure
        #[source]
        source: TlsError,
    },

    /// Cluster object store error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Kubernetes API error outside of reconciliation (startup, watches)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Unexpected fault inside the controller
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    /// Classify a certificate error: bad material is a certificate error,
    /// a failure to produce new material is internal.
    pub fn from_tls(context: impl Into<String>, source: TlsError) -> Self {
        let context = context.into();
        if source.is_material_error() {
            ControllerError::Certificate { context, source }
        } else {
            ControllerError::Internal(format!("{context}: {source}"))
        }
    }

    /// Whether the request should be retried later.
    pub fn requeue(&self) -> bool {
        match self {
            ControllerError::InvalidConfig(_) | ControllerError::Validation(_) => false,
            ControllerError::Certificate { .. }
            | ControllerError::Cluster(_)
            | ControllerError::Kube(_)
            | ControllerError::Internal(_) => true,
        }
    }

    /// Phase to record for the failure. `None` leaves the recorded phase
    /// untouched.
    pub fn failure_phase(&self) -> Option<DeploymentPhase> {
        match self {
            ControllerError::Validation(_)
            | ControllerError::Certificate { .. }
            | ControllerError::Internal(_) => Some(DeploymentPhase::Failed),
            ControllerError::InvalidConfig(_)
            | ControllerError::Cluster(_)
            | ControllerError::Kube(_) => None,
        }
    }
}
