//! Main controller implementation.
//!
//! Wires the Kubernetes client, the cluster client adapter, the reconciler,
//! the Deployment watcher and the probe server together.

use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, Watcher};
use cluster_client::KubeClusterClient;
use crds::Deployment;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for PMEM-CSI Deployments.
#[derive(Debug)]
pub struct Controller {
    deployment_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing PMEM-CSI operator");

        let kube_client = Client::try_default().await?;
        let cluster_client = Arc::new(KubeClusterClient::new(kube_client.clone()));
        let reconciler = Reconciler::new(cluster_client, config.options)?;
        let metrics = Metrics::new()?;

        let probe_server = tokio::spawn(metrics::serve(config.metrics_addr, metrics.clone()));

        let deployment_api: Api<Deployment> = Api::all(kube_client);
        let context = Arc::new(Context::new(reconciler, metrics));
        let deployment_watcher = tokio::spawn(Watcher::new(deployment_api, context).run());

        Ok(Self {
            deployment_watcher,
            probe_server,
        })
    }

    /// Runs until the watcher stops or the probe server fails.
    pub async fn run(self) -> Result<(), ControllerError> {
        let Self {
            deployment_watcher,
            probe_server,
        } = self;

        tokio::select! {
            result = deployment_watcher => {
                let result = result.map_err(|e| ControllerError::Internal(format!("watcher task failed: {e}")))?;
                if let Err(e) = &result {
                    error!("Deployment watcher failed: {}", e);
                }
                result
            }
            result = probe_server => {
                let result = result.map_err(|e| ControllerError::Internal(format!("probe server task failed: {e}")))?;
                if let Err(e) = &result {
                    error!("Probe server failed: {}", e);
                }
                result
            }
        }
    }
}
