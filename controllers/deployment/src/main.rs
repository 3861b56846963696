//! PMEM-CSI Operator
//!
//! Watches PMEM-CSI `Deployment` resources and keeps the driver objects they
//! describe in place.

use deployment_controller::controller::Controller;
use deployment_controller::{Config, ControllerError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls client needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    info!("Starting PMEM-CSI operator");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.options.namespace);
    info!("  Kubernetes version: {}", config.options.kubernetes_version);
    info!("  Default driver image: {}", config.options.driver_image);
    info!("  Probe and metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
