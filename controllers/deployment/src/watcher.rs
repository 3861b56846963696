//! Kubernetes resource watchers.
//!
//! Watches Deployments with `kube_runtime::Controller` and runs the
//! reconciler for every change. The runtime serializes passes for one name,
//! so the reconciler never runs twice concurrently for the same Deployment.

use crate::backoff::BackoffTracker;
use crate::error::ControllerError;
use crate::metrics::{Metrics, Outcome};
use crate::reconciler::{ReconcileRequest, Reconciler};
use crds::Deployment;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// State shared by all reconciliation passes
#[derive(Debug)]
pub struct Context {
    reconciler: Reconciler,
    metrics: Metrics,
    backoff: BackoffTracker,
}

impl Context {
    /// Bundle reconciler and metrics
    pub fn new(reconciler: Reconciler, metrics: Metrics) -> Self {
        Self {
            reconciler,
            metrics,
            backoff: BackoffTracker::default(),
        }
    }
}

async fn reconcile(deployment: Arc<Deployment>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let name = deployment.name_any();
    debug!("Reconciling Deployment {}", name);

    let result = ctx.reconciler.reconcile(&ReconcileRequest::new(name.as_str())).await;
    ctx.metrics.record(Outcome::of(&result));

    let reconciled = result?;
    ctx.backoff.reset(&name);
    if reconciled.requeue {
        Ok(Action::requeue(ctx.backoff.next_backoff(&name)))
    } else {
        Ok(Action::await_change())
    }
}

fn error_policy(deployment: Arc<Deployment>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let name = deployment.name_any();
    if error.requeue() {
        let delay = ctx.backoff.next_backoff(&name);
        error!(
            "Reconciliation error for Deployment {}: {} (retrying in {:?})",
            name, error, delay
        );
        Action::requeue(delay)
    } else {
        error!(
            "Reconciliation error for Deployment {}: {} (waiting for a change)",
            name, error
        );
        Action::await_change()
    }
}

/// Watches Deployment resources for changes.
#[derive(Debug)]
pub struct Watcher {
    api: Api<Deployment>,
    context: Arc<Context>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(api: Api<Deployment>, context: Arc<Context>) -> Self {
        Self { api, context }
    }

    /// Watch Deployments until the stream ends.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Starting Deployment watcher");

        // Debounce batches bursts of events for one object, e.g. our own
        // status writes.
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(3);

        self.context.metrics.set_ready();
        Controller::new(self.api, watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context)
            .for_each(|res| async move {
                match res {
                    Ok((object, _)) => debug!("Reconciled Deployment {}", object.name),
                    Err(e) => error!("Controller error for Deployment: {}", e),
                }
            })
            .await;

        info!("Deployment watcher stopped");
        Ok(())
    }
}
