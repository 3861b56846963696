//! Prometheus metrics and the probe server.
//!
//! `/healthz` answers as soon as the server runs, `/readyz` once the
//! Deployment watcher has started, `/metrics` exposes the registry.

use crate::error::ControllerError;
use crate::reconciler::Reconciled;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use crds::DeploymentPhase;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// How a reconciliation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The driver is running
    Running,
    /// The Deployment was marked failed
    Failed,
    /// A cluster error; the phase was left alone
    Transient,
    /// The Deployment no longer exists
    Deleted,
}

impl Outcome {
    /// Label value
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Running => "running",
            Outcome::Failed => "failed",
            Outcome::Transient => "transient",
            Outcome::Deleted => "deleted",
        }
    }

    /// Outcome of a reconciliation result
    pub fn of(result: &Result<Reconciled, ControllerError>) -> Self {
        match result {
            Ok(Reconciled { phase: None, .. }) => Outcome::Deleted,
            Ok(Reconciled {
                phase: Some(DeploymentPhase::Failed),
                ..
            }) => Outcome::Failed,
            Ok(Reconciled {
                phase: Some(DeploymentPhase::Running | DeploymentPhase::New),
                ..
            }) => Outcome::Running,
            Err(e) if e.failure_phase().is_some() => Outcome::Failed,
            Err(_) => Outcome::Transient,
        }
    }
}

/// Operator metrics
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconcile_total: IntCounterVec,
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register the operator's metrics
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();
        let reconcile_total = IntCounterVec::new(
            Opts::new(
                "pmem_operator_reconcile_total",
                "Deployment reconciliations by outcome",
            ),
            &["outcome"],
        )
        .map_err(|e| ControllerError::Internal(format!("failed to create metrics: {e}")))?;
        registry
            .register(Box::new(reconcile_total.clone()))
            .map_err(|e| ControllerError::Internal(format!("failed to register metrics: {e}")))?;
        Ok(Self {
            registry,
            reconcile_total,
            ready: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Count one reconciliation
    pub fn record(&self, outcome: Outcome) {
        self.reconcile_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Number of reconciliations with the given outcome
    pub fn count(&self, outcome: Outcome) -> u64 {
        self.reconcile_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Mark the operator ready
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Whether the operator is ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Metrics in Prometheus text format
    pub fn export(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ControllerError::Internal(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buffer)
            .map_err(|e| ControllerError::Internal(format!("metrics are not UTF-8: {e}")))
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(metrics): State<Metrics>) -> Response {
    if metrics.is_ready() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics_handler(State(metrics): State<Metrics>) -> Response {
    match metrics.export() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router with the probe and metrics endpoints
pub fn router(metrics: Metrics) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// Serve the probe and metrics endpoints until the process exits
pub async fn serve(addr: SocketAddr, metrics: Metrics) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!("Serving probes and metrics on {}", addr);
    axum::serve(listener, router(metrics))
        .await
        .map_err(|e| ControllerError::Internal(format!("probe server failed: {e}")))
}
