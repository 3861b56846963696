//! PMEM-CSI Deployment controller
//!
//! Reconciles `Deployment` resources (`pmem-csi.intel.com/v1alpha1`) into
//! running PMEM-CSI driver installations: TLS Secrets issued by a CA, the
//! controller StatefulSet with its Service, the node DaemonSet and the
//! CSIDriver registration.
//!
//! The reconciler only talks to the cluster through
//! [`cluster_client::ClusterClient`], so it runs unchanged against the API
//! server and against the in-memory mock used by the tests.

pub mod backoff;
pub mod config;
pub mod controller;
pub mod defaults;
pub mod error;
pub mod manifest;
pub mod materials;
pub mod metrics;
pub mod names;
pub mod reconcile_helpers;
pub mod reconciler;
pub mod validation;
pub mod watcher;


#[cfg(test)]
pub mod test_utils;

pub use config::{Config, ControllerOptions, KubernetesVersion};
pub use error::ControllerError;
pub use manifest::{DriverManifests, ManifestBuilder};
pub use reconciler::{ReconcileRequest, Reconciled, Reconciler};
