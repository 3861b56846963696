//! Reconciliation of PMEM-CSI Deployments.
//!
//! One pass reads the Deployment, validates it, resolves the TLS material,
//! builds the desired children, applies them, prunes stale ones and records
//! the outcome in the Deployment status. Every pass starts from scratch, so
//! a pass interrupted half way is completed by the next one.

pub mod apply;
pub mod status;

#[cfg(test)]
pub mod testcases;


use crate::config::ControllerOptions;
use crate::defaults::DriverSpec;
use crate::error::ControllerError;
use crate::manifest::{DriverManifests, ManifestBuilder};
use crate::materials::{self, DriverMaterials};
use crate::names;
use crate::validation::{self, non_empty};
use cluster_client::{ClusterClient, ClusterObject, ObjectKey};
use crds::{Deployment, DeploymentPhase};
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Reconcile the Deployment with this name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileRequest {
    /// Deployment name (Deployments are cluster-scoped)
    pub name: String,
}

impl ReconcileRequest {
    /// Request for one Deployment
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Outcome of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// Whether the caller should run the request again
    pub requeue: bool,
    /// Phase recorded by this pass, `None` if the Deployment does not exist
    pub phase: Option<DeploymentPhase>,
}

/// Reconciles Deployments against the cluster.
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    options: ControllerOptions,
    builder: Arc<dyn ManifestBuilder>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler with the shipped manifest builder.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        options: ControllerOptions,
    ) -> Result<Self, ControllerError> {
        options.validate()?;
        Ok(Self {
            client,
            options,
            builder: Arc::new(DriverManifests),
        })
    }

    /// Replace the manifest builder
    #[must_use]
    pub fn with_manifest_builder(mut self, builder: Arc<dyn ManifestBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// Operator options this reconciler runs with
    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Run one reconciliation pass.
    ///
    /// Errors are returned after their phase has been recorded;
    /// [`ControllerError::requeue`] tells whether retrying can help.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<Reconciled, ControllerError> {
        let key = ObjectKey::of::<Deployment>(None, request.name.as_str());
        let Some(object) = self.client.get(&key).await? else {
            debug!("Deployment {} not found, nothing to do", request.name);
            return Ok(Reconciled {
                requeue: false,
                phase: None,
            });
        };

        match self.converge(&object).await {
            Ok(()) => {
                status::record(self.client.as_ref(), &object, DeploymentPhase::Running, None)
                    .await?;
                Ok(Reconciled {
                    requeue: false,
                    phase: Some(DeploymentPhase::Running),
                })
            }
            Err(err) => {
                error!("Reconciliation of Deployment {} failed: {}", request.name, err);
                if let Some(phase) = err.failure_phase() {
                    let reason = err.to_string();
                    if let Err(e) =
                        status::record(self.client.as_ref(), &object, phase, Some(&reason)).await
                    {
                        error!(
                            "Failed to record {} status for Deployment {}: {}",
                            phase, request.name, e
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn converge(&self, object: &ClusterObject) -> Result<(), ControllerError> {
        let deployment: Deployment = object.clone().into_resource().map_err(|e| {
            ControllerError::Validation(format!("malformed Deployment {}: {e}", object.name()))
        })?;
        let device_mode = validation::validate(&deployment.spec)?;
        let spec = DriverSpec::new(&deployment, device_mode, &self.options)?;

        let stored = if non_empty(deployment.spec.ca_cert.as_ref()).is_some() {
            None
        } else {
            self.stored_materials(&spec).await?
        };
        let materials = materials::resolve(&deployment.spec, stored.as_ref())?;

        let desired = self.builder.build(&spec, &materials, &self.options)?;
        let mut changed = 0;
        for child in &desired {
            if apply::apply(self.client.as_ref(), child).await? != apply::Applied::Unchanged {
                changed += 1;
            }
        }
        let pruned = apply::prune(
            self.client.as_ref(),
            &self.builder.managed_types(&self.options),
            &self.options.namespace,
            &names::instance_selector(&spec.name),
            &desired,
        )
        .await?;

        if changed > 0 || pruned > 0 {
            info!(
                "Deployment {}: {} children written, {} pruned",
                spec.name, changed, pruned
            );
        }
        Ok(())
    }

    /// Material of an earlier pass, if both Secrets exist and belong to this
    /// Deployment instance.
    async fn stored_materials(
        &self,
        spec: &DriverSpec,
    ) -> Result<Option<DriverMaterials>, ControllerError> {
        let namespace = Some(self.options.namespace.as_str());
        let registry = self
            .owned_secret(ObjectKey::of::<Secret>(namespace, names::registry_secret(&spec.name)), &spec.uid)
            .await?;
        let node = self
            .owned_secret(ObjectKey::of::<Secret>(namespace, names::node_secret(&spec.name)), &spec.uid)
            .await?;
        Ok(match (registry, node) {
            (Some(registry), Some(node)) => DriverMaterials::from_secrets(&registry, &node),
            _ => None,
        })
    }

    async fn owned_secret(
        &self,
        key: ObjectKey,
        uid: &str,
    ) -> Result<Option<Secret>, ControllerError> {
        let Some(object) = self.client.get(&key).await? else {
            return Ok(None);
        };
        if !object.is_owned_by(uid) {
            info!("{} belongs to another Deployment instance, not reusing it", key);
            return Ok(None);
        }
        match object.into_resource() {
            Ok(secret) => Ok(Some(secret)),
            Err(e) => {
                info!("{} is unreadable ({}), not reusing it", key, e);
                Ok(None)
            }
        }
    }
}
