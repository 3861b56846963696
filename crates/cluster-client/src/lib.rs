//! Kubernetes object access for the PMEM-CSI operator
//!
//! The reconciler only needs a handful of operations on arbitrary object
//! kinds: get, create, update, status update, delete and list. They are
//! captured by the [`ClusterClient`] trait with two implementations:
//!
//! - [`KubeClusterClient`] talks to a live API server through `kube`'s
//!   dynamic API
//! - `MockClusterClient` (feature `test-util`) keeps objects in memory
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClient, KubeClusterClient, ObjectKey};
//! use k8s_openapi::api::core::v1::Secret;
//!
//! # async fn example() -> Result<(), cluster_client::ClusterError> {
//! let client = KubeClusterClient::try_default().await?;
//! let key = ObjectKey::of::<Secret>(Some("default"), "pmem-csi-registry-secrets");
//! if let Some(secret) = client.get(&key).await? {
//!     println!("found {}", secret.key());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod object;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use cluster_trait::ClusterClient;
pub use error::ClusterError;
pub use object::{ClusterObject, ObjectKey, ObjectType, format_label_selector, parse_label_selector};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterClient, Operation};
