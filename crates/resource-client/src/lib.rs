//! Kubernetes Resource Client
//!
//! Read-only access to the version marker (`metadata.resourceVersion`) of a
//! single named Secret or ConfigMap.
//!
//! # Example
//!
//! ```no_run
//! use resource_client::{KubeResourceAccessor, ResourceAccessor, ResourceKind, WatchedResource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let accessor = KubeResourceAccessor::new(client);
//!
//! let resource = WatchedResource::new("default", ResourceKind::ConfigMap, "app-config");
//! let version = accessor.fetch_version(&resource).await?;
//! println!("{resource} is at version {version}");
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Metadata-only reads**: Secret payloads are never transferred
//! - **Mocking**: `test-util` exposes [`MockResourceAccessor`] for unit tests

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod accessor_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use accessor_trait::ResourceAccessor;
pub use client::KubeResourceAccessor;
pub use error::ResourceError;
pub use models::*;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockResourceAccessor;
