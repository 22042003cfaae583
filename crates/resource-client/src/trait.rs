//! ResourceAccessor trait for mocking
//!
//! The kube-backed [`KubeResourceAccessor`](crate::KubeResourceAccessor) implements
//! this trait; tests use [`MockResourceAccessor`](crate::MockResourceAccessor).

use crate::error::ResourceError;
use crate::models::WatchedResource;

/// Read access to the current version marker of a watched object.
///
/// Implementations perform exactly one read per call and never retry;
/// retry policy belongs to the caller.
#[async_trait::async_trait]
pub trait ResourceAccessor: Send + Sync {
    /// Returns the object's current `resourceVersion`.
    ///
    /// The marker is opaque: callers may only compare it for equality.
    async fn fetch_version(&self, resource: &WatchedResource) -> Result<String, ResourceError>;
}
