//! Resource client errors

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when reading the watched object's version marker
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The object does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The API server rejected or failed the read (network, auth, permission)
    #[error("failed to read {resource}: {source}")]
    Api {
        resource: String,
        #[source]
        source: kube::Error,
    },

    /// The object was returned without a resourceVersion
    #[error("{resource} has no resourceVersion")]
    MissingVersion { resource: String },

    /// The read did not complete in time
    #[error("timed out reading {resource} after {timeout:?}")]
    Timeout { resource: String, timeout: Duration },

    /// The configured resource type is neither a Secret nor a ConfigMap
    #[error("unsupported resource type: {0}")]
    UnsupportedKind(String),
}

impl ResourceError {
    /// True for every failure that means "the object could not be read right now".
    ///
    /// Such errors are transient from the watcher's point of view; only
    /// `UnsupportedKind` indicates a configuration problem.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, ResourceError::UnsupportedKind(_))
    }
}
