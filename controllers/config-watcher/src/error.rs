//! Controller-specific error types.
//!
//! Errors from the resource client and the signaler are wrapped as-is; the
//! remaining variants cover configuration and timeouts owned by the controller.

use resource_client::ResourceError;
use signaler::SignalerError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the Config Watcher.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client construction failed
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Reading the watched resource failed
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Locating or signalling the target process failed
    #[error("Signal error: {0}")]
    Signal(#[from] SignalerError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signal dispatch did not finish in time
    #[error("Signal dispatch timed out after {0:?}")]
    DispatchTimeout(Duration),
}
