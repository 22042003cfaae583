//! Signaler errors

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Errors that can occur while locating or signalling the target process
#[derive(Debug, Error)]
pub enum SignalerError {
    /// The configured signal type has no mapping
    #[error("unsupported signal type: {0}")]
    UnsupportedSignalKind(String),

    /// The locator string itself is malformed
    #[error("invalid target locator: {0}")]
    InvalidLocator(String),

    /// The locator could not be resolved to a usable PID
    #[error("target {locator} unresolved: {reason}")]
    TargetUnresolved { locator: String, reason: String },

    /// The kernel refused the signal (no such process, permission denied)
    #[error("failed to deliver {signal:?} to pid {pid}: {source}")]
    DeliveryFailed {
        pid: i32,
        signal: Signal,
        #[source]
        source: Errno,
    },
}
