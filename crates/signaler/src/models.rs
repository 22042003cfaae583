//! Signal intents and delivery records

use crate::error::SignalerError;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::fmt;
use std::str::FromStr;

/// What the target process should do when signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Re-read configuration (`SIGHUP`)
    Reload,
    /// Shut down and let the kubelet restart the container (`SIGTERM`)
    Terminate,
}

impl SignalKind {
    /// The concrete OS signal for this intent.
    pub fn signal(&self) -> Signal {
        match self {
            SignalKind::Reload => Signal::SIGHUP,
            SignalKind::Terminate => Signal::SIGTERM,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Reload => f.write_str("reload"),
            SignalKind::Terminate => f.write_str("terminate"),
        }
    }
}

impl FromStr for SignalKind {
    type Err = SignalerError;

    /// Accepts `SIGHUP`, `HUP`, `reload`, `SIGTERM`, `TERM` and `terminate`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIGHUP" | "HUP" | "RELOAD" => Ok(SignalKind::Reload),
            "SIGTERM" | "TERM" | "TERMINATE" => Ok(SignalKind::Terminate),
            _ => Err(SignalerError::UnsupportedSignalKind(s.to_string())),
        }
    }
}

/// A signal that the kernel accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub pid: Pid,
    pub signal: Signal,
}
