//! Process Signaler
//!
//! Delivers a reload (`SIGHUP`) or terminate (`SIGTERM`) signal to a process
//! in a neighbouring container. The pod must share its process namespace
//! (`shareProcessNamespace: true`) for the target PID to be visible.
//!
//! The target PID is looked up on every dispatch through a [`TargetLocator`],
//! since the target may have restarted under a new PID since the last signal.

pub mod error;
pub mod locator;
pub mod models;
pub mod signaler;

pub use error::SignalerError;
pub use locator::TargetLocator;
pub use models::*;
pub use signaler::{SignalDispatcher, Signaler};

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;
