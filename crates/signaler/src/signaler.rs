//! Signal delivery.

use crate::error::SignalerError;
use crate::locator::TargetLocator;
use crate::models::{Delivery, SignalKind};
use nix::sys::signal::kill;
use tracing::debug;

/// Something that can notify the target process of a configuration change.
///
/// Implementations make exactly one delivery attempt per call and keep no
/// state between calls.
#[async_trait::async_trait]
pub trait SignalDispatcher: Send + Sync {
    /// Sends the signal once and reports which process received it.
    async fn dispatch(&self) -> Result<Delivery, SignalerError>;
}

/// Delivers a fixed signal to the process named by a [`TargetLocator`].
#[derive(Debug, Clone)]
pub struct Signaler {
    locator: TargetLocator,
    kind: SignalKind,
    container: Option<String>,
}

impl Signaler {
    /// Sends `kind` to whatever process `locator` names at dispatch time.
    pub fn new(locator: TargetLocator, kind: SignalKind) -> Self {
        Self {
            locator,
            kind,
            container: None,
        }
    }

    /// Name of the container the target runs in; only used for log context.
    pub fn with_container_name(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

#[async_trait::async_trait]
impl SignalDispatcher for Signaler {
    async fn dispatch(&self) -> Result<Delivery, SignalerError> {
        let pid = self.locator.resolve().await?;
        let signal = self.kind.signal();
        let container = self.container.as_deref().unwrap_or("<unnamed>");

        debug!(pid = pid.as_raw(), ?signal, container, locator = %self.locator, "Sending signal");

        kill(pid, signal).map_err(|source| SignalerError::DeliveryFailed {
            pid: pid.as_raw(),
            signal,
            source,
        })?;

        debug!(pid = pid.as_raw(), ?signal, container, "Signal delivered");
        Ok(Delivery { pid, signal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{Child, Command};

    fn spawn_sleeper() -> Child {
        Command::new("sleep").arg("30").spawn().unwrap()
    }

    #[tokio::test]
    async fn test_reload_delivers_sighup() {
        let mut child = spawn_sleeper();
        let signaler = Signaler::new(TargetLocator::Pid(child.id() as i32), SignalKind::Reload)
            .with_container_name("app");

        let delivery = signaler.dispatch().await.unwrap();
        assert_eq!(delivery.signal, Signal::SIGHUP);
        assert_eq!(delivery.pid.as_raw(), child.id() as i32);

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGHUP as i32));
    }

    #[tokio::test]
    async fn test_terminate_delivers_sigterm() {
        let mut child = spawn_sleeper();
        let signaler = Signaler::new(TargetLocator::Pid(child.id() as i32), SignalKind::Terminate);

        signaler.dispatch().await.unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_resolution_happens_on_every_dispatch() {
        let path = std::env::temp_dir()
            .join(format!("signaler-{}-redispatch.pid", std::process::id()));
        let signaler = Signaler::new(TargetLocator::File(path.clone()), SignalKind::Terminate);

        // No pid file yet
        assert!(matches!(
            signaler.dispatch().await,
            Err(SignalerError::TargetUnresolved { .. })
        ));

        let mut child = spawn_sleeper();
        std::fs::write(&path, child.id().to_string()).unwrap();

        let delivery = signaler.dispatch().await.unwrap();
        assert_eq!(delivery.pid.as_raw(), child.id() as i32);
        assert_eq!(child.wait().unwrap().signal(), Some(Signal::SIGTERM as i32));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_process_is_delivery_failure() {
        // Above any pid_max the kernel allows
        let signaler = Signaler::new(TargetLocator::Pid(i32::MAX), SignalKind::Reload);

        let err = signaler.dispatch().await.unwrap_err();
        assert!(matches!(
            err,
            SignalerError::DeliveryFailed {
                pid: i32::MAX,
                signal: Signal::SIGHUP,
                source: Errno::ESRCH
            }
        ));
    }

    #[tokio::test]
    async fn test_unresolved_target_sends_nothing() {
        let signaler = Signaler::new(
            TargetLocator::Env("SIGNALER_TEST_VARIABLE_THAT_IS_NEVER_SET".to_string()),
            SignalKind::Terminate,
        );

        let err = signaler.dispatch().await.unwrap_err();
        assert!(matches!(err, SignalerError::TargetUnresolved { .. }));
    }
}
