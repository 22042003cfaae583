//! Main control loop.
//!
//! Each cycle is a small state machine:
//!
//! - **Polling**: ask the [`Watcher`] whether the resource changed. No change or
//!   a failed poll ends the cycle; a change moves to Signaling.
//! - **Signaling**: dispatch the signal once. Success or failure, the cycle ends.
//!
//! Errors are logged and counted, never propagated: a failed cycle only delays
//! the next one. Consecutive poll failures back off along a Fibonacci sequence.
//! The loop stops only when its [`CancellationToken`] is cancelled, which is
//! checked before every poll, before every dispatch and during every pause.

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::watcher::Watcher;
use resource_client::ResourceAccessor;
use signaler::{Delivery, SignalDispatcher};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing knobs for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Pause after every cycle; zero polls back to back
    pub poll_interval: Duration,
    /// First delay after a failed poll
    pub backoff_min: Duration,
    /// Upper bound for the failed-poll delay
    pub backoff_max: Duration,
    /// Longest a single version read may take
    pub fetch_timeout: Duration,
    /// Longest a single signal delivery may take
    pub dispatch_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            dispatch_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Polling,
    Signaling,
}

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Version matched the stored one
    Unchanged,
    /// Version changed and the target was signaled
    Signaled(Delivery),
    /// The version could not be read
    PollFailed,
    /// Version changed but the signal was not delivered
    DispatchFailed,
    /// Shutdown was requested before the cycle finished
    Cancelled,
}

/// Running totals, logged when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub changes: u64,
    pub signals_delivered: u64,
    pub poll_failures: u64,
    pub dispatch_failures: u64,
}

/// Drives the watcher and dispatcher until shutdown.
pub struct Controller<A, D> {
    watcher: Watcher<A>,
    dispatcher: D,
    poll_interval: Duration,
    dispatch_timeout: Duration,
    backoff: FibonacciBackoff,
    shutdown: CancellationToken,
    stats: LoopStats,
}

impl<A, D> Controller<A, D>
where
    A: ResourceAccessor,
    D: SignalDispatcher,
{
    /// Creates a new controller instance.
    ///
    /// The watcher's fetch timeout is set from `settings`.
    pub fn new(
        watcher: Watcher<A>,
        dispatcher: D,
        settings: LoopSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            watcher: watcher.with_fetch_timeout(settings.fetch_timeout),
            dispatcher,
            poll_interval: settings.poll_interval,
            dispatch_timeout: settings.dispatch_timeout,
            backoff: FibonacciBackoff::new(settings.backoff_min, settings.backoff_max),
            shutdown,
            stats: LoopStats::default(),
        }
    }

    #[cfg(test)]
    pub fn watcher(&self) -> &Watcher<A> {
        &self.watcher
    }

    #[cfg(test)]
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Runs until the shutdown token is cancelled.
    pub async fn run(mut self) -> LoopStats {
        info!(resource = %self.watcher.resource(), "Config watcher running");
        self.drive(None).await;
        info!(
            cycles = self.stats.cycles,
            changes = self.stats.changes,
            signals_delivered = self.stats.signals_delivered,
            poll_failures = self.stats.poll_failures,
            dispatch_failures = self.stats.dispatch_failures,
            last_version = self.watcher.last_version().unwrap_or("<none>"),
            "Config watcher stopped"
        );
        self.stats
    }

    /// Runs at most `cycles` cycles, stopping early on shutdown.
    #[cfg(test)]
    pub async fn run_cycles(&mut self, cycles: u64) -> &LoopStats {
        self.drive(Some(cycles)).await;
        &self.stats
    }

    async fn drive(&mut self, limit: Option<u64>) {
        let mut remaining = limit;
        while remaining != Some(0) {
            let outcome = self.cycle().await;
            if outcome == CycleOutcome::Cancelled {
                break;
            }
            self.record(outcome);
            remaining = remaining.map(|n| n - 1);

            if remaining != Some(0) && !self.pause(outcome).await {
                break;
            }
        }
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let mut state = LoopState::Polling;
        loop {
            if self.shutdown.is_cancelled() {
                if state == LoopState::Signaling {
                    warn!(
                        resource = %self.watcher.resource(),
                        "Shutdown requested, change left unsignaled"
                    );
                }
                return CycleOutcome::Cancelled;
            }

            match state {
                LoopState::Polling => {
                    let polled = tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return CycleOutcome::Cancelled,
                        polled = self.watcher.poll() => polled,
                    };
                    match polled {
                        Ok(true) => state = LoopState::Signaling,
                        Ok(false) => return CycleOutcome::Unchanged,
                        Err(e) if e.is_unavailable() => {
                            warn!(
                                resource = %self.watcher.resource(),
                                "Resource unavailable, will retry: {}",
                                ControllerError::from(e)
                            );
                            return CycleOutcome::PollFailed;
                        }
                        Err(e) => {
                            error!(
                                resource = %self.watcher.resource(),
                                "Invalid watch configuration: {}",
                                ControllerError::from(e)
                            );
                            return CycleOutcome::PollFailed;
                        }
                    }
                }
                LoopState::Signaling => {
                    return match self.dispatch().await {
                        Ok(delivery) => CycleOutcome::Signaled(delivery),
                        Err(e) => {
                            error!("Error signaling main container: {}", e);
                            CycleOutcome::DispatchFailed
                        }
                    };
                }
            }
        }
    }

    async fn dispatch(&self) -> Result<Delivery, ControllerError> {
        tokio::time::timeout(self.dispatch_timeout, self.dispatcher.dispatch())
            .await
            .map_err(|_| ControllerError::DispatchTimeout(self.dispatch_timeout))?
            .map_err(ControllerError::from)
    }

    fn record(&mut self, outcome: CycleOutcome) {
        self.stats.cycles += 1;
        if outcome != CycleOutcome::PollFailed {
            self.backoff.reset();
        }
        match outcome {
            CycleOutcome::Unchanged => {}
            CycleOutcome::Signaled(delivery) => {
                self.stats.changes += 1;
                self.stats.signals_delivered += 1;
                info!(
                    pid = delivery.pid.as_raw(),
                    signal = ?delivery.signal,
                    "Successfully signaled main container"
                );
            }
            CycleOutcome::PollFailed => self.stats.poll_failures += 1,
            CycleOutcome::DispatchFailed => {
                self.stats.changes += 1;
                self.stats.dispatch_failures += 1;
            }
            CycleOutcome::Cancelled => {}
        }
    }

    /// Sleeps before the next cycle; returns `false` if shutdown interrupted it.
    async fn pause(&mut self, outcome: CycleOutcome) -> bool {
        let delay = if outcome == CycleOutcome::PollFailed {
            let backoff = self.backoff.next_backoff();
            debug!(?backoff, "Backing off after failed poll");
            std::cmp::max(self.poll_interval, backoff)
        } else {
            self.poll_interval
        };

        if delay.is_zero() {
            tokio::task::yield_now().await;
            return !self.shutdown.is_cancelled();
        }

        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_client::{
        MockResourceAccessor, ResourceAccessor, ResourceError, ResourceKind, WatchedResource,
    };
    use signaler::{Pid, Signal, SignalerError};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn app_config() -> WatchedResource {
        WatchedResource::new("default", ResourceKind::ConfigMap, "app-config")
    }

    fn settings() -> LoopSettings {
        LoopSettings {
            poll_interval: Duration::from_secs(5),
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            dispatch_timeout: Duration::from_secs(5),
        }
    }

    /// Records dispatches instead of sending signals.
    #[derive(Clone, Default)]
    struct RecordingDispatcher {
        calls: Arc<Mutex<usize>>,
        fail: Arc<Mutex<bool>>,
    }

    impl RecordingDispatcher {
        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }

        fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    #[async_trait::async_trait]
    impl SignalDispatcher for RecordingDispatcher {
        async fn dispatch(&self) -> Result<Delivery, SignalerError> {
            *self.calls.lock().unwrap() += 1;
            if *self.fail.lock().unwrap() {
                return Err(SignalerError::TargetUnresolved {
                    locator: "env:MAIN_CONTAINER_PID".to_string(),
                    reason: "not set".to_string(),
                });
            }
            Ok(Delivery {
                pid: Pid::from_raw(4242),
                signal: Signal::SIGHUP,
            })
        }
    }

    struct HangingDispatcher;

    #[async_trait::async_trait]
    impl SignalDispatcher for HangingDispatcher {
        async fn dispatch(&self) -> Result<Delivery, SignalerError> {
            std::future::pending().await
        }
    }

    /// Requests shutdown from inside the read, so it lands after the poll
    /// completed and before the dispatch starts.
    struct CancellingAccessor {
        shutdown: CancellationToken,
    }

    #[async_trait::async_trait]
    impl ResourceAccessor for CancellingAccessor {
        async fn fetch_version(
            &self,
            _resource: &WatchedResource,
        ) -> Result<String, ResourceError> {
            self.shutdown.cancel();
            Ok("1".to_string())
        }
    }

    struct HangingAccessor;

    #[async_trait::async_trait]
    impl ResourceAccessor for HangingAccessor {
        async fn fetch_version(
            &self,
            _resource: &WatchedResource,
        ) -> Result<String, ResourceError> {
            std::future::pending().await
        }
    }

    fn controller(
        mock: &MockResourceAccessor,
        dispatcher: &RecordingDispatcher,
        shutdown: &CancellationToken,
    ) -> Controller<MockResourceAccessor, RecordingDispatcher> {
        Controller::new(
            Watcher::new(mock.clone(), app_config()),
            dispatcher.clone(),
            settings(),
            shutdown.clone(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_configmap_reload() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let mut controller = controller(&mock, &dispatcher, &CancellationToken::new());

        mock.set_version(&app_config(), "1");
        let delivery = Delivery {
            pid: Pid::from_raw(4242),
            signal: Signal::SIGHUP,
        };
        assert_eq!(controller.cycle().await, CycleOutcome::Signaled(delivery));
        assert_eq!(controller.watcher().last_version(), Some("1"));

        assert_eq!(controller.cycle().await, CycleOutcome::Unchanged);

        mock.set_version(&app_config(), "2");
        assert!(matches!(controller.cycle().await, CycleOutcome::Signaled(_)));
        assert_eq!(controller.watcher().last_version(), Some("2"));
        assert_eq!(dispatcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_do_not_stop_the_loop() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let mut controller = controller(&mock, &dispatcher, &CancellationToken::new());

        // Object missing for the first three cycles
        mock.fail_next(ResourceError::NotFound { resource: app_config().to_string() });
        mock.fail_next(ResourceError::NotFound { resource: app_config().to_string() });
        mock.fail_next(ResourceError::NotFound { resource: app_config().to_string() });
        mock.set_version(&app_config(), "1");

        let stats = controller.run_cycles(5).await.clone();
        assert_eq!(
            stats,
            LoopStats {
                cycles: 5,
                changes: 1,
                signals_delivered: 1,
                poll_failures: 3,
                dispatch_failures: 0,
            }
        );
        assert_eq!(mock.calls(), 5);
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dispatch_keeps_detector_state() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let mut controller = controller(&mock, &dispatcher, &CancellationToken::new());

        dispatcher.set_failing(true);
        mock.set_version(&app_config(), "v1");
        assert_eq!(controller.cycle().await, CycleOutcome::DispatchFailed);
        assert_eq!(controller.watcher().last_version(), Some("v1"));

        // Next cycle still runs; the change was consumed, so no second dispatch
        assert_eq!(controller.cycle().await, CycleOutcome::Unchanged);

        dispatcher.set_failing(false);
        mock.set_version(&app_config(), "v2");
        assert!(matches!(controller.cycle().await, CycleOutcome::Signaled(_)));
        assert_eq!(dispatcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout_is_a_failed_cycle() {
        let mock = MockResourceAccessor::new();
        mock.set_version(&app_config(), "1");
        let mut controller = Controller::new(
            Watcher::new(mock.clone(), app_config()),
            HangingDispatcher,
            settings(),
            CancellationToken::new(),
        );

        assert_eq!(controller.cycle().await, CycleOutcome::DispatchFailed);
        assert_eq!(controller.watcher().last_version(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_after_consecutive_poll_failures() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let mut settings = settings();
        settings.poll_interval = Duration::ZERO;
        settings.backoff_min = Duration::from_secs(2);
        let mut controller = Controller::new(
            Watcher::new(mock.clone(), app_config()),
            dispatcher.clone(),
            settings,
            CancellationToken::new(),
        );

        // Object never exists: delays 2s, 2s, 4s between four polls
        let start = Instant::now();
        controller.run_cycles(4).await;
        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert_eq!(controller.stats().poll_failures, 4);

        // A successful poll resets the sequence back to the minimum
        mock.set_version(&app_config(), "1");
        controller.run_cycles(1).await;
        mock.fail_next(ResourceError::NotFound { resource: app_config().to_string() });
        let start = Instant::now();
        controller.run_cycles(2).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(controller.stats().poll_failures, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_between_cycles() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        mock.set_version(&app_config(), "1");
        let mut controller = controller(&mock, &dispatcher, &CancellationToken::new());

        let start = Instant::now();
        controller.run_cycles(3).await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_polls_nothing() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let shutdown = CancellationToken::new();
        mock.set_version(&app_config(), "1");
        let controller = controller(&mock, &dispatcher, &shutdown);

        shutdown.cancel();
        let stats = controller.run().await;

        assert_eq!(stats, LoopStats::default());
        assert_eq!(mock.calls(), 0);
        assert_eq!(dispatcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let shutdown = CancellationToken::new();
        mock.set_version(&app_config(), "1");
        let controller = controller(&mock, &dispatcher, &shutdown);

        let handle = tokio::spawn(controller.run());
        tokio::time::sleep(Duration::from_secs(12)).await;
        shutdown.cancel();
        let stats = handle.await.unwrap();

        // Cycles at t=0, 5 and 10, then cancelled while paused
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.signals_delivered, 1);
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_poll_and_dispatch() {
        let shutdown = CancellationToken::new();
        let dispatcher = RecordingDispatcher::default();
        let accessor = CancellingAccessor {
            shutdown: shutdown.clone(),
        };
        let mut controller = Controller::new(
            Watcher::new(accessor, app_config()),
            dispatcher.clone(),
            settings(),
            shutdown.clone(),
        );

        assert_eq!(controller.cycle().await, CycleOutcome::Cancelled);
        assert_eq!(dispatcher.calls(), 0);
        // The change was observed, only the signal was skipped
        assert_eq!(controller.watcher().last_version(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pending_poll() {
        let shutdown = CancellationToken::new();
        let dispatcher = RecordingDispatcher::default();
        let mut controller = Controller::new(
            Watcher::new(HangingAccessor, app_config()),
            dispatcher.clone(),
            settings(),
            shutdown.clone(),
        );

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        assert_eq!(controller.cycle().await, CycleOutcome::Cancelled);
        // Interrupted well before the 10s fetch timeout
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(dispatcher.calls(), 0);
        assert!(controller.watcher().last_version().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_poll_error_is_a_failed_cycle() {
        let mock = MockResourceAccessor::new();
        let dispatcher = RecordingDispatcher::default();
        let mut controller = controller(&mock, &dispatcher, &CancellationToken::new());

        mock.fail_next(ResourceError::UnsupportedKind("deployment".to_string()));
        mock.set_version(&app_config(), "1");
        assert_eq!(controller.cycle().await, CycleOutcome::PollFailed);
        assert!(controller.watcher().last_version().is_none());

        // The loop keeps going once the read succeeds
        assert!(matches!(controller.cycle().await, CycleOutcome::Signaled(_)));
        assert_eq!(dispatcher.calls(), 1);
    }
}
