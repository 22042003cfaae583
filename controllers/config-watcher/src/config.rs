//! Environment configuration.
//!
//! Everything is read once at startup. Unknown resource types, unknown signal
//! types and malformed locators are rejected here, before any connection to the
//! API server is made.

use crate::controller::LoopSettings;
use crate::error::ControllerError;
use resource_client::{ResourceKind, WatchedResource};
use signaler::{SignalKind, TargetLocator};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_SIGNAL_TYPE: &str = "SIGHUP";

/// Fully parsed sidecar configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub resource: WatchedResource,
    pub locator: TargetLocator,
    pub signal_kind: SignalKind,
    pub container_name: Option<String>,
    pub poll_interval: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub fetch_timeout: Duration,
    pub dispatch_timeout: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("{key} environment variable is required"))
            })
        };

        let namespace = get("NAMESPACE")
            .map(|ns| ns.trim().to_string())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let kind: ResourceKind = required("RESOURCE_TYPE")?.parse()?;
        let name = required("RESOURCE_NAME")?.trim().to_string();

        let locator = match get("TARGET_LOCATOR") {
            Some(raw) => raw.parse()?,
            None => TargetLocator::default(),
        };
        let signal_kind: SignalKind = get("SIGNAL_TYPE")
            .as_deref()
            .unwrap_or(DEFAULT_SIGNAL_TYPE)
            .parse()?;

        let defaults = LoopSettings::default();
        let seconds = |key: &str, default: Duration| -> Result<Duration, ControllerError> {
            match get(key) {
                Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ControllerError::InvalidConfig(format!(
                        "{key} must be a whole number of seconds, got {raw:?}: {e}"
                    ))
                }),
                None => Ok(default),
            }
        };

        let config = Self {
            resource: WatchedResource::new(namespace, kind, name),
            locator,
            signal_kind,
            container_name: get("MAIN_CONTAINER_NAME"),
            poll_interval: seconds("POLL_INTERVAL_SECS", defaults.poll_interval)?,
            backoff_min: seconds("BACKOFF_MIN_SECS", defaults.backoff_min)?,
            backoff_max: seconds("BACKOFF_MAX_SECS", defaults.backoff_max)?,
            fetch_timeout: seconds("FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            dispatch_timeout: seconds("DISPATCH_TIMEOUT_SECS", defaults.dispatch_timeout)?,
        };

        if config.backoff_max < config.backoff_min {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MAX_SECS ({:?}) is below BACKOFF_MIN_SECS ({:?})",
                config.backoff_max, config.backoff_min
            )));
        }
        if config.fetch_timeout.is_zero() || config.dispatch_timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "FETCH_TIMEOUT_SECS and DISPATCH_TIMEOUT_SECS must be greater than zero"
                    .to_string(),
            ));
        }

        Ok(config)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            poll_interval: self.poll_interval,
            backoff_min: self.backoff_min,
            backoff_max: self.backoff_max,
            fetch_timeout: self.fetch_timeout,
            dispatch_timeout: self.dispatch_timeout,
        }
    }

    pub fn log(&self) {
        info!("Configuration:");
        info!("  Resource: {}", self.resource);
        info!("  Target: {}", self.locator);
        info!("  Container: {}", self.container_name.as_deref().unwrap_or("<unnamed>"));
        info!("  Signal: {} ({:?})", self.signal_kind, self.signal_kind.signal());
        info!("  Poll interval: {:?}", self.poll_interval);
        info!("  Backoff: {:?} to {:?}", self.backoff_min, self.backoff_max);
        info!("  Timeouts: fetch {:?}, dispatch {:?}", self.fetch_timeout, self.dispatch_timeout);
    }
}
