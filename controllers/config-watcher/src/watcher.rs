//! Change detection for the watched resource.
//!
//! The watcher remembers the last version marker it saw and reports whether
//! the next poll returns a different one. Markers are opaque: only equality is
//! meaningful, so the stored value is the last one seen rather than the highest.
//!
//! An object deleted and recreated with a marker equal to the stored one is not
//! reported as changed.

use resource_client::{ResourceAccessor, ResourceError, WatchedResource};
use std::time::Duration;
use tracing::{debug, info};

/// Polls one resource and tracks its last observed version.
///
/// `poll` takes `&mut self`, so a single watcher can never be polled from two
/// places at once.
pub struct Watcher<A> {
    accessor: A,
    resource: WatchedResource,
    last_version: Option<String>,
    fetch_timeout: Option<Duration>,
}

impl<A: ResourceAccessor> Watcher<A> {
    /// Creates a watcher that has not yet observed any version.
    pub fn new(accessor: A, resource: WatchedResource) -> Self {
        Self {
            accessor,
            resource,
            last_version: None,
            fetch_timeout: None,
        }
    }

    /// Bounds every fetch; an expired fetch fails with [`ResourceError::Timeout`].
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn resource(&self) -> &WatchedResource {
        &self.resource
    }

    pub fn last_version(&self) -> Option<&str> {
        self.last_version.as_deref()
    }

    /// Returns `true` if the resource changed since the previous successful poll.
    ///
    /// The first successful poll always reports a change. On error the stored
    /// version is left untouched.
    pub async fn poll(&mut self) -> Result<bool, ResourceError> {
        let version = self.fetch().await?;

        if self.last_version.as_deref() == Some(version.as_str()) {
            debug!(resource = %self.resource, version = %version, "Resource unchanged");
            return Ok(false);
        }

        info!(
            resource = %self.resource,
            previous = self.last_version.as_deref().unwrap_or("<none>"),
            version = %version,
            "Resource version changed"
        );
        self.last_version = Some(version);
        Ok(true)
    }

    async fn fetch(&self) -> Result<String, ResourceError> {
        let fetch = self.accessor.fetch_version(&self.resource);
        match self.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fetch)
                .await
                .map_err(|_| ResourceError::Timeout {
                    resource: self.resource.to_string(),
                    timeout,
                })?,
            None => fetch.await,
        }
    }
}
