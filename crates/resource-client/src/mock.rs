//! Mock ResourceAccessor for unit testing
//!
//! Holds the "current" version of every object in memory and can be told to
//! fail upcoming reads, so watchers can be exercised without a cluster.

use crate::accessor_trait::ResourceAccessor;
use crate::error::ResourceError;
use crate::models::WatchedResource;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// In-memory accessor.
///
/// Clones share state, so a test can keep a handle while the code under test
/// owns another.
#[derive(Clone, Default)]
pub struct MockResourceAccessor {
    versions: Arc<Mutex<HashMap<WatchedResource, String>>>,
    failures: Arc<Mutex<VecDeque<ResourceError>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockResourceAccessor {
    /// Create an empty mock; every object reads as not found.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update an object at the given version.
    pub fn set_version(&self, resource: &WatchedResource, version: impl Into<String>) {
        self.versions
            .lock()
            .unwrap()
            .insert(resource.clone(), version.into());
    }

    /// Delete an object.
    pub fn remove(&self, resource: &WatchedResource) {
        self.versions.lock().unwrap().remove(resource);
    }

    /// Make the next read fail with `error`, regardless of the stored version.
    ///
    /// Failures queue up and are consumed one per call.
    pub fn fail_next(&self, error: ResourceError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Number of `fetch_version` calls seen so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ResourceAccessor for MockResourceAccessor {
    async fn fetch_version(&self, resource: &WatchedResource) -> Result<String, ResourceError> {
        *self.calls.lock().unwrap() += 1;

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.versions
            .lock()
            .unwrap()
            .get(resource)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                resource: resource.to_string(),
            })
    }
}
