//! kube-backed resource accessor

use crate::accessor_trait::ResourceAccessor;
use crate::error::ResourceError;
use crate::models::{ResourceKind, WatchedResource};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Reads version markers through the Kubernetes API.
///
/// Only object metadata is requested, so Secret data never leaves the API server.
#[derive(Clone)]
pub struct KubeResourceAccessor {
    client: Client,
}

impl KubeResourceAccessor {
    /// Wraps an already configured client.
    ///
    /// Use [`Client::try_default`] to get in-cluster credentials with a
    /// fallback to the local kubeconfig.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn resource_version<K>(&self, resource: &WatchedResource) -> Result<String, ResourceError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), resource.namespace());

        let meta = api.get_metadata(resource.name()).await.map_err(|e| match e {
            kube::Error::Api(ref response) if response.code == 404 => ResourceError::NotFound {
                resource: resource.to_string(),
            },
            source => ResourceError::Api {
                resource: resource.to_string(),
                source,
            },
        })?;

        meta.metadata
            .resource_version
            .filter(|version| !version.is_empty())
            .ok_or_else(|| ResourceError::MissingVersion {
                resource: resource.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl ResourceAccessor for KubeResourceAccessor {
    async fn fetch_version(&self, resource: &WatchedResource) -> Result<String, ResourceError> {
        let version = match resource.kind() {
            ResourceKind::Secret => self.resource_version::<Secret>(resource).await?,
            ResourceKind::ConfigMap => self.resource_version::<ConfigMap>(resource).await?,
        };

        debug!(
            namespace = resource.namespace(),
            kind = %resource.kind(),
            name = resource.name(),
            version = %version,
            "Fetched resource version"
        );

        Ok(version)
    }
}
