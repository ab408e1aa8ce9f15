//! Typed per-entity endpoints on top of [`RestClient`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::models::{HostAgent, WebsiteMonitoringConfig};
use super::{ApiError, RestClient};

/// Capability every entity exchanged with the API provides.
pub trait DataObject: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The identifier of the entity.
    fn id(&self) -> &str;

    /// The identifier used in the URL of the entity.
    fn id_for_resource_path(&self) -> &str {
        self.id()
    }
}

/// Endpoint offering reads only.
#[async_trait]
pub trait ReadOnlyRestResource<T: DataObject>: Send + Sync {
    /// Fetch all entities.
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<T>, ApiError>;

    /// Fetch a single entity by id.
    async fn get_one(&self, id: &str, cancel: &CancellationToken) -> Result<T, ApiError>;
}

/// Endpoint offering the full create/read/update/delete cycle.
#[async_trait]
pub trait RestResource<T: DataObject>: ReadOnlyRestResource<T> {
    /// Create the entity and return the stored version.
    async fn create(&self, object: &T, cancel: &CancellationToken) -> Result<T, ApiError>;

    /// Update the entity and return the stored version.
    async fn update(&self, object: &T, cancel: &CancellationToken) -> Result<T, ApiError>;

    /// Delete the entity.
    async fn delete(&self, object: &T, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.delete_by_id(object.id_for_resource_path(), cancel).await
    }

    /// Delete the entity with the given id.
    async fn delete_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError>;
}

/// HTTP methods used to create and update entities of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// `PUT {path}/{id}` for both; the id is chosen by the client.
    CreatePutUpdatePut,
    /// `POST {path}` to create, `PUT {path}/{id}` to update.
    CreatePostUpdatePut,
    /// `POST {path}` to create, `POST {path}/{id}` to update.
    CreatePostUpdatePost,
    /// `POST {path}` to create; entities are immutable.
    CreatePostUpdateNotSupported,
}

/// Decode a response into an entity.
pub(crate) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
}

/// Decode a write response, echoing the submitted object for an empty body.
fn decode_written<T: DataObject>(path: &str, submitted: &T, value: Value) -> Result<T, ApiError> {
    if value.as_object().is_some_and(|m| m.is_empty()) {
        return Ok(submitted.clone());
    }
    decode(path, value)
}

/// Endpoint at a fixed path whose write strategy is given by a [`WriteMode`].
pub struct DefaultRestResource<T> {
    client: Arc<RestClient>,
    path: &'static str,
    mode: WriteMode,
    _entity: PhantomData<fn() -> T>,
}

impl<T: DataObject> DefaultRestResource<T> {
    /// Create an endpoint at `path`.
    pub fn new(client: Arc<RestClient>, path: &'static str, mode: WriteMode) -> Self {
        Self {
            client,
            path,
            mode,
            _entity: PhantomData,
        }
    }

    /// The resource path.
    pub fn path(&self) -> &str {
        self.path
    }
}

#[async_trait]
impl<T: DataObject> ReadOnlyRestResource<T> for DefaultRestResource<T> {
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<T>, ApiError> {
        let value = self.client.get(self.path, cancel).await?;
        decode(self.path, value)
    }

    async fn get_one(&self, id: &str, cancel: &CancellationToken) -> Result<T, ApiError> {
        let value = self.client.get_one(self.path, id, cancel).await?;
        decode(self.path, value)
    }
}

#[async_trait]
impl<T: DataObject> RestResource<T> for DefaultRestResource<T> {
    async fn create(&self, object: &T, cancel: &CancellationToken) -> Result<T, ApiError> {
        let body = serde_json::to_value(object)?;
        let response = match self.mode {
            WriteMode::CreatePutUpdatePut => {
                self.client
                    .put(self.path, object.id_for_resource_path(), &body, cancel)
                    .await?
            },
            WriteMode::CreatePostUpdatePut
            | WriteMode::CreatePostUpdatePost
            | WriteMode::CreatePostUpdateNotSupported => {
                self.client.post(self.path, &body, cancel).await?
            },
        };
        decode_written(self.path, object, response)
    }

    async fn update(&self, object: &T, cancel: &CancellationToken) -> Result<T, ApiError> {
        let body = serde_json::to_value(object)?;
        let id = object.id_for_resource_path();
        let response = match self.mode {
            WriteMode::CreatePutUpdatePut | WriteMode::CreatePostUpdatePut => {
                self.client.put(self.path, id, &body, cancel).await?
            },
            WriteMode::CreatePostUpdatePost => {
                self.client.post_with_id(self.path, id, &body, cancel).await?
            },
            WriteMode::CreatePostUpdateNotSupported => {
                return Err(ApiError::Unsupported(format!(
                    "update of {} is not supported by the Instana API",
                    self.path
                )))
            },
        };
        decode_written(self.path, object, response)
    }

    async fn delete_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.client.delete(self.path, id, cancel).await
    }
}

/// Endpoint of website monitoring configurations.
///
/// Writes carry the name as query parameter instead of a JSON body.
pub struct WebsiteMonitoringConfigResource {
    client: Arc<RestClient>,
}

impl WebsiteMonitoringConfigResource {
    /// Path of the endpoint.
    pub const PATH: &'static str = "/api/website-monitoring/config";

    /// Create the endpoint.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReadOnlyRestResource<WebsiteMonitoringConfig> for WebsiteMonitoringConfigResource {
    async fn get_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<WebsiteMonitoringConfig>, ApiError> {
        let value = self.client.get(Self::PATH, cancel).await?;
        decode(Self::PATH, value)
    }

    async fn get_one(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<WebsiteMonitoringConfig, ApiError> {
        let value = self.client.get_one(Self::PATH, id, cancel).await?;
        decode(Self::PATH, value)
    }
}

#[async_trait]
impl RestResource<WebsiteMonitoringConfig> for WebsiteMonitoringConfigResource {
    async fn create(
        &self,
        object: &WebsiteMonitoringConfig,
        cancel: &CancellationToken,
    ) -> Result<WebsiteMonitoringConfig, ApiError> {
        let query = [("name", object.name.clone())];
        let response = self.client.post_by_query(Self::PATH, &query, cancel).await?;
        decode_written(Self::PATH, object, response)
    }

    async fn update(
        &self,
        object: &WebsiteMonitoringConfig,
        cancel: &CancellationToken,
    ) -> Result<WebsiteMonitoringConfig, ApiError> {
        let query = [("name", object.name.clone())];
        let response = self
            .client
            .put_by_query(Self::PATH, &object.id, &query, cancel)
            .await?;
        decode_written(Self::PATH, object, response)
    }

    async fn delete_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.client.delete(Self::PATH, id, cancel).await
    }
}

/// Endpoint of host agents, served in pages.
pub struct HostAgentResource {
    client: Arc<RestClient>,
    page_size: usize,
}

impl HostAgentResource {
    /// Path of the endpoint.
    pub const PATH: &'static str = "/api/host-agent";

    /// Number of agents requested per page.
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Create the endpoint.
    pub fn new(client: Arc<RestClient>) -> Self {
        Self {
            client,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Change the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetch all agents matching an optional dynamic focus query.
    pub async fn query(
        &self,
        filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostAgent>, ApiError> {
        let mut query = Vec::new();
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            query.push(("query", filter.to_string()));
        }
        let items = self
            .client
            .get_paged(Self::PATH, &query, self.page_size, cancel)
            .await?;
        items
            .into_iter()
            .map(|item| decode(Self::PATH, item))
            .collect()
    }
}

#[async_trait]
impl ReadOnlyRestResource<HostAgent> for HostAgentResource {
    async fn get_all(&self, cancel: &CancellationToken) -> Result<Vec<HostAgent>, ApiError> {
        self.query(None, cancel).await
    }

    async fn get_one(&self, id: &str, cancel: &CancellationToken) -> Result<HostAgent, ApiError> {
        let value = self.client.get_one(Self::PATH, id, cancel).await?;
        decode(Self::PATH, value)
    }
}
