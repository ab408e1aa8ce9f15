use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{computed_block, DataSourceHandle};
use crate::error::ProviderError;
use crate::resource::ResourceHandle;
use crate::resources::AlertingChannelResource;
use crate::restapi::{InstanaApi, ReadOnlyRestResource};
use crate::schema::{Attribute, Schema};
use crate::value::ObjectReader;

/// `instana_alerting_channel`: an alerting channel looked up by name.
///
/// The result has the shape of the resource of the same name.
pub struct AlertingChannelDataSource {
    resource: AlertingChannelResource,
}

impl AlertingChannelDataSource {
    /// Create the data source.
    pub fn new() -> Self {
        Self {
            resource: AlertingChannelResource::new(),
        }
    }
}

impl Default for AlertingChannelDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSourceHandle for AlertingChannelDataSource {
    fn name(&self) -> &'static str {
        "alerting_channel"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0().with_description("Data source for an Instana alerting channel");
        schema.block = computed_block(&self.resource.metadata().schema.block);
        schema
            .block
            .attributes
            .insert("name".to_string(), Attribute::required_string());
        schema
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let name: String = ObjectReader::new(config)?.required("name")?;
        let channels = api.alerting_channels().get_all(cancel).await?;
        debug!(count = channels.len(), name = %name, "looking up alerting channel");
        let channel = channels
            .into_iter()
            .find(|channel| channel.name == name)
            .ok_or_else(|| ProviderError::NotFound(format!("no alerting channel found with name {}", name)))?;
        self.resource.update_state(None, &channel)
    }
}
