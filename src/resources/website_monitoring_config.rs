use std::collections::BTreeMap;

use serde_json::Value;

use super::id_attribute;
use crate::error::ProviderError;
use crate::resource::{plan_or_state, unchanged_state, ResourceHandle, ResourceMetaData, StateUpgrader};
use crate::restapi::models::WebsiteMonitoringConfig;
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_website_monitoring_config`: a website reporting to Instana.
///
/// Writes go through query parameters; the API assigns `app_name`.
pub struct WebsiteMonitoringConfigResource {
    metadata: ResourceMetaData,
}

impl WebsiteMonitoringConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(1)
            .with_description("Website monitoring configuration of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "app_name",
                Attribute::computed_string()
                    .with_description("The application name assigned by Instana"),
            );

        Self {
            metadata: ResourceMetaData::new("website_monitoring_config", schema),
        }
    }
}

impl Default for WebsiteMonitoringConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for WebsiteMonitoringConfigResource {
    type Object = WebsiteMonitoringConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<WebsiteMonitoringConfig>> {
        api.website_monitoring_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<WebsiteMonitoringConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        Ok(WebsiteMonitoringConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            app_name: reader.optional("app_name")?.unwrap_or_default(),
        })
    }

    fn update_state(
        &self,
        _plan: Option<&Value>,
        config: &WebsiteMonitoringConfig,
    ) -> Result<Value, ProviderError> {
        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("app_name", config.app_name.clone())
            .into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([(0, unchanged_state as StateUpgrader)])
    }
}
