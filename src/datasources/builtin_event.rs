use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::models::{BuiltinEventSpecification, Severity};
use crate::restapi::{InstanaApi, ReadOnlyRestResource};
use crate::schema::{Attribute, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_builtin_event_spec`: a built-in event looked up by name and plugin.
pub struct BuiltinEventDataSource;

fn event_state(event: &BuiltinEventSpecification) -> Result<Value, ProviderError> {
    let severity = Severity::from_code(event.severity).ok_or_else(|| {
        ProviderError::Validation(format!(
            "built-in event {} has unsupported severity code {}",
            event.id, event.severity
        ))
    })?;
    Ok(ObjectWriter::new()
        .set("id", event.id.clone())
        .set("name", event.name.clone())
        .set("short_plugin_id", event.short_plugin_id.clone())
        .set("description", event.description.clone())
        .set("severity", severity.term())
        .set("severity_code", event.severity)
        .set("triggering", event.triggering)
        .set("enabled", event.enabled)
        .into_value())
}

#[async_trait]
impl DataSourceHandle for BuiltinEventDataSource {
    fn name(&self) -> &'static str {
        "builtin_event_spec"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for an Instana built-in event specification")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "short_plugin_id",
                Attribute::required_string().with_description("The plugin id of the event, e.g. host"),
            )
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("severity", Attribute::computed_string())
            .with_attribute("severity_code", Attribute::computed_int64())
            .with_attribute("triggering", Attribute::computed_bool())
            .with_attribute("enabled", Attribute::computed_bool())
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let reader = ObjectReader::new(config)?;
        let name: String = reader.required("name")?;
        let short_plugin_id: String = reader.required("short_plugin_id")?;

        let events = api.builtin_event_specifications().get_all(cancel).await?;
        let event = events
            .iter()
            .find(|event| event.name == name && event.short_plugin_id == short_plugin_id)
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "no built-in event found with name {} and plugin {}",
                    name, short_plugin_id
                ))
            })?;
        event_state(event)
    }
}
