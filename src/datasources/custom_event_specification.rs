use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::models::CustomEventSpecification;
use crate::restapi::InstanaApi;
use crate::schema::{Attribute, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_custom_event_specification`: a custom event looked up by name and entity type.
pub struct CustomEventSpecificationDataSource;

fn spec_state(spec: &CustomEventSpecification) -> Value {
    ObjectWriter::new()
        .set("id", spec.id.clone())
        .set("name", spec.name.clone())
        .set("entity_type", spec.entity_type.clone())
        .set("description", spec.description.clone())
        .set("query", spec.query.clone())
        .set("triggering", spec.triggering)
        .set("enabled", spec.enabled)
        .set("expiration_time", spec.expiration_time)
        .set("rule_logical_operator", spec.rule_logical_operator.clone())
        .into_value()
}

#[async_trait]
impl DataSourceHandle for CustomEventSpecificationDataSource {
    fn name(&self) -> &'static str {
        "custom_event_specification"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for an Instana custom event specification")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "entity_type",
                Attribute::required_string().with_description("The entity type the event applies to"),
            )
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("query", Attribute::computed_string())
            .with_attribute("triggering", Attribute::computed_bool())
            .with_attribute("enabled", Attribute::computed_bool())
            .with_attribute("expiration_time", Attribute::computed_int64())
            .with_attribute("rule_logical_operator", Attribute::computed_string())
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let reader = ObjectReader::new(config)?;
        let name: String = reader.required("name")?;
        let entity_type: String = reader.required("entity_type")?;

        let specs = api.custom_event_specifications().get_all(cancel).await?;
        debug!(count = specs.len(), "custom event specifications loaded");
        let spec = specs
            .iter()
            .find(|spec| spec.name == name && spec.entity_type == entity_type)
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "no custom event specification found with name {} and entity type {}",
                    name, entity_type
                ))
            })?;
        Ok(spec_state(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_state() {
        let spec = CustomEventSpecification {
            id: "ces-1".to_string(),
            name: "disk full".to_string(),
            entity_type: "host".to_string(),
            query: Some("entity.zone:eu".to_string()),
            triggering: true,
            description: None,
            expiration_time: Some(60000),
            enabled: true,
            rule_logical_operator: "AND".to_string(),
            rules: Vec::new(),
        };
        let state = spec_state(&spec);
        assert_eq!(state["id"], "ces-1");
        assert_eq!(state["query"], "entity.zone:eu");
        assert_eq!(state["expiration_time"], 60000);
        assert_eq!(state["description"], Value::Null);
        assert_eq!(state["triggering"], true);
    }
}
