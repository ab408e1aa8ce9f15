use std::collections::BTreeMap;

use serde_json::Value;

use super::alert_common::{
    custom_payload_field_block, custom_payload_field_blocks, read_custom_payload_fields,
};
use super::{id_attribute, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, unchanged_state, ResourceHandle, ResourceMetaData, StateUpgrader};
use crate::restapi::models::{AlertingConfig, EventFilteringConfiguration};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

/// Event types an alerting configuration can forward.
const EVENT_TYPES: &[&str] = &[
    "incident",
    "critical",
    "warning",
    "change",
    "online",
    "offline",
    "none",
    "agent_monitoring_issue",
];

/// `instana_alerting_config`: routes events to alerting channels.
///
/// Events are selected by rule ids or by event type, optionally narrowed by
/// a dynamic focus query. Ids are generated by the provider.
pub struct AlertingConfigResource {
    metadata: ResourceMetaData,
}

impl AlertingConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(2)
            .with_description("Alerting configuration of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute(
                "alert_name",
                Attribute::required_string().with_validator(Validator::LengthBetween { min: 1, max: 256 }),
            )
            .with_attribute("integration_ids", string_set(AttributeFlags::required()))
            .with_attribute(
                "event_filter_query",
                Attribute::optional_string().with_validator(Validator::LengthBetween { min: 0, max: 2048 }),
            )
            .with_attribute(
                "event_filter_event_types",
                string_set(AttributeFlags::optional())
                    .with_force_new()
                    .with_description("Event types to forward, lower case"),
            )
            .with_attribute(
                "event_filter_rule_ids",
                string_set(AttributeFlags::optional()).with_force_new(),
            )
            .with_block("custom_payload_field", custom_payload_field_block());

        Self {
            metadata: ResourceMetaData::new("alerting_config", schema),
        }
    }
}

impl Default for AlertingConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn read_event_types(reader: &ObjectReader<'_>) -> Result<Vec<String>, ProviderError> {
    let mut event_types = Vec::new();
    for event_type in reader.optional::<Vec<String>>("event_filter_event_types")?.unwrap_or_default() {
        let event_type = event_type.to_lowercase();
        if !EVENT_TYPES.contains(&event_type.as_str()) {
            return Err(ProviderError::attribute(
                "event_filter_event_types",
                format!("unsupported event type '{}', expected one of [{}]", event_type, EVENT_TYPES.join(", ")),
            ));
        }
        event_types.push(event_type);
    }
    event_types.sort();
    Ok(event_types)
}

/// Set state of a list, null when empty.
fn non_empty(values: &[String]) -> Option<Vec<String>> {
    let mut values = values.to_vec();
    values.sort();
    (!values.is_empty()).then_some(values)
}

impl ResourceHandle for AlertingConfigResource {
    type Object = AlertingConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<AlertingConfig>> {
        api.alerting_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<AlertingConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let mut rule_ids = reader.optional::<Vec<String>>("event_filter_rule_ids")?.unwrap_or_default();
        rule_ids.sort();

        Ok(AlertingConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            alert_name: reader.optional("alert_name")?.unwrap_or_default(),
            integration_ids: reader.optional("integration_ids")?.unwrap_or_default(),
            event_filtering_configuration: EventFilteringConfiguration {
                query: reader.optional::<String>("event_filter_query")?.filter(|q| !q.is_empty()),
                rule_ids,
                event_types: read_event_types(&reader)?,
            },
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, config: &AlertingConfig) -> Result<Value, ProviderError> {
        let filter = &config.event_filtering_configuration;
        let event_types: Vec<String> = filter.event_types.iter().map(|t| t.to_lowercase()).collect();

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("alert_name", config.alert_name.clone())
            .set("integration_ids", non_empty(&config.integration_ids).unwrap_or_default())
            .set("event_filter_query", filter.query.clone())
            .set("event_filter_event_types", non_empty(&event_types))
            .set("event_filter_rule_ids", non_empty(&filter.rule_ids))
            .set_blocks(
                "custom_payload_field",
                custom_payload_field_blocks(&config.custom_payload_fields),
            )
            .into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([
            (0, unchanged_state as StateUpgrader),
            (1, unchanged_state as StateUpgrader),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan() -> Value {
        json!({
            "id": "cfg-1",
            "alert_name": "incidents to ops",
            "integration_ids": ["ch-2", "ch-1"],
            "event_filter_query": "entity.zone:eu",
            "event_filter_event_types": ["Incident", "critical"],
            "custom_payload_field": [{"key": "team", "value": "ops"}]
        })
    }

    #[test]
    fn test_event_types_are_lower_cased() {
        let resource = AlertingConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        let filter = &config.event_filtering_configuration;
        assert_eq!(filter.event_types, vec!["critical", "incident"]);
        assert!(filter.rule_ids.is_empty());
        assert_eq!(filter.query.as_deref(), Some("entity.zone:eu"));
    }

    #[test]
    fn test_state_round_trip() {
        let resource = AlertingConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        let state = resource.update_state(Some(&plan()), &config).unwrap();
        assert_eq!(state["integration_ids"], json!(["ch-1", "ch-2"]));
        assert_eq!(state["event_filter_rule_ids"], Value::Null);
        assert_eq!(state["custom_payload_field"][0]["value"], "ops");

        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(again.event_filtering_configuration, config.event_filtering_configuration);
        assert_eq!(again.custom_payload_fields, config.custom_payload_fields);
    }

    #[test]
    fn test_unknown_event_type() {
        let resource = AlertingConfigResource::new();
        let mut plan = plan();
        plan["event_filter_event_types"] = json!(["outage"]);
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("event_filter_event_types"));
    }

    #[test]
    fn test_older_states_upgrade_unchanged() {
        let resource = AlertingConfigResource::new();
        assert_eq!(resource.metadata().schema_version(), 2);
        let upgraders = resource.state_upgraders();
        let state = json!({"alert_name": "a"});
        assert_eq!(upgraders[&1](state.clone()).unwrap(), state);
        assert!(upgraders.contains_key(&0));
    }
}
