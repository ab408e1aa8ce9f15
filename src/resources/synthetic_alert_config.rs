use serde_json::{json, Value};

use super::alert_common::{
    custom_payload_field_block, custom_payload_field_blocks, read_custom_payload_fields,
    read_severity, severity_attribute, severity_state,
};
use super::{id_attribute, planned, read_tag_filter, string_set, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    Severity, SyntheticAlertConfig, SyntheticAlertRule, SyntheticAlertTimeThreshold, AGGREGATIONS,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const ALERT_TYPES: &[&str] = &["failure"];
const TIME_THRESHOLD_TYPES: &[&str] = &["violationsInSequence"];

/// `instana_synthetic_alert_config`: smart alert on failing synthetic tests.
pub struct SyntheticAlertConfigResource {
    metadata: ResourceMetaData,
}

impl SyntheticAlertConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("synthetic_alert_config", schema()),
        }
    }
}

impl Default for SyntheticAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn schema() -> Schema {
    Schema::v0()
        .with_description("Smart alert on synthetic test results")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 1, max: 256 }),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_validator(Validator::LengthBetween { min: 0, max: 1024 }),
        )
        .with_attribute("synthetic_test_ids", string_set(AttributeFlags::required()))
        .with_attribute("severity", severity_attribute())
        .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::optional()))
        .with_attribute("alert_channel_ids", string_set(AttributeFlags::optional()))
        .with_attribute(
            "grace_period",
            Attribute::optional_int64()
                .with_description("Time in milliseconds before an open alert is closed"),
        )
        .with_block(
            "rule",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "alert_type",
                        Attribute::optional_string()
                            .with_default(json!(ALERT_TYPES[0]))
                            .with_validator(Validator::one_of(ALERT_TYPES)),
                    )
                    .with_attribute("metric_name", Attribute::required_string())
                    .with_attribute(
                        "aggregation",
                        Attribute::optional_string()
                            .with_default(json!("SUM"))
                            .with_validator(Validator::one_of(AGGREGATIONS)),
                    ),
            )
            .with_min_items(1),
        )
        .with_block(
            "time_threshold",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "type",
                        Attribute::optional_string()
                            .with_default(json!(TIME_THRESHOLD_TYPES[0]))
                            .with_validator(Validator::one_of(TIME_THRESHOLD_TYPES)),
                    )
                    .with_attribute(
                        "violations_count",
                        Attribute::required_int64().with_validator(Validator::IntBetween { min: 1, max: 12 }),
                    ),
            )
            .with_min_items(1),
        )
        .with_block("custom_payload_field", custom_payload_field_block())
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

impl ResourceHandle for SyntheticAlertConfigResource {
    type Object = SyntheticAlertConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<SyntheticAlertConfig>> {
        api.synthetic_alert_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<SyntheticAlertConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let rule = reader
            .nested("rule")?
            .ok_or_else(|| ProviderError::attribute("rule", "a value is required"))?;
        let time_threshold = reader
            .nested("time_threshold")?
            .ok_or_else(|| ProviderError::attribute("time_threshold", "a value is required"))?;

        Ok(SyntheticAlertConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            synthetic_test_ids: sorted(reader.optional("synthetic_test_ids")?.unwrap_or_default()),
            severity: read_severity(&reader, "severity")?.unwrap_or(Severity::Warning.code()),
            tag_filter_expression: read_tag_filter(&reader, "tag_filter")?,
            rule: SyntheticAlertRule {
                alert_type: rule
                    .optional("alert_type")?
                    .unwrap_or_else(|| ALERT_TYPES[0].to_string()),
                metric_name: rule.required("metric_name")?,
                aggregation: rule.optional("aggregation")?.unwrap_or_else(|| "SUM".to_string()),
            },
            alert_channel_ids: sorted(reader.optional("alert_channel_ids")?.unwrap_or_default()),
            time_threshold: SyntheticAlertTimeThreshold {
                kind: time_threshold
                    .optional("type")?
                    .unwrap_or_else(|| TIME_THRESHOLD_TYPES[0].to_string()),
                violations_count: time_threshold.required("violations_count")?,
            },
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
            grace_period: reader.optional("grace_period")?,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        config: &SyntheticAlertConfig,
    ) -> Result<Value, ProviderError> {
        let description = (!config.description.is_empty()).then(|| config.description.clone());
        let alert_channel_ids =
            (!config.alert_channel_ids.is_empty()).then(|| sorted(config.alert_channel_ids.clone()));

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("description", description)
            .set("synthetic_test_ids", sorted(config.synthetic_test_ids.clone()))
            .set("severity", severity_state(Some(config.severity))?)
            .set(
                "tag_filter",
                tag_filter_state(
                    config.tag_filter_expression.as_ref(),
                    planned(plan, "tag_filter")?,
                )?,
            )
            .set("alert_channel_ids", alert_channel_ids)
            .set("grace_period", config.grace_period)
            .set_block(
                "rule",
                Some(
                    ObjectWriter::new()
                        .set("alert_type", config.rule.alert_type.clone())
                        .set("metric_name", config.rule.metric_name.clone())
                        .set("aggregation", config.rule.aggregation.clone()),
                ),
            )
            .set_block(
                "time_threshold",
                Some(
                    ObjectWriter::new()
                        .set("type", config.time_threshold.kind.clone())
                        .set("violations_count", config.time_threshold.violations_count),
                ),
            )
            .set_blocks(
                "custom_payload_field",
                custom_payload_field_blocks(&config.custom_payload_fields),
            )
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "synth-alert-1",
            "name": "health check failing",
            "synthetic_test_ids": ["test-2", "test-1"],
            "tag_filter": "synthetic.locationLabel EQUALS 'eu-west'",
            "alert_channel_ids": ["ch-1"],
            "rule": {"metric_name": "synthetic.status"},
            "time_threshold": {"violations_count": 2}
        })
    }

    #[test]
    fn test_defaults_applied() {
        let resource = SyntheticAlertConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert_eq!(config.rule.alert_type, "failure");
        assert_eq!(config.rule.aggregation, "SUM");
        assert_eq!(config.time_threshold.kind, "violationsInSequence");
        assert_eq!(config.severity, 5);
        assert_eq!(config.synthetic_test_ids, vec!["test-1", "test-2"]);
        assert!(config.description.is_empty());

        let body = serde_json::to_value(&config).unwrap();
        assert!(body.get("description").is_none());
        assert_eq!(body["timeThreshold"]["violationsCount"], 2);
    }

    #[test]
    fn test_state_round_trip() {
        let resource = SyntheticAlertConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(state["tag_filter"], plan["tag_filter"]);
        assert_eq!(state["severity"], "warning");
        assert_eq!(state["description"], Value::Null);
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_rule_required() {
        let resource = SyntheticAlertConfigResource::new();
        let mut plan = plan();
        plan["rule"] = Value::Null;
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("rule"));
    }
}
