use serde_json::{json, Value};

use super::alert_common::{
    alert_channels_block, alert_channels_state, custom_payload_field_block,
    custom_payload_field_blocks, read_alert_channels, read_custom_payload_fields,
    read_static_thresholds, read_time_threshold, static_threshold_block, static_thresholds_state,
    time_threshold_block, time_threshold_state,
};
use super::{id_attribute, planned, read_tag_filter, string_list, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    InfraAlertConfig, InfraAlertRule, RuleWithThreshold, AGGREGATIONS, GRANULARITIES,
    THRESHOLD_OPERATORS,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const EVALUATION_TYPES: &[&str] = &["PER_ENTITY", "CUSTOM"];

/// `instana_infra_alert_config`: smart alert on infrastructure metrics.
pub struct InfraAlertConfigResource {
    metadata: ResourceMetaData,
}

impl InfraAlertConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("infra_alert_config", schema()),
        }
    }
}

impl Default for InfraAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn schema() -> Schema {
    let generic_rule = Block::new()
        .with_attribute("metric_name", Attribute::required_string())
        .with_attribute("entity_type", Attribute::required_string())
        .with_attribute(
            "aggregation",
            Attribute::required_string().with_validator(Validator::one_of(AGGREGATIONS)),
        )
        .with_attribute(
            "cross_series_aggregation",
            Attribute::required_string().with_validator(Validator::one_of(AGGREGATIONS)),
        )
        .with_attribute("regex", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute(
            "threshold_operator",
            Attribute::required_string().with_validator(Validator::one_of(THRESHOLD_OPERATORS)),
        )
        .with_block("threshold", static_threshold_block());

    Schema::v0()
        .with_description("Smart alert on infrastructure metrics")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 1, max: 256 }),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_validator(Validator::LengthBetween { min: 0, max: 65536 }),
        )
        .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::optional()))
        .with_attribute("group_by", string_list(AttributeFlags::optional()))
        .with_attribute(
            "granularity",
            Attribute::required_int64().with_description("Evaluation granularity in milliseconds"),
        )
        .with_attribute(
            "evaluation_type",
            Attribute::required_string().with_validator(Validator::one_of(EVALUATION_TYPES)),
        )
        .with_block("alert_channels", alert_channels_block())
        .with_block("custom_payload_field", custom_payload_field_block())
        .with_block(
            "rules",
            NestedBlock::single(
                Block::new().with_block("generic_rule", NestedBlock::single(generic_rule).with_min_items(1)),
            )
            .with_min_items(1),
        )
        .with_block("time_threshold", time_threshold_block())
}

fn read_rules(
    reader: &ObjectReader<'_>,
) -> Result<Vec<RuleWithThreshold<InfraAlertRule>>, ProviderError> {
    let Some(rules) = reader.nested("rules")? else {
        return Ok(Vec::new());
    };
    let Some(generic) = rules.nested("generic_rule")? else {
        return Err(ProviderError::attribute(rules.path("generic_rule"), "a value is required"));
    };
    Ok(vec![RuleWithThreshold {
        threshold_operator: generic.required("threshold_operator")?,
        rule: InfraAlertRule {
            alert_type: InfraAlertRule::GENERIC.to_string(),
            metric_name: generic.required("metric_name")?,
            entity_type: generic.required("entity_type")?,
            aggregation: generic.required("aggregation")?,
            cross_series_aggregation: generic.required("cross_series_aggregation")?,
            regex: generic.optional("regex")?.unwrap_or(false),
        },
        thresholds: read_static_thresholds(&generic, "threshold")?,
    }])
}

fn rules_state(rules: &[RuleWithThreshold<InfraAlertRule>]) -> Option<ObjectWriter> {
    let rule = rules.iter().find(|r| r.rule.alert_type == InfraAlertRule::GENERIC)?;
    let generic = ObjectWriter::new()
        .set("metric_name", rule.rule.metric_name.clone())
        .set("entity_type", rule.rule.entity_type.clone())
        .set("aggregation", rule.rule.aggregation.clone())
        .set("cross_series_aggregation", rule.rule.cross_series_aggregation.clone())
        .set("regex", rule.rule.regex)
        .set("threshold_operator", rule.threshold_operator.clone())
        .set_block("threshold", Some(static_thresholds_state(&rule.thresholds)));
    Some(ObjectWriter::new().set_block("generic_rule", Some(generic)))
}

impl ResourceHandle for InfraAlertConfigResource {
    type Object = InfraAlertConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<InfraAlertConfig>> {
        api.infra_alert_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<InfraAlertConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;

        let granularity: i64 = reader.required("granularity")?;
        if !GRANULARITIES.contains(&granularity) {
            return Err(ProviderError::attribute(
                "granularity",
                format!("granularity must be one of {:?}, got {}", GRANULARITIES, granularity),
            ));
        }

        Ok(InfraAlertConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            tag_filter_expression: read_tag_filter(&reader, "tag_filter")?,
            group_by: reader.optional("group_by")?.unwrap_or_default(),
            granularity,
            time_threshold: read_time_threshold(&reader, "time_threshold")?,
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
            rules: read_rules(&reader)?,
            alert_channels: read_alert_channels(&reader, "alert_channels")?,
            evaluation_type: reader.optional("evaluation_type")?.unwrap_or_default(),
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        config: &InfraAlertConfig,
    ) -> Result<Value, ProviderError> {
        let description = (!config.description.is_empty()).then(|| config.description.clone());
        let group_by = (!config.group_by.is_empty()).then(|| config.group_by.clone());

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("description", description)
            .set(
                "tag_filter",
                tag_filter_state(
                    config.tag_filter_expression.as_ref(),
                    planned(plan, "tag_filter")?,
                )?,
            )
            .set("group_by", group_by)
            .set("granularity", config.granularity)
            .set("evaluation_type", config.evaluation_type.clone())
            .set_block("alert_channels", alert_channels_state(&config.alert_channels))
            .set_blocks(
                "custom_payload_field",
                custom_payload_field_blocks(&config.custom_payload_fields),
            )
            .set_block("rules", rules_state(&config.rules))
            .set_block("time_threshold", Some(time_threshold_state(&config.time_threshold)))
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "infra-1",
            "name": "disk filling up",
            "tag_filter": "host.name EQUALS 'db-1'",
            "group_by": ["host.name"],
            "granularity": 600000,
            "evaluation_type": "PER_ENTITY",
            "alert_channels": {"critical": ["ch-9"]},
            "rules": {
                "generic_rule": {
                    "metric_name": "fs.used",
                    "entity_type": "host",
                    "aggregation": "MAX",
                    "cross_series_aggregation": "MAX",
                    "threshold_operator": ">=",
                    "threshold": {
                        "warning": {"static": {"value": 80.0}},
                        "critical": {"static": {"value": 95.0}}
                    }
                }
            },
            "time_threshold": {"violations_in_sequence": {"time_window": 600000}}
        })
    }

    #[test]
    fn test_state_to_object() {
        let resource = InfraAlertConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        let rule = &config.rules[0];
        assert_eq!(rule.rule.alert_type, "genericRule");
        assert_eq!(rule.thresholds["CRITICAL"].value, Some(95.0));
        assert_eq!(rule.thresholds["WARNING"].kind, "staticThreshold");
        assert_eq!(config.alert_channels["CRITICAL"], vec!["ch-9".to_string()]);
        assert!(config.description.is_empty());
    }

    #[test]
    fn test_state_round_trip() {
        let resource = InfraAlertConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(state["tag_filter"], plan["tag_filter"]);
        assert_eq!(state["description"], Value::Null);
        assert_eq!(state["rules"]["generic_rule"]["regex"], json!(false));
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_generic_rule_required() {
        let resource = InfraAlertConfigResource::new();
        let mut plan = plan();
        plan["rules"] = json!({});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("rules.generic_rule"));
    }

    #[test]
    fn test_unsupported_granularity() {
        let resource = InfraAlertConfigResource::new();
        let mut plan = plan();
        plan["granularity"] = json!(42);
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("granularity"));
    }
}
