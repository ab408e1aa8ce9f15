use serde_json::{json, Value};

use super::alert_common::{
    alert_channels_block, alert_channels_state, custom_payload_field_block,
    custom_payload_field_blocks, read_alert_channels, read_custom_payload_fields,
    read_static_thresholds, read_time_threshold, static_threshold_block, static_thresholds_state,
    time_threshold_block, time_threshold_state,
};
use super::{id_attribute, planned, read_tag_filter, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    GroupByTag, LogAlertConfig, LogAlertRule, RuleWithThreshold, GRANULARITIES,
    THRESHOLD_OPERATORS,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

/// Alert types as configured and as sent to the API.
const ALERT_TYPES: &[(&str, &str)] = &[("log.count", "logCount")];
const DEFAULT_METRIC: &str = "log.count";
const DEFAULT_AGGREGATION: &str = "SUM";

/// `instana_log_alert_config`: smart alert on the number of log messages.
pub struct LogAlertConfigResource {
    metadata: ResourceMetaData,
}

impl LogAlertConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("log_alert_config", schema()),
        }
    }
}

impl Default for LogAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn schema() -> Schema {
    let alert_types: Vec<&str> = ALERT_TYPES.iter().map(|(term, _)| *term).collect();
    let rule = Block::new()
        .with_attribute(
            "metric_name",
            Attribute::optional_string().with_default(json!(DEFAULT_METRIC)),
        )
        .with_attribute(
            "alert_type",
            Attribute::optional_string()
                .with_default(json!(ALERT_TYPES[0].0))
                .with_validator(Validator::one_of(&alert_types)),
        )
        .with_attribute(
            "aggregation",
            Attribute::optional_string()
                .with_default(json!(DEFAULT_AGGREGATION))
                .with_validator(Validator::one_of(&[DEFAULT_AGGREGATION])),
        )
        .with_attribute(
            "threshold_operator",
            Attribute::required_string().with_validator(Validator::one_of(THRESHOLD_OPERATORS)),
        )
        .with_block("threshold", static_threshold_block());

    let group_by = Block::new()
        .with_attribute("tag_name", Attribute::required_string())
        .with_attribute("key", Attribute::optional_string());

    Schema::v0()
        .with_description("Smart alert on log messages")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 1, max: 256 }),
        )
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::required()))
        .with_attribute(
            "granularity",
            Attribute::required_int64().with_description("Evaluation granularity in milliseconds"),
        )
        .with_attribute(
            "grace_period",
            Attribute::optional_int64()
                .with_description("Time in milliseconds before an open alert is closed"),
        )
        .with_block("alert_channels", alert_channels_block())
        .with_block("group_by", NestedBlock::list(group_by))
        .with_block("custom_payload_field", custom_payload_field_block())
        .with_block("rules", NestedBlock::single(rule).with_min_items(1))
        .with_block("time_threshold", time_threshold_block())
}

fn read_rules(
    reader: &ObjectReader<'_>,
) -> Result<Vec<RuleWithThreshold<LogAlertRule>>, ProviderError> {
    let Some(rule) = reader.nested("rules")? else {
        return Err(ProviderError::attribute("rules", "a value is required"));
    };
    let term = rule
        .optional::<String>("alert_type")?
        .unwrap_or_else(|| ALERT_TYPES[0].0.to_string());
    let Some((_, alert_type)) = ALERT_TYPES.iter().find(|(t, _)| *t == term) else {
        return Err(ProviderError::attribute(
            rule.path("alert_type"),
            format!("unsupported alert type '{}'", term),
        ));
    };
    Ok(vec![RuleWithThreshold {
        threshold_operator: rule.required("threshold_operator")?,
        rule: LogAlertRule {
            alert_type: alert_type.to_string(),
            metric_name: rule
                .optional("metric_name")?
                .unwrap_or_else(|| DEFAULT_METRIC.to_string()),
            aggregation: Some(
                rule.optional("aggregation")?
                    .unwrap_or_else(|| DEFAULT_AGGREGATION.to_string()),
            ),
        },
        thresholds: read_static_thresholds(&rule, "threshold")?,
    }])
}

fn rules_state(rules: &[RuleWithThreshold<LogAlertRule>]) -> Option<ObjectWriter> {
    let rule = rules.first()?;
    let term = ALERT_TYPES
        .iter()
        .find(|(_, wire)| *wire == rule.rule.alert_type)
        .map(|(term, _)| term.to_string())
        .unwrap_or_else(|| rule.rule.alert_type.clone());
    Some(
        ObjectWriter::new()
            .set("metric_name", rule.rule.metric_name.clone())
            .set("alert_type", term)
            .set("aggregation", rule.rule.aggregation.clone())
            .set("threshold_operator", rule.threshold_operator.clone())
            .set_block("threshold", Some(static_thresholds_state(&rule.thresholds))),
    )
}

fn read_group_by(reader: &ObjectReader<'_>) -> Result<Vec<GroupByTag>, ProviderError> {
    reader
        .nested_list("group_by")?
        .iter()
        .map(|tag| {
            Ok(GroupByTag {
                tag_name: tag.required("tag_name")?,
                key: tag.optional("key")?,
            })
        })
        .collect()
}

impl ResourceHandle for LogAlertConfigResource {
    type Object = LogAlertConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<LogAlertConfig>> {
        api.log_alert_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<LogAlertConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;

        let granularity: i64 = reader.required("granularity")?;
        if !GRANULARITIES.contains(&granularity) {
            return Err(ProviderError::attribute(
                "granularity",
                format!("granularity must be one of {:?}, got {}", GRANULARITIES, granularity),
            ));
        }

        Ok(LogAlertConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            tag_filter_expression: read_tag_filter(&reader, "tag_filter")?,
            alert_channels: read_alert_channels(&reader, "alert_channels")?,
            granularity,
            time_threshold: read_time_threshold(&reader, "time_threshold")?,
            grace_period: reader.optional("grace_period")?,
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
            rules: read_rules(&reader)?,
            group_by: read_group_by(&reader)?,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        config: &LogAlertConfig,
    ) -> Result<Value, ProviderError> {
        let description = (!config.description.is_empty()).then(|| config.description.clone());
        let group_by = config
            .group_by
            .iter()
            .map(|tag| {
                ObjectWriter::new()
                    .set("tag_name", tag.tag_name.clone())
                    .set("key", tag.key.clone())
            })
            .collect();

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
            .set("granularity", config.granularity)
            .set("grace_period", config.grace_period)
            .set_block("alert_channels", alert_channels_state(&config.alert_channels))
            .set_blocks("group_by", group_by)
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
            "id": "log-1",
            "name": "error logs",
            "tag_filter": "log.level EQUALS 'ERROR'",
            "granularity": 60000,
            "grace_period": 300000,
            "alert_channels": {"warning": ["ch-1"]},
            "group_by": [{"tag_name": "kubernetes.namespace.name"}],
            "rules": {
                "alert_type": "log.count",
                "threshold_operator": ">",
                "threshold": {"warning": {"static": {"value": 100.0}}}
            },
            "time_threshold": {"violations_in_sequence": {"time_window": 60000}}
        })
    }

    #[test]
    fn test_alert_type_maps_to_wire_name() {
        let resource = LogAlertConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        let rule = &config.rules[0].rule;
        assert_eq!(rule.alert_type, "logCount");
        assert_eq!(rule.metric_name, "log.count");
        assert_eq!(rule.aggregation.as_deref(), Some("SUM"));
        assert_eq!(config.group_by[0].tag_name, "kubernetes.namespace.name");
        assert_eq!(config.grace_period, Some(300000));
    }

    #[test]
    fn test_state_round_trip() {
        let resource = LogAlertConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(state["rules"]["alert_type"], "log.count");
        assert_eq!(state["rules"]["threshold"]["critical"], Value::Null);
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_rules_required() {
        let resource = LogAlertConfigResource::new();
        let mut plan = plan();
        plan["rules"] = Value::Null;
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("rules"));
    }
}
