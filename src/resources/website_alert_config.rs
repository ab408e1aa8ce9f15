use serde_json::{json, Value};

use super::alert_common::{
    custom_payload_field_block, custom_payload_field_blocks, read_custom_payload_fields,
    read_severity, read_thresholds, severity_attribute, severity_state, threshold_block,
    thresholds_state,
};
use super::{id_attribute, planned, read_tag_filter, string_set, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    WebsiteAlertConfig, WebsiteAlertRule, WebsiteAlertRuleWithThresholds, WebsiteTimeThreshold,
    GRANULARITIES, THRESHOLD_OPERATORS,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const DEFAULT_GRANULARITY: i64 = 600_000;
const MATCH_OPERATORS: &[&str] = &[
    "EQUALS",
    "NOT_EQUAL",
    "CONTAINS",
    "NOT_CONTAIN",
    "IS_EMPTY",
    "NOT_EMPTY",
    "IS_BLANK",
    "NOT_BLANK",
    "STARTS_WITH",
    "ENDS_WITH",
    "NOT_STARTS_WITH",
    "NOT_ENDS_WITH",
];
const IMPACT_MEASUREMENT_METHODS: &[&str] = &["AGGREGATED", "PER_WINDOW"];

/// Rule blocks and the alert type each of them selects.
const RULE_KINDS: &[(&str, &str)] = &[
    ("slowness", "slowness"),
    ("specific_js_error", "specificJsError"),
    ("status_code", "statusCode"),
    ("throughput", "throughput"),
];

const TIME_THRESHOLD_KINDS: &[(&str, &str)] = &[
    ("user_impact_of_violations_in_sequence", "userImpactOfViolationsInSequence"),
    ("violations_in_period", "violationsInPeriod"),
    ("violations_in_sequence", "violationsInSequence"),
];

/// `instana_website_alert_config`: smart alert on website beacons.
pub struct WebsiteAlertConfigResource {
    metadata: ResourceMetaData,
}

impl WebsiteAlertConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("website_alert_config", schema()),
        }
    }
}

impl Default for WebsiteAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn rule_block() -> Block {
    let metric = || {
        Block::new()
            .with_attribute("metric_name", Attribute::required_string())
            .with_attribute("aggregation", Attribute::optional_string())
    };
    let matching = || {
        metric()
            .with_attribute(
                "operator",
                Attribute::required_string().with_validator(Validator::one_of(MATCH_OPERATORS)),
            )
            .with_attribute("value", Attribute::optional_string())
    };
    Block::new()
        .with_block("slowness", NestedBlock::single(metric()))
        .with_block("specific_js_error", NestedBlock::single(matching()))
        .with_block("status_code", NestedBlock::single(matching()))
        .with_block("throughput", NestedBlock::single(metric()))
}

fn time_threshold_block() -> NestedBlock {
    let window = || Attribute::required_int64().with_description("Time window in milliseconds");
    NestedBlock::single(
        Block::new()
            .with_block(
                "user_impact_of_violations_in_sequence",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("time_window", window())
                        .with_attribute(
                            "impact_measurement_method",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(IMPACT_MEASUREMENT_METHODS)),
                        )
                        .with_attribute("user_percentage", Attribute::optional_float64())
                        .with_attribute("users", Attribute::optional_int64()),
                ),
            )
            .with_block(
                "violations_in_period",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("time_window", window())
                        .with_attribute("violations", Attribute::required_int64()),
                ),
            )
            .with_block(
                "violations_in_sequence",
                NestedBlock::single(Block::new().with_attribute("time_window", window())),
            ),
    )
    .with_min_items(1)
}

fn schema() -> Schema {
    Schema::v0()
        .with_description("Smart alert on website beacons")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 1, max: 256 }),
        )
        .with_attribute(
            "description",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 0, max: 65536 }),
        )
        .with_attribute("severity", severity_attribute())
        .with_attribute("triggering", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute("website_id", Attribute::required_string().with_force_new())
        .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::optional()))
        .with_attribute("alert_channel_ids", string_set(AttributeFlags::optional()))
        .with_attribute(
            "granularity",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_GRANULARITY))
                .with_description("Evaluation granularity in milliseconds"),
        )
        .with_block("custom_payload_field", custom_payload_field_block())
        .with_block(
            "rules",
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "threshold_operator",
                        Attribute::required_string()
                            .with_validator(Validator::one_of(THRESHOLD_OPERATORS)),
                    )
                    .with_block("rule", NestedBlock::single(rule_block()).with_min_items(1))
                    .with_block("threshold", threshold_block()),
            )
            .with_min_items(1),
        )
        .with_block("time_threshold", time_threshold_block())
}

fn read_rule(reader: &ObjectReader<'_>) -> Result<WebsiteAlertRule, ProviderError> {
    let rule = reader
        .nested("rule")?
        .ok_or_else(|| ProviderError::attribute(reader.path("rule"), "a value is required"))?;

    let mut configured = Vec::new();
    for (block_name, alert_type) in RULE_KINDS {
        if let Some(metric) = rule.nested(block_name)? {
            configured.push((*alert_type, metric));
        }
    }
    if configured.len() != 1 {
        return Err(ProviderError::attribute(
            reader.path("rule"),
            format!("exactly one rule type must be configured, got {}", configured.len()),
        ));
    }
    let (alert_type, metric) = configured.remove(0);
    Ok(WebsiteAlertRule {
        alert_type: alert_type.to_string(),
        metric_name: metric.required("metric_name")?,
        aggregation: metric.optional("aggregation")?,
        operator: metric.optional("operator")?,
        value: metric.optional("value")?,
    })
}

fn rule_state(rule: &WebsiteAlertRule) -> ObjectWriter {
    RULE_KINDS.iter().fold(ObjectWriter::new(), |writer, (block_name, alert_type)| {
        let block = (rule.alert_type == *alert_type).then(|| {
            let metric = ObjectWriter::new()
                .set("metric_name", rule.metric_name.clone())
                .set("aggregation", rule.aggregation.clone());
            match *block_name {
                "specific_js_error" | "status_code" => metric
                    .set("operator", rule.operator.clone())
                    .set("value", rule.value.clone()),
                _ => metric,
            }
        });
        writer.set_block(block_name, block)
    })
}

fn read_time_threshold(reader: &ObjectReader<'_>) -> Result<WebsiteTimeThreshold, ProviderError> {
    let block = reader
        .nested("time_threshold")?
        .ok_or_else(|| ProviderError::attribute("time_threshold", "a value is required"))?;
    let mut configured = Vec::new();
    for (block_name, kind) in TIME_THRESHOLD_KINDS {
        if let Some(inner) = block.nested(block_name)? {
            configured.push(WebsiteTimeThreshold {
                kind: kind.to_string(),
                time_window: inner.required("time_window")?,
                violations: inner.optional("violations")?,
                impact_measurement_method: inner.optional("impact_measurement_method")?,
                user_percentage: inner.optional("user_percentage")?,
                users: inner.optional("users")?,
            });
        }
    }
    match configured.len() {
        1 => Ok(configured.remove(0)),
        n => Err(ProviderError::attribute(
            "time_threshold",
            format!("exactly one time threshold type must be configured, got {}", n),
        )),
    }
}

fn time_threshold_state(threshold: &WebsiteTimeThreshold) -> ObjectWriter {
    TIME_THRESHOLD_KINDS.iter().fold(ObjectWriter::new(), |writer, (block_name, kind)| {
        let block = (threshold.kind == *kind).then(|| {
            let inner = ObjectWriter::new().set("time_window", threshold.time_window);
            match *block_name {
                "user_impact_of_violations_in_sequence" => inner
                    .set("impact_measurement_method", threshold.impact_measurement_method.clone())
                    .set("user_percentage", threshold.user_percentage)
                    .set("users", threshold.users),
                "violations_in_period" => inner.set("violations", threshold.violations),
                _ => inner,
            }
        });
        writer.set_block(block_name, block)
    })
}

impl ResourceHandle for WebsiteAlertConfigResource {
    type Object = WebsiteAlertConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<WebsiteAlertConfig>> {
        api.website_alert_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<WebsiteAlertConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;

        let granularity = reader.optional("granularity")?.unwrap_or(DEFAULT_GRANULARITY);
        if !GRANULARITIES.contains(&granularity) {
            return Err(ProviderError::attribute(
                "granularity",
                format!("granularity must be one of {:?}, got {}", GRANULARITIES, granularity),
            ));
        }

        let rules = reader
            .nested_list("rules")?
            .iter()
            .map(|rule| {
                Ok(WebsiteAlertRuleWithThresholds {
                    rule: read_rule(rule)?,
                    threshold_operator: rule.required("threshold_operator")?,
                    thresholds: read_thresholds(rule, "threshold")?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        let mut alert_channel_ids: Vec<String> =
            reader.optional("alert_channel_ids")?.unwrap_or_default();
        alert_channel_ids.sort();

        Ok(WebsiteAlertConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            severity: read_severity(&reader, "severity")?,
            triggering: reader.optional("triggering")?.unwrap_or(false),
            enabled: None,
            website_id: reader.optional("website_id")?.unwrap_or_default(),
            tag_filter_expression: read_tag_filter(&reader, "tag_filter")?,
            alert_channel_ids,
            granularity,
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
            rules,
            time_threshold: read_time_threshold(&reader)?,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        config: &WebsiteAlertConfig,
    ) -> Result<Value, ProviderError> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                ObjectWriter::new()
                    .set("threshold_operator", rule.threshold_operator.clone())
                    .set_block("rule", Some(rule_state(&rule.rule)))
                    .set_block("threshold", Some(thresholds_state(&rule.thresholds)))
            })
            .collect();
        let mut alert_channel_ids = config.alert_channel_ids.clone();
        alert_channel_ids.sort();

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("description", config.description.clone())
            .set("severity", severity_state(config.severity)?)
            .set("triggering", config.triggering)
            .set("website_id", config.website_id.clone())
            .set(
                "tag_filter",
                tag_filter_state(
                    config.tag_filter_expression.as_ref(),
                    planned(plan, "tag_filter")?,
                )?,
            )
            .set("alert_channel_ids", (!alert_channel_ids.is_empty()).then_some(alert_channel_ids))
            .set("granularity", config.granularity)
            .set_blocks(
                "custom_payload_field",
                custom_payload_field_blocks(&config.custom_payload_fields),
            )
            .set_blocks("rules", rules)
            .set_block("time_threshold", Some(time_threshold_state(&config.time_threshold)))
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "web-alert-1",
            "name": "js errors",
            "description": "uncaught errors on checkout",
            "severity": "critical",
            "website_id": "site-1",
            "tag_filter": "beacon.page.name EQUALS 'checkout'",
            "alert_channel_ids": ["ch-2", "ch-1"],
            "rules": [{
                "threshold_operator": ">=",
                "rule": {"specific_js_error": {
                    "metric_name": "errors",
                    "aggregation": "SUM",
                    "operator": "CONTAINS",
                    "value": "TypeError"
                }},
                "threshold": {"warning": {"static": {"value": 3.0}}}
            }],
            "time_threshold": {"user_impact_of_violations_in_sequence": {
                "time_window": 600000,
                "impact_measurement_method": "AGGREGATED",
                "user_percentage": 0.25
            }}
        })
    }

    #[test]
    fn test_state_to_object() {
        let resource = WebsiteAlertConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert_eq!(config.severity, Some(10));
        assert_eq!(config.granularity, DEFAULT_GRANULARITY);
        assert_eq!(config.rules[0].rule.alert_type, "specificJsError");
        assert_eq!(config.rules[0].rule.value.as_deref(), Some("TypeError"));
        assert_eq!(config.time_threshold.kind, "userImpactOfViolationsInSequence");
        assert_eq!(config.time_threshold.user_percentage, Some(0.25));
        assert_eq!(config.alert_channel_ids, vec!["ch-1", "ch-2"]);
    }

    #[test]
    fn test_state_round_trip() {
        let resource = WebsiteAlertConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(state["rules"][0]["rule"]["slowness"], Value::Null);
        assert_eq!(state["time_threshold"]["violations_in_sequence"], Value::Null);
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_single_time_threshold() {
        let resource = WebsiteAlertConfigResource::new();
        let mut plan = plan();
        plan["time_threshold"]["violations_in_sequence"] = json!({"time_window": 60000});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("time_threshold"));
    }
}
