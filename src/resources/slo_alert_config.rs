use serde_json::{json, Value};

use super::alert_common::{
    custom_payload_field_block, custom_payload_field_blocks, read_custom_payload_fields,
    read_severity, severity_attribute, severity_state,
};
use super::{id_attribute, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    BurnRateConfig, BurnRateThreshold, Severity, SloAlertConfig, SloAlertRule, SloAlertThreshold,
    SloAlertTimeThreshold, ThresholdRule,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

/// Alert types with the rule they select.
const ALERT_TYPES: &[(&str, &str, &str)] = &[
    ("status", "SERVICE_LEVELS_OBJECTIVE", "STATUS"),
    ("error_budget", "ERROR_BUDGET", "BURNED_PERCENTAGE"),
    ("burn_rate_v2", "ERROR_BUDGET", "BURN_RATE_V2"),
];
const BURN_RATE: &str = "burn_rate_v2";
const OPERATORS: &[&str] = &[">", ">=", "=", "<=", "<"];
const ALERT_WINDOW_TYPES: &[&str] = &["SINGLE", "LONG", "SHORT"];
const DURATION_UNIT_TYPES: &[&str] = &["MINUTE", "HOUR", "DAY"];

/// `instana_slo_alert_config`: smart alert on service level objectives.
///
/// Status and error budget alerts compare against a static threshold, burn
/// rate alerts against one or more burn rate windows.
pub struct SloAlertConfigResource {
    metadata: ResourceMetaData,
}

impl SloAlertConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("slo_alert_config", schema()),
        }
    }
}

impl Default for SloAlertConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn schema() -> Schema {
    let alert_types: Vec<&str> = ALERT_TYPES.iter().map(|(term, _, _)| *term).collect();
    let operator = || Attribute::required_string().with_validator(Validator::one_of(OPERATORS));

    Schema::v0()
        .with_description("Smart alert on service level objectives")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 0, max: 256 }),
        )
        .with_attribute("description", Attribute::required_string())
        .with_attribute("severity", severity_attribute())
        .with_attribute("triggering", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute("enabled", Attribute::optional_bool().with_default(json!(true)))
        .with_attribute(
            "alert_type",
            Attribute::required_string().with_validator(Validator::one_of(&alert_types)),
        )
        .with_attribute("slo_ids", string_set(AttributeFlags::required()))
        .with_attribute("alert_channel_ids", string_set(AttributeFlags::required()))
        .with_block(
            "threshold",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "type",
                        Attribute::optional_string().with_default(json!(ThresholdRule::STATIC)),
                    )
                    .with_attribute("operator", operator())
                    .with_attribute("value", Attribute::required_float64()),
            ),
        )
        .with_block(
            "time_threshold",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "warm_up",
                        Attribute::required_int64()
                            .with_description("Time in milliseconds the condition must hold"),
                    )
                    .with_attribute(
                        "cool_down",
                        Attribute::required_int64()
                            .with_description("Time in milliseconds before an open alert closes"),
                    ),
            )
            .with_min_items(1),
        )
        .with_block(
            "burn_rate_config",
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "alert_window_type",
                        Attribute::required_string().with_validator(Validator::one_of(ALERT_WINDOW_TYPES)),
                    )
                    .with_attribute("duration", Attribute::required_int64())
                    .with_attribute(
                        "duration_unit_type",
                        Attribute::required_string().with_validator(Validator::one_of(DURATION_UNIT_TYPES)),
                    )
                    .with_attribute("threshold_operator", operator())
                    .with_attribute("threshold_value", Attribute::required_float64()),
            ),
        )
        .with_block("custom_payload_field", custom_payload_field_block())
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

fn read_rule(reader: &ObjectReader<'_>) -> Result<(&'static str, SloAlertRule), ProviderError> {
    let term: String = reader.required("alert_type")?;
    let Some((term, alert_type, metric)) = ALERT_TYPES.iter().find(|(t, _, _)| *t == term) else {
        return Err(ProviderError::attribute(
            "alert_type",
            format!("unsupported alert type '{}'", term),
        ));
    };
    Ok((
        *term,
        SloAlertRule {
            alert_type: alert_type.to_string(),
            metric: metric.to_string(),
        },
    ))
}

fn read_threshold(reader: &ObjectReader<'_>) -> Result<Option<SloAlertThreshold>, ProviderError> {
    let Some(threshold) = reader.nested("threshold")? else {
        return Ok(None);
    };
    Ok(Some(SloAlertThreshold {
        kind: threshold
            .optional("type")?
            .unwrap_or_else(|| ThresholdRule::STATIC.to_string()),
        operator: threshold.required("operator")?,
        value: threshold.required("value")?,
    }))
}

fn read_burn_rates(reader: &ObjectReader<'_>) -> Result<Vec<BurnRateConfig>, ProviderError> {
    reader
        .nested_list("burn_rate_config")?
        .iter()
        .map(|config| {
            Ok(BurnRateConfig {
                alert_window_type: config.required("alert_window_type")?,
                duration: config.required("duration")?,
                duration_unit_type: config.required("duration_unit_type")?,
                threshold: BurnRateThreshold {
                    operator: config.required("threshold_operator")?,
                    value: config.required("threshold_value")?,
                },
            })
        })
        .collect()
}

impl ResourceHandle for SloAlertConfigResource {
    type Object = SloAlertConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<SloAlertConfig>> {
        api.slo_alert_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<SloAlertConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let (term, rule) = read_rule(&reader)?;

        let (threshold, burn_rate_configs) = if term == BURN_RATE {
            let burn_rates = read_burn_rates(&reader)?;
            if burn_rates.is_empty() {
                return Err(ProviderError::attribute(
                    "burn_rate_config",
                    "burn rate alerts need at least one burn_rate_config",
                ));
            }
            (None, burn_rates)
        } else {
            let threshold = read_threshold(&reader)?.ok_or_else(|| {
                ProviderError::attribute("threshold", format!("{} alerts need a threshold", term))
            })?;
            (Some(threshold), Vec::new())
        };

        let time_threshold = reader
            .nested("time_threshold")?
            .ok_or_else(|| ProviderError::attribute("time_threshold", "a value is required"))?;

        Ok(SloAlertConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            severity: read_severity(&reader, "severity")?.unwrap_or(Severity::Warning.code()),
            triggering: reader.optional("triggering")?.unwrap_or(false),
            enabled: reader.optional("enabled")?.unwrap_or(true),
            rule,
            threshold,
            time_threshold: SloAlertTimeThreshold {
                time_window: time_threshold.required("warm_up")?,
                expiry: time_threshold.required("cool_down")?,
            },
            slo_ids: sorted(reader.optional("slo_ids")?.unwrap_or_default()),
            alert_channel_ids: sorted(reader.optional("alert_channel_ids")?.unwrap_or_default()),
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
            burn_rate_configs,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, config: &SloAlertConfig) -> Result<Value, ProviderError> {
        let term = ALERT_TYPES
            .iter()
            .find(|(_, alert_type, metric)| {
                *alert_type == config.rule.alert_type && *metric == config.rule.metric
            })
            .map(|(term, _, _)| *term)
            .ok_or_else(|| {
                ProviderError::Validation(format!(
                    "unsupported SLO alert rule {}/{}",
                    config.rule.alert_type, config.rule.metric
                ))
            })?;

        let threshold = config.threshold.as_ref().map(|threshold| {
            ObjectWriter::new()
                .set("type", threshold.kind.clone())
                .set("operator", threshold.operator.clone())
                .set("value", threshold.value)
        });
        let burn_rates = config
            .burn_rate_configs
            .iter()
            .map(|burn_rate| {
                ObjectWriter::new()
                    .set("alert_window_type", burn_rate.alert_window_type.clone())
                    .set("duration", burn_rate.duration)
                    .set("duration_unit_type", burn_rate.duration_unit_type.clone())
                    .set("threshold_operator", burn_rate.threshold.operator.clone())
                    .set("threshold_value", burn_rate.threshold.value)
            })
            .collect();

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("description", config.description.clone())
            .set("severity", severity_state(Some(config.severity))?)
            .set("triggering", config.triggering)
            .set("enabled", config.enabled)
            .set("alert_type", term)
            .set("slo_ids", sorted(config.slo_ids.clone()))
            .set("alert_channel_ids", sorted(config.alert_channel_ids.clone()))
            .set_block("threshold", threshold)
            .set_block(
                "time_threshold",
                Some(
                    ObjectWriter::new()
                        .set("warm_up", config.time_threshold.time_window)
                        .set("cool_down", config.time_threshold.expiry),
                ),
            )
            .set_blocks("burn_rate_config", burn_rates)
            .set_blocks(
                "custom_payload_field",
                custom_payload_field_blocks(&config.custom_payload_fields),
            )
            .into_value())
    }
}
