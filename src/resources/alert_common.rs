//! Schema fragments and mappings shared by alert configurations.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::warn;

use super::string_set;
use crate::error::ProviderError;
use crate::restapi::models::{
    CustomPayloadField, CustomPayloadType, DynamicValue, Severity, ThresholdRule, TimeThreshold,
};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Validator};
use crate::value::{ObjectReader, ObjectWriter};

pub(crate) const SEASONALITIES: &[&str] = &["DAILY", "WEEKLY", "AUTO"];

/// Optional `warning`/`critical` severity attribute.
pub(crate) fn severity_attribute() -> Attribute {
    let terms = Severity::terms();
    let terms: Vec<&str> = terms.iter().map(String::as_str).collect();
    Attribute::optional_string()
        .with_validator(Validator::one_of(&terms))
        .with_description("The severity of the alert when triggered, either warning or critical")
}

/// Read a severity term into its API code.
pub(crate) fn read_severity(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<Option<i32>, ProviderError> {
    match reader.optional::<String>(name)? {
        Some(term) => Severity::from_term(&term)
            .map(|s| Some(s.code()))
            .ok_or_else(|| {
                ProviderError::attribute(reader.path(name), format!("unsupported severity '{}'", term))
            }),
        None => Ok(None),
    }
}

/// State value of a severity code.
pub(crate) fn severity_state(code: Option<i32>) -> Result<Value, ProviderError> {
    match code {
        None => Ok(Value::Null),
        Some(code) => Severity::from_code(code)
            .map(|s| Value::String(s.term().to_string()))
            .ok_or_else(|| ProviderError::Validation(format!("unsupported severity code {}", code))),
    }
}

/// Schema of the `threshold` block of an alert rule.
///
/// Warning thresholds are static, critical thresholds are adaptive baselines.
pub(crate) fn threshold_block() -> NestedBlock {
    let static_block = NestedBlock::single(
        Block::new().with_attribute("value", Attribute::required_float64()),
    );
    let adaptive_block = NestedBlock::single(
        Block::new()
            .with_attribute("deviation_factor", Attribute::required_float64())
            .with_attribute(
                "adaptability",
                Attribute::optional_float64().with_default(json!(1.0)),
            )
            .with_attribute(
                "seasonality",
                Attribute::optional_string()
                    .with_default(json!("AUTO"))
                    .with_validator(Validator::one_of(SEASONALITIES)),
            ),
    );
    NestedBlock::single(
        Block::new()
            .with_description("Thresholds per severity")
            .with_block(
                "warning",
                NestedBlock::single(Block::new().with_block("static", static_block)),
            )
            .with_block(
                "critical",
                NestedBlock::single(Block::new().with_block("adaptive_baseline", adaptive_block)),
            ),
    )
}

/// Read the `threshold` block into thresholds keyed by severity.
pub(crate) fn read_thresholds(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<BTreeMap<String, ThresholdRule>, ProviderError> {
    let mut thresholds = BTreeMap::new();
    let Some(threshold) = reader.nested(name)? else {
        return Ok(thresholds);
    };

    if let Some(warning) = threshold.nested("warning")? {
        if let Some(fixed) = warning.nested("static")? {
            thresholds.insert(
                Severity::Warning.wire_key().to_string(),
                ThresholdRule::fixed(fixed.required("value")?),
            );
        }
    }
    if let Some(critical) = threshold.nested("critical")? {
        if let Some(adaptive) = critical.nested("adaptive_baseline")? {
            thresholds.insert(
                Severity::Critical.wire_key().to_string(),
                ThresholdRule::adaptive(
                    adaptive.required("deviation_factor")?,
                    adaptive.optional("adaptability")?.unwrap_or(1.0),
                    adaptive
                        .optional::<String>("seasonality")?
                        .unwrap_or_else(|| "AUTO".to_string()),
                ),
            );
        }
    }
    if thresholds.is_empty() {
        return Err(ProviderError::attribute(
            reader.path(name),
            "at least one of warning or critical must be configured",
        ));
    }
    Ok(thresholds)
}

/// State of thresholds keyed by severity.
pub(crate) fn thresholds_state(thresholds: &BTreeMap<String, ThresholdRule>) -> ObjectWriter {
    let mut writer = ObjectWriter::new();
    let mut warning = None;
    let mut critical = None;
    for (key, rule) in thresholds {
        match (key.as_str(), rule.kind.as_str()) {
            ("WARNING", ThresholdRule::STATIC) => {
                warning = Some(ObjectWriter::new().set_block(
                    "static",
                    Some(ObjectWriter::new().set("value", rule.value)),
                ));
            },
            ("CRITICAL", ThresholdRule::ADAPTIVE_BASELINE) => {
                critical = Some(ObjectWriter::new().set_block(
                    "adaptive_baseline",
                    Some(
                        ObjectWriter::new()
                            .set("deviation_factor", rule.deviation_factor)
                            .set("adaptability", rule.adaptability)
                            .set("seasonality", rule.seasonality.clone()),
                    ),
                ));
            },
            (key, kind) => {
                warn!(severity = key, kind, "threshold cannot be represented, ignoring it");
            },
        }
    }
    writer = writer.set_block("warning", warning);
    writer.set_block("critical", critical)
}

/// Schema of a `threshold` block holding a static value per severity.
pub(crate) fn static_threshold_block() -> NestedBlock {
    let severity = || {
        NestedBlock::single(Block::new().with_block(
            "static",
            NestedBlock::single(Block::new().with_attribute("value", Attribute::required_float64())),
        ))
    };
    NestedBlock::single(
        Block::new()
            .with_description("Static thresholds per severity")
            .with_block("warning", severity())
            .with_block("critical", severity()),
    )
}

/// Read a block built by [`static_threshold_block`].
pub(crate) fn read_static_thresholds(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<BTreeMap<String, ThresholdRule>, ProviderError> {
    let mut thresholds = BTreeMap::new();
    let Some(threshold) = reader.nested(name)? else {
        return Ok(thresholds);
    };
    for severity in Severity::ALL {
        let Some(level) = threshold.nested(severity.term())? else {
            continue;
        };
        if let Some(fixed) = level.nested("static")? {
            thresholds.insert(
                severity.wire_key().to_string(),
                ThresholdRule::fixed(fixed.required("value")?),
            );
        }
    }
    if thresholds.is_empty() {
        return Err(ProviderError::attribute(
            reader.path(name),
            "at least one of warning or critical must be configured",
        ));
    }
    Ok(thresholds)
}

pub(crate) fn static_thresholds_state(thresholds: &BTreeMap<String, ThresholdRule>) -> ObjectWriter {
    Severity::ALL.iter().fold(ObjectWriter::new(), |writer, severity| {
        let level = match thresholds.get(severity.wire_key()) {
            Some(rule) if rule.kind == ThresholdRule::STATIC => Some(ObjectWriter::new().set_block(
                "static",
                Some(ObjectWriter::new().set("value", rule.value)),
            )),
            Some(rule) => {
                warn!(severity = severity.wire_key(), kind = %rule.kind, "threshold is not static, ignoring it");
                None
            },
            None => None,
        };
        writer.set_block(severity.term(), level)
    })
}

/// Schema of the `alert_channels` block: channel ids per severity.
pub(crate) fn alert_channels_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("warning", string_set(AttributeFlags::optional()))
            .with_attribute("critical", string_set(AttributeFlags::optional())),
    )
}

pub(crate) fn read_alert_channels(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<BTreeMap<String, Vec<String>>, ProviderError> {
    let mut channels = BTreeMap::new();
    if let Some(block) = reader.nested(name)? {
        for severity in Severity::ALL {
            if let Some(ids) = block.optional::<Vec<String>>(severity.term())? {
                channels.insert(severity.wire_key().to_string(), ids);
            }
        }
    }
    Ok(channels)
}

pub(crate) fn alert_channels_state(channels: &BTreeMap<String, Vec<String>>) -> Option<ObjectWriter> {
    if channels.is_empty() {
        return None;
    }
    let mut writer = ObjectWriter::new();
    for severity in Severity::ALL {
        writer = writer.set(severity.term(), channels.get(severity.wire_key()).cloned());
    }
    Some(writer)
}

/// Schema of the `custom_payload_field` blocks.
pub(crate) fn custom_payload_field_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("key", Attribute::required_string())
            .with_attribute("value", Attribute::optional_string())
            .with_block(
                "dynamic_value",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("key", Attribute::optional_string())
                        .with_attribute("tag_name", Attribute::required_string()),
                ),
            ),
    )
}

pub(crate) fn read_custom_payload_fields(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<Vec<CustomPayloadField>, ProviderError> {
    reader
        .nested_list(name)?
        .iter()
        .map(|field| {
            let key: String = field.required("key")?;
            let value = field.optional::<String>("value")?;
            let dynamic = field.nested("dynamic_value")?;
            match (value, dynamic) {
                (Some(value), None) => Ok(CustomPayloadField {
                    kind: CustomPayloadType::Static,
                    key,
                    value: Some(value),
                    dynamic_value: None,
                }),
                (None, Some(dynamic)) => Ok(CustomPayloadField {
                    kind: CustomPayloadType::Dynamic,
                    key,
                    value: None,
                    dynamic_value: Some(DynamicValue {
                        key: dynamic.optional("key")?,
                        tag_name: dynamic.required("tag_name")?,
                    }),
                }),
                _ => Err(ProviderError::attribute(
                    field.path("value"),
                    "exactly one of value or dynamic_value must be set",
                )),
            }
        })
        .collect()
}

pub(crate) fn custom_payload_field_blocks(fields: &[CustomPayloadField]) -> Vec<ObjectWriter> {
    fields
        .iter()
        .map(|field| {
            let dynamic = field.dynamic_value.as_ref().map(|d| {
                ObjectWriter::new()
                    .set("key", d.key.clone())
                    .set("tag_name", d.tag_name.clone())
            });
            ObjectWriter::new()
                .set("key", field.key.clone())
                .set("value", field.value.clone())
                .set_block("dynamic_value", dynamic)
        })
        .collect()
}

const TIME_THRESHOLD_KINDS: &[(&str, &str)] = &[
    ("request_impact", "requestImpact"),
    ("violations_in_period", "violationsInPeriod"),
    ("violations_in_sequence", "violationsInSequence"),
];

/// Schema of the `time_threshold` block.
pub(crate) fn time_threshold_block() -> NestedBlock {
    let window = || Attribute::required_int64().with_description("Time window in milliseconds");
    NestedBlock::single(
        Block::new()
            .with_block(
                "request_impact",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("time_window", window())
                        .with_attribute("requests", Attribute::required_int64()),
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

pub(crate) fn read_time_threshold(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<TimeThreshold, ProviderError> {
    let block = reader
        .nested(name)?
        .ok_or_else(|| ProviderError::attribute(reader.path(name), "a value is required"))?;
    let mut configured = Vec::new();
    for (block_name, kind) in TIME_THRESHOLD_KINDS {
        if let Some(inner) = block.nested(block_name)? {
            configured.push(TimeThreshold {
                kind: kind.to_string(),
                time_window: inner.required("time_window")?,
                requests: inner.optional("requests")?,
                violations: inner.optional("violations")?,
            });
        }
    }
    match configured.len() {
        1 => Ok(configured.remove(0)),
        n => Err(ProviderError::attribute(
            reader.path(name),
            format!("exactly one time threshold type must be configured, got {}", n),
        )),
    }
}

pub(crate) fn time_threshold_state(threshold: &TimeThreshold) -> ObjectWriter {
    let mut writer = ObjectWriter::new();
    for (block_name, kind) in TIME_THRESHOLD_KINDS {
        let block = (threshold.kind == *kind).then(|| {
            let inner = ObjectWriter::new().set("time_window", threshold.time_window);
            match *block_name {
                "request_impact" => inner.set("requests", threshold.requests),
                "violations_in_period" => inner.set("violations", threshold.violations),
                _ => inner,
            }
        });
        writer = writer.set_block(block_name, block);
    }
    writer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let value = json!({"severity": "critical"});
        let reader = ObjectReader::new(&value).unwrap();
        assert_eq!(read_severity(&reader, "severity").unwrap(), Some(10));
        assert_eq!(severity_state(Some(5)).unwrap(), json!("warning"));
        assert_eq!(severity_state(None).unwrap(), Value::Null);
        assert!(severity_state(Some(3)).is_err());
    }

    #[test]
    fn test_thresholds_keep_severity_pairing() {
        let value = json!({"threshold": {
            "warning": {"static": {"value": 5.0}},
            "critical": {"adaptive_baseline": {"deviation_factor": 2.0, "seasonality": "DAILY"}}
        }});
        let reader = ObjectReader::new(&value).unwrap();
        let thresholds = read_thresholds(&reader, "threshold").unwrap();
        assert_eq!(thresholds["WARNING"], ThresholdRule::fixed(5.0));
        assert_eq!(thresholds["CRITICAL"], ThresholdRule::adaptive(2.0, 1.0, "DAILY"));

        let state = thresholds_state(&thresholds).into_value();
        assert_eq!(state["warning"]["static"]["value"], 5.0);
        assert_eq!(state["critical"]["adaptive_baseline"]["adaptability"], 1.0);
    }

    #[test]
    fn test_mismatched_threshold_is_not_written() {
        let mut thresholds = BTreeMap::new();
        thresholds.insert("WARNING".to_string(), ThresholdRule::adaptive(1.0, 1.0, "AUTO"));
        let state = thresholds_state(&thresholds).into_value();
        assert_eq!(state["warning"], Value::Null);
    }

    #[test]
    fn test_empty_threshold_is_rejected() {
        let value = json!({"rule": [{"threshold": {}}]});
        let reader = ObjectReader::new(&value).unwrap();
        let rule = reader.nested_list("rule").unwrap().remove(0);
        let err = read_thresholds(&rule, "threshold").unwrap_err();
        assert_eq!(err.attribute_path(), Some("rule.0.threshold"));
    }

    #[test]
    fn test_static_thresholds() {
        let value = json!({"threshold": {"critical": {"static": {"value": 95.0}}}});
        let reader = ObjectReader::new(&value).unwrap();
        let thresholds = read_static_thresholds(&reader, "threshold").unwrap();
        assert_eq!(thresholds.len(), 1);
        assert_eq!(thresholds["CRITICAL"], ThresholdRule::fixed(95.0));

        let state = static_thresholds_state(&thresholds).into_value();
        assert_eq!(state["critical"]["static"]["value"], 95.0);
        assert_eq!(state["warning"], Value::Null);

        let value = json!({"threshold": {"warning": {}}});
        let reader = ObjectReader::new(&value).unwrap();
        assert!(read_static_thresholds(&reader, "threshold").is_err());
    }

    #[test]
    fn test_alert_channels() {
        let value = json!({"alert_channels": {"warning": ["a"], "critical": ["b", "c"]}});
        let reader = ObjectReader::new(&value).unwrap();
        let channels = read_alert_channels(&reader, "alert_channels").unwrap();
        assert_eq!(channels["CRITICAL"], vec!["b".to_string(), "c".to_string()]);

        let state = alert_channels_state(&channels).unwrap().into_value();
        assert_eq!(state["warning"], json!(["a"]));
        assert!(alert_channels_state(&BTreeMap::new()).is_none());
    }

    #[test]
    fn test_custom_payload_fields() {
        let value = json!({"custom_payload_field": [
            {"key": "team", "value": "sre"},
            {"key": "zone", "dynamic_value": {"tag_name": "aws.zone"}}
        ]});
        let reader = ObjectReader::new(&value).unwrap();
        let fields = read_custom_payload_fields(&reader, "custom_payload_field").unwrap();
        assert_eq!(fields[0].kind, CustomPayloadType::Static);
        assert_eq!(fields[1].dynamic_value.as_ref().unwrap().tag_name, "aws.zone");

        let blocks = custom_payload_field_blocks(&fields);
        let state = ObjectWriter::new().set_blocks("f", blocks).into_value();
        assert_eq!(state["f"][1]["dynamic_value"]["tag_name"], "aws.zone");
        assert_eq!(state["f"][0]["dynamic_value"], Value::Null);
    }

    #[test]
    fn test_custom_payload_field_needs_one_value() {
        let value = json!({"custom_payload_field": [{"key": "team"}]});
        let reader = ObjectReader::new(&value).unwrap();
        let err = read_custom_payload_fields(&reader, "custom_payload_field").unwrap_err();
        assert_eq!(err.attribute_path(), Some("custom_payload_field.0.value"));
    }

    #[test]
    fn test_time_threshold() {
        let value = json!({"time_threshold": {"violations_in_period": {"time_window": 600000, "violations": 3}}});
        let reader = ObjectReader::new(&value).unwrap();
        let threshold = read_time_threshold(&reader, "time_threshold").unwrap();
        assert_eq!(threshold.kind, "violationsInPeriod");
        assert_eq!(threshold.violations, Some(3));

        let state = time_threshold_state(&threshold).into_value();
        assert_eq!(state["violations_in_period"]["violations"], 3);
        assert_eq!(state["request_impact"], Value::Null);

        let value = json!({"time_threshold": {}});
        let reader = ObjectReader::new(&value).unwrap();
        assert!(read_time_threshold(&reader, "time_threshold").is_err());
    }
}
