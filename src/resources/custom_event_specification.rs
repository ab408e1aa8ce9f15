use serde_json::{json, Value};

use super::alert_common::{read_severity, severity_state};
use super::{id_attribute, read_tag_filter, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{CustomEventSpecification, MetricPattern, RuleSpecification, Severity};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const LOGICAL_OPERATORS: &[&str] = &["AND", "OR"];
const AGGREGATIONS: &[&str] = &["sum", "avg", "min", "max", "abs_diff", "rel_diff"];
const CONDITION_OPERATORS: &[&str] = &["=", "!=", "<=", "<", ">", ">="];
const MATCHING_OPERATORS: &[&str] = &["is", "contains", "startsWith", "endsWith"];
const PATTERN_OPERATORS: &[&str] = &["is", "contains", "any", "startsWith", "endsWith"];

/// Rule blocks, also the rule type sent to the API.
const RULE_TYPES: &[&str] = &[
    "entity_count",
    "entity_count_verification",
    "entity_verification",
    "host_availability",
    "system",
    "threshold",
];

/// `instana_custom_event_specification`: an event raised when its rules match.
pub struct CustomEventSpecificationResource {
    metadata: ResourceMetaData,
}

impl CustomEventSpecificationResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(0)
            .with_description("Custom event specification of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("entity_type", Attribute::required_string())
            .with_attribute("query", Attribute::optional_string())
            .with_attribute("triggering", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("expiration_time", Attribute::optional_int64())
            .with_attribute("enabled", Attribute::optional_bool().with_default(json!(true)))
            .with_attribute(
                "rule_logical_operator",
                Attribute::optional_string()
                    .with_default(json!("AND"))
                    .with_validator(Validator::one_of(LOGICAL_OPERATORS)),
            )
            .with_block("rules", NestedBlock::single(rules_block()).with_min_items(1));

        Self {
            metadata: ResourceMetaData::new("custom_event_specification", schema),
        }
    }
}

impl Default for CustomEventSpecificationResource {
    fn default() -> Self {
        Self::new()
    }
}

fn severity() -> Attribute {
    let terms = Severity::terms();
    let terms: Vec<&str> = terms.iter().map(String::as_str).collect();
    Attribute::required_string().with_validator(Validator::one_of(&terms))
}

fn condition() -> Block {
    Block::new()
        .with_attribute("severity", severity())
        .with_attribute(
            "condition_operator",
            Attribute::required_string().with_validator(Validator::one_of(CONDITION_OPERATORS)),
        )
        .with_attribute("condition_value", Attribute::required_float64())
}

fn matching(block: Block) -> Block {
    block
        .with_attribute("matching_entity_type", Attribute::required_string())
        .with_attribute(
            "matching_operator",
            Attribute::required_string().with_validator(Validator::one_of(MATCHING_OPERATORS)),
        )
        .with_attribute("matching_entity_label", Attribute::required_string())
}

fn rules_block() -> Block {
    let metric_pattern = Block::new()
        .with_attribute("prefix", Attribute::required_string())
        .with_attribute("postfix", Attribute::optional_string())
        .with_attribute("placeholder", Attribute::optional_string())
        .with_attribute(
            "operator",
            Attribute::optional_string()
                .with_default(json!("is"))
                .with_validator(Validator::one_of(PATTERN_OPERATORS)),
        );

    Block::new()
        .with_block("entity_count", NestedBlock::list(condition()))
        .with_block("entity_count_verification", NestedBlock::list(matching(condition())))
        .with_block(
            "entity_verification",
            NestedBlock::list(matching(
                Block::new()
                    .with_attribute("severity", severity())
                    .with_attribute("offline_duration", Attribute::required_int64()),
            )),
        )
        .with_block(
            "host_availability",
            NestedBlock::list(
                Block::new()
                    .with_attribute("severity", severity())
                    .with_attribute("offline_duration", Attribute::required_int64())
                    .with_attribute("close_after", Attribute::optional_int64())
                    .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::optional())),
            ),
        )
        .with_block(
            "system",
            NestedBlock::list(
                Block::new()
                    .with_attribute("severity", severity())
                    .with_attribute("system_rule_id", Attribute::required_string()),
            ),
        )
        .with_block(
            "threshold",
            NestedBlock::list(
                Block::new()
                    .with_attribute("severity", severity())
                    .with_attribute("metric_name", Attribute::optional_string())
                    .with_attribute("rollup", Attribute::optional_int64())
                    .with_attribute("window", Attribute::required_int64())
                    .with_attribute(
                        "aggregation",
                        Attribute::required_string().with_validator(Validator::one_of(AGGREGATIONS)),
                    )
                    .with_attribute(
                        "condition_operator",
                        Attribute::required_string()
                            .with_validator(Validator::one_of(CONDITION_OPERATORS)),
                    )
                    .with_attribute("condition_value", Attribute::optional_float64())
                    .with_block("metric_pattern", NestedBlock::single(metric_pattern)),
            ),
        )
}

fn read_rule(rule_type: &str, reader: &ObjectReader<'_>) -> Result<RuleSpecification, ProviderError> {
    let severity = read_severity(reader, "severity")?
        .ok_or_else(|| ProviderError::attribute(reader.path("severity"), "a value is required"))?;
    let mut rule = RuleSpecification::new(rule_type, severity);
    rule.condition_operator = reader.optional("condition_operator")?;
    rule.condition_value = reader.optional("condition_value")?;
    rule.matching_entity_type = reader.optional("matching_entity_type")?;
    rule.matching_operator = reader.optional("matching_operator")?;
    rule.matching_entity_label = reader.optional("matching_entity_label")?;
    rule.offline_duration = reader.optional("offline_duration")?;
    rule.close_after = reader.optional("close_after")?;
    rule.system_rule_id = reader.optional("system_rule_id")?;
    rule.metric_name = reader.optional("metric_name")?;
    rule.rollup = reader.optional("rollup")?;
    rule.window = reader.optional("window")?;
    rule.aggregation = reader.optional("aggregation")?;
    if rule_type == "host_availability" {
        rule.tag_filter = read_tag_filter(reader, "tag_filter")?;
    }
    if let Some(pattern) = reader.nested("metric_pattern")? {
        rule.metric_pattern = Some(MetricPattern {
            prefix: pattern.required("prefix")?,
            postfix: pattern.optional("postfix")?,
            placeholder: pattern.optional("placeholder")?,
            operator: pattern.optional("operator")?.unwrap_or_else(|| "is".to_string()),
        });
    }
    if rule_type == "threshold" && rule.metric_name.is_none() && rule.metric_pattern.is_none() {
        return Err(ProviderError::attribute(
            reader.path("metric_name"),
            "either metric_name or metric_pattern must be set",
        ));
    }
    Ok(rule)
}

fn rule_state(rule: &RuleSpecification, configured_tag_filter: Option<String>) -> Result<ObjectWriter, ProviderError> {
    let writer = ObjectWriter::new().set("severity", severity_state(Some(rule.severity))?);
    let writer = match rule.rule_type.as_str() {
        "entity_count" => writer
            .set("condition_operator", rule.condition_operator.clone())
            .set("condition_value", rule.condition_value),
        "entity_count_verification" => writer
            .set("condition_operator", rule.condition_operator.clone())
            .set("condition_value", rule.condition_value)
            .set("matching_entity_type", rule.matching_entity_type.clone())
            .set("matching_operator", rule.matching_operator.clone())
            .set("matching_entity_label", rule.matching_entity_label.clone()),
        "entity_verification" => writer
            .set("matching_entity_type", rule.matching_entity_type.clone())
            .set("matching_operator", rule.matching_operator.clone())
            .set("matching_entity_label", rule.matching_entity_label.clone())
            .set("offline_duration", rule.offline_duration),
        "host_availability" => writer
            .set("offline_duration", rule.offline_duration)
            .set("close_after", rule.close_after)
            .set(
                "tag_filter",
                tag_filter_state(rule.tag_filter.as_ref(), configured_tag_filter)?,
            ),
        "system" => writer.set("system_rule_id", rule.system_rule_id.clone()),
        _ => {
            let pattern = rule.metric_pattern.as_ref().map(|p| {
                ObjectWriter::new()
                    .set("prefix", p.prefix.clone())
                    .set("postfix", p.postfix.clone())
                    .set("placeholder", p.placeholder.clone())
                    .set("operator", p.operator.clone())
            });
            writer
                .set("metric_name", rule.metric_name.clone())
                .set("rollup", rule.rollup)
                .set("window", rule.window)
                .set("aggregation", rule.aggregation.clone())
                .set("condition_operator", rule.condition_operator.clone())
                .set("condition_value", rule.condition_value)
                .set_block("metric_pattern", pattern)
        },
    };
    Ok(writer)
}

/// Configured tag filters of host availability rules, by position.
fn configured_tag_filters(plan: Option<&Value>) -> Result<Vec<Option<String>>, ProviderError> {
    let Some(plan) = plan else {
        return Ok(Vec::new());
    };
    let reader = ObjectReader::new(plan)?;
    let Some(rules) = reader.nested("rules")? else {
        return Ok(Vec::new());
    };
    rules
        .nested_list("host_availability")?
        .iter()
        .map(|rule| rule.optional("tag_filter"))
        .collect()
}

impl ResourceHandle for CustomEventSpecificationResource {
    type Object = CustomEventSpecification;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<CustomEventSpecification>> {
        api.custom_event_specifications()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<CustomEventSpecification, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let mut rules = Vec::new();
        if let Some(block) = reader.nested("rules")? {
            for rule_type in RULE_TYPES {
                for rule in block.nested_list(rule_type)? {
                    rules.push(read_rule(rule_type, &rule)?);
                }
            }
        }
        if rules.is_empty() {
            return Err(ProviderError::attribute("rules", "at least one rule must be configured"));
        }

        Ok(CustomEventSpecification {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            entity_type: reader.optional("entity_type")?.unwrap_or_default(),
            query: reader.optional("query")?,
            triggering: reader.optional("triggering")?.unwrap_or(false),
            description: reader.optional("description")?,
            expiration_time: reader.optional("expiration_time")?,
            enabled: reader.optional("enabled")?.unwrap_or(true),
            rule_logical_operator: reader
                .optional("rule_logical_operator")?
                .unwrap_or_else(|| "AND".to_string()),
            rules,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        spec: &CustomEventSpecification,
    ) -> Result<Value, ProviderError> {
        let mut configured = configured_tag_filters(plan)?.into_iter();
        let mut rules = ObjectWriter::new();
        for rule_type in RULE_TYPES {
            let mut blocks = Vec::new();
            for rule in spec.rules.iter().filter(|r| r.rule_type == *rule_type) {
                let tag_filter = if *rule_type == "host_availability" {
                    configured.next().flatten()
                } else {
                    None
                };
                blocks.push(rule_state(rule, tag_filter)?);
            }
            rules = rules.set_blocks(rule_type, blocks);
        }

        Ok(ObjectWriter::new()
            .set("id", spec.id.clone())
            .set("name", spec.name.clone())
            .set("entity_type", spec.entity_type.clone())
            .set("query", spec.query.clone())
            .set("triggering", spec.triggering)
            .set("description", spec.description.clone())
            .set("expiration_time", spec.expiration_time)
            .set("enabled", spec.enabled)
            .set("rule_logical_operator", spec.rule_logical_operator.clone())
            .set_block("rules", Some(rules))
            .into_value())
    }
}
