use serde_json::{json, Value};

use super::{id_attribute, read_tag_filter, string_list, string_set, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    RbacTag, SloConfig, SloEntity, SloIndicator, SloTimeWindow, AGGREGATIONS,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::tagfilter::TagFilter;
use crate::value::{ObjectReader, ObjectWriter};

const BOUNDARY_SCOPES: &[&str] = &["ALL", "INBOUND"];
const BEACON_TYPES: &[&str] = &["pageLoad", "resourceLoad", "httpRequest", "error", "custom", "pageChange"];
const DURATION_UNITS: &[&str] = &["day", "week"];
const TRAFFIC_TYPES: &[&str] = &["all", "erroneous"];
const TRAFFIC_OPERATORS: &[&str] = &[">", ">=", "<", "<="];

/// Entity blocks and the entity type each one stands for.
const ENTITY_KINDS: &[(&str, &str)] = &[
    ("application", "application"),
    ("website", "website"),
    ("synthetic", "synthetic"),
    ("infrastructure", "infrastructure"),
];

/// Indicator blocks with their blueprint and measurement type.
const INDICATOR_KINDS: &[(&str, &str, &str)] = &[
    ("time_based_latency", "latency", "timeBased"),
    ("event_based_latency", "latency", "eventBased"),
    ("time_based_availability", "availability", "timeBased"),
    ("event_based_availability", "availability", "eventBased"),
    ("traffic", "traffic", "timeBased"),
    ("custom", "custom", "eventBased"),
];

const TIME_WINDOW_KINDS: &[&str] = &["rolling", "fixed"];

/// `instana_slo_config`: a service level objective.
///
/// An objective combines the entity it watches, the indicator counting good
/// and bad events or time slices, and the window it is evaluated over.
pub struct SloConfigResource {
    metadata: ResourceMetaData,
}

impl SloConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("slo_config", schema()),
        }
    }
}

impl Default for SloConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn entity_block() -> NestedBlock {
    let filter = || Attribute::tag_filter(AttributeFlags::optional());
    let application = Block::new()
        .with_attribute("application_id", Attribute::required_string())
        .with_attribute(
            "boundary_scope",
            Attribute::required_string().with_validator(Validator::one_of(BOUNDARY_SCOPES)),
        )
        .with_attribute("filter_expression", filter())
        .with_attribute("include_internal", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute("include_synthetic", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute("service_id", Attribute::optional_string())
        .with_attribute("endpoint_id", Attribute::optional_string());
    let website = Block::new()
        .with_attribute("website_id", Attribute::required_string())
        .with_attribute("filter_expression", filter())
        .with_attribute(
            "beacon_type",
            Attribute::required_string().with_validator(Validator::one_of(BEACON_TYPES)),
        );
    let synthetic = Block::new()
        .with_attribute("synthetic_test_ids", string_set(AttributeFlags::required()))
        .with_attribute("filter_expression", filter());
    let infrastructure = Block::new().with_attribute("infra_type", Attribute::required_string());

    NestedBlock::single(
        Block::new()
            .with_block("application", NestedBlock::single(application))
            .with_block("website", NestedBlock::single(website))
            .with_block("synthetic", NestedBlock::single(synthetic))
            .with_block("infrastructure", NestedBlock::single(infrastructure)),
    )
    .with_min_items(1)
}

fn indicator_block() -> NestedBlock {
    let threshold = || Attribute::required_float64();
    let aggregation = || Attribute::optional_string().with_validator(Validator::one_of(AGGREGATIONS));
    NestedBlock::single(
        Block::new()
            .with_block(
                "time_based_latency",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("threshold", threshold())
                        .with_attribute("aggregation", aggregation()),
                ),
            )
            .with_block(
                "event_based_latency",
                NestedBlock::single(Block::new().with_attribute("threshold", threshold())),
            )
            .with_block(
                "time_based_availability",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("threshold", threshold())
                        .with_attribute("aggregation", aggregation()),
                ),
            )
            .with_block("event_based_availability", NestedBlock::single(Block::new()))
            .with_block(
                "traffic",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "traffic_type",
                            Attribute::required_string().with_validator(Validator::one_of(TRAFFIC_TYPES)),
                        )
                        .with_attribute("threshold", threshold())
                        .with_attribute(
                            "operator",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(TRAFFIC_OPERATORS)),
                        ),
                ),
            )
            .with_block(
                "custom",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "good_event_filter_expression",
                            Attribute::tag_filter(AttributeFlags::required()),
                        )
                        .with_attribute(
                            "bad_event_filter_expression",
                            Attribute::tag_filter(AttributeFlags::optional()),
                        ),
                ),
            ),
    )
    .with_min_items(1)
}

fn time_window_block() -> NestedBlock {
    let window = |fixed: bool| {
        let block = Block::new()
            .with_attribute("duration", Attribute::required_int64())
            .with_attribute(
                "duration_unit",
                Attribute::required_string().with_validator(Validator::one_of(DURATION_UNITS)),
            )
            .with_attribute("timezone", Attribute::optional_string());
        if fixed {
            block.with_attribute(
                "start_timestamp",
                Attribute::required_float64().with_description("Start in milliseconds since the epoch"),
            )
        } else {
            block
        }
    };
    NestedBlock::single(
        Block::new()
            .with_block("rolling", NestedBlock::single(window(false)))
            .with_block("fixed", NestedBlock::single(window(true))),
    )
    .with_min_items(1)
}

fn schema() -> Schema {
    Schema::v0()
        .with_description("SLO configuration of Instana")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 0, max: 256 }),
        )
        .with_attribute(
            "target",
            Attribute::required_float64().with_description("Target between 0 and 1, e.g. 0.99"),
        )
        .with_attribute("tags", string_list(AttributeFlags::optional()))
        .with_block(
            "rbac_tags",
            NestedBlock::list(
                Block::new()
                    .with_attribute("display_name", Attribute::required_string())
                    .with_attribute("id", Attribute::required_string()),
            ),
        )
        .with_block("entity", entity_block())
        .with_block("indicator", indicator_block())
        .with_block("time_window", time_window_block())
}

/// Pick the one configured block out of `kinds`.
fn exactly_one<'a, K: Copy>(
    reader: &ObjectReader<'a>,
    name: &str,
    kinds: &[(&str, K)],
) -> Result<(K, ObjectReader<'a>), ProviderError> {
    let block = reader
        .nested(name)?
        .ok_or_else(|| ProviderError::attribute(name, "a value is required"))?;
    let mut configured = Vec::new();
    for (block_name, kind) in kinds {
        if let Some(inner) = block.nested(block_name)? {
            configured.push((*kind, inner));
        }
    }
    if configured.len() != 1 {
        let names: Vec<&str> = kinds.iter().map(|(n, _)| *n).collect();
        return Err(ProviderError::attribute(
            name,
            format!("exactly one of {} must be configured", names.join(", ")),
        ));
    }
    Ok(configured.remove(0))
}

fn read_entity(reader: &ObjectReader<'_>) -> Result<SloEntity, ProviderError> {
    let (kind, block) = exactly_one(reader, "entity", ENTITY_KINDS)?;
    let mut entity = SloEntity::new(kind);
    match kind {
        "application" => {
            entity.application_id = block.optional("application_id")?;
            entity.boundary_scope = block.optional("boundary_scope")?;
            entity.service_id = block.optional("service_id")?;
            entity.endpoint_id = block.optional("endpoint_id")?;
            entity.include_internal = Some(block.optional("include_internal")?.unwrap_or(false));
            entity.include_synthetic = Some(block.optional("include_synthetic")?.unwrap_or(false));
            entity.tag_filter_expression = read_tag_filter(&block, "filter_expression")?;
        },
        "website" => {
            entity.website_id = block.optional("website_id")?;
            entity.beacon_type = block.optional("beacon_type")?;
            entity.tag_filter_expression = read_tag_filter(&block, "filter_expression")?;
        },
        "synthetic" => {
            let mut ids: Vec<String> = block.optional("synthetic_test_ids")?.unwrap_or_default();
            ids.sort();
            entity.synthetic_test_ids = ids;
            entity.tag_filter_expression = read_tag_filter(&block, "filter_expression")?;
        },
        _ => {
            entity.infra_type = block.optional("infra_type")?;
        },
    }
    Ok(entity)
}

fn read_indicator(reader: &ObjectReader<'_>) -> Result<SloIndicator, ProviderError> {
    let kinds: Vec<(&str, (&str, &str))> = INDICATOR_KINDS
        .iter()
        .map(|(block, blueprint, kind)| (*block, (*blueprint, *kind)))
        .collect();
    let ((blueprint, kind), block) = exactly_one(reader, "indicator", &kinds)?;
    let mut indicator = SloIndicator::new(blueprint, kind);
    indicator.threshold = block.optional("threshold")?;
    indicator.aggregation = block.optional("aggregation")?;
    indicator.operator = block.optional("operator")?;
    indicator.traffic_type = block.optional("traffic_type")?;
    indicator.good_events_filter = read_tag_filter(&block, "good_event_filter_expression")?;
    indicator.bad_events_filter = read_tag_filter(&block, "bad_event_filter_expression")?;
    Ok(indicator)
}

fn read_time_window(reader: &ObjectReader<'_>) -> Result<SloTimeWindow, ProviderError> {
    let kinds: Vec<(&str, &str)> = TIME_WINDOW_KINDS.iter().map(|k| (*k, *k)).collect();
    let (kind, block) = exactly_one(reader, "time_window", &kinds)?;
    Ok(SloTimeWindow {
        kind: kind.to_string(),
        duration: block.required("duration")?,
        duration_unit: block.required("duration_unit")?,
        timezone: block.optional("timezone")?,
        start_timestamp: block.optional("start_timestamp")?,
    })
}

/// The expression configured at `block.inner.name` of the plan.
fn planned_expression(
    plan: Option<&Value>,
    block: &str,
    inner: &str,
    name: &str,
) -> Result<Option<String>, ProviderError> {
    let Some(plan) = plan else {
        return Ok(None);
    };
    let reader = ObjectReader::new(plan)?;
    let Some(outer) = reader.nested(block)? else {
        return Ok(None);
    };
    match outer.nested(inner)? {
        Some(inner) => inner.optional(name),
        None => Ok(None),
    }
}

/// Write `selected` into its slot and null into every other one.
fn one_of_blocks<'a>(
    names: impl Iterator<Item = &'a str>,
    selected: &str,
    writer: ObjectWriter,
) -> ObjectWriter {
    let mut writer = Some(writer);
    names.fold(ObjectWriter::new(), |outer, name| {
        let block = if name == selected { writer.take() } else { None };
        outer.set_block(name, block)
    })
}

fn entity_state(entity: &SloEntity, plan: Option<&Value>) -> Result<ObjectWriter, ProviderError> {
    let block = entity.kind.as_str();
    let expression = |filter: Option<&TagFilter>| {
        tag_filter_state(filter, planned_expression(plan, "entity", block, "filter_expression")?)
    };
    let writer = match block {
        "application" => ObjectWriter::new()
            .set("application_id", entity.application_id.clone())
            .set("boundary_scope", entity.boundary_scope.clone())
            .set("service_id", entity.service_id.clone())
            .set("endpoint_id", entity.endpoint_id.clone())
            .set("include_internal", entity.include_internal.unwrap_or(false))
            .set("include_synthetic", entity.include_synthetic.unwrap_or(false))
            .set("filter_expression", expression(entity.tag_filter_expression.as_ref())?),
        "website" => ObjectWriter::new()
            .set("website_id", entity.website_id.clone())
            .set("beacon_type", entity.beacon_type.clone())
            .set("filter_expression", expression(entity.tag_filter_expression.as_ref())?),
        "synthetic" => {
            let mut ids = entity.synthetic_test_ids.clone();
            ids.sort();
            ObjectWriter::new()
                .set("synthetic_test_ids", ids)
                .set("filter_expression", expression(entity.tag_filter_expression.as_ref())?)
        },
        "infrastructure" => ObjectWriter::new().set("infra_type", entity.infra_type.clone()),
        other => {
            return Err(ProviderError::Validation(format!("unsupported SLO entity type {}", other)));
        },
    };
    Ok(one_of_blocks(ENTITY_KINDS.iter().map(|(n, _)| *n), block, writer))
}

fn indicator_state(indicator: &SloIndicator, plan: Option<&Value>) -> Result<ObjectWriter, ProviderError> {
    let Some((block, _, _)) = INDICATOR_KINDS
        .iter()
        .find(|(_, blueprint, kind)| *blueprint == indicator.blueprint && *kind == indicator.kind)
    else {
        return Err(ProviderError::Validation(format!(
            "unsupported SLO indicator {} {}",
            indicator.blueprint, indicator.kind
        )));
    };
    let expression = |name: &str, filter: Option<&TagFilter>| {
        tag_filter_state(filter, planned_expression(plan, "indicator", block, name)?)
    };
    let writer = match *block {
        "time_based_latency" | "time_based_availability" => ObjectWriter::new()
            .set("threshold", indicator.threshold)
            .set("aggregation", indicator.aggregation.clone()),
        "event_based_latency" => ObjectWriter::new().set("threshold", indicator.threshold),
        "traffic" => ObjectWriter::new()
            .set("traffic_type", indicator.traffic_type.clone())
            .set("threshold", indicator.threshold)
            .set("operator", indicator.operator.clone()),
        "custom" => ObjectWriter::new()
            .set(
                "good_event_filter_expression",
                expression("good_event_filter_expression", indicator.good_events_filter.as_ref())?,
            )
            .set(
                "bad_event_filter_expression",
                expression("bad_event_filter_expression", indicator.bad_events_filter.as_ref())?,
            ),
        _ => ObjectWriter::new(),
    };
    Ok(one_of_blocks(INDICATOR_KINDS.iter().map(|(n, _, _)| *n), block, writer))
}

fn time_window_state(window: &SloTimeWindow) -> ObjectWriter {
    let mut writer = ObjectWriter::new()
        .set("duration", window.duration)
        .set("duration_unit", window.duration_unit.clone())
        .set("timezone", window.timezone.clone());
    if window.kind == "fixed" {
        writer = writer.set("start_timestamp", window.start_timestamp);
    }
    one_of_blocks(TIME_WINDOW_KINDS.iter().copied(), &window.kind, writer)
}

impl ResourceHandle for SloConfigResource {
    type Object = SloConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<SloConfig>> {
        api.slo_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<SloConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;

        let target: f64 = reader.required("target")?;
        if !(target > 0.0 && target < 1.0) {
            return Err(ProviderError::attribute(
                "target",
                format!("target must be between 0 and 1 exclusive, got {}", target),
            ));
        }

        let rbac_tags = reader
            .nested_list("rbac_tags")?
            .iter()
            .map(|tag| {
                Ok(RbacTag {
                    display_name: tag.required("display_name")?,
                    id: tag.required("id")?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(SloConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            target,
            tags: reader.optional("tags")?.unwrap_or_default(),
            entity: read_entity(&reader)?,
            indicator: read_indicator(&reader)?,
            time_window: read_time_window(&reader)?,
            rbac_tags,
        })
    }

    fn update_state(&self, plan: Option<&Value>, config: &SloConfig) -> Result<Value, ProviderError> {
        let rbac_tags = config
            .rbac_tags
            .iter()
            .map(|tag| {
                ObjectWriter::new()
                    .set("display_name", tag.display_name.clone())
                    .set("id", tag.id.clone())
            })
            .collect();
        let tags = (!config.tags.is_empty()).then(|| config.tags.clone());

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("target", config.target)
            .set("tags", tags)
            .set_blocks("rbac_tags", rbac_tags)
            .set_block("entity", Some(entity_state(&config.entity, plan)?))
            .set_block("indicator", Some(indicator_state(&config.indicator, plan)?))
            .set_block("time_window", Some(time_window_state(&config.time_window)))
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "slo-1",
            "name": "checkout latency",
            "target": 0.99,
            "tags": ["shop"],
            "entity": {"application": {
                "application_id": "app-1",
                "boundary_scope": "INBOUND",
                "filter_expression": "call.http.path EQUALS '/checkout'"
            }},
            "indicator": {"time_based_latency": {"threshold": 250.0, "aggregation": "P90"}},
            "time_window": {"rolling": {"duration": 7, "duration_unit": "day"}}
        })
    }

    #[test]
    fn test_state_to_object() {
        let resource = SloConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert_eq!(config.entity.kind, "application");
        assert_eq!(config.entity.include_internal, Some(false));
        assert!(config.entity.tag_filter_expression.is_some());
        assert_eq!(config.indicator.blueprint, "latency");
        assert_eq!(config.indicator.kind, "timeBased");
        assert_eq!(config.indicator.threshold, Some(250.0));
        assert_eq!(config.time_window.kind, "rolling");
        assert_eq!(config.time_window.start_timestamp, None);
    }

    #[test]
    fn test_state_round_trip() {
        let resource = SloConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(
            state["entity"]["application"]["filter_expression"],
            plan["entity"]["application"]["filter_expression"]
        );
        assert_eq!(state["entity"]["website"], Value::Null);
        assert_eq!(state["indicator"]["traffic"], Value::Null);
        assert_eq!(state["time_window"]["fixed"], Value::Null);
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_custom_indicator_and_fixed_window() {
        let resource = SloConfigResource::new();
        let mut plan = plan();
        plan["indicator"] = json!({"custom": {
            "good_event_filter_expression": "call.erroneous EQUALS 'false'"
        }});
        plan["time_window"] = json!({"fixed": {
            "duration": 1, "duration_unit": "week", "start_timestamp": 1700000000000.0
        }});
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(config.indicator.blueprint, "custom");
        assert_eq!(config.indicator.kind, "eventBased");
        assert!(config.indicator.good_events_filter.is_some());
        assert!(config.indicator.bad_events_filter.is_none());
        assert_eq!(config.time_window.start_timestamp, Some(1700000000000.0));

        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(
            state["indicator"]["custom"]["good_event_filter_expression"],
            "call.erroneous EQUALS 'false'"
        );
    }

    #[test]
    fn test_exactly_one_indicator() {
        let resource = SloConfigResource::new();
        let mut plan = plan();
        plan["indicator"]["event_based_availability"] = json!({});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("indicator"));
    }

    #[test]
    fn test_target_out_of_range() {
        let resource = SloConfigResource::new();
        let mut plan = plan();
        plan["target"] = json!(1.5);
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("target"));
    }
}
