use serde_json::{json, Value};

use super::{id_attribute, read_tag_filter, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{MetricConfiguration, SliConfig, SliEntity, AGGREGATIONS};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, Validator};
use crate::tagfilter::TagFilter;
use crate::value::{ObjectReader, ObjectWriter};

const BEACON_TYPES: &[&str] = &["pageLoad", "resourceLoad", "httpRequest", "error", "custom", "pageChange"];

const BOUNDARY_SCOPES: &[&str] = &["ALL", "INBOUND"];

/// Entity blocks and the `sliType` each one stands for.
const ENTITY_KINDS: &[(&str, &str)] = &[
    ("application_time_based", "application"),
    ("application_event_based", "availability"),
    ("website_event_based", "websiteEventBased"),
    ("website_time_based", "websiteTimeBased"),
];

/// Smallest accepted metric threshold.
const MIN_THRESHOLD: f64 = 0.000001;

/// `instana_sli_config`: a service level indicator.
///
/// The API does not support updates, so every change replaces the indicator.
pub struct SliConfigResource {
    metadata: ResourceMetaData,
}

impl SliConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        let boundary_scope =
            || Attribute::required_string().with_validator(Validator::one_of(BOUNDARY_SCOPES));
        let beacon_type = || Attribute::required_string().with_validator(Validator::one_of(BEACON_TYPES));

        let application_time_based = Block::new()
            .with_attribute("application_id", Attribute::required_string())
            .with_attribute("service_id", Attribute::optional_string())
            .with_attribute("endpoint_id", Attribute::optional_string())
            .with_attribute("boundary_scope", boundary_scope());
        let application_event_based = Block::new()
            .with_attribute("application_id", Attribute::required_string())
            .with_attribute("service_id", Attribute::optional_string())
            .with_attribute("endpoint_id", Attribute::optional_string())
            .with_attribute("boundary_scope", boundary_scope())
            .with_attribute("bad_event_filter_expression", Attribute::tag_filter(AttributeFlags::required()))
            .with_attribute("good_event_filter_expression", Attribute::tag_filter(AttributeFlags::required()))
            .with_attribute("include_internal", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("include_synthetic", Attribute::optional_bool().with_default(json!(false)));
        let website_event_based = Block::new()
            .with_attribute("website_id", Attribute::required_string())
            .with_attribute("beacon_type", beacon_type())
            .with_attribute("bad_event_filter_expression", Attribute::tag_filter(AttributeFlags::required()))
            .with_attribute("good_event_filter_expression", Attribute::tag_filter(AttributeFlags::required()));
        let website_time_based = Block::new()
            .with_attribute("website_id", Attribute::required_string())
            .with_attribute("beacon_type", beacon_type())
            .with_attribute("filter_expression", Attribute::tag_filter(AttributeFlags::optional()));

        let schema = Schema::new(0)
            .with_description("SLI configuration of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::LengthBetween { min: 0, max: 256 }),
            )
            .with_attribute(
                "initial_evaluation_timestamp",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed()),
            )
            .with_block(
                "metric_configuration",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("metric_name", Attribute::required_string())
                        .with_attribute(
                            "aggregation",
                            Attribute::required_string().with_validator(Validator::one_of(AGGREGATIONS)),
                        )
                        .with_attribute("threshold", Attribute::required_float64()),
                ),
            )
            .with_block(
                "sli_entity",
                NestedBlock::single(
                    Block::new()
                        .with_block("application_time_based", NestedBlock::single(application_time_based))
                        .with_block("application_event_based", NestedBlock::single(application_event_based))
                        .with_block("website_event_based", NestedBlock::single(website_event_based))
                        .with_block("website_time_based", NestedBlock::single(website_time_based)),
                )
                .with_min_items(1),
            );

        Self {
            metadata: ResourceMetaData::new("sli_config", schema)
                .with_skip_id_generation()
                .create_only(),
        }
    }
}

impl Default for SliConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn read_entity(entity: &ObjectReader<'_>) -> Result<SliEntity, ProviderError> {
    let mut configured = Vec::new();
    for (block, sli_type) in ENTITY_KINDS {
        if let Some(reader) = entity.nested(block)? {
            configured.push((*sli_type, reader));
        }
    }
    if configured.len() != 1 {
        return Err(ProviderError::attribute(
            "sli_entity",
            format!("exactly one of {} must be configured", entity_block_names()),
        ));
    }
    let (sli_type, reader) = configured.remove(0);

    let mut result = SliEntity::new(sli_type);
    match sli_type {
        "application" | "availability" => {
            result.application_id = reader.optional("application_id")?;
            result.service_id = reader.optional("service_id")?;
            result.endpoint_id = reader.optional("endpoint_id")?;
            result.boundary_scope = reader.optional("boundary_scope")?;
            if sli_type == "availability" {
                result.bad_event_filter_expression = read_tag_filter(&reader, "bad_event_filter_expression")?;
                result.good_event_filter_expression = read_tag_filter(&reader, "good_event_filter_expression")?;
                result.include_internal = Some(reader.optional("include_internal")?.unwrap_or(false));
                result.include_synthetic = Some(reader.optional("include_synthetic")?.unwrap_or(false));
            }
        },
        _ => {
            result.website_id = reader.optional("website_id")?;
            result.beacon_type = reader.optional("beacon_type")?;
            if sli_type == "websiteEventBased" {
                result.bad_event_filter_expression = read_tag_filter(&reader, "bad_event_filter_expression")?;
                result.good_event_filter_expression = read_tag_filter(&reader, "good_event_filter_expression")?;
            } else {
                result.filter_expression = read_tag_filter(&reader, "filter_expression")?;
            }
        },
    }
    Ok(result)
}

fn entity_block_names() -> String {
    ENTITY_KINDS.iter().map(|(block, _)| *block).collect::<Vec<_>>().join(", ")
}

/// The configured expression of an entity block attribute, if any.
fn planned_expression(
    plan: Option<&Value>,
    block: &str,
    name: &str,
) -> Result<Option<String>, ProviderError> {
    let Some(plan) = plan else {
        return Ok(None);
    };
    let reader = ObjectReader::new(plan)?;
    let Some(entity) = reader.nested("sli_entity")? else {
        return Ok(None);
    };
    match entity.nested(block)? {
        Some(block) => block.optional(name),
        None => Ok(None),
    }
}

fn entity_state(entity: &SliEntity, plan: Option<&Value>) -> Result<ObjectWriter, ProviderError> {
    let Some((block, _)) = ENTITY_KINDS.iter().find(|(_, kind)| *kind == entity.sli_type) else {
        return Err(ProviderError::Validation(format!(
            "unsupported SLI entity type {}",
            entity.sli_type
        )));
    };
    let expression = |name: &str, filter: Option<&TagFilter>| {
        tag_filter_state(filter, planned_expression(plan, block, name)?)
    };

    let writer = match entity.sli_type.as_str() {
        "application" => ObjectWriter::new()
            .set("application_id", entity.application_id.clone())
            .set("service_id", entity.service_id.clone())
            .set("endpoint_id", entity.endpoint_id.clone())
            .set("boundary_scope", entity.boundary_scope.clone()),
        "availability" => ObjectWriter::new()
            .set("application_id", entity.application_id.clone())
            .set("service_id", entity.service_id.clone())
            .set("endpoint_id", entity.endpoint_id.clone())
            .set("boundary_scope", entity.boundary_scope.clone())
            .set(
                "bad_event_filter_expression",
                expression("bad_event_filter_expression", entity.bad_event_filter_expression.as_ref())?,
            )
            .set(
                "good_event_filter_expression",
                expression("good_event_filter_expression", entity.good_event_filter_expression.as_ref())?,
            )
            .set("include_internal", entity.include_internal.unwrap_or(false))
            .set("include_synthetic", entity.include_synthetic.unwrap_or(false)),
        "websiteEventBased" => ObjectWriter::new()
            .set("website_id", entity.website_id.clone())
            .set("beacon_type", entity.beacon_type.clone())
            .set(
                "bad_event_filter_expression",
                expression("bad_event_filter_expression", entity.bad_event_filter_expression.as_ref())?,
            )
            .set(
                "good_event_filter_expression",
                expression("good_event_filter_expression", entity.good_event_filter_expression.as_ref())?,
            ),
        _ => ObjectWriter::new()
            .set("website_id", entity.website_id.clone())
            .set("beacon_type", entity.beacon_type.clone())
            .set(
                "filter_expression",
                expression("filter_expression", entity.filter_expression.as_ref())?,
            ),
    };

    let entity_writer = ENTITY_KINDS
        .iter()
        .filter(|(name, _)| name != block)
        .fold(ObjectWriter::new(), |w, (name, _)| w.set_block(name, None));
    Ok(entity_writer.set_block(block, Some(writer)))
}

impl ResourceHandle for SliConfigResource {
    type Object = SliConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<SliConfig>> {
        api.sli_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<SliConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let metric_configuration = match reader.nested("metric_configuration")? {
            Some(metric) => {
                let threshold: f64 = metric.required("threshold")?;
                if threshold < MIN_THRESHOLD {
                    return Err(ProviderError::attribute(
                        metric.path("threshold"),
                        format!("threshold must be at least {}", MIN_THRESHOLD),
                    ));
                }
                Some(MetricConfiguration {
                    metric_name: metric.required("metric_name")?,
                    aggregation: metric.required("aggregation")?,
                    threshold,
                })
            },
            None => None,
        };
        let sli_entity = match reader.nested("sli_entity")? {
            Some(entity) => read_entity(&entity)?,
            None => {
                return Err(ProviderError::attribute("sli_entity", "an SLI entity is required"));
            },
        };

        Ok(SliConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            sli_name: reader.optional("name")?.unwrap_or_default(),
            initial_evaluation_timestamp: reader.optional("initial_evaluation_timestamp")?,
            metric_configuration,
            sli_entity,
        })
    }

    fn update_state(&self, plan: Option<&Value>, sli: &SliConfig) -> Result<Value, ProviderError> {
        let metric = sli.metric_configuration.as_ref().map(|metric| {
            ObjectWriter::new()
                .set("metric_name", metric.metric_name.clone())
                .set("aggregation", metric.aggregation.clone())
                .set("threshold", metric.threshold)
        });

        Ok(ObjectWriter::new()
            .set("id", sli.id.clone())
            .set("name", sli.sli_name.clone())
            .set(
                "initial_evaluation_timestamp",
                sli.initial_evaluation_timestamp.unwrap_or(0),
            )
            .set_block("metric_configuration", metric)
            .set_block("sli_entity", Some(entity_state(&sli.sli_entity, plan)?))
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_application_time_based() {
        let resource = SliConfigResource::new();
        assert!(resource.metadata().create_only);
        let plan = json!({
            "name": "latency",
            "metric_configuration": {"metric_name": "latency", "aggregation": "P90", "threshold": 200.0},
            "sli_entity": {"application_time_based": {"application_id": "app", "boundary_scope": "ALL"}}
        });
        let sli = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(sli.sli_entity.sli_type, "application");
        assert_eq!(sli.sli_entity.application_id.as_deref(), Some("app"));
        assert!(sli.sli_entity.include_internal.is_none());

        let state = resource.update_state(Some(&plan), &sli).unwrap();
        assert_eq!(state["initial_evaluation_timestamp"], 0);
        assert_eq!(state["sli_entity"]["application_time_based"]["boundary_scope"], "ALL");
        assert_eq!(state["sli_entity"]["website_time_based"], Value::Null);
    }

    #[test]
    fn test_event_based_filters_keep_configuration() {
        let resource = SliConfigResource::new();
        let plan = json!({
            "name": "errors",
            "sli_entity": {"website_event_based": {
                "website_id": "web",
                "beacon_type": "httpRequest",
                "bad_event_filter_expression": "beacon.http.status EQUALS '500'",
                "good_event_filter_expression": "beacon.http.status EQUALS '200'"
            }}
        });
        let sli = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(sli.sli_entity.sli_type, "websiteEventBased");
        assert!(sli.sli_entity.bad_event_filter_expression.is_some());

        let state = resource.update_state(Some(&plan), &sli).unwrap();
        assert_eq!(
            state["sli_entity"]["website_event_based"]["good_event_filter_expression"],
            "beacon.http.status EQUALS '200'"
        );
    }

    #[test]
    fn test_entity_is_exclusive() {
        let resource = SliConfigResource::new();
        let plan = json!({
            "name": "both",
            "sli_entity": {
                "application_time_based": {"application_id": "a", "boundary_scope": "ALL"},
                "website_time_based": {"website_id": "w", "beacon_type": "pageLoad"}
            }
        });
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("sli_entity"));
    }

    #[test]
    fn test_threshold_minimum() {
        let resource = SliConfigResource::new();
        let plan = json!({
            "name": "latency",
            "metric_configuration": {"metric_name": "latency", "aggregation": "SUM", "threshold": 0.0},
            "sli_entity": {"website_time_based": {"website_id": "w", "beacon_type": "pageLoad"}}
        });
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("metric_configuration.threshold"));
    }
}
