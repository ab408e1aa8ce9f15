use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::alert_common::{
    alert_channels_block, alert_channels_state, custom_payload_field_block,
    custom_payload_field_blocks, read_alert_channels, read_custom_payload_fields, read_severity,
    read_thresholds, read_time_threshold, severity_attribute, severity_state, threshold_block,
    thresholds_state, time_threshold_block, time_threshold_state,
};
use super::{id_attribute, planned, read_tag_filter, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, unchanged_state, ResourceHandle, ResourceMetaData, StateUpgrader};
use crate::restapi::models::{
    ApplicationAlertConfig, ApplicationAlertRule, IncludedApplication, IncludedEndpoint,
    IncludedService, RuleWithThreshold, BOUNDARY_SCOPES, GRANULARITIES, THRESHOLD_OPERATORS,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const EVALUATION_TYPES: &[&str] = &["PER_AP", "PER_AP_SERVICE", "PER_AP_ENDPOINT"];
const DEFAULT_GRANULARITY: i64 = 600_000;

/// Rule blocks and the alert type each of them selects.
const RULE_KINDS: &[(&str, &str)] = &[
    ("error_rate", "errorRate"),
    ("errors", "errors"),
    ("logs", "logs"),
    ("slowness", "slowness"),
    ("status_code", "statusCode"),
    ("throughput", "throughput"),
];

/// `instana_application_alert_config` and `instana_global_application_alert_config`.
///
/// Both share the schema; they differ in the endpoint they are stored at.
pub struct ApplicationAlertConfigResource {
    metadata: ResourceMetaData,
    global: bool,
}

impl ApplicationAlertConfigResource {
    /// Smart alerts of application perspectives.
    pub fn new() -> Self {
        Self::with_name("application_alert_config", false)
    }

    /// Smart alerts spanning all application perspectives.
    pub fn global() -> Self {
        Self::with_name("global_application_alert_config", true)
    }

    fn with_name(resource_name: &'static str, global: bool) -> Self {
        Self {
            metadata: ResourceMetaData::new(resource_name, schema()),
            global,
        }
    }
}

impl Default for ApplicationAlertConfigResource {
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
    Block::new()
        .with_block("error_rate", NestedBlock::single(metric()))
        .with_block("errors", NestedBlock::single(metric()))
        .with_block(
            "logs",
            NestedBlock::single(
                metric()
                    .with_attribute("level", Attribute::required_string())
                    .with_attribute("message", Attribute::optional_string())
                    .with_attribute("operator", Attribute::required_string()),
            ),
        )
        .with_block("slowness", NestedBlock::single(metric()))
        .with_block(
            "status_code",
            NestedBlock::single(
                metric()
                    .with_attribute("status_code_start", Attribute::optional_int64())
                    .with_attribute("status_code_end", Attribute::optional_int64()),
            ),
        )
        .with_block("throughput", NestedBlock::single(metric()))
}

fn schema() -> Schema {
    let endpoint = Block::new()
        .with_attribute("endpoint_id", Attribute::required_string())
        .with_attribute("inclusive", Attribute::required_bool());
    let service = Block::new()
        .with_attribute("service_id", Attribute::required_string())
        .with_attribute("inclusive", Attribute::required_bool())
        .with_block("endpoint", NestedBlock::set(endpoint));
    let application = Block::new()
        .with_attribute("application_id", Attribute::required_string())
        .with_attribute("inclusive", Attribute::required_bool())
        .with_block("service", NestedBlock::set(service));

    Schema::new(1)
        .with_description("Smart alert on application metrics")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_validator(Validator::LengthBetween { min: 1, max: 256 }),
        )
        .with_attribute(
            "description",
            Attribute::required_string()
                .with_validator(Validator::LengthBetween { min: 0, max: 65536 }),
        )
        .with_attribute(
            "boundary_scope",
            Attribute::required_string().with_validator(Validator::one_of(BOUNDARY_SCOPES)),
        )
        .with_attribute(
            "evaluation_type",
            Attribute::required_string().with_validator(Validator::one_of(EVALUATION_TYPES)),
        )
        .with_attribute(
            "granularity",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_GRANULARITY))
                .with_description("Evaluation granularity in milliseconds"),
        )
        .with_attribute("grace_period", Attribute::optional_int64())
        .with_attribute(
            "include_internal",
            Attribute::optional_bool().with_default(json!(false)),
        )
        .with_attribute(
            "include_synthetic",
            Attribute::optional_bool().with_default(json!(false)),
        )
        .with_attribute("severity", severity_attribute())
        .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::optional()))
        .with_attribute(
            "triggering",
            Attribute::optional_bool().with_default(json!(false)),
        )
        .with_block("alert_channels", alert_channels_block())
        .with_block("application", NestedBlock::set(application).with_min_items(1))
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

fn read_applications(
    reader: &ObjectReader<'_>,
) -> Result<BTreeMap<String, IncludedApplication>, ProviderError> {
    let mut applications = BTreeMap::new();
    for application in reader.nested_list("application")? {
        let mut services = BTreeMap::new();
        for service in application.nested_list("service")? {
            let mut endpoints = BTreeMap::new();
            for endpoint in service.nested_list("endpoint")? {
                let endpoint_id: String = endpoint.required("endpoint_id")?;
                endpoints.insert(
                    endpoint_id.clone(),
                    IncludedEndpoint {
                        endpoint_id,
                        inclusive: endpoint.required("inclusive")?,
                    },
                );
            }
            let service_id: String = service.required("service_id")?;
            services.insert(
                service_id.clone(),
                IncludedService {
                    service_id,
                    inclusive: service.required("inclusive")?,
                    endpoints,
                },
            );
        }
        let application_id: String = application.required("application_id")?;
        applications.insert(
            application_id.clone(),
            IncludedApplication {
                application_id,
                inclusive: application.required("inclusive")?,
                services,
            },
        );
    }
    Ok(applications)
}

fn application_blocks(applications: &BTreeMap<String, IncludedApplication>) -> Vec<ObjectWriter> {
    applications
        .values()
        .map(|application| {
            let services = application
                .services
                .values()
                .map(|service| {
                    let endpoints = service
                        .endpoints
                        .values()
                        .map(|endpoint| {
                            ObjectWriter::new()
                                .set("endpoint_id", endpoint.endpoint_id.clone())
                                .set("inclusive", endpoint.inclusive)
                        })
                        .collect();
                    ObjectWriter::new()
                        .set("service_id", service.service_id.clone())
                        .set("inclusive", service.inclusive)
                        .set_blocks("endpoint", endpoints)
                })
                .collect();
            ObjectWriter::new()
                .set("application_id", application.application_id.clone())
                .set("inclusive", application.inclusive)
                .set_blocks("service", services)
        })
        .collect()
}

fn read_rule(reader: &ObjectReader<'_>) -> Result<ApplicationAlertRule, ProviderError> {
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
    Ok(ApplicationAlertRule {
        alert_type: alert_type.to_string(),
        metric_name: metric.required("metric_name")?,
        aggregation: metric.optional("aggregation")?,
        status_code_start: metric.optional("status_code_start")?,
        status_code_end: metric.optional("status_code_end")?,
        level: metric.optional("level")?,
        message: metric.optional("message")?,
        operator: metric.optional("operator")?,
    })
}

fn rule_state(rule: &ApplicationAlertRule) -> ObjectWriter {
    let mut writer = ObjectWriter::new();
    for (block_name, alert_type) in RULE_KINDS {
        let block = (rule.alert_type == *alert_type).then(|| {
            let metric = ObjectWriter::new()
                .set("metric_name", rule.metric_name.clone())
                .set("aggregation", rule.aggregation.clone());
            match *block_name {
                "logs" => metric
                    .set("level", rule.level.clone())
                    .set("message", rule.message.clone())
                    .set("operator", rule.operator.clone()),
                "status_code" => metric
                    .set("status_code_start", rule.status_code_start)
                    .set("status_code_end", rule.status_code_end),
                _ => metric,
            }
        });
        writer = writer.set_block(block_name, block);
    }
    writer
}

impl ResourceHandle for ApplicationAlertConfigResource {
    type Object = ApplicationAlertConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<ApplicationAlertConfig>> {
        if self.global {
            api.global_application_alert_configs()
        } else {
            api.application_alert_configs()
        }
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<ApplicationAlertConfig, ProviderError> {
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
                Ok(RuleWithThreshold {
                    threshold_operator: rule.required("threshold_operator")?,
                    rule: read_rule(rule)?,
                    thresholds: read_thresholds(rule, "threshold")?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(ApplicationAlertConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            severity: read_severity(&reader, "severity")?,
            triggering: reader.optional("triggering")?.unwrap_or(false),
            applications: read_applications(&reader)?,
            boundary_scope: reader.optional("boundary_scope")?.unwrap_or_default(),
            tag_filter_expression: read_tag_filter(&reader, "tag_filter")?,
            include_internal: reader.optional("include_internal")?.unwrap_or(false),
            include_synthetic: reader.optional("include_synthetic")?.unwrap_or(false),
            evaluation_type: reader.optional("evaluation_type")?.unwrap_or_default(),
            alert_channels: read_alert_channels(&reader, "alert_channels")?,
            granularity,
            grace_period: reader.optional("grace_period")?,
            custom_payload_fields: read_custom_payload_fields(&reader, "custom_payload_field")?,
            rules,
            time_threshold: read_time_threshold(&reader, "time_threshold")?,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        config: &ApplicationAlertConfig,
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

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("description", config.description.clone())
            .set("boundary_scope", config.boundary_scope.clone())
            .set("evaluation_type", config.evaluation_type.clone())
            .set("granularity", config.granularity)
            .set("grace_period", config.grace_period)
            .set("include_internal", config.include_internal)
            .set("include_synthetic", config.include_synthetic)
            .set("severity", severity_state(config.severity)?)
            .set(
                "tag_filter",
                tag_filter_state(
                    config.tag_filter_expression.as_ref(),
                    planned(plan, "tag_filter")?,
                )?,
            )
            .set("triggering", config.triggering)
            .set_block("alert_channels", alert_channels_state(&config.alert_channels))
            .set_blocks("application", application_blocks(&config.applications))
            .set_blocks(
                "custom_payload_field",
                custom_payload_field_blocks(&config.custom_payload_fields),
            )
            .set_blocks("rules", rules)
            .set_block("time_threshold", Some(time_threshold_state(&config.time_threshold)))
            .into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([(0, unchanged_state as StateUpgrader)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "alert-1",
            "name": "checkout errors",
            "description": "too many errors",
            "boundary_scope": "INBOUND",
            "evaluation_type": "PER_AP_SERVICE",
            "granularity": 600000,
            "severity": "warning",
            "tag_filter": "call.type EQUALS 'HTTP'",
            "application": [{
                "application_id": "app-1",
                "inclusive": true,
                "service": [{
                    "service_id": "svc-1",
                    "inclusive": true,
                    "endpoint": [{"endpoint_id": "ep-1", "inclusive": false}]
                }]
            }],
            "alert_channels": {"warning": ["ch-1"]},
            "rules": [{
                "threshold_operator": ">",
                "rule": {"status_code": {"metric_name": "calls", "aggregation": "SUM", "status_code_start": 500}},
                "threshold": {"warning": {"static": {"value": 10.0}}}
            }],
            "time_threshold": {"violations_in_sequence": {"time_window": 600000}}
        })
    }

    #[test]
    fn test_state_to_object() {
        let resource = ApplicationAlertConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert_eq!(config.severity, Some(5));
        assert_eq!(config.rules[0].rule.alert_type, "statusCode");
        assert_eq!(config.rules[0].rule.status_code_start, Some(500));
        assert_eq!(config.rules[0].thresholds["WARNING"].value, Some(10.0));
        let service = &config.applications["app-1"].services["svc-1"];
        assert!(!service.endpoints["ep-1"].inclusive);
        assert_eq!(config.alert_channels["WARNING"], vec!["ch-1".to_string()]);
        assert_eq!(config.time_threshold.kind, "violationsInSequence");
    }

    #[test]
    fn test_state_round_trip() {
        let resource = ApplicationAlertConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(config, again);
        assert_eq!(state["tag_filter"], plan["tag_filter"]);
        assert_eq!(state["rules"][0]["rule"]["errors"], Value::Null);
    }

    #[test]
    fn test_unsupported_granularity() {
        let resource = ApplicationAlertConfigResource::new();
        let mut plan = plan();
        plan["granularity"] = json!(1000);
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("granularity"));
    }

    #[test]
    fn test_rule_needs_exactly_one_type() {
        let resource = ApplicationAlertConfigResource::new();
        let mut plan = plan();
        plan["rules"][0]["rule"] = json!({
            "errors": {"metric_name": "errors"},
            "throughput": {"metric_name": "calls"}
        });
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("rules.0.rule"));
    }

    #[test]
    fn test_global_variant() {
        let resource = ApplicationAlertConfigResource::global();
        assert_eq!(resource.metadata().type_name(), "instana_global_application_alert_config");
        assert!(resource.global);
    }
}
