use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{id_attribute, string_list, string_map, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{ApiTag, SyntheticTest, SyntheticTestConfig};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const PLAYBACK_MODES: &[&str] = &["Simultaneous", "Staggered"];
const OPERATIONS: &[&str] = &["GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "DELETE"];
const SCRIPT_TYPES: &[&str] = &["Basic", "Jest"];
const DEFAULT_FREQUENCY: i64 = 15;

/// Test type blocks and the `syntheticType` each one stands for.
const TEST_KINDS: &[(&str, &str)] = &[
    ("http_action", "HTTPAction"),
    ("http_script", "HTTPScript"),
    ("ssl_certificate", "SSLCertificate"),
];

/// `instana_synthetic_test`: a check run periodically from synthetic locations.
pub struct SyntheticTestResource {
    metadata: ResourceMetaData,
}

impl SyntheticTestResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self {
            metadata: ResourceMetaData::new("synthetic_test", schema()),
        }
    }
}

impl Default for SyntheticTestResource {
    fn default() -> Self {
        Self::new()
    }
}

fn common(block: Block) -> Block {
    block
        .with_attribute(
            "mark_synthetic_call",
            Attribute::optional_bool().with_default(json!(false)),
        )
        .with_attribute(
            "retries",
            Attribute::optional_int64()
                .with_default(json!(0))
                .with_validator(Validator::IntBetween { min: 0, max: 2 }),
        )
        .with_attribute(
            "retry_interval",
            Attribute::optional_int64()
                .with_default(json!(1))
                .with_validator(Validator::IntBetween { min: 1, max: 10 }),
        )
        .with_attribute(
            "timeout",
            Attribute::optional_string().with_description("Timeout such as 30s or 2m"),
        )
}

fn schema() -> Schema {
    let http_action = common(Block::new())
        .with_attribute("url", Attribute::required_string())
        .with_attribute(
            "operation",
            Attribute::optional_string()
                .with_default(json!("GET"))
                .with_validator(Validator::one_of(OPERATIONS)),
        )
        .with_attribute("headers", string_map(AttributeFlags::optional()))
        .with_attribute("body", Attribute::optional_string())
        .with_attribute("validation_string", Attribute::optional_string())
        .with_attribute("follow_redirect", Attribute::optional_bool())
        .with_attribute("allow_insecure", Attribute::optional_bool())
        .with_attribute("expect_status", Attribute::optional_int64())
        .with_attribute("expect_match", Attribute::optional_string())
        .with_attribute("expect_exists", string_list(AttributeFlags::optional()))
        .with_attribute("expect_not_empty", string_list(AttributeFlags::optional()));
    let http_script = common(Block::new())
        .with_attribute("script", Attribute::required_string())
        .with_attribute(
            "script_type",
            Attribute::optional_string().with_validator(Validator::one_of(SCRIPT_TYPES)),
        )
        .with_attribute("file_name", Attribute::optional_string());
    let ssl_certificate = common(Block::new())
        .with_attribute("hostname", Attribute::required_string())
        .with_attribute(
            "port",
            Attribute::optional_int64()
                .with_default(json!(443))
                .with_validator(Validator::IntBetween { min: 1, max: 65535 }),
        )
        .with_attribute(
            "days_remaining_check",
            Attribute::required_int64().with_validator(Validator::IntBetween { min: 1, max: 365 }),
        )
        .with_attribute(
            "accept_self_signed_certificate",
            Attribute::optional_bool().with_default(json!(false)),
        );

    Schema::v0()
        .with_description("Synthetic test of Instana")
        .with_attribute("id", id_attribute())
        .with_attribute(
            "label",
            Attribute::required_string().with_validator(Validator::LengthBetween { min: 0, max: 128 }),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_validator(Validator::LengthBetween { min: 0, max: 512 }),
        )
        .with_attribute("active", Attribute::optional_bool().with_default(json!(true)))
        .with_attribute("application_id", Attribute::optional_string())
        .with_attribute("applications", string_set(AttributeFlags::optional()))
        .with_attribute("mobile_apps", string_set(AttributeFlags::optional()))
        .with_attribute("websites", string_set(AttributeFlags::optional()))
        .with_attribute("custom_properties", string_map(AttributeFlags::optional()))
        .with_attribute("locations", string_set(AttributeFlags::required()))
        .with_attribute(
            "playback_mode",
            Attribute::optional_string()
                .with_default(json!(PLAYBACK_MODES[0]))
                .with_validator(Validator::one_of(PLAYBACK_MODES)),
        )
        .with_attribute(
            "test_frequency",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional())
                .with_default(json!(DEFAULT_FREQUENCY))
                .with_validator(Validator::IntBetween { min: 1, max: 1440 })
                .with_description("Minutes between two runs"),
        )
        .with_block(
            "rbac_tags",
            NestedBlock::set(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("value", Attribute::required_string()),
            ),
        )
        .with_block("http_action", NestedBlock::single(http_action))
        .with_block("http_script", NestedBlock::single(http_script))
        .with_block("ssl_certificate", NestedBlock::single(ssl_certificate))
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

fn read_configuration(reader: &ObjectReader<'_>) -> Result<SyntheticTestConfig, ProviderError> {
    let mut configured = Vec::new();
    for (block_name, synthetic_type) in TEST_KINDS {
        if let Some(block) = reader.nested(block_name)? {
            configured.push((*synthetic_type, block));
        }
    }
    if configured.len() != 1 {
        let names: Vec<&str> = TEST_KINDS.iter().map(|(n, _)| *n).collect();
        return Err(ProviderError::attribute(
            "http_action",
            format!("exactly one of {} must be configured", names.join(", ")),
        ));
    }
    let (synthetic_type, block) = configured.remove(0);

    let mut config = SyntheticTestConfig {
        synthetic_type: synthetic_type.to_string(),
        mark_synthetic_call: block.optional("mark_synthetic_call")?.unwrap_or(false),
        retries: Some(block.optional("retries")?.unwrap_or(0)),
        retry_interval: Some(block.optional("retry_interval")?.unwrap_or(1)),
        timeout: block.optional("timeout")?,
        ..SyntheticTestConfig::default()
    };
    match synthetic_type {
        "HTTPAction" => {
            config.url = block.optional("url")?;
            config.operation = Some(block.optional("operation")?.unwrap_or_else(|| "GET".to_string()));
            config.headers = block.optional("headers")?.unwrap_or_default();
            config.body = block.optional("body")?;
            config.validation_string = block.optional("validation_string")?;
            config.follow_redirect = block.optional("follow_redirect")?;
            config.allow_insecure = block.optional("allow_insecure")?;
            config.expect_status = block.optional("expect_status")?;
            config.expect_match = block.optional("expect_match")?;
            config.expect_exists = block.optional("expect_exists")?.unwrap_or_default();
            config.expect_not_empty = block.optional("expect_not_empty")?.unwrap_or_default();
        },
        "HTTPScript" => {
            config.script = block.optional("script")?;
            config.script_type = block.optional("script_type")?;
            config.file_name = block.optional("file_name")?;
        },
        _ => {
            config.hostname = block.optional("hostname")?;
            config.port = Some(block.optional("port")?.unwrap_or(443));
            config.days_remaining_check = block.optional("days_remaining_check")?;
            config.accept_self_signed_cert =
                Some(block.optional("accept_self_signed_certificate")?.unwrap_or(false));
        },
    }
    Ok(config)
}

fn configuration_state(config: &SyntheticTestConfig) -> Result<ObjectWriter, ProviderError> {
    let Some((selected, _)) = TEST_KINDS.iter().find(|(_, t)| *t == config.synthetic_type) else {
        return Err(ProviderError::Validation(format!(
            "unsupported synthetic test type {}",
            config.synthetic_type
        )));
    };
    let common = ObjectWriter::new()
        .set("mark_synthetic_call", config.mark_synthetic_call)
        .set("retries", config.retries)
        .set("retry_interval", config.retry_interval)
        .set("timeout", config.timeout.clone());
    let block = match *selected {
        "http_action" => common
            .set("url", config.url.clone())
            .set("operation", config.operation.clone())
            .set("headers", (!config.headers.is_empty()).then(|| json!(config.headers)))
            .set("body", config.body.clone())
            .set("validation_string", config.validation_string.clone())
            .set("follow_redirect", config.follow_redirect)
            .set("allow_insecure", config.allow_insecure)
            .set("expect_status", config.expect_status)
            .set("expect_match", config.expect_match.clone())
            .set("expect_exists", (!config.expect_exists.is_empty()).then(|| config.expect_exists.clone()))
            .set(
                "expect_not_empty",
                (!config.expect_not_empty.is_empty()).then(|| config.expect_not_empty.clone()),
            ),
        "http_script" => common
            .set("script", config.script.clone())
            .set("script_type", config.script_type.clone())
            .set("file_name", config.file_name.clone()),
        _ => common
            .set("hostname", config.hostname.clone())
            .set("port", config.port)
            .set("days_remaining_check", config.days_remaining_check)
            .set("accept_self_signed_certificate", config.accept_self_signed_cert),
    };

    let mut block = Some(block);
    Ok(TEST_KINDS.iter().fold(ObjectWriter::new(), |writer, (name, _)| {
        let value = if name == selected { block.take() } else { None };
        writer.set_block(name, value)
    }))
}

impl ResourceHandle for SyntheticTestResource {
    type Object = SyntheticTest;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<SyntheticTest>> {
        api.synthetic_tests()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<SyntheticTest, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;

        let rbac_tags = reader
            .nested_list("rbac_tags")?
            .iter()
            .map(|tag| {
                Ok(ApiTag {
                    name: tag.required("name")?,
                    value: tag.required("value")?,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(SyntheticTest {
            id: reader.optional("id")?.unwrap_or_default(),
            label: reader.optional("label")?.unwrap_or_default(),
            description: reader.optional::<String>("description")?.filter(|d| !d.is_empty()),
            active: reader.optional("active")?.unwrap_or(true),
            application_id: reader.optional("application_id")?,
            applications: sorted(reader.optional("applications")?.unwrap_or_default()),
            mobile_apps: sorted(reader.optional("mobile_apps")?.unwrap_or_default()),
            websites: sorted(reader.optional("websites")?.unwrap_or_default()),
            configuration: read_configuration(&reader)?,
            custom_properties: reader
                .optional::<BTreeMap<String, String>>("custom_properties")?
                .unwrap_or_default(),
            locations: sorted(reader.optional("locations")?.unwrap_or_default()),
            playback_mode: reader
                .optional("playback_mode")?
                .unwrap_or_else(|| PLAYBACK_MODES[0].to_string()),
            test_frequency: Some(reader.optional("test_frequency")?.unwrap_or(DEFAULT_FREQUENCY as i32)),
            rbac_tags,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, test: &SyntheticTest) -> Result<Value, ProviderError> {
        let non_empty = |values: &[String]| (!values.is_empty()).then(|| sorted(values.to_vec()));
        let rbac_tags = test
            .rbac_tags
            .iter()
            .map(|tag| {
                ObjectWriter::new()
                    .set("name", tag.name.clone())
                    .set("value", tag.value.clone())
            })
            .collect();

        let writer = ObjectWriter::new()
            .set("id", test.id.clone())
            .set("label", test.label.clone())
            .set("description", test.description.clone())
            .set("active", test.active)
            .set("application_id", test.application_id.clone())
            .set("applications", non_empty(&test.applications))
            .set("mobile_apps", non_empty(&test.mobile_apps))
            .set("websites", non_empty(&test.websites))
            .set(
                "custom_properties",
                (!test.custom_properties.is_empty()).then(|| json!(test.custom_properties)),
            )
            .set("locations", sorted(test.locations.clone()))
            .set("playback_mode", test.playback_mode.clone())
            .set("test_frequency", test.test_frequency)
            .set_blocks("rbac_tags", rbac_tags);

        let mut state = writer.into_value();
        if let (Value::Object(state), Value::Object(blocks)) =
            (&mut state, configuration_state(&test.configuration)?.into_value())
        {
            state.extend(blocks);
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "test-1",
            "label": "shop health",
            "locations": ["loc-2", "loc-1"],
            "custom_properties": {"team": "shop"},
            "http_action": {
                "url": "https://shop.example.com/health",
                "operation": "GET",
                "headers": {"accept": "application/json"},
                "expect_status": 200,
                "retries": 1
            }
        })
    }

    #[test]
    fn test_http_action() {
        let resource = SyntheticTestResource::new();
        let test = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert!(test.active);
        assert_eq!(test.playback_mode, "Simultaneous");
        assert_eq!(test.test_frequency, Some(15));
        assert_eq!(test.locations, vec!["loc-1", "loc-2"]);
        let config = &test.configuration;
        assert_eq!(config.synthetic_type, "HTTPAction");
        assert_eq!(config.retries, Some(1));
        assert_eq!(config.retry_interval, Some(1));
        assert_eq!(config.headers["accept"], "application/json");
        assert_eq!(config.expect_status, Some(200));
        assert!(config.script.is_none());
    }

    #[test]
    fn test_state_round_trip() {
        let resource = SyntheticTestResource::new();
        let plan = plan();
        let test = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &test).unwrap();
        assert_eq!(state["http_script"], Value::Null);
        assert_eq!(state["http_action"]["headers"]["accept"], "application/json");
        assert_eq!(state["custom_properties"]["team"], "shop");
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(test, again);
    }

    #[test]
    fn test_ssl_certificate() {
        let resource = SyntheticTestResource::new();
        let mut plan = plan();
        plan.as_object_mut().unwrap().remove("http_action");
        plan["ssl_certificate"] = json!({"hostname": "shop.example.com", "days_remaining_check": 30});
        let test = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let config = &test.configuration;
        assert_eq!(config.synthetic_type, "SSLCertificate");
        assert_eq!(config.port, Some(443));
        assert_eq!(config.accept_self_signed_cert, Some(false));
        assert!(config.url.is_none());

        let value = serde_json::to_value(config).unwrap();
        assert_eq!(value["acceptSelfSignedCertificate"], json!(false));
    }

    #[test]
    fn test_exactly_one_test_type() {
        let resource = SyntheticTestResource::new();
        let mut plan = plan();
        plan["http_script"] = json!({"script": "console.log('hi')"});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("http_action"));
    }
}
