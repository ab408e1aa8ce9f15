use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use super::{id_attribute, string_list, string_map};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{AutomationAction, AutomationField, AutomationInputParameter};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const SCRIPT: &str = "SCRIPT";
const HTTP: &str = "HTTP";
const MANUAL: &str = "MANUAL";
const DOC_LINK: &str = "DOC_LINK";

const ASCII: &str = "ascii";
const BASE64: &str = "base64";

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD"];
const PARAMETER_TYPES: &[&str] = &["static", "dynamic", "vault"];

/// `instana_automation_action`: a script, HTTP call, runbook or link run
/// by the automation framework.
pub struct AutomationActionResource {
    metadata: ResourceMetaData,
}

impl AutomationActionResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(0)
            .with_description("Automation action of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("tags", string_list(AttributeFlags::optional()))
            .with_block(
                "script",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("content", Attribute::required_string())
                        .with_attribute("interpreter", Attribute::optional_string())
                        .with_attribute(
                            "timeout",
                            Attribute::optional_string()
                                .with_description("Timeout of the execution in seconds"),
                        )
                        .with_attribute("source", Attribute::optional_string()),
                ),
            )
            .with_block(
                "http",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("host", Attribute::required_string())
                        .with_attribute(
                            "method",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(HTTP_METHODS)),
                        )
                        .with_attribute("body", Attribute::optional_string())
                        .with_attribute("headers", string_map(AttributeFlags::optional()))
                        .with_attribute("ignore_certificate_errors", Attribute::optional_bool())
                        .with_attribute("timeout", Attribute::optional_string()),
                ),
            )
            .with_block(
                "manual",
                NestedBlock::single(
                    Block::new().with_attribute("content", Attribute::required_string()),
                ),
            )
            .with_block(
                "doc_link",
                NestedBlock::single(Block::new().with_attribute("url", Attribute::required_string())),
            )
            .with_block(
                "input_parameter",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("name", Attribute::required_string())
                        .with_attribute("label", Attribute::optional_string())
                        .with_attribute("description", Attribute::optional_string())
                        .with_attribute(
                            "type",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(PARAMETER_TYPES)),
                        )
                        .with_attribute("value", Attribute::optional_string())
                        .with_attribute(
                            "required",
                            Attribute::optional_bool().with_default(json!(false)),
                        )
                        .with_attribute("hidden", Attribute::optional_bool().with_default(json!(false))),
                ),
            );

        Self {
            metadata: ResourceMetaData::new("automation_action", schema),
        }
    }
}

impl Default for AutomationActionResource {
    fn default() -> Self {
        Self::new()
    }
}

fn field(name: &str, value: impl Into<String>, encoding: &str) -> AutomationField {
    AutomationField {
        name: name.to_string(),
        description: String::new(),
        value: value.into(),
        encoding: Some(encoding.to_string()),
        secured: false,
    }
}

/// Typed view of the fields of an action.
struct Fields<'a>(&'a [AutomationField]);

impl Fields<'_> {
    fn get(&self, name: &str) -> Option<String> {
        let field = self.0.iter().find(|f| f.name == name)?;
        if field.encoding.as_deref() == Some(BASE64) {
            let decoded = STANDARD.decode(&field.value).ok()?;
            String::from_utf8(decoded).ok()
        } else {
            Some(field.value.clone())
        }
    }
}

fn read_fields(reader: &ObjectReader<'_>) -> Result<(&'static str, Vec<AutomationField>), ProviderError> {
    let mut kinds = Vec::new();

    if let Some(script) = reader.nested("script")? {
        let content: String = script.required("content")?;
        let mut fields = vec![field("script_ssh", STANDARD.encode(content), BASE64)];
        for (attribute, name) in [("interpreter", "subtype"), ("timeout", "timeout"), ("source", "source")] {
            if let Some(value) = script.optional::<String>(attribute)? {
                fields.push(field(name, value, ASCII));
            }
        }
        kinds.push((SCRIPT, fields));
    }
    if let Some(http) = reader.nested("http")? {
        let mut fields = vec![
            field("host", http.required::<String>("host")?, ASCII),
            field("method", http.required::<String>("method")?, ASCII),
        ];
        if let Some(body) = http.optional::<String>("body")? {
            fields.push(field("body", body, ASCII));
        }
        if let Some(headers) = http.optional::<BTreeMap<String, String>>("headers")? {
            fields.push(field("headers", serde_json::to_string(&headers)?, ASCII));
        }
        if let Some(ignore) = http.optional::<bool>("ignore_certificate_errors")? {
            fields.push(field("ignoreCertErrors", ignore.to_string(), ASCII));
        }
        if let Some(timeout) = http.optional::<String>("timeout")? {
            fields.push(field("timeout", timeout, ASCII));
        }
        kinds.push((HTTP, fields));
    }
    if let Some(manual) = reader.nested("manual")? {
        let content: String = manual.required("content")?;
        kinds.push((MANUAL, vec![field("content", STANDARD.encode(content), BASE64)]));
    }
    if let Some(link) = reader.nested("doc_link")? {
        kinds.push((DOC_LINK, vec![field("url", link.required::<String>("url")?, ASCII)]));
    }

    match kinds.len() {
        1 => Ok(kinds.remove(0)),
        n => Err(ProviderError::Validation(format!(
            "exactly one of script, http, manual or doc_link must be configured, got {}",
            n
        ))),
    }
}

fn action_block(action: &AutomationAction) -> Result<(&'static str, ObjectWriter), ProviderError> {
    let fields = Fields(&action.fields);
    let block = match action.kind.as_str() {
        SCRIPT => (
            "script",
            ObjectWriter::new()
                .set("content", fields.get("script_ssh"))
                .set("interpreter", fields.get("subtype"))
                .set("timeout", fields.get("timeout"))
                .set("source", fields.get("source")),
        ),
        HTTP => {
            let headers = match fields.get("headers") {
                Some(raw) => Some(serde_json::from_str::<Value>(&raw)?),
                None => None,
            };
            (
                "http",
                ObjectWriter::new()
                    .set("host", fields.get("host"))
                    .set("method", fields.get("method"))
                    .set("body", fields.get("body"))
                    .set("headers", headers)
                    .set(
                        "ignore_certificate_errors",
                        fields.get("ignoreCertErrors").map(|v| v == "true"),
                    )
                    .set("timeout", fields.get("timeout")),
            )
        },
        MANUAL => ("manual", ObjectWriter::new().set("content", fields.get("content"))),
        DOC_LINK => ("doc_link", ObjectWriter::new().set("url", fields.get("url"))),
        other => {
            return Err(ProviderError::Validation(format!(
                "automation action type '{}' is not supported",
                other
            )))
        },
    };
    Ok(block)
}

impl ResourceHandle for AutomationActionResource {
    type Object = AutomationAction;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<AutomationAction>> {
        api.automation_actions()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<AutomationAction, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let (kind, fields) = read_fields(&reader)?;
        let input_parameters = reader
            .nested_list("input_parameter")?
            .iter()
            .map(|parameter| {
                Ok(AutomationInputParameter {
                    name: parameter.required("name")?,
                    label: parameter.optional("label")?.unwrap_or_default(),
                    description: parameter.optional("description")?.unwrap_or_default(),
                    kind: parameter.required("type")?,
                    value: parameter.optional("value")?.unwrap_or_default(),
                    required: parameter.optional("required")?.unwrap_or(false),
                    hidden: parameter.optional("hidden")?.unwrap_or(false),
                    secured: false,
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(AutomationAction {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?,
            kind: kind.to_string(),
            tags: reader.optional("tags")?.unwrap_or_default(),
            fields,
            input_parameters,
        })
    }

    fn update_state(
        &self,
        _plan: Option<&Value>,
        action: &AutomationAction,
    ) -> Result<Value, ProviderError> {
        let (block_name, block) = action_block(action)?;
        let mut writer = ObjectWriter::new()
            .set("id", action.id.clone())
            .set("name", action.name.clone())
            .set("description", action.description.clone())
            .set("tags", (!action.tags.is_empty()).then(|| action.tags.clone()));
        let mut block = Some(block);
        for name in ["script", "http", "manual", "doc_link"] {
            writer = writer.set_block(name, if name == block_name { block.take() } else { None });
        }

        let parameters = action
            .input_parameters
            .iter()
            .map(|p| {
                let optional = |s: &String| (!s.is_empty()).then(|| s.clone());
                ObjectWriter::new()
                    .set("name", p.name.clone())
                    .set("label", optional(&p.label))
                    .set("description", optional(&p.description))
                    .set("type", p.kind.clone())
                    .set("value", optional(&p.value))
                    .set("required", p.required)
                    .set("hidden", p.hidden)
            })
            .collect();
        Ok(writer.set_blocks("input_parameter", parameters).into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_content_is_base64_encoded() {
        let resource = AutomationActionResource::new();
        let plan = json!({
            "id": "a1",
            "name": "restart",
            "script": {"content": "systemctl restart shop", "interpreter": "bash"},
            "input_parameter": [{"name": "host", "type": "static", "required": true}]
        });
        let action = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(action.kind, SCRIPT);
        assert_eq!(action.fields[0].name, "script_ssh");
        assert_eq!(action.fields[0].value, STANDARD.encode("systemctl restart shop"));
        assert_eq!(action.fields[1].value, "bash");
        assert!(action.input_parameters[0].required);

        let state = resource.update_state(None, &action).unwrap();
        assert_eq!(state["script"]["content"], "systemctl restart shop");
        assert_eq!(state["script"]["interpreter"], "bash");
        assert_eq!(state["http"], Value::Null);
        assert_eq!(state["input_parameter"][0]["label"], Value::Null);
    }

    #[test]
    fn test_http_action_round_trip() {
        let resource = AutomationActionResource::new();
        let plan = json!({
            "name": "notify",
            "http": {
                "host": "https://hooks.example.com",
                "method": "POST",
                "headers": {"x-token": "t"},
                "ignore_certificate_errors": true
            }
        });
        let action = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(None, &action).unwrap();
        assert_eq!(state["http"]["headers"], json!({"x-token": "t"}));
        assert_eq!(state["http"]["ignore_certificate_errors"], true);
        assert_eq!(state["http"]["body"], Value::Null);
    }

    #[test]
    fn test_exactly_one_action_type() {
        let resource = AutomationActionResource::new();
        let plan = json!({"name": "nothing"});
        assert!(resource.map_state_to_data_object(Some(&plan), None).is_err());
    }

    #[test]
    fn test_unsupported_type_from_api() {
        let resource = AutomationActionResource::new();
        let action = AutomationAction {
            id: "a".to_string(),
            name: "n".to_string(),
            description: None,
            kind: "ANSIBLE".to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            input_parameters: Vec::new(),
        };
        assert!(resource.update_state(None, &action).is_err());
    }
}
