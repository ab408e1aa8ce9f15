use std::collections::BTreeMap;

use serde_json::Value;

use super::{id_attribute, string_list, string_map, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{AlertingChannel, AlertingChannelKind};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const CHANNEL_BLOCKS: &[(&str, AlertingChannelKind)] = &[
    ("email", AlertingChannelKind::Email),
    ("google_chat", AlertingChannelKind::GoogleChat),
    ("office_365", AlertingChannelKind::Office365),
    ("ops_genie", AlertingChannelKind::OpsGenie),
    ("pager_duty", AlertingChannelKind::PagerDuty),
    ("prometheus_webhook", AlertingChannelKind::PrometheusWebhook),
    ("service_now", AlertingChannelKind::ServiceNowWebhook),
    ("service_now_application", AlertingChannelKind::ServiceNowApplication),
    ("slack", AlertingChannelKind::Slack),
    ("splunk", AlertingChannelKind::Splunk),
    ("victor_ops", AlertingChannelKind::VictorOps),
    ("watson_aiops_webhook", AlertingChannelKind::WatsonAiopsWebhook),
    ("webex_teams_webhook", AlertingChannelKind::WebexTeamsWebhook),
    ("webhook", AlertingChannelKind::WebHook),
];

const OPS_GENIE_REGIONS: &[&str] = &["EU", "US"];

/// `instana_alerting_channel`: a notification target of alerts.
///
/// Exactly one of the channel blocks must be configured; it selects the
/// kind of the channel.
pub struct AlertingChannelResource {
    metadata: ResourceMetaData,
}

impl AlertingChannelResource {
    /// Create the resource.
    pub fn new() -> Self {
        let webhook_url = || {
            NestedBlock::single(
                Block::new().with_attribute("webhook_url", Attribute::required_string()),
            )
        };
        let service_now = || {
            Block::new()
                .with_attribute("service_now_url", Attribute::required_string())
                .with_attribute("username", Attribute::required_string())
                .with_attribute("password", Attribute::optional_string().sensitive())
                .with_attribute("auto_close_incidents", Attribute::optional_bool())
        };

        let schema = Schema::new(0)
            .with_description("Alerting channel notified by Instana alerts")
            .with_attribute("id", id_attribute())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the alerting channel"),
            )
            .with_block(
                "email",
                NestedBlock::single(
                    Block::new().with_attribute("emails", string_set(AttributeFlags::required())),
                ),
            )
            .with_block("google_chat", webhook_url())
            .with_block("office_365", webhook_url())
            .with_block(
                "ops_genie",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("api_key", Attribute::required_string().sensitive())
                        .with_attribute("tags", string_list(AttributeFlags::required()))
                        .with_attribute(
                            "region",
                            Attribute::required_string()
                                .with_validator(Validator::one_of(OPS_GENIE_REGIONS)),
                        ),
                ),
            )
            .with_block(
                "pager_duty",
                NestedBlock::single(Block::new().with_attribute(
                    "service_integration_key",
                    Attribute::required_string().sensitive(),
                )),
            )
            .with_block(
                "prometheus_webhook",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("webhook_url", Attribute::required_string())
                        .with_attribute("receiver", Attribute::optional_string()),
                ),
            )
            .with_block("service_now", NestedBlock::single(service_now()))
            .with_block(
                "service_now_application",
                NestedBlock::single(
                    service_now()
                        .with_attribute("tenant", Attribute::required_string())
                        .with_attribute("unit", Attribute::required_string())
                        .with_attribute("instana_url", Attribute::required_string()),
                ),
            )
            .with_block(
                "slack",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("webhook_url", Attribute::required_string())
                        .with_attribute("icon_url", Attribute::optional_string())
                        .with_attribute("channel", Attribute::optional_string()),
                ),
            )
            .with_block(
                "splunk",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("url", Attribute::required_string())
                        .with_attribute("token", Attribute::required_string().sensitive()),
                ),
            )
            .with_block(
                "victor_ops",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("api_key", Attribute::required_string().sensitive())
                        .with_attribute("routing_key", Attribute::required_string()),
                ),
            )
            .with_block(
                "watson_aiops_webhook",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("webhook_url", Attribute::required_string())
                        .with_attribute("http_headers", string_list(AttributeFlags::optional())),
                ),
            )
            .with_block("webex_teams_webhook", webhook_url())
            .with_block(
                "webhook",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("webhook_urls", string_set(AttributeFlags::required()))
                        .with_attribute("http_headers", string_map(AttributeFlags::optional())),
                ),
            );

        Self {
            metadata: ResourceMetaData::new("alerting_channel", schema),
        }
    }
}

impl Default for AlertingChannelResource {
    fn default() -> Self {
        Self::new()
    }
}

fn header_map_to_lines(headers: BTreeMap<String, String>) -> Vec<String> {
    headers
        .into_iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect()
}

fn header_lines_to_map(headers: &[String]) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|tags| {
        tags.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn read_service_now(
    block: &ObjectReader<'_>,
    channel: &mut AlertingChannel,
) -> Result<(), ProviderError> {
    channel.service_now_url = Some(block.required("service_now_url")?);
    channel.username = Some(block.required("username")?);
    channel.password = block.optional("password")?;
    channel.auto_close_incidents = block.optional("auto_close_incidents")?;
    Ok(())
}

fn service_now_state(channel: &AlertingChannel, password: Option<String>) -> ObjectWriter {
    ObjectWriter::new()
        .set("service_now_url", channel.service_now_url.clone())
        .set("username", channel.username.clone())
        .set("password", channel.password.clone().or(password))
        .set("auto_close_incidents", channel.auto_close_incidents)
}

/// Secrets the API does not return are kept from the plan.
fn planned_secret(plan: Option<&Value>, block: &str, name: &str) -> Result<Option<String>, ProviderError> {
    let Some(plan) = plan else {
        return Ok(None);
    };
    match ObjectReader::new(plan)?.nested(block)? {
        Some(reader) => reader.optional(name),
        None => Ok(None),
    }
}

impl ResourceHandle for AlertingChannelResource {
    type Object = AlertingChannel;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<AlertingChannel>> {
        api.alerting_channels()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<AlertingChannel, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let id: String = reader.optional("id")?.unwrap_or_default();
        let name: String = reader.required("name")?;

        let mut configured = Vec::new();
        for (block_name, kind) in CHANNEL_BLOCKS {
            if let Some(block) = reader.nested(block_name)? {
                configured.push((*kind, block));
            }
        }
        let (kind, block) = match configured.len() {
            1 => configured.remove(0),
            n => {
                let names: Vec<&str> = CHANNEL_BLOCKS.iter().map(|(name, _)| *name).collect();
                return Err(ProviderError::Validation(format!(
                    "exactly one of [{}] must be configured, got {}",
                    names.join(", "),
                    n
                )));
            },
        };

        let mut channel = AlertingChannel::new(id, name, kind);
        match kind {
            AlertingChannelKind::Email => channel.emails = block.required("emails")?,
            AlertingChannelKind::GoogleChat
            | AlertingChannelKind::Office365
            | AlertingChannelKind::WebexTeamsWebhook => {
                channel.webhook_url = Some(block.required("webhook_url")?);
            },
            AlertingChannelKind::OpsGenie => {
                channel.api_key = Some(block.required("api_key")?);
                channel.tags = Some(block.required::<Vec<String>>("tags")?.join(","));
                channel.region = Some(block.required("region")?);
            },
            AlertingChannelKind::PagerDuty => {
                channel.service_integration_key = Some(block.required("service_integration_key")?);
            },
            AlertingChannelKind::PrometheusWebhook => {
                channel.webhook_url = Some(block.required("webhook_url")?);
                channel.receiver = block.optional("receiver")?;
            },
            AlertingChannelKind::ServiceNowWebhook => read_service_now(&block, &mut channel)?,
            AlertingChannelKind::ServiceNowApplication => {
                read_service_now(&block, &mut channel)?;
                channel.tenant = Some(block.required("tenant")?);
                channel.unit = Some(block.required("unit")?);
                channel.instana_url = Some(block.required("instana_url")?);
            },
            AlertingChannelKind::Slack => {
                channel.webhook_url = Some(block.required("webhook_url")?);
                channel.icon_url = block.optional("icon_url")?;
                channel.channel = block.optional("channel")?;
            },
            AlertingChannelKind::Splunk => {
                channel.url = Some(block.required("url")?);
                channel.token = Some(block.required("token")?);
            },
            AlertingChannelKind::VictorOps => {
                channel.api_key = Some(block.required("api_key")?);
                channel.routing_key = Some(block.required("routing_key")?);
            },
            AlertingChannelKind::WatsonAiopsWebhook => {
                channel.webhook_url = Some(block.required("webhook_url")?);
                channel.headers = block.optional("http_headers")?.unwrap_or_default();
            },
            AlertingChannelKind::WebHook => {
                channel.webhook_urls = block.required("webhook_urls")?;
                channel.headers = header_map_to_lines(
                    block.optional("http_headers")?.unwrap_or_default(),
                );
            },
        }
        Ok(channel)
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        channel: &AlertingChannel,
    ) -> Result<Value, ProviderError> {
        let mut writer = ObjectWriter::new()
            .set("id", channel.id.clone())
            .set("name", channel.name.clone());

        let block = match channel.kind {
            AlertingChannelKind::Email => ObjectWriter::new().set("emails", channel.emails.clone()),
            AlertingChannelKind::GoogleChat
            | AlertingChannelKind::Office365
            | AlertingChannelKind::WebexTeamsWebhook => {
                ObjectWriter::new().set("webhook_url", channel.webhook_url.clone())
            },
            AlertingChannelKind::OpsGenie => ObjectWriter::new()
                .set("api_key", channel.api_key.clone())
                .set("tags", split_tags(channel.tags.as_deref()))
                .set("region", channel.region.clone()),
            AlertingChannelKind::PagerDuty => ObjectWriter::new()
                .set("service_integration_key", channel.service_integration_key.clone()),
            AlertingChannelKind::PrometheusWebhook => ObjectWriter::new()
                .set("webhook_url", channel.webhook_url.clone())
                .set("receiver", channel.receiver.clone()),
            AlertingChannelKind::ServiceNowWebhook => {
                service_now_state(channel, planned_secret(plan, "service_now", "password")?)
            },
            AlertingChannelKind::ServiceNowApplication => service_now_state(
                channel,
                planned_secret(plan, "service_now_application", "password")?,
            )
            .set("tenant", channel.tenant.clone())
            .set("unit", channel.unit.clone())
            .set("instana_url", channel.instana_url.clone()),
            AlertingChannelKind::Slack => ObjectWriter::new()
                .set("webhook_url", channel.webhook_url.clone())
                .set("icon_url", channel.icon_url.clone())
                .set("channel", channel.channel.clone()),
            AlertingChannelKind::Splunk => ObjectWriter::new()
                .set("url", channel.url.clone())
                .set("token", channel.token.clone()),
            AlertingChannelKind::VictorOps => ObjectWriter::new()
                .set("api_key", channel.api_key.clone())
                .set("routing_key", channel.routing_key.clone()),
            AlertingChannelKind::WatsonAiopsWebhook => ObjectWriter::new()
                .set("webhook_url", channel.webhook_url.clone())
                .set(
                    "http_headers",
                    (!channel.headers.is_empty()).then(|| channel.headers.clone()),
                ),
            AlertingChannelKind::WebHook => {
                let headers = header_lines_to_map(&channel.headers);
                ObjectWriter::new()
                    .set("webhook_urls", channel.webhook_urls.clone())
                    .set(
                        "http_headers",
                        (!headers.is_empty()).then(|| serde_json::json!(headers)),
                    )
            },
        };

        let mut block = Some(block);
        for (block_name, kind) in CHANNEL_BLOCKS {
            let value = if *kind == channel.kind { block.take() } else { None };
            writer = writer.set_block(block_name, value);
        }
        Ok(writer.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_has_every_channel_block() {
        let resource = AlertingChannelResource::new();
        let schema = &resource.metadata().schema;
        for (name, _) in CHANNEL_BLOCKS {
            assert!(schema.block.blocks.contains_key(*name), "missing {}", name);
        }
    }

    #[test]
    fn test_email_channel() {
        let resource = AlertingChannelResource::new();
        let plan = json!({"id": "abc", "name": "ops", "email": {"emails": ["a@b.c"]}});
        let channel = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(channel.kind, AlertingChannelKind::Email);
        assert_eq!(channel.emails, vec!["a@b.c".to_string()]);

        let state = resource.update_state(Some(&plan), &channel).unwrap();
        assert_eq!(state["email"]["emails"], json!(["a@b.c"]));
        assert_eq!(state["slack"], Value::Null);
    }

    #[test]
    fn test_exactly_one_channel_block() {
        let resource = AlertingChannelResource::new();
        let none = json!({"id": "abc", "name": "ops"});
        assert!(resource.map_state_to_data_object(Some(&none), None).is_err());

        let two = json!({
            "id": "abc",
            "name": "ops",
            "email": {"emails": ["a@b.c"]},
            "office_365": {"webhook_url": "https://o"}
        });
        assert!(resource.map_state_to_data_object(Some(&two), None).is_err());
    }

    #[test]
    fn test_ops_genie_tags_are_joined() {
        let resource = AlertingChannelResource::new();
        let plan = json!({
            "name": "genie",
            "ops_genie": {"api_key": "k", "tags": ["a", "b"], "region": "EU"}
        });
        let channel = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(channel.tags.as_deref(), Some("a,b"));

        let state = resource.update_state(None, &channel).unwrap();
        assert_eq!(state["ops_genie"]["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_webhook_headers() {
        let resource = AlertingChannelResource::new();
        let plan = json!({
            "name": "hook",
            "webhook": {"webhook_urls": ["https://h"], "http_headers": {"x-key": "v"}}
        });
        let channel = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(channel.headers, vec!["x-key: v".to_string()]);

        let state = resource.update_state(None, &channel).unwrap();
        assert_eq!(state["webhook"]["http_headers"], json!({"x-key": "v"}));
    }

    #[test]
    fn test_service_now_password_kept_from_plan() {
        let resource = AlertingChannelResource::new();
        let plan = json!({
            "id": "sn",
            "name": "snow",
            "service_now": {"service_now_url": "https://sn", "username": "u", "password": "p"}
        });
        let mut channel = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        channel.password = None;

        let state = resource.update_state(Some(&plan), &channel).unwrap();
        assert_eq!(state["service_now"]["password"], "p");
        assert_eq!(state["service_now"]["username"], "u");
    }
}
