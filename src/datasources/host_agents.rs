use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::models::HostAgent;
use crate::restapi::InstanaApi;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_host_agents`: all host agents matching a dynamic focus query.
pub struct HostAgentsDataSource;

fn item_type() -> AttributeType {
    AttributeType::object(HashMap::from([
        ("snapshot_id".to_string(), AttributeType::String),
        ("label".to_string(), AttributeType::String),
        ("host".to_string(), AttributeType::String),
        ("plugin".to_string(), AttributeType::String),
        ("tags".to_string(), AttributeType::list(AttributeType::String)),
    ]))
}

fn item_state(agent: &HostAgent) -> Value {
    ObjectWriter::new()
        .set("snapshot_id", agent.snapshot_id.clone())
        .set("label", agent.label.clone())
        .set("host", agent.host.clone())
        .set("plugin", agent.plugin.clone())
        .set("tags", agent.tags.clone())
        .into_value()
}

#[async_trait]
impl DataSourceHandle for HostAgentsDataSource {
    fn name(&self) -> &'static str {
        "host_agents"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for Instana host agents")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "filter",
                Attribute::required_string().with_description("Dynamic focus query selecting the agents"),
            )
            .with_attribute(
                "items",
                Attribute::new(AttributeType::list(item_type()), AttributeFlags::computed()),
            )
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let filter: String = ObjectReader::new(config)?.required("filter")?;
        let agents = api.host_agents().query(Some(&filter), cancel).await?;
        debug!(count = agents.len(), "host agents found");

        let read_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Ok(ObjectWriter::new()
            .set("id", read_at.to_string())
            .set("filter", filter)
            .set("items", agents.iter().map(item_state).collect::<Vec<_>>())
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_state() {
        let agent = HostAgent {
            snapshot_id: "snap".to_string(),
            label: "host-1".to_string(),
            host: "10.0.0.1".to_string(),
            plugin: "host".to_string(),
            tags: vec!["prod".to_string()],
        };
        let item = item_state(&agent);
        assert_eq!(item["tags"][0], "prod");
        assert_eq!(item["snapshot_id"], "snap");
    }
}
