use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::models::AutomationAction;
use crate::restapi::InstanaApi;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_automation_action`: an automation action looked up by name and type.
pub struct AutomationActionDataSource;

fn find_action<'a>(
    actions: &'a [AutomationAction],
    name: &str,
    kind: &str,
) -> Option<&'a AutomationAction> {
    actions
        .iter()
        .find(|action| action.name == name && action.kind.eq_ignore_ascii_case(kind))
}

fn action_state(action: &AutomationAction) -> Value {
    ObjectWriter::new()
        .set("id", action.id.clone())
        .set("name", action.name.clone())
        .set("type", action.kind.clone())
        .set("description", action.description.clone())
        .set("tags", action.tags.clone())
        .into_value()
}

#[async_trait]
impl DataSourceHandle for AutomationActionDataSource {
    fn name(&self) -> &'static str {
        "automation_action"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for an Instana automation action")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "type",
                Attribute::required_string().with_description("The action type, e.g. SCRIPT or HTTP"),
            )
            .with_attribute("description", Attribute::computed_string())
            .with_attribute(
                "tags",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed()),
            )
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let reader = ObjectReader::new(config)?;
        let name: String = reader.required("name")?;
        let kind: String = reader.required("type")?;

        let actions = api.automation_actions().get_all(cancel).await?;
        debug!(count = actions.len(), "automation actions loaded");
        let action = find_action(&actions, &name, &kind).ok_or_else(|| {
            ProviderError::NotFound(format!(
                "no automation action found with name {} and type {}",
                name, kind
            ))
        })?;
        Ok(action_state(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(id: &str, name: &str, kind: &str) -> AutomationAction {
        AutomationAction {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            kind: kind.to_string(),
            tags: vec!["ops".to_string()],
            fields: Vec::new(),
            input_parameters: Vec::new(),
        }
    }

    #[test]
    fn test_find_action_by_name_and_type() {
        let actions = vec![action("a1", "restart", "SCRIPT"), action("a2", "restart", "HTTP")];
        assert_eq!(find_action(&actions, "restart", "http").map(|a| a.id.as_str()), Some("a2"));
        assert!(find_action(&actions, "restart", "ANSIBLE").is_none());
        assert!(find_action(&actions, "Restart", "SCRIPT").is_none());
    }

    #[test]
    fn test_action_state() {
        let state = action_state(&action("a1", "restart", "SCRIPT"));
        assert_eq!(state["type"], "SCRIPT");
        assert_eq!(state["tags"], json!(["ops"]));
        assert_eq!(state["description"], Value::Null);
    }
}
