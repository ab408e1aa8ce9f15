use serde_json::Value;

use super::{access_rule_block, access_rule_blocks, id_attribute, planned, read_access_rules};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::CustomDashboard;
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, Normalizer, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_custom_dashboard`: a dashboard whose widgets are given as JSON.
pub struct CustomDashboardResource {
    metadata: ResourceMetaData,
}

impl CustomDashboardResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(0)
            .with_description("Custom dashboard of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("title", Attribute::required_string())
            .with_attribute(
                "widgets",
                Attribute::required_string()
                    .with_validator(Validator::Json)
                    .with_normalizer(Normalizer::Json)
                    .with_description("The widgets of the dashboard as JSON array"),
            )
            .with_block("access_rule", access_rule_block().with_min_items(1));

        Self {
            metadata: ResourceMetaData::new("custom_dashboard", schema),
        }
    }
}

impl Default for CustomDashboardResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for CustomDashboardResource {
    type Object = CustomDashboard;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<CustomDashboard>> {
        api.custom_dashboards()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<CustomDashboard, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let widgets = match reader.optional::<String>("widgets")? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| ProviderError::attribute("widgets", format!("invalid JSON: {}", err)))?,
            None => Value::Array(Vec::new()),
        };
        Ok(CustomDashboard {
            id: reader.optional("id")?.unwrap_or_default(),
            title: reader.optional("title")?.unwrap_or_default(),
            access_rules: read_access_rules(&reader, "access_rule")?,
            widgets,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        dashboard: &CustomDashboard,
    ) -> Result<Value, ProviderError> {
        let configured: Option<String> = planned(plan, "widgets")?;
        let widgets = match configured {
            Some(raw)
                if serde_json::from_str::<Value>(&raw).ok().as_ref() == Some(&dashboard.widgets) =>
            {
                raw
            },
            _ => serde_json::to_string(&dashboard.widgets)?,
        };
        Ok(ObjectWriter::new()
            .set("id", dashboard.id.clone())
            .set("title", dashboard.title.clone())
            .set("widgets", widgets)
            .set_blocks("access_rule", access_rule_blocks(&dashboard.access_rules))
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widgets_keep_configured_formatting() {
        let resource = CustomDashboardResource::new();
        let plan = json!({
            "id": "d1",
            "title": "Shop",
            "widgets": "[ {\"type\": \"chart\",  \"id\": \"w1\"} ]",
            "access_rule": [{"access_type": "READ", "relation_type": "GLOBAL"}]
        });
        let dashboard = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(dashboard.widgets, json!([{"type": "chart", "id": "w1"}]));

        let state = resource.update_state(Some(&plan), &dashboard).unwrap();
        assert_eq!(state["widgets"], plan["widgets"]);

        let imported = resource.update_state(None, &dashboard).unwrap();
        let raw = imported["widgets"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(raw).unwrap(), dashboard.widgets);
        assert!(!raw.contains(' '));
    }

    #[test]
    fn test_invalid_widgets() {
        let resource = CustomDashboardResource::new();
        let plan = json!({"title": "Shop", "widgets": "[", "access_rule": []});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("widgets"));
    }
}
