use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{
    access_rule_block, access_rule_blocks, id_attribute, read_access_rules, read_tag_filter,
    tag_filter_state,
};
use crate::error::ProviderError;
use crate::resource::{
    plan_or_state, remove_attribute, rename_attribute, unchanged_state, ResourceHandle,
    ResourceMetaData, StateUpgrader,
};
use crate::restapi::models::{ApplicationConfig, BOUNDARY_SCOPES};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const SCOPES: &[&str] = &[
    "INCLUDE_NO_DOWNSTREAM",
    "INCLUDE_IMMEDIATE_DOWNSTREAM_DATABASE_AND_MESSAGING",
    "INCLUDE_ALL_DOWNSTREAM",
];

/// `instana_application_config`: an application perspective.
pub struct ApplicationConfigResource {
    metadata: ResourceMetaData,
}

impl ApplicationConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(4)
            .with_description("Application perspective of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute(
                "label",
                Attribute::required_string().with_description("The name of the application perspective"),
            )
            .with_attribute(
                "scope",
                Attribute::optional_string()
                    .with_default(json!("INCLUDE_NO_DOWNSTREAM"))
                    .with_validator(Validator::one_of(SCOPES)),
            )
            .with_attribute(
                "boundary_scope",
                Attribute::optional_string()
                    .with_default(json!("DEFAULT"))
                    .with_validator(Validator::one_of(BOUNDARY_SCOPES)),
            )
            .with_attribute(
                "tag_filter",
                Attribute::tag_filter(AttributeFlags::optional())
                    .with_description("Expression selecting the calls of the application"),
            )
            .with_block("access_rule", access_rule_block().with_min_items(1));

        Self {
            metadata: ResourceMetaData::new("application_config", schema),
        }
    }
}

impl Default for ApplicationConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn upgrade_full_label(state: Value) -> Result<Value, ProviderError> {
    Ok(rename_attribute(state, "full_label", "label"))
}

fn upgrade_match_specification(state: Value) -> Result<Value, ProviderError> {
    Ok(remove_attribute(state, "match_specification"))
}

impl ResourceHandle for ApplicationConfigResource {
    type Object = ApplicationConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<ApplicationConfig>> {
        api.application_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<ApplicationConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        Ok(ApplicationConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            label: reader.optional("label")?.unwrap_or_default(),
            scope: reader
                .optional("scope")?
                .unwrap_or_else(|| SCOPES[0].to_string()),
            boundary_scope: reader
                .optional("boundary_scope")?
                .unwrap_or_else(|| "DEFAULT".to_string()),
            tag_filter_expression: read_tag_filter(&reader, "tag_filter")?,
            access_rules: read_access_rules(&reader, "access_rule")?,
        })
    }

    fn update_state(
        &self,
        plan: Option<&Value>,
        config: &ApplicationConfig,
    ) -> Result<Value, ProviderError> {
        let configured = super::planned::<String>(plan, "tag_filter")?;
        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("label", config.label.clone())
            .set("scope", config.scope.clone())
            .set("boundary_scope", config.boundary_scope.clone())
            .set(
                "tag_filter",
                tag_filter_state(config.tag_filter_expression.as_ref(), configured)?,
            )
            .set_blocks("access_rule", access_rule_blocks(&config.access_rules))
            .into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([
            (0, upgrade_full_label as StateUpgrader),
            (1, upgrade_match_specification as StateUpgrader),
            (2, unchanged_state as StateUpgrader),
            (3, unchanged_state as StateUpgrader),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ManagedResource, ResourceFramework};

    fn plan() -> Value {
        json!({
            "id": "app-1",
            "label": "shop",
            "scope": "INCLUDE_ALL_DOWNSTREAM",
            "boundary_scope": "INBOUND",
            "tag_filter": "service.name EQUALS 'checkout' AND call.http.status@na GREATER_THAN 499",
            "access_rule": [{"access_type": "READ_WRITE", "relation_type": "GLOBAL"}]
        })
    }

    #[test]
    fn test_state_to_object() {
        let resource = ApplicationConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert_eq!(config.label, "shop");
        assert_eq!(config.scope, "INCLUDE_ALL_DOWNSTREAM");
        assert!(config.tag_filter_expression.is_some());
        assert_eq!(config.access_rules.len(), 1);
    }

    #[test]
    fn test_state_round_trip_keeps_configured_tag_filter() {
        let resource = ApplicationConfigResource::new();
        let plan = plan();
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(state["tag_filter"], plan["tag_filter"]);
        assert_eq!(state["access_rule"][0]["relation_type"], "GLOBAL");
    }

    #[test]
    fn test_imported_state_uses_normalized_tag_filter() {
        let resource = ApplicationConfigResource::new();
        let config = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        let state = resource.update_state(None, &config).unwrap();
        let normalized = state["tag_filter"].as_str().unwrap();
        assert!(crate::tagfilter::semantically_equal(
            normalized,
            plan()["tag_filter"].as_str().unwrap()
        ));
    }

    #[test]
    fn test_invalid_tag_filter_is_rejected() {
        let resource = ApplicationConfigResource::new();
        let mut plan = plan();
        plan["tag_filter"] = json!("service.name EQUALS");
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("tag_filter"));
    }

    #[test]
    fn test_state_upgrade_from_version_zero() {
        let framework = ResourceFramework::new(ApplicationConfigResource::new());
        let upgraded = framework
            .upgrade_state(
                0,
                json!({"id": "a", "full_label": "shop", "match_specification": {"key": "x"}}),
            )
            .unwrap();
        assert_eq!(upgraded, json!({"id": "a", "label": "shop"}));

        let upgraded = framework.upgrade_state(2, json!({"label": "shop"})).unwrap();
        assert_eq!(upgraded, json!({"label": "shop"}));
        assert!(framework.upgrade_state(5, json!({})).is_err());
    }
}
