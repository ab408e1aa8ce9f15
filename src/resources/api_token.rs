use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::id_attribute;
use crate::error::ProviderError;
use crate::resource::{
    generate_id, plan_or_state, rename_attribute, unchanged_state, ResourceHandle,
    ResourceMetaData, StateUpgrader,
};
use crate::restapi::models::{ApiToken, API_TOKEN_PERMISSIONS};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::value::{ObjectReader, ObjectWriter};

const INTERNAL_ID: &str = "internal_id";
const ACCESS_GRANTING_TOKEN: &str = "access_granting_token";

/// `instana_api_token`: an API token and its permissions.
///
/// Tokens are addressed by their internal id. The provider chooses the
/// internal id and the token secret before the token is created.
pub struct ApiTokenResource {
    metadata: ResourceMetaData,
}

impl ApiTokenResource {
    /// Create the resource.
    pub fn new() -> Self {
        let mut schema = Schema::new(2)
            .with_description("API token of the Instana REST API")
            .with_attribute("id", id_attribute())
            .with_attribute(
                ACCESS_GRANTING_TOKEN,
                Attribute::computed_string()
                    .sensitive()
                    .with_use_state_for_unknown()
                    .with_description("The token used to authenticate against the API"),
            )
            .with_attribute(
                INTERNAL_ID,
                Attribute::computed_string()
                    .with_use_state_for_unknown()
                    .with_description("The id by which the token is addressed"),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the API token"),
            );
        for (attribute, _) in API_TOKEN_PERMISSIONS {
            schema = schema.with_attribute(
                *attribute,
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_default(json!(false)),
            );
        }

        Self {
            metadata: ResourceMetaData::new("api_token", schema)
                .with_id_field(INTERNAL_ID)
                .with_skip_id_generation(),
        }
    }
}

impl Default for ApiTokenResource {
    fn default() -> Self {
        Self::new()
    }
}

fn upgrade_full_name(state: Value) -> Result<Value, ProviderError> {
    Ok(rename_attribute(state, "full_name", "name"))
}

impl ResourceHandle for ApiTokenResource {
    type Object = ApiToken;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<ApiToken>> {
        api.api_tokens()
    }

    fn set_computed_fields(&self, plan: &mut Value) -> Result<(), ProviderError> {
        let map = plan
            .as_object_mut()
            .ok_or_else(|| ProviderError::Internal("plan of api_token is not an object".to_string()))?;
        for field in ["id", INTERNAL_ID, ACCESS_GRANTING_TOKEN] {
            map.insert(field.to_string(), Value::String(generate_id()));
        }
        Ok(())
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<ApiToken, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let mut permissions = BTreeMap::new();
        for (attribute, field) in API_TOKEN_PERMISSIONS {
            let granted = reader.optional::<bool>(attribute)?.unwrap_or(false);
            permissions.insert(field.to_string(), Value::Bool(granted));
        }
        Ok(ApiToken {
            id: reader.optional("id")?.unwrap_or_default(),
            access_granting_token: reader.optional(ACCESS_GRANTING_TOKEN)?.unwrap_or_default(),
            internal_id: reader.optional(INTERNAL_ID)?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            permissions,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, token: &ApiToken) -> Result<Value, ProviderError> {
        let mut writer = ObjectWriter::new()
            .set("id", token.id.clone())
            .set(ACCESS_GRANTING_TOKEN, token.access_granting_token.clone())
            .set(INTERNAL_ID, token.internal_id.clone())
            .set("name", token.name.clone());
        for (attribute, field) in API_TOKEN_PERMISSIONS {
            writer = writer.set(attribute, token.has_permission(field));
        }
        Ok(writer.into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([
            (0, unchanged_state as StateUpgrader),
            (1, upgrade_full_name as StateUpgrader),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ManagedResource, ResourceFramework};

    #[test]
    fn test_computed_fields_are_generated() {
        let resource = ApiTokenResource::new();
        let mut plan = json!({"name": "ci"});
        resource.set_computed_fields(&mut plan).unwrap();
        for field in ["id", INTERNAL_ID, ACCESS_GRANTING_TOKEN] {
            assert_eq!(plan[field].as_str().unwrap().len(), 18, "{}", field);
        }
        assert_ne!(plan[INTERNAL_ID], plan[ACCESS_GRANTING_TOKEN]);
    }

    #[test]
    fn test_permissions_mapping() {
        let resource = ApiTokenResource::new();
        let plan = json!({
            "id": "public",
            "internal_id": "internal",
            "access_granting_token": "secret",
            "name": "ci",
            "can_view_logs": true
        });
        let token = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert!(token.has_permission("canViewLogs"));
        assert!(!token.has_permission("canConfigureUsers"));
        assert_eq!(token.permissions.len(), API_TOKEN_PERMISSIONS.len());

        let state = resource.update_state(None, &token).unwrap();
        assert_eq!(state["can_view_logs"], true);
        assert_eq!(state["can_configure_users"], false);
        assert_eq!(state["internal_id"], "internal");
    }

    #[test]
    fn test_state_upgrade_renames_full_name() {
        let framework = ResourceFramework::new(ApiTokenResource::new());
        let state = framework
            .upgrade_state(0, json!({"full_name": "ci", "internal_id": "x"}))
            .unwrap();
        assert_eq!(state, json!({"name": "ci", "internal_id": "x"}));

        let current = framework.upgrade_state(2, json!({"name": "ci"})).unwrap();
        assert_eq!(current, json!({"name": "ci"}));
    }

    #[test]
    fn test_import_sets_internal_id() {
        let framework = ResourceFramework::new(ApiTokenResource::new());
        assert_eq!(framework.import("abc").unwrap(), json!({"internal_id": "abc"}));
    }
}
