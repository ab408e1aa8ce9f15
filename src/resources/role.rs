use serde_json::Value;

use super::group::read_members;
use super::{id_attribute, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::Role;
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_rbac_role`: a named set of permissions held by users.
pub struct RoleResource {
    metadata: ResourceMetaData,
}

impl RoleResource {
    /// Create the resource.
    pub fn new() -> Self {
        let schema = Schema::new(0)
            .with_description("RBAC role of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("permissions", string_set(AttributeFlags::optional()))
            .with_block(
                "member",
                NestedBlock::set(Block::new().with_attribute("user_id", Attribute::required_string())),
            );

        Self {
            metadata: ResourceMetaData::new("rbac_role", schema),
        }
    }
}

impl Default for RoleResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandle for RoleResource {
    type Object = Role;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<Role>> {
        api.roles()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<Role, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let mut permissions: Vec<String> = reader.optional("permissions")?.unwrap_or_default();
        permissions.sort();
        Ok(Role {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            members: read_members(&reader)?,
            permissions,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, role: &Role) -> Result<Value, ProviderError> {
        let mut user_ids: Vec<&str> = role.members.iter().map(|m| m.user_id.as_str()).collect();
        user_ids.sort_unstable();
        let members = user_ids
            .into_iter()
            .map(|id| ObjectWriter::new().set("user_id", id))
            .collect();
        let mut permissions = role.permissions.clone();
        permissions.sort();

        Ok(ObjectWriter::new()
            .set("id", role.id.clone())
            .set("name", role.name.clone())
            .set("permissions", (!permissions.is_empty()).then_some(permissions))
            .set_blocks("member", members)
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_round_trip() {
        let resource = RoleResource::new();
        let plan = json!({
            "id": "r1",
            "name": "viewers",
            "permissions": ["CAN_VIEW_LOGS", "ACCESS_APPLICATIONS"],
            "member": [{"user_id": "u9"}, {"user_id": "u1"}]
        });
        let role = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(role.permissions, vec!["ACCESS_APPLICATIONS", "CAN_VIEW_LOGS"]);
        assert_eq!(role.members[0].user_id, "u1");

        let state = resource.update_state(None, &role).unwrap();
        assert_eq!(state["member"], json!([{"user_id": "u1"}, {"user_id": "u9"}]));
        assert_eq!(state["permissions"], json!(["ACCESS_APPLICATIONS", "CAN_VIEW_LOGS"]));
    }
}
