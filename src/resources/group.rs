use std::collections::BTreeMap;

use serde_json::Value;

use super::{id_attribute, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, unchanged_state, ResourceHandle, ResourceMetaData, StateUpgrader};
use crate::restapi::models::{ApiMember, Group, PermissionSet, ScopeBinding};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_rbac_group`: a group of users sharing permissions.
pub struct GroupResource {
    metadata: ResourceMetaData,
}

impl GroupResource {
    /// Create the resource.
    pub fn new() -> Self {
        let permission_set = Block::new()
            .with_attribute("application_ids", string_set(AttributeFlags::optional()))
            .with_attribute("infra_dfq_filter", Attribute::optional_string())
            .with_attribute("kubernetes_cluster_uuids", string_set(AttributeFlags::optional()))
            .with_attribute("kubernetes_namespaces_uuids", string_set(AttributeFlags::optional()))
            .with_attribute("mobile_app_ids", string_set(AttributeFlags::optional()))
            .with_attribute("website_ids", string_set(AttributeFlags::optional()))
            .with_attribute("permissions", string_set(AttributeFlags::optional()));

        let schema = Schema::new(1)
            .with_description("RBAC group of Instana users")
            .with_attribute("id", id_attribute())
            .with_attribute("name", Attribute::required_string())
            .with_block(
                "member",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("user_id", Attribute::required_string())
                        .with_attribute("email", Attribute::optional_string()),
                ),
            )
            .with_block("permission_set", NestedBlock::single(permission_set));

        Self {
            metadata: ResourceMetaData::new("rbac_group", schema),
        }
    }
}

impl Default for GroupResource {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn read_members(reader: &ObjectReader<'_>) -> Result<Vec<ApiMember>, ProviderError> {
    let mut members = reader
        .nested_list("member")?
        .iter()
        .map(|member| {
            Ok(ApiMember {
                user_id: member.required("user_id")?,
                email: member.optional("email")?,
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    members.sort();
    Ok(members)
}

pub(crate) fn member_blocks(members: &[ApiMember]) -> Vec<ObjectWriter> {
    let mut members = members.to_vec();
    members.sort();
    members
        .into_iter()
        .map(|m| ObjectWriter::new().set("user_id", m.user_id).set("email", m.email))
        .collect()
}

fn scope_ids(reader: &ObjectReader<'_>, name: &str) -> Result<Vec<ScopeBinding>, ProviderError> {
    let mut ids: Vec<String> = reader.optional(name)?.unwrap_or_default();
    ids.sort();
    Ok(ids.into_iter().map(ScopeBinding::scope).collect())
}

fn scope_ids_state(bindings: &[ScopeBinding]) -> Option<Vec<String>> {
    if bindings.is_empty() {
        return None;
    }
    let mut ids: Vec<String> = bindings.iter().map(|b| b.scope_id.clone()).collect();
    ids.sort();
    Some(ids)
}

impl ResourceHandle for GroupResource {
    type Object = Group;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<Group>> {
        api.groups()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<Group, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let permission_set = match reader.nested("permission_set")? {
            Some(set) => {
                let mut permissions: Vec<String> = set.optional("permissions")?.unwrap_or_default();
                permissions.sort();
                PermissionSet {
                    application_ids: scope_ids(&set, "application_ids")?,
                    infra_dfq_filter: set.optional::<String>("infra_dfq_filter")?.map(ScopeBinding::scope),
                    kubernetes_cluster_uuids: scope_ids(&set, "kubernetes_cluster_uuids")?,
                    kubernetes_namespace_uids: scope_ids(&set, "kubernetes_namespaces_uuids")?,
                    mobile_app_ids: scope_ids(&set, "mobile_app_ids")?,
                    website_ids: scope_ids(&set, "website_ids")?,
                    permissions,
                }
            },
            None => PermissionSet::default(),
        };

        Ok(Group {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            members: read_members(&reader)?,
            permission_set,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, group: &Group) -> Result<Value, ProviderError> {
        let set = &group.permission_set;
        let permission_set = (*set != PermissionSet::default()).then(|| {
            let mut permissions = set.permissions.clone();
            permissions.sort();
            ObjectWriter::new()
                .set("application_ids", scope_ids_state(&set.application_ids))
                .set(
                    "infra_dfq_filter",
                    set.infra_dfq_filter.as_ref().map(|b| b.scope_id.clone()),
                )
                .set("kubernetes_cluster_uuids", scope_ids_state(&set.kubernetes_cluster_uuids))
                .set(
                    "kubernetes_namespaces_uuids",
                    scope_ids_state(&set.kubernetes_namespace_uids),
                )
                .set("mobile_app_ids", scope_ids_state(&set.mobile_app_ids))
                .set("website_ids", scope_ids_state(&set.website_ids))
                .set("permissions", (!permissions.is_empty()).then_some(permissions))
        });

        Ok(ObjectWriter::new()
            .set("id", group.id.clone())
            .set("name", group.name.clone())
            .set_blocks("member", member_blocks(&group.members))
            .set_block("permission_set", permission_set)
            .into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([(0, unchanged_state as StateUpgrader)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_mapping() {
        let resource = GroupResource::new();
        let plan = json!({
            "id": "g1",
            "name": "sre",
            "member": [{"user_id": "u2"}, {"user_id": "u1", "email": "u1@example.com"}],
            "permission_set": {
                "application_ids": ["app-2", "app-1"],
                "infra_dfq_filter": "entity.zone:eu",
                "permissions": ["CAN_CONFIGURE_USERS"]
            }
        });
        let group = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(group.members[0].user_id, "u1");
        assert_eq!(group.permission_set.application_ids[0], ScopeBinding::scope("app-1"));
        assert_eq!(
            group.permission_set.infra_dfq_filter,
            Some(ScopeBinding::scope("entity.zone:eu"))
        );

        let state = resource.update_state(None, &group).unwrap();
        assert_eq!(state["permission_set"]["application_ids"], json!(["app-1", "app-2"]));
        assert_eq!(state["permission_set"]["website_ids"], Value::Null);
        assert_eq!(state["member"][1]["user_id"], "u2");
    }

    #[test]
    fn test_group_without_permissions() {
        let resource = GroupResource::new();
        let plan = json!({"id": "g1", "name": "empty"});
        let group = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(group.permission_set, PermissionSet::default());
        let state = resource.update_state(None, &group).unwrap();
        assert_eq!(state["permission_set"], Value::Null);
        assert_eq!(state["member"], json!([]));
    }
}
