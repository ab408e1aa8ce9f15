use serde_json::Value;

use super::{id_attribute, read_tag_filter, string_set, tag_filter_state};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    RestrictedApplicationFilter, Team, TeamInfo, TeamMember, TeamMemberRole, TeamScope,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// Set attributes of the `scope` block, in schema order.
const SCOPE_SETS: &[&str] = &[
    "access_permissions",
    "applications",
    "kubernetes_clusters",
    "kubernetes_namespaces",
    "mobile_apps",
    "websites",
    "business_perspectives",
    "slo_ids",
    "synthetic_tests",
    "synthetic_credentials",
    "tag_ids",
];

/// `instana_rbac_team`: a team of users with a shared scope.
pub struct TeamResource {
    metadata: ResourceMetaData,
}

impl TeamResource {
    /// Create the resource.
    pub fn new() -> Self {
        let roles = Block::new()
            .with_attribute("role_id", Attribute::required_string())
            .with_attribute("role_name", Attribute::optional_string())
            .with_attribute("via_idp", Attribute::optional_bool());
        let member = Block::new()
            .with_attribute("user_id", Attribute::required_string())
            .with_attribute("email", Attribute::optional_computed_string())
            .with_attribute("name", Attribute::optional_string())
            .with_block("roles", NestedBlock::set(roles));

        let restricted = Block::new()
            .with_attribute("label", Attribute::optional_string())
            .with_attribute("restricting_application_id", Attribute::optional_computed_string())
            .with_attribute("scope", Attribute::optional_string())
            .with_attribute("tag_filter_expression", Attribute::tag_filter(AttributeFlags::optional()));
        let mut scope = SCOPE_SETS.iter().fold(Block::new(), |block, name| {
            block.with_attribute(*name, string_set(AttributeFlags::optional()))
        });
        scope = scope
            .with_attribute("infra_dfq_filter", Attribute::optional_string())
            .with_attribute("action_filter", Attribute::optional_string())
            .with_attribute("log_filter", Attribute::optional_string())
            .with_block("restricted_application_filter", NestedBlock::single(restricted));

        let schema = Schema::new(0)
            .with_description("RBAC team of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("tag", Attribute::required_string())
            .with_block(
                "info",
                NestedBlock::single(
                    Block::new().with_attribute("description", Attribute::optional_string()),
                ),
            )
            .with_block("member", NestedBlock::set(member))
            .with_block("scope", NestedBlock::single(scope));

        Self {
            metadata: ResourceMetaData::new("rbac_team", schema),
        }
    }
}

impl Default for TeamResource {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(reader: &ObjectReader<'_>, name: &str) -> Result<Vec<String>, ProviderError> {
    let mut values: Vec<String> = reader.optional(name)?.unwrap_or_default();
    values.sort();
    Ok(values)
}

fn set_state(values: &[String]) -> Option<Vec<String>> {
    let mut values = values.to_vec();
    values.sort();
    (!values.is_empty()).then_some(values)
}

fn read_member(member: &ObjectReader<'_>) -> Result<TeamMember, ProviderError> {
    let roles = member
        .nested_list("roles")?
        .iter()
        .map(|role| {
            Ok(TeamMemberRole {
                role_id: role.required("role_id")?,
                role_name: role.optional("role_name")?,
                via_idp: role.optional("via_idp")?.unwrap_or(false),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    Ok(TeamMember {
        user_id: member.required("user_id")?,
        email: member.optional("email")?,
        name: member.optional("name")?,
        roles,
    })
}

fn read_scope(scope: &ObjectReader<'_>) -> Result<TeamScope, ProviderError> {
    let restricted_application_filter = match scope.nested("restricted_application_filter")? {
        Some(filter) => Some(RestrictedApplicationFilter {
            label: filter.optional("label")?,
            restricting_application_id: filter.optional("restricting_application_id")?,
            scope: filter.optional("scope")?,
            tag_filter_expression: read_tag_filter(&filter, "tag_filter_expression")?,
        }),
        None => None,
    };
    Ok(TeamScope {
        access_permissions: sorted(scope, "access_permissions")?,
        applications: sorted(scope, "applications")?,
        kubernetes_clusters: sorted(scope, "kubernetes_clusters")?,
        kubernetes_namespaces: sorted(scope, "kubernetes_namespaces")?,
        mobile_apps: sorted(scope, "mobile_apps")?,
        websites: sorted(scope, "websites")?,
        infra_dfq_filter: scope.optional("infra_dfq_filter")?,
        action_filter: scope.optional("action_filter")?,
        log_filter: scope.optional("log_filter")?,
        business_perspectives: sorted(scope, "business_perspectives")?,
        slo_ids: sorted(scope, "slo_ids")?,
        synthetic_tests: sorted(scope, "synthetic_tests")?,
        synthetic_credentials: sorted(scope, "synthetic_credentials")?,
        tag_ids: sorted(scope, "tag_ids")?,
        restricted_application_filter,
    })
}

/// The tag filter expression configured for the restricted application.
fn planned_restriction(plan: Option<&Value>) -> Result<Option<String>, ProviderError> {
    let Some(plan) = plan else {
        return Ok(None);
    };
    let reader = ObjectReader::new(plan)?;
    let Some(scope) = reader.nested("scope")? else {
        return Ok(None);
    };
    match scope.nested("restricted_application_filter")? {
        Some(filter) => filter.optional("tag_filter_expression"),
        None => Ok(None),
    }
}

fn scope_state(scope: &TeamScope, plan: Option<&Value>) -> Result<Option<ObjectWriter>, ProviderError> {
    if *scope == TeamScope::default() {
        return Ok(None);
    }
    let restricted = match &scope.restricted_application_filter {
        Some(filter) => Some(
            ObjectWriter::new()
                .set("label", filter.label.clone())
                .set("restricting_application_id", filter.restricting_application_id.clone())
                .set("scope", filter.scope.clone())
                .set(
                    "tag_filter_expression",
                    tag_filter_state(filter.tag_filter_expression.as_ref(), planned_restriction(plan)?)?,
                ),
        ),
        None => None,
    };
    let sets: [(&str, &Vec<String>); 11] = [
        ("access_permissions", &scope.access_permissions),
        ("applications", &scope.applications),
        ("kubernetes_clusters", &scope.kubernetes_clusters),
        ("kubernetes_namespaces", &scope.kubernetes_namespaces),
        ("mobile_apps", &scope.mobile_apps),
        ("websites", &scope.websites),
        ("business_perspectives", &scope.business_perspectives),
        ("slo_ids", &scope.slo_ids),
        ("synthetic_tests", &scope.synthetic_tests),
        ("synthetic_credentials", &scope.synthetic_credentials),
        ("tag_ids", &scope.tag_ids),
    ];
    let writer = sets
        .into_iter()
        .fold(ObjectWriter::new(), |writer, (name, values)| writer.set(name, set_state(values)))
        .set("infra_dfq_filter", scope.infra_dfq_filter.clone())
        .set("action_filter", scope.action_filter.clone())
        .set("log_filter", scope.log_filter.clone())
        .set_block("restricted_application_filter", restricted);
    Ok(Some(writer))
}

fn member_blocks(members: &[TeamMember]) -> Vec<ObjectWriter> {
    let mut members = members.to_vec();
    members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    members
        .into_iter()
        .map(|member| {
            let mut roles = member.roles;
            roles.sort_by(|a, b| a.role_id.cmp(&b.role_id));
            let roles = roles
                .into_iter()
                .map(|role| {
                    ObjectWriter::new()
                        .set("role_id", role.role_id)
                        .set("role_name", role.role_name)
                        .set("via_idp", role.via_idp)
                })
                .collect();
            ObjectWriter::new()
                .set("user_id", member.user_id)
                .set("email", member.email)
                .set("name", member.name)
                .set_blocks("roles", roles)
        })
        .collect()
}

impl ResourceHandle for TeamResource {
    type Object = Team;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<Team>> {
        api.teams()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<Team, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let info = match reader.nested("info")? {
            Some(info) => TeamInfo {
                description: info.optional("description")?,
            },
            None => TeamInfo::default(),
        };
        let members = reader
            .nested_list("member")?
            .iter()
            .map(read_member)
            .collect::<Result<Vec<_>, ProviderError>>()?;
        let scope = match reader.nested("scope")? {
            Some(scope) => read_scope(&scope)?,
            None => TeamScope::default(),
        };

        Ok(Team {
            id: reader.optional("id")?.unwrap_or_default(),
            tag: reader.optional("tag")?.unwrap_or_default(),
            info,
            members,
            scope,
        })
    }

    fn update_state(&self, plan: Option<&Value>, team: &Team) -> Result<Value, ProviderError> {
        let info = team
            .info
            .description
            .as_ref()
            .map(|description| ObjectWriter::new().set("description", description.clone()));

        Ok(ObjectWriter::new()
            .set("id", team.id.clone())
            .set("tag", team.tag.clone())
            .set_block("info", info)
            .set_blocks("member", member_blocks(&team.members))
            .set_block("scope", scope_state(&team.scope, plan)?)
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan() -> Value {
        json!({
            "id": "t1",
            "tag": "payments",
            "info": {"description": "Payment squad"},
            "member": [
                {"user_id": "u2", "roles": [{"role_id": "r2"}, {"role_id": "r1", "via_idp": true}]},
                {"user_id": "u1", "email": "u1@example.com"}
            ],
            "scope": {
                "applications": ["app-b", "app-a"],
                "log_filter": "service:checkout",
                "restricted_application_filter": {
                    "label": "checkout",
                    "scope": "INCLUDE_NO_DOWNSTREAM",
                    "tag_filter_expression": "call.name EQUALS 'checkout'"
                }
            }
        })
    }

    #[test]
    fn test_team_mapping() {
        let resource = TeamResource::new();
        let team = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        assert_eq!(team.info.description.as_deref(), Some("Payment squad"));
        assert_eq!(team.scope.applications, vec!["app-a", "app-b"]);
        assert!(team.members[0].roles[1].via_idp);
        let filter = team.scope.restricted_application_filter.as_ref().unwrap();
        assert!(filter.tag_filter_expression.is_some());
    }

    #[test]
    fn test_team_state_keeps_configured_expression() {
        let resource = TeamResource::new();
        let plan = plan();
        let team = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &team).unwrap();

        let restricted = &state["scope"]["restricted_application_filter"];
        assert_eq!(restricted["tag_filter_expression"], "call.name EQUALS 'checkout'");
        assert_eq!(state["member"][0]["user_id"], "u1");
        assert_eq!(state["member"][1]["roles"][0]["role_id"], "r1");
        assert_eq!(state["scope"]["websites"], Value::Null);
    }

    #[test]
    fn test_team_without_scope() {
        let resource = TeamResource::new();
        let plan = json!({"tag": "empty"});
        let team = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(None, &team).unwrap();
        assert_eq!(state["scope"], Value::Null);
        assert_eq!(state["info"], Value::Null);
    }
}
