//! Role based access control: users, groups, roles and teams.

use serde::{Deserialize, Serialize};

use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of groups.
pub const GROUPS_PATH: &str = "/api/settings/rbac/groups";

/// Path of roles.
pub const ROLES_PATH: &str = "/api/settings/rbac/roles";

/// Path of teams.
pub const TEAMS_PATH: &str = "/api/settings/rbac/teams";

/// Path of users.
pub const USERS_PATH: &str = "/api/settings/users";

/// A user of the tenant unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_logged_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfa_enabled: Option<bool>,
}

impl DataObject for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A user assigned to a group or role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMember {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Binding of a scope, optionally restricted to a role within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeBinding {
    pub scope_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_role_id: Option<String>,
}

impl ScopeBinding {
    /// A binding without role.
    pub fn scope(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            scope_role_id: None,
        }
    }
}

/// What members of a group may access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    #[serde(default)]
    pub application_ids: Vec<ScopeBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_dfq_filter: Option<ScopeBinding>,
    #[serde(default, rename = "kubernetesClusterUUIDs")]
    pub kubernetes_cluster_uuids: Vec<ScopeBinding>,
    #[serde(default, rename = "kubernetesNamespaceUIDs")]
    pub kubernetes_namespace_uids: Vec<ScopeBinding>,
    #[serde(default)]
    pub mobile_app_ids: Vec<ScopeBinding>,
    #[serde(default)]
    pub website_ids: Vec<ScopeBinding>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// A group of users sharing permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<ApiMember>,
    #[serde(default)]
    pub permission_set: PermissionSet,
}

impl DataObject for Group {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<ApiMember>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl DataObject for Role {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Free form information about a team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A role held by a team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberRole {
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, rename = "viaIdP")]
    pub via_idp: bool,
}

/// A member of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<TeamMemberRole>,
}

/// Restricts a team to the calls of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedApplicationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricting_application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
}

/// The entities visible to a team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamScope {
    #[serde(default)]
    pub access_permissions: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub kubernetes_clusters: Vec<String>,
    #[serde(default)]
    pub kubernetes_namespaces: Vec<String>,
    #[serde(default)]
    pub mobile_apps: Vec<String>,
    #[serde(default)]
    pub websites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_dfq_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub business_perspectives: Vec<String>,
    #[serde(default)]
    pub slo_ids: Vec<String>,
    #[serde(default)]
    pub synthetic_tests: Vec<String>,
    #[serde(default)]
    pub synthetic_credentials: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted_application_filter: Option<RestrictedApplicationFilter>,
}

/// A team of users with a shared scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    pub tag: String,
    #[serde(default)]
    pub info: TeamInfo,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub scope: TeamScope,
}

impl DataObject for Team {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_set_field_names() {
        let set = PermissionSet {
            kubernetes_cluster_uuids: vec![ScopeBinding::scope("k8s-1")],
            infra_dfq_filter: Some(ScopeBinding::scope("entity.zone:eu")),
            ..Default::default()
        };
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["kubernetesClusterUUIDs"][0]["scopeId"], "k8s-1");
        assert_eq!(value["infraDfqFilter"]["scopeId"], "entity.zone:eu");
        assert!(value["kubernetesClusterUUIDs"][0].get("scopeRoleId").is_none());
    }

    #[test]
    fn test_team_defaults_missing_sections() {
        let team: Team = serde_json::from_value(json!({"id": "t1", "tag": "sre"})).unwrap();
        assert!(team.members.is_empty());
        assert!(team.scope.restricted_application_filter.is_none());
        assert!(team.info.description.is_none());
    }
}
