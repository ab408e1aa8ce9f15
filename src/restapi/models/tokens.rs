//! API tokens.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::restapi::DataObject;

/// Path of API tokens.
pub const API_TOKENS_PATH: &str = "/api/settings/api-tokens";

/// Permission flags of API tokens: configuration attribute and API field.
pub const API_TOKEN_PERMISSIONS: &[(&str, &str)] = &[
    ("can_configure_service_mapping", "canConfigureServiceMapping"),
    ("can_configure_eum_applications", "canConfigureEumApplications"),
    ("can_configure_mobile_app_monitoring", "canConfigureMobileAppMonitoring"),
    ("can_configure_users", "canConfigureUsers"),
    ("can_install_new_agents", "canInstallNewAgents"),
    ("can_configure_integrations", "canConfigureIntegrations"),
    ("can_configure_events_and_alerts", "canConfigureEventsAndAlerts"),
    ("can_configure_maintenance_windows", "canConfigureMaintenanceWindows"),
    ("can_configure_application_smart_alerts", "canConfigureApplicationSmartAlerts"),
    ("can_configure_website_smart_alerts", "canConfigureWebsiteSmartAlerts"),
    ("can_configure_mobile_app_smart_alerts", "canConfigureMobileAppSmartAlerts"),
    ("can_configure_api_tokens", "canConfigureApiTokens"),
    ("can_configure_agent_run_mode", "canConfigureAgentRunMode"),
    ("can_view_audit_log", "canViewAuditLog"),
    ("can_configure_agents", "canConfigureAgents"),
    ("can_configure_authentication_methods", "canConfigureAuthenticationMethods"),
    ("can_configure_applications", "canConfigureApplications"),
    ("can_configure_teams", "canConfigureTeams"),
    ("can_configure_releases", "canConfigureReleases"),
    ("can_configure_log_management", "canConfigureLogManagement"),
    ("can_create_public_custom_dashboards", "canCreatePublicCustomDashboards"),
    ("can_view_logs", "canViewLogs"),
    ("can_view_trace_details", "canViewTraceDetails"),
    ("can_configure_session_settings", "canConfigureSessionSettings"),
    ("can_configure_service_level_indicators", "canConfigureServiceLevelIndicators"),
    ("can_configure_global_alert_payload", "canConfigureGlobalAlertPayload"),
    ("can_configure_global_alert_configs", "canConfigureGlobalAlertConfigs"),
    ("can_view_account_and_billing_information", "canViewAccountAndBillingInformation"),
    ("can_edit_all_accessible_custom_dashboards", "canEditAllAccessibleCustomDashboards"),
    ("can_configure_synthetic_tests", "canConfigureSyntheticTests"),
    ("can_configure_synthetic_locations", "canConfigureSyntheticLocations"),
    ("can_configure_automation_actions", "canConfigureAutomationActions"),
    ("can_run_automation_actions", "canRunAutomationActions"),
];

/// An API token.
///
/// The API addresses tokens by `internalId`; `id` is the token's public id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiToken {
    #[serde(default)]
    pub id: String,
    pub access_granting_token: String,
    pub internal_id: String,
    pub name: String,
    /// Permission flags keyed by API field name.
    #[serde(flatten)]
    pub permissions: BTreeMap<String, Value>,
}

impl ApiToken {
    /// Whether the permission with the given API field name is granted.
    pub fn has_permission(&self, field: &str) -> bool {
        self.permissions
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl DataObject for ApiToken {
    fn id(&self) -> &str {
        &self.id
    }

    fn id_for_resource_path(&self) -> &str {
        &self.internal_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_token_addressed_by_internal_id() {
        let token: ApiToken = serde_json::from_value(json!({
            "id": "public",
            "accessGrantingToken": "secret",
            "internalId": "internal",
            "name": "ci",
            "canConfigureUsers": true,
            "canViewLogs": false
        }))
        .unwrap();
        assert_eq!(token.id(), "public");
        assert_eq!(token.id_for_resource_path(), "internal");
        assert!(token.has_permission("canConfigureUsers"));
        assert!(!token.has_permission("canViewLogs"));
        assert!(!token.has_permission("canInstallNewAgents"));
    }

    #[test]
    fn test_permissions_flatten_on_write() {
        let mut permissions = BTreeMap::new();
        permissions.insert("canViewLogs".to_string(), Value::Bool(true));
        let token = ApiToken {
            id: "public".to_string(),
            access_granting_token: "secret".to_string(),
            internal_id: "internal".to_string(),
            name: "ci".to_string(),
            permissions,
        };
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["canViewLogs"], true);
        assert_eq!(value["internalId"], "internal");
    }
}
