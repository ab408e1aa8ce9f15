//! Entities exchanged with the Instana REST API.

mod alerting;
mod application;
mod automation;
mod dashboard;
mod events;
mod infrastructure;
mod logs;
mod rbac;
mod slo;
mod synthetics;
mod tokens;
mod website;

use serde::{Deserialize, Serialize};

pub use alerting::{
    AlertingChannel, AlertingChannelKind, AlertingConfig, ApplicationAlertConfig,
    ApplicationAlertRule, CustomPayloadField, CustomPayloadType, DynamicValue,
    EventFilteringConfiguration, IncludedApplication, IncludedEndpoint, IncludedService,
    RuleWithThreshold, Severity, ThresholdRule, TimeThreshold, ALERTING_CHANNELS_PATH,
    ALERTING_CONFIGS_PATH, APPLICATION_ALERT_CONFIGS_PATH, GLOBAL_APPLICATION_ALERT_CONFIGS_PATH,
};
pub use application::{ApplicationConfig, APPLICATION_CONFIGS_PATH};
pub use automation::{
    ActionConfiguration, ActionReference, AutomationAction, AutomationField,
    AutomationInputParameter, AutomationPolicy, InputParameterValue, PolicyCondition,
    PolicyTrigger, RunConfiguration, Runnable, TriggerScheduling, TypeConfiguration,
    AUTOMATION_ACTIONS_PATH, AUTOMATION_POLICIES_PATH,
};
pub use dashboard::{CustomDashboard, CUSTOM_DASHBOARDS_PATH};
pub use events::{
    BuiltinEventSpecification, CustomEventSpecification, MetricPattern, RuleSpecification,
    BUILTIN_EVENT_SPECIFICATIONS_PATH, CUSTOM_EVENT_SPECIFICATIONS_PATH,
};
pub use infrastructure::{HostAgent, InfraAlertConfig, InfraAlertRule, INFRA_ALERT_CONFIGS_PATH};
pub use logs::{GroupByTag, LogAlertConfig, LogAlertRule, LOG_ALERT_CONFIGS_PATH};
pub use rbac::{
    ApiMember, Group, PermissionSet, RestrictedApplicationFilter, Role, ScopeBinding, Team,
    TeamInfo, TeamMember, TeamMemberRole, TeamScope, User, GROUPS_PATH, ROLES_PATH, TEAMS_PATH,
    USERS_PATH,
};
pub use slo::{
    BurnRateConfig, BurnRateThreshold, MetricConfiguration, RbacTag, Scheduling, SliConfig,
    SliEntity, SloAlertConfig, SloAlertRule, SloAlertThreshold, SloAlertTimeThreshold, SloConfig,
    SloCorrectionConfig, SloEntity, SloIndicator, SloTimeWindow, SLI_CONFIGS_PATH,
    SLO_ALERT_CONFIGS_PATH, SLO_CONFIGS_PATH, SLO_CORRECTION_CONFIGS_PATH,
};
pub use synthetics::{
    ApiTag, SyntheticAlertConfig, SyntheticAlertRule, SyntheticAlertTimeThreshold,
    SyntheticLocation, SyntheticTest, SyntheticTestConfig, SYNTHETIC_ALERT_CONFIGS_PATH,
    SYNTHETIC_LOCATIONS_PATH, SYNTHETIC_TESTS_PATH,
};
pub use tokens::{ApiToken, API_TOKENS_PATH, API_TOKEN_PERMISSIONS};
pub use website::{
    WebsiteAlertConfig, WebsiteAlertRule, WebsiteAlertRuleWithThresholds, WebsiteMonitoringConfig,
    WebsiteTimeThreshold, WEBSITE_ALERT_CONFIGS_PATH,
};

/// Access rule of application configurations and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    /// `READ`, `READ_WRITE`, ...
    pub access_type: String,
    /// Id of the related user, group or token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    /// `USER`, `API_TOKEN`, `ROLE`, `TEAM`, `GLOBAL`.
    pub relation_type: String,
}

/// Access types accepted by access rules.
pub const ACCESS_TYPES: &[&str] = &["READ", "READ_WRITE"];

/// Relation types accepted by access rules.
pub const RELATION_TYPES: &[&str] = &["USER", "API_TOKEN", "ROLE", "TEAM", "GLOBAL"];

/// Boundary scopes of application perspectives and alerts.
pub const BOUNDARY_SCOPES: &[&str] = &["ALL", "INBOUND", "DEFAULT"];

/// Aggregations of metric based rules and indicators.
pub const AGGREGATIONS: &[&str] = &[
    "SUM",
    "MEAN",
    "MAX",
    "MIN",
    "P25",
    "P50",
    "P75",
    "P90",
    "P95",
    "P98",
    "P99",
    "P99_9",
    "P99_99",
    "DISTRIBUTION",
    "DISTINCT_COUNT",
    "SUM_POSITIVE",
    "PER_SECOND",
    "INCREASE",
];

/// Comparison operators of alert thresholds.
pub const THRESHOLD_OPERATORS: &[&str] = &[">", ">=", "<", "<="];

/// Alert granularities in milliseconds.
pub const GRANULARITIES: &[i64] = &[60000, 300000, 600000, 900000, 1200000, 1800000];
