//! Alerting channels, alerting configurations and application alert
//! configurations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of alerting channels.
pub const ALERTING_CHANNELS_PATH: &str = "/api/events/settings/alertingChannels";

/// Path of alerting configurations.
pub const ALERTING_CONFIGS_PATH: &str = "/api/events/settings/alerts";

/// Path of application alert configurations.
pub const APPLICATION_ALERT_CONFIGS_PATH: &str = "/api/events/settings/application-alert-configs";

/// Path of global application alert configurations.
pub const GLOBAL_APPLICATION_ALERT_CONFIGS_PATH: &str =
    "/api/events/settings/global-alert-configs/applications";

/// Severity of an alert or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Code 5.
    Warning,
    /// Code 10.
    Critical,
}

impl Severity {
    /// All severities.
    pub const ALL: [Severity; 2] = [Severity::Warning, Severity::Critical];

    /// Numeric code used by the API.
    pub fn code(self) -> i32 {
        match self {
            Self::Warning => 5,
            Self::Critical => 10,
        }
    }

    /// Name used in configurations.
    pub fn term(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Key used in threshold and channel maps of the API.
    pub fn wire_key(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }

    /// Look up a severity by API code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Look up a severity by configuration name.
    pub fn from_term(term: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.term() == term)
    }

    /// Configuration names of all severities.
    pub fn terms() -> Vec<String> {
        Self::ALL.iter().map(|s| s.term().to_string()).collect()
    }
}

/// Kinds of alerting channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertingChannelKind {
    Email,
    GoogleChat,
    #[serde(rename = "OFFICE_365")]
    Office365,
    OpsGenie,
    PagerDuty,
    Slack,
    Splunk,
    VictorOps,
    WebHook,
    ServiceNowWebhook,
    ServiceNowApplication,
    PrometheusWebhook,
    WebexTeamsWebhook,
    WatsonAiopsWebhook,
}

/// A notification target of alerts.
///
/// Only the fields belonging to [`AlertingChannel::kind`] are populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingChannel {
    pub id: String,
    pub name: String,
    pub kind: AlertingChannelKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_integration_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhook_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_now_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close_incidents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instana_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

impl AlertingChannel {
    /// A channel of the given kind with no kind specific fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AlertingChannelKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            emails: Vec::new(),
            webhook_url: None,
            api_key: None,
            tags: None,
            region: None,
            routing_key: None,
            service_integration_key: None,
            icon_url: None,
            channel: None,
            url: None,
            token: None,
            webhook_urls: Vec::new(),
            headers: Vec::new(),
            service_now_url: None,
            username: None,
            password: None,
            auto_close_incidents: None,
            tenant: None,
            unit: None,
            instana_url: None,
            receiver: None,
        }
    }
}

impl DataObject for AlertingChannel {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Endpoint included in an alert scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedEndpoint {
    pub endpoint_id: String,
    pub inclusive: bool,
}

/// Service included in an alert scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedService {
    pub service_id: String,
    pub inclusive: bool,
    #[serde(default)]
    pub endpoints: BTreeMap<String, IncludedEndpoint>,
}

/// Application included in an alert scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedApplication {
    pub application_id: String,
    pub inclusive: bool,
    #[serde(default)]
    pub services: BTreeMap<String, IncludedService>,
}

/// The metric condition of an alert rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAlertRule {
    /// `errorRate`, `errors`, `logs`, `slowness`, `statusCode` or `throughput`.
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code_start: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code_end: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

/// A static or adaptive threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRule {
    /// `staticThreshold` or `adaptiveBaseline`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonality: Option<String>,
}

impl ThresholdRule {
    /// Discriminator of static thresholds.
    pub const STATIC: &'static str = "staticThreshold";

    /// Discriminator of adaptive baselines.
    pub const ADAPTIVE_BASELINE: &'static str = "adaptiveBaseline";

    /// A static threshold.
    pub fn fixed(value: f64) -> Self {
        Self {
            kind: Self::STATIC.to_string(),
            operator: None,
            value: Some(value),
            deviation_factor: None,
            adaptability: None,
            seasonality: None,
        }
    }

    /// An adaptive baseline.
    pub fn adaptive(deviation_factor: f64, adaptability: f64, seasonality: impl Into<String>) -> Self {
        Self {
            kind: Self::ADAPTIVE_BASELINE.to_string(),
            operator: None,
            value: None,
            deviation_factor: Some(deviation_factor),
            adaptability: Some(adaptability),
            seasonality: Some(seasonality.into()),
        }
    }
}

/// A rule together with its per severity thresholds.
///
/// Application, infrastructure, log and website alerts share this envelope
/// around their own rule type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleWithThreshold<R = ApplicationAlertRule> {
    pub threshold_operator: String,
    pub rule: R,
    /// Keyed by `WARNING` and `CRITICAL`.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdRule>,
}

/// How long or how often a rule must be violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeThreshold {
    /// `requestImpact`, `violationsInPeriod` or `violationsInSequence`.
    #[serde(rename = "type")]
    pub kind: String,
    pub time_window: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<i32>,
}

/// Kind of a custom payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomPayloadType {
    #[serde(rename = "staticString")]
    Static,
    #[serde(rename = "dynamic")]
    Dynamic,
}

/// Tag lookup of a dynamic payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub tag_name: String,
}

/// Extra field attached to alert notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPayloadField {
    #[serde(rename = "type")]
    pub kind: CustomPayloadType,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_value: Option<DynamicValue>,
}

/// Which events an alerting configuration forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilteringConfiguration {
    /// Dynamic focus query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    /// Lower case event types such as `incident` or `change`.
    #[serde(default)]
    pub event_types: Vec<String>,
}

/// Routes events to alerting channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingConfig {
    pub id: String,
    pub alert_name: String,
    #[serde(default)]
    pub integration_ids: Vec<String>,
    pub event_filtering_configuration: EventFilteringConfiguration,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
}

impl DataObject for AlertingConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Smart alert on application metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAlertConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<i32>,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default)]
    pub applications: BTreeMap<String, IncludedApplication>,
    pub boundary_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    #[serde(default)]
    pub include_internal: bool,
    #[serde(default)]
    pub include_synthetic: bool,
    pub evaluation_type: String,
    /// Channel ids keyed by `WARNING` and `CRITICAL`.
    #[serde(default)]
    pub alert_channels: BTreeMap<String, Vec<String>>,
    pub granularity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default)]
    pub rules: Vec<RuleWithThreshold>,
    pub time_threshold: TimeThreshold,
}

impl DataObject for ApplicationAlertConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_codes() {
        assert_eq!(Severity::Warning.code(), 5);
        assert_eq!(Severity::Critical.code(), 10);
        assert_eq!(Severity::from_code(10), Some(Severity::Critical));
        assert_eq!(Severity::from_code(7), None);
        assert_eq!(Severity::from_term("warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_term("WARNING"), None);
    }

    #[test]
    fn test_alerting_channel_kind_names() {
        let channel = AlertingChannel::new("c1", "ops", AlertingChannelKind::Office365);
        let value = serde_json::to_value(&channel).unwrap();
        assert_eq!(value["kind"], "OFFICE_365");
        assert!(value.get("emails").is_none());

        let parsed: AlertingChannel = serde_json::from_value(json!({
            "id": "c2", "name": "hook", "kind": "SERVICE_NOW_WEBHOOK",
            "serviceNowUrl": "https://example.service-now.com", "autoCloseIncidents": true
        }))
        .unwrap();
        assert_eq!(parsed.kind, AlertingChannelKind::ServiceNowWebhook);
        assert_eq!(parsed.auto_close_incidents, Some(true));
    }

    #[test]
    fn test_threshold_rule_json() {
        let value = serde_json::to_value(ThresholdRule::fixed(5.0)).unwrap();
        assert_eq!(value, json!({"type": "staticThreshold", "value": 5.0}));

        let value = serde_json::to_value(ThresholdRule::adaptive(1.5, 0.7, "DAILY")).unwrap();
        assert_eq!(value["deviationFactor"], 1.5);
        assert_eq!(value["seasonality"], "DAILY");
    }

    #[test]
    fn test_alerting_config_json() {
        let config: AlertingConfig = serde_json::from_value(json!({
            "id": "a1",
            "alertName": "all incidents",
            "integrationIds": ["ch-1"],
            "eventFilteringConfiguration": {"eventTypes": ["incident", "critical"], "ruleIds": []}
        }))
        .unwrap();
        assert_eq!(config.integration_ids, vec!["ch-1".to_string()]);
        assert_eq!(config.event_filtering_configuration.event_types.len(), 2);
        assert!(config.custom_payload_fields.is_empty());

        let value = serde_json::to_value(&config).unwrap();
        assert!(value["eventFilteringConfiguration"].get("query").is_none());
        assert_eq!(value["eventFilteringConfiguration"]["ruleIds"], json!([]));
    }

    #[test]
    fn test_custom_payload_field_json() {
        let field: CustomPayloadField = serde_json::from_value(json!({
            "type": "dynamic", "key": "zone",
            "dynamicValue": {"tagName": "aws.zone"}
        }))
        .unwrap();
        assert_eq!(field.kind, CustomPayloadType::Dynamic);
        assert_eq!(field.dynamic_value.unwrap().tag_name, "aws.zone");
    }
}
