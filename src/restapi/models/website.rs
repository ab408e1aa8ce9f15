//! Website monitoring and website smart alerts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CustomPayloadField, ThresholdRule};
use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of website smart alerts.
pub const WEBSITE_ALERT_CONFIGS_PATH: &str = "/api/events/settings/website-alert-configs";

/// A monitored website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteMonitoringConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Name of the application the website reports to, assigned by the API.
    #[serde(default)]
    pub app_name: String,
}

impl DataObject for WebsiteMonitoringConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Beacon metric condition of a website smart alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAlertRule {
    /// `slowness`, `specificJsError`, `statusCode` or `throughput`.
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    /// Match operator of `specificJsError` and `statusCode` rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A website rule and its thresholds per severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAlertRuleWithThresholds {
    pub rule: WebsiteAlertRule,
    pub threshold_operator: String,
    /// Keyed by `WARNING` and `CRITICAL`.
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdRule>,
}

/// How long or how widely a website rule must be violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteTimeThreshold {
    /// `userImpactOfViolationsInSequence`, `violationsInPeriod` or
    /// `violationsInSequence`.
    #[serde(rename = "type")]
    pub kind: String,
    pub time_window: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<i32>,
    /// `AGGREGATED` or `PER_WINDOW`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_measurement_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i32>,
}

/// Smart alert on website beacons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteAlertConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<i32>,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub website_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    #[serde(default)]
    pub alert_channel_ids: Vec<String>,
    pub granularity: i64,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default)]
    pub rules: Vec<WebsiteAlertRuleWithThresholds>,
    pub time_threshold: WebsiteTimeThreshold,
}

impl DataObject for WebsiteAlertConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
