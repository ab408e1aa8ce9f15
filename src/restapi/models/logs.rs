//! Log smart alerts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CustomPayloadField, RuleWithThreshold, TimeThreshold};
use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of log smart alerts.
pub const LOG_ALERT_CONFIGS_PATH: &str = "/api/events/settings/global-alert-configs/logs";

/// Counted log messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAlertRule {
    /// `logCount`.
    pub alert_type: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
}

/// A tag the log alert is grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByTag {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Smart alert on log volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAlertConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    /// Channel ids keyed by `WARNING` and `CRITICAL`.
    #[serde(default)]
    pub alert_channels: BTreeMap<String, Vec<String>>,
    pub granularity: i64,
    pub time_threshold: TimeThreshold,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default)]
    pub rules: Vec<RuleWithThreshold<LogAlertRule>>,
    #[serde(default)]
    pub group_by: Vec<GroupByTag>,
}

impl DataObject for LogAlertConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
