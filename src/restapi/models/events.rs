//! Event specifications.

use serde::{Deserialize, Serialize};

use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of custom event specifications.
pub const CUSTOM_EVENT_SPECIFICATIONS_PATH: &str =
    "/api/events/settings/event-specifications/custom";

/// Path of built-in event specifications.
pub const BUILTIN_EVENT_SPECIFICATIONS_PATH: &str =
    "/api/events/settings/event-specifications/built-in";

/// Metric name pattern of threshold rules on dynamic metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPattern {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postfix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// `is`, `contains`, `any`, `startsWith` or `endsWith`.
    pub operator: String,
}

/// A rule of a custom event.
///
/// Which fields are populated depends on [`RuleSpecification::rule_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpecification {
    /// `threshold`, `system`, `entity_verification`, `entity_count`,
    /// `entity_count_verification` or `host_availability`.
    pub rule_type: String,
    pub severity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_pattern: Option<MetricPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_entity_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_after: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter: Option<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_rule_id: Option<String>,
}

impl RuleSpecification {
    /// A rule of the given type with only the severity set.
    pub fn new(rule_type: impl Into<String>, severity: i32) -> Self {
        Self {
            rule_type: rule_type.into(),
            severity,
            metric_name: None,
            metric_pattern: None,
            rollup: None,
            window: None,
            aggregation: None,
            condition_operator: None,
            condition_value: None,
            matching_entity_type: None,
            matching_operator: None,
            matching_entity_label: None,
            offline_duration: None,
            close_after: None,
            tag_filter: None,
            system_rule_id: None,
        }
    }
}

/// A user defined event raised when its rules match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEventSpecification {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub enabled: bool,
    /// `AND` or `OR`.
    #[serde(default = "default_rule_logical_operator")]
    pub rule_logical_operator: String,
    #[serde(default)]
    pub rules: Vec<RuleSpecification>,
}

fn default_rule_logical_operator() -> String {
    "AND".to_string()
}

impl DataObject for CustomEventSpecification {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An event shipped with Instana.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinEventSpecification {
    pub id: String,
    pub short_plugin_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub severity: i32,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default)]
    pub enabled: bool,
}

impl DataObject for BuiltinEventSpecification {
    fn id(&self) -> &str {
        &self.id
    }
}
