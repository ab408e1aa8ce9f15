//! Synthetic monitoring: locations, tests and their smart alerts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CustomPayloadField;
use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of synthetic test locations.
pub const SYNTHETIC_LOCATIONS_PATH: &str = "/api/synthetics/settings/locations";

/// Path of synthetic tests.
pub const SYNTHETIC_TESTS_PATH: &str = "/api/synthetics/settings/tests";

/// Path of synthetic smart alerts.
pub const SYNTHETIC_ALERT_CONFIGS_PATH: &str = "/api/events/settings/global-alert-configs/synthetics";

/// A location running synthetic tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticLocation {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// `Public` or `Private`.
    pub location_type: String,
}

impl DataObject for SyntheticLocation {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Name and value pair restricting access to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTag {
    pub name: String,
    pub value: String,
}

/// What a synthetic test does.
///
/// Which fields are populated depends on [`SyntheticTestConfig::synthetic_type`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticTestConfig {
    /// `HTTPAction`, `HTTPScript` or `SSLCertificate`.
    pub synthetic_type: String,
    #[serde(default)]
    pub mark_synthetic_call: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i32>,
    /// Duration such as `30s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_match: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expect_exists: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expect_not_empty: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// `Basic` or `Jest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining_check: Option<i32>,
    #[serde(
        default,
        rename = "acceptSelfSignedCertificate",
        skip_serializing_if = "Option::is_none"
    )]
    pub accept_self_signed_cert: Option<bool>,
}

/// A synthetic test run periodically from a set of locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticTest {
    #[serde(default)]
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mobile_apps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<String>,
    pub configuration: SyntheticTestConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub locations: Vec<String>,
    /// `Simultaneous` or `Staggered`.
    pub playback_mode: String,
    /// Minutes between two runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_frequency: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rbac_tags: Vec<ApiTag>,
}

impl DataObject for SyntheticTest {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Metric watched by a synthetic smart alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticAlertRule {
    /// `failure`.
    pub alert_type: String,
    pub metric_name: String,
    pub aggregation: String,
}

/// Consecutive failures needed to open a synthetic alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticAlertTimeThreshold {
    /// `violationsInSequence`.
    #[serde(rename = "type")]
    pub kind: String,
    pub violations_count: i32,
}

/// Smart alert on synthetic test results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticAlertConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub synthetic_test_ids: Vec<String>,
    pub severity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    pub rule: SyntheticAlertRule,
    #[serde(default)]
    pub alert_channel_ids: Vec<String>,
    pub time_threshold: SyntheticAlertTimeThreshold,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
}

impl DataObject for SyntheticAlertConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
