//! Host agents and infrastructure smart alerts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CustomPayloadField, RuleWithThreshold, TimeThreshold};
use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of infrastructure smart alerts.
pub const INFRA_ALERT_CONFIGS_PATH: &str = "/api/events/settings/infra-alert-configs";

/// A host agent reporting to Instana.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAgent {
    pub snapshot_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub plugin: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DataObject for HostAgent {
    fn id(&self) -> &str {
        &self.snapshot_id
    }
}

/// Metric condition of an infrastructure smart alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraAlertRule {
    /// Always `genericRule`.
    pub alert_type: String,
    pub metric_name: String,
    pub entity_type: String,
    pub aggregation: String,
    pub cross_series_aggregation: String,
    #[serde(default)]
    pub regex: bool,
}

impl InfraAlertRule {
    /// Discriminator of the only rule type infrastructure alerts support.
    pub const GENERIC: &'static str = "genericRule";
}

/// Smart alert on infrastructure metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraAlertConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    #[serde(default)]
    pub group_by: Vec<String>,
    pub granularity: i64,
    pub time_threshold: TimeThreshold,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default)]
    pub rules: Vec<RuleWithThreshold<InfraAlertRule>>,
    /// Channel ids keyed by `WARNING` and `CRITICAL`.
    #[serde(default)]
    pub alert_channels: BTreeMap<String, Vec<String>>,
    /// `PER_ENTITY` or `CUSTOM`.
    pub evaluation_type: String,
}

impl DataObject for InfraAlertConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
