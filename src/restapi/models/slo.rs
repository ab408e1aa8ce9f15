//! Service level indicators, objectives, their alerts and corrections.

use serde::{Deserialize, Serialize};

use super::CustomPayloadField;
use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of SLI configurations.
pub const SLI_CONFIGS_PATH: &str = "/api/settings/v2/sli";

/// Path of service level objectives.
pub const SLO_CONFIGS_PATH: &str = "/api/settings/slo";

/// Path of SLO smart alerts.
pub const SLO_ALERT_CONFIGS_PATH: &str = "/api/events/settings/global-alert-configs/service-levels";

/// Path of SLO correction windows.
pub const SLO_CORRECTION_CONFIGS_PATH: &str = "/api/settings/correction";

/// The metric of a time based indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfiguration {
    pub metric_name: String,
    pub aggregation: String,
    pub threshold: f64,
}

/// The entity an indicator is measured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliEntity {
    /// `application`, `availability`, `websiteEventBased` or `websiteTimeBased`.
    pub sli_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_event_filter_expression: Option<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_event_filter_expression: Option<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_synthetic: Option<bool>,
}

impl SliEntity {
    /// An entity of the given type with nothing else set.
    pub fn new(sli_type: impl Into<String>) -> Self {
        Self {
            sli_type: sli_type.into(),
            application_id: None,
            service_id: None,
            endpoint_id: None,
            boundary_scope: None,
            website_id: None,
            beacon_type: None,
            bad_event_filter_expression: None,
            good_event_filter_expression: None,
            filter_expression: None,
            include_internal: None,
            include_synthetic: None,
        }
    }
}

/// A service level indicator. Indicators cannot be changed once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliConfig {
    #[serde(default)]
    pub id: String,
    pub sli_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_evaluation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_configuration: Option<MetricConfiguration>,
    pub sli_entity: SliEntity,
}

impl DataObject for SliConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

/// When a correction window is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    /// Milliseconds since the epoch.
    pub start_time: i64,
    pub duration: i64,
    /// `MINUTE`, `HOUR` or `DAY`.
    pub duration_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrent_rule: Option<String>,
    #[serde(default)]
    pub recurrent: bool,
}

/// A window excluded from SLO evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloCorrectionConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub scheduling: Scheduling,
    #[serde(default)]
    pub slo_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DataObject for SloCorrectionConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Tag restricting who can see an objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacTag {
    pub display_name: String,
    pub id: String,
}

/// What an objective is measured on.
///
/// Which fields are populated depends on [`SloEntity::kind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloEntity {
    /// `application`, `website`, `synthetic` or `infrastructure`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_synthetic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synthetic_test_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_type: Option<String>,
}

impl SloEntity {
    /// An entity of the given type with nothing else set.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            application_id: None,
            service_id: None,
            endpoint_id: None,
            boundary_scope: None,
            include_synthetic: None,
            include_internal: None,
            tag_filter_expression: None,
            website_id: None,
            beacon_type: None,
            synthetic_test_ids: Vec::new(),
            infra_type: None,
        }
    }
}

/// How good and bad events or time slices are counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloIndicator {
    /// `latency`, `availability`, `traffic` or `custom`.
    pub blueprint: String,
    /// `timeBased` or `eventBased`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// `all` or `erroneous`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_events_filter: Option<TagFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_events_filter: Option<TagFilter>,
}

impl SloIndicator {
    /// An indicator of the given blueprint and measurement type.
    pub fn new(blueprint: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            blueprint: blueprint.into(),
            kind: kind.into(),
            threshold: None,
            aggregation: None,
            operator: None,
            traffic_type: None,
            good_events_filter: None,
            bad_events_filter: None,
        }
    }
}

/// Period an objective is evaluated over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloTimeWindow {
    /// `rolling` or `fixed`.
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: i64,
    /// `day` or `week`.
    pub duration_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Start of a fixed window in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<f64>,
}

/// A service level objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Fraction of good events or time, between 0 and 1.
    pub target: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub entity: SloEntity,
    pub indicator: SloIndicator,
    pub time_window: SloTimeWindow,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rbac_tags: Vec<RbacTag>,
}

impl DataObject for SloConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Alert type and metric watched by an SLO smart alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloAlertRule {
    /// `SERVICE_LEVELS_OBJECTIVE` or `ERROR_BUDGET`.
    pub alert_type: String,
    /// `STATUS`, `BURNED_PERCENTAGE` or `BURN_RATE_V2`.
    pub metric: String,
}

/// Static threshold of an SLO smart alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloAlertThreshold {
    #[serde(rename = "type")]
    pub kind: String,
    pub operator: String,
    pub value: f64,
}

/// Warm up and cool down of an SLO smart alert in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloAlertTimeThreshold {
    pub time_window: i64,
    pub expiry: i64,
}

/// Operator and value compared against a burn rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRateThreshold {
    pub operator: String,
    pub value: f64,
}

/// One evaluation window of a burn rate alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRateConfig {
    /// `SINGLE`, `LONG` or `SHORT`.
    pub alert_window_type: String,
    pub duration: i64,
    /// `MINUTE`, `HOUR` or `DAY`.
    pub duration_unit_type: String,
    pub threshold: BurnRateThreshold,
}

/// Smart alert on service level objectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloAlertConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: i32,
    #[serde(default)]
    pub triggering: bool,
    #[serde(default)]
    pub enabled: bool,
    pub rule: SloAlertRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<SloAlertThreshold>,
    pub time_threshold: SloAlertTimeThreshold,
    #[serde(default)]
    pub slo_ids: Vec<String>,
    #[serde(default)]
    pub alert_channel_ids: Vec<String>,
    #[serde(default)]
    pub custom_payload_fields: Vec<CustomPayloadField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub burn_rate_configs: Vec<BurnRateConfig>,
}

impl DataObject for SloAlertConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slo_indicator_filter_names() {
        let indicator: SloIndicator = serde_json::from_value(json!({
            "blueprint": "custom",
            "type": "eventBased",
            "goodEventsFilter": {"type": "TAG_FILTER", "name": "call.erroneous", "operator": "EQUALS", "entity": "NOT_APPLICABLE", "value": "false"}
        }))
        .unwrap();
        assert!(indicator.good_events_filter.is_some());
        assert!(indicator.bad_events_filter.is_none());

        let value = serde_json::to_value(SloIndicator::new("latency", "timeBased")).unwrap();
        assert_eq!(value, json!({"blueprint": "latency", "type": "timeBased"}));
    }

    #[test]
    fn test_slo_alert_burn_rate_json() {
        let config: SloAlertConfig = serde_json::from_value(json!({
            "id": "sa-1",
            "name": "burn",
            "description": "fast burn",
            "severity": 10,
            "rule": {"alertType": "ERROR_BUDGET", "metric": "BURN_RATE_V2"},
            "timeThreshold": {"timeWindow": 60000, "expiry": 60000},
            "sloIds": ["slo-1"],
            "alertChannelIds": [],
            "burnRateConfigs": [{
                "alertWindowType": "SINGLE",
                "duration": 1,
                "durationUnitType": "HOUR",
                "threshold": {"operator": ">=", "value": 2.0}
            }]
        }))
        .unwrap();
        assert!(config.threshold.is_none());
        assert_eq!(config.burn_rate_configs[0].threshold.value, 2.0);
    }
}
