//! Custom dashboards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AccessRule;
use crate::restapi::DataObject;

/// Path of custom dashboards.
pub const CUSTOM_DASHBOARDS_PATH: &str = "/api/custom-dashboard";

/// A custom dashboard. Widgets are passed through as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDashboard {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub access_rules: Vec<AccessRule>,
    #[serde(default)]
    pub widgets: Value,
}

impl DataObject for CustomDashboard {
    fn id(&self) -> &str {
        &self.id
    }
}
