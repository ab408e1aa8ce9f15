//! Application perspectives.

use serde::{Deserialize, Serialize};

use super::AccessRule;
use crate::restapi::DataObject;
use crate::tagfilter::TagFilter;

/// Path of application configurations.
pub const APPLICATION_CONFIGS_PATH: &str = "/api/application-monitoring/settings/application";

/// An application perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfig {
    #[serde(default)]
    pub id: String,
    pub label: String,
    /// `INCLUDE_NO_DOWNSTREAM`, `INCLUDE_IMMEDIATE_DOWNSTREAM_DATABASE_AND_MESSAGING` or
    /// `INCLUDE_ALL_DOWNSTREAM`.
    pub scope: String,
    pub boundary_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter_expression: Option<TagFilter>,
    #[serde(default)]
    pub access_rules: Vec<AccessRule>,
}

impl DataObject for ApplicationConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
