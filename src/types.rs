//! Plan, import and metadata types exchanged between the lifecycle engine
//! and the plugin protocol layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider type name; resource types are named `instana_{name}`.
pub const PROVIDER_TYPE_NAME: &str = "instana";

/// Prefix of the line printed on stdout once the server listens.
pub const HANDSHAKE_PREFIX: &str = "INSTANA_PROVIDER";

/// Version of the plugin protocol announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// One attribute that differs between prior and planned state.
///
/// `before` is `None` when the attribute appears, `after` is `None` when it
/// goes away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Dotted path of the attribute, e.g. `rule.threshold.value`.
    pub path: String,
    /// Prior value.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// The attribute gains a value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), before: None, after: Some(value) }
    }

    /// The attribute loses its value.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), before: Some(value), after: None }
    }

    /// The attribute changes from `before` to `after`.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self { path: path.into(), before: Some(before), after: Some(after) }
    }
}

fn to_wire(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: to_wire(change.before),
            after: to_wire(change.after),
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the host should expect after apply; null when destroying.
    pub planned_state: Value,
    /// Attributes that differ from the prior state.
    pub changes: Vec<AttributeChange>,
    /// The entity must be destroyed and created again.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves `state` untouched.
    pub fn no_change(state: Value) -> Self {
        Self::with_changes(state, Vec::new(), false)
    }

    /// A plan with the given changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// State produced by importing an existing Instana entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type, e.g. `instana_api_token`.
    pub resource_type: String,
    /// State holding only the identifier; a read fills in the rest.
    pub state: Value,
}

impl ImportedResource {
    /// Imported state for `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self { resource_type: resource_type.into(), state }
    }
}

/// What GetMetadata reports about the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Provider type name.
    pub type_name: String,
    /// Release version of the provider binary.
    pub version: String,
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Whether destroy plans are routed through PlanResourceChange.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_removed_attribute_encodes_empty_after() {
        let change = AttributeChange::removed("custom_payload_field", json!([{"key": "team"}]));
        let proto: crate::generated::AttributeChange = change.into();
        assert_eq!(proto.path, "custom_payload_field");
        assert_eq!(proto.before, br#"[{"key":"team"}]"#.to_vec());
        assert!(proto.after.is_empty());
    }

    #[test]
    fn test_threshold_change_encodes_both_sides() {
        let change = AttributeChange::modified("rule.threshold.value", json!(5.0), json!(10.0));
        let proto: crate::generated::AttributeChange = change.into();
        assert_eq!(proto.before, b"5.0".to_vec());
        assert_eq!(proto.after, b"10.0".to_vec());
    }

    #[test]
    fn test_unchanged_plan_keeps_state() {
        let plan = PlanResult::no_change(json!({"id": "app-1", "label": "shop"}));
        assert!(plan.changes.is_empty());
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["label"], "shop");
    }
}
