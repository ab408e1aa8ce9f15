//! Automation actions and the policies running them.

use serde::{Deserialize, Serialize};

use crate::restapi::DataObject;

/// Path of automation actions.
pub const AUTOMATION_ACTIONS_PATH: &str = "/api/automation/actions";

/// Path of automation policies.
pub const AUTOMATION_POLICIES_PATH: &str = "/api/automation/policies";

/// A type specific field of an action, such as the script body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationField {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: String,
    /// `ascii` or `base64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default)]
    pub secured: bool,
}

/// A parameter supplied when the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationInputParameter {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub secured: bool,
}

/// A script or HTTP action run by the automation framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationAction {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `SCRIPT`, `HTTP`, `ANSIBLE`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: Vec<AutomationField>,
    #[serde(default)]
    pub input_parameters: Vec<AutomationInputParameter>,
}

impl DataObject for AutomationAction {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Recurrence of a scheduled policy trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerScheduling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// `MINUTE`, `HOUR` or `DAY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrent_rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrent: Option<bool>,
}

/// The event, smart alert or schedule starting a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTrigger {
    pub id: String,
    /// `customEvent`, `builtinEvent`, `applicationSmartAlert`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<TriggerScheduling>,
}

/// Dynamic focus query selecting the entities a policy runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCondition {
    pub query: String,
}

/// Reference to an automation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReference {
    pub id: String,
}

/// Value supplied to an input parameter of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameterValue {
    pub name: String,
    pub value: String,
}

/// An action run by a policy and the agent running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfiguration {
    pub action: ActionReference,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub input_parameter_values: Vec<InputParameterValue>,
}

/// Actions of a policy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    #[serde(default)]
    pub actions: Vec<ActionConfiguration>,
}

/// What a policy type runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runnable {
    /// Id of the first action.
    pub id: String,
    /// Always `action`.
    #[serde(rename = "type")]
    pub kind: String,
    pub run_configuration: RunConfiguration,
}

impl Runnable {
    /// Discriminator of runnables made of automation actions.
    pub const ACTION: &'static str = "action";
}

/// A manual or automatic run of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConfiguration {
    /// `manual` or `automatic`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<PolicyCondition>,
    pub runnable: Runnable,
}

/// Runs automation actions when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationPolicy {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub trigger: PolicyTrigger,
    #[serde(default)]
    pub type_configurations: Vec<TypeConfiguration>,
}

impl DataObject for AutomationPolicy {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_automation_policy_json() {
        let policy: AutomationPolicy = serde_json::from_value(json!({
            "id": "p1",
            "name": "restart",
            "description": "restart on alert",
            "trigger": {"id": "evt-1", "type": "customEvent"},
            "typeConfigurations": [{
                "name": "manual",
                "runnable": {
                    "id": "a1",
                    "type": "action",
                    "runConfiguration": {"actions": [{
                        "action": {"id": "a1"},
                        "agentId": "agent-1",
                        "inputParameterValues": [{"name": "service", "value": "shop"}]
                    }]}
                }
            }]
        }))
        .unwrap();
        let runnable = &policy.type_configurations[0].runnable;
        assert_eq!(runnable.kind, Runnable::ACTION);
        assert_eq!(runnable.run_configuration.actions[0].input_parameter_values[0].value, "shop");
        assert!(policy.tags.is_empty());
        assert!(policy.trigger.scheduling.is_none());
    }
}
