use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{id_attribute, string_list, string_map};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, ResourceHandle, ResourceMetaData};
use crate::restapi::models::{
    ActionConfiguration, ActionReference, AutomationPolicy, InputParameterValue, PolicyCondition,
    PolicyTrigger, RunConfiguration, Runnable, TriggerScheduling, TypeConfiguration,
};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const TRIGGER_TYPES: &[&str] = &[
    "customEvent",
    "builtinEvent",
    "applicationSmartAlert",
    "globalApplicationSmartAlert",
    "websiteSmartAlert",
    "infraSmartAlert",
    "mobileAppSmartAlert",
    "syntheticsSmartAlert",
    "logSmartAlert",
    "sloSmartAlert",
    "schedule",
];
const SCHEDULE: &str = "schedule";
const POLICY_TYPES: &[&str] = &["manual", "automatic"];
const DURATION_UNITS: &[&str] = &["MINUTE", "HOUR", "DAY"];

/// `instana_automation_policy`: runs automation actions when a trigger fires.
pub struct AutomationPolicyResource {
    metadata: ResourceMetaData,
}

impl AutomationPolicyResource {
    /// Create the resource.
    pub fn new() -> Self {
        let scheduling = Block::new()
            .with_attribute(
                "start_time",
                Attribute::required_int64().with_description("Milliseconds since the epoch"),
            )
            .with_attribute("duration", Attribute::optional_int64())
            .with_attribute(
                "duration_unit",
                Attribute::optional_string().with_validator(Validator::one_of(DURATION_UNITS)),
            )
            .with_attribute("recurrent_rule", Attribute::optional_string());
        let trigger = Block::new()
            .with_attribute("id", Attribute::required_string())
            .with_attribute(
                "type",
                Attribute::required_string().with_validator(Validator::one_of(TRIGGER_TYPES)),
            )
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("description", Attribute::optional_string())
            .with_block("scheduling", NestedBlock::single(scheduling));
        let action = Block::new()
            .with_attribute("action_id", Attribute::required_string())
            .with_attribute("agent_id", Attribute::optional_string())
            .with_attribute("input_parameters", string_map(AttributeFlags::optional()));
        let type_configuration = Block::new()
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::one_of(POLICY_TYPES)),
            )
            .with_block(
                "condition",
                NestedBlock::single(Block::new().with_attribute("query", Attribute::required_string())),
            )
            .with_block("action", NestedBlock::list(action).with_min_items(1));

        let schema = Schema::v0()
            .with_description("Automation policy of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::required_string())
            .with_attribute("tags", string_list(AttributeFlags::optional()))
            .with_block("trigger", NestedBlock::single(trigger).with_min_items(1))
            .with_block(
                "type_configuration",
                NestedBlock::list(type_configuration).with_min_items(1),
            );

        Self {
            metadata: ResourceMetaData::new("automation_policy", schema),
        }
    }
}

impl Default for AutomationPolicyResource {
    fn default() -> Self {
        Self::new()
    }
}

fn read_trigger(reader: &ObjectReader<'_>) -> Result<PolicyTrigger, ProviderError> {
    let trigger = reader
        .nested("trigger")?
        .ok_or_else(|| ProviderError::attribute("trigger", "a value is required"))?;
    let kind: String = trigger.required("type")?;
    let scheduling = match trigger.nested("scheduling")? {
        Some(scheduling) => Some(TriggerScheduling {
            start_time: Some(scheduling.required("start_time")?),
            duration: scheduling.optional("duration")?,
            duration_unit: scheduling.optional("duration_unit")?,
            recurrent_rule: scheduling.optional::<String>("recurrent_rule")?,
            recurrent: None,
        }),
        None if kind == SCHEDULE => {
            return Err(ProviderError::attribute(
                trigger.path("scheduling"),
                "schedule triggers need a scheduling block",
            ));
        },
        None => None,
    };
    let scheduling = scheduling.map(|mut scheduling| {
        scheduling.recurrent = Some(scheduling.recurrent_rule.is_some());
        scheduling
    });
    Ok(PolicyTrigger {
        id: trigger.required("id")?,
        kind,
        name: trigger.optional("name")?,
        description: trigger.optional("description")?,
        scheduling,
    })
}

fn read_type_configuration(reader: &ObjectReader<'_>) -> Result<TypeConfiguration, ProviderError> {
    let actions = reader
        .nested_list("action")?
        .iter()
        .map(|action| {
            let parameters: BTreeMap<String, String> =
                action.optional("input_parameters")?.unwrap_or_default();
            Ok(ActionConfiguration {
                action: ActionReference { id: action.required("action_id")? },
                agent_id: action.optional("agent_id")?.unwrap_or_default(),
                input_parameter_values: parameters
                    .into_iter()
                    .map(|(name, value)| InputParameterValue { name, value })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    let Some(first) = actions.first() else {
        return Err(ProviderError::attribute(reader.path("action"), "at least one action is required"));
    };
    let condition = match reader.nested("condition")? {
        Some(condition) => Some(PolicyCondition { query: condition.required("query")? }),
        None => None,
    };
    Ok(TypeConfiguration {
        name: reader.required("name")?,
        condition,
        runnable: Runnable {
            id: first.action.id.clone(),
            kind: Runnable::ACTION.to_string(),
            run_configuration: RunConfiguration { actions },
        },
    })
}

fn trigger_state(trigger: &PolicyTrigger) -> ObjectWriter {
    let scheduling = trigger.scheduling.as_ref().map(|scheduling| {
        ObjectWriter::new()
            .set("start_time", scheduling.start_time)
            .set("duration", scheduling.duration)
            .set("duration_unit", scheduling.duration_unit.clone())
            .set("recurrent_rule", scheduling.recurrent_rule.clone())
    });
    ObjectWriter::new()
        .set("id", trigger.id.clone())
        .set("type", trigger.kind.clone())
        .set("name", trigger.name.clone())
        .set("description", trigger.description.clone())
        .set_block("scheduling", scheduling)
}

fn type_configuration_state(configuration: &TypeConfiguration) -> ObjectWriter {
    let actions = configuration
        .runnable
        .run_configuration
        .actions
        .iter()
        .map(|action| {
            let parameters: BTreeMap<&str, &str> = action
                .input_parameter_values
                .iter()
                .map(|p| (p.name.as_str(), p.value.as_str()))
                .collect();
            ObjectWriter::new()
                .set("action_id", action.action.id.clone())
                .set("agent_id", (!action.agent_id.is_empty()).then(|| action.agent_id.clone()))
                .set("input_parameters", (!parameters.is_empty()).then(|| json!(parameters)))
        })
        .collect();
    let condition = configuration
        .condition
        .as_ref()
        .map(|condition| ObjectWriter::new().set("query", condition.query.clone()));
    ObjectWriter::new()
        .set("name", configuration.name.clone())
        .set_block("condition", condition)
        .set_blocks("action", actions)
}

impl ResourceHandle for AutomationPolicyResource {
    type Object = AutomationPolicy;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<AutomationPolicy>> {
        api.automation_policies()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<AutomationPolicy, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let type_configurations = reader
            .nested_list("type_configuration")?
            .iter()
            .map(read_type_configuration)
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(AutomationPolicy {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?.unwrap_or_default(),
            tags: reader.optional("tags")?.unwrap_or_default(),
            trigger: read_trigger(&reader)?,
            type_configurations,
        })
    }

    fn update_state(&self, _plan: Option<&Value>, policy: &AutomationPolicy) -> Result<Value, ProviderError> {
        Ok(ObjectWriter::new()
            .set("id", policy.id.clone())
            .set("name", policy.name.clone())
            .set("description", policy.description.clone())
            .set("tags", (!policy.tags.is_empty()).then(|| policy.tags.clone()))
            .set_block("trigger", Some(trigger_state(&policy.trigger)))
            .set_blocks(
                "type_configuration",
                policy.type_configurations.iter().map(type_configuration_state).collect(),
            )
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Value {
        json!({
            "id": "policy-1",
            "name": "restart on crash",
            "description": "restart the pod when the event fires",
            "tags": ["ops"],
            "trigger": {"id": "event-1", "type": "customEvent", "name": "pod crashed"},
            "type_configuration": [{
                "name": "automatic",
                "condition": {"query": "entity.kubernetes.namespace:shop"},
                "action": [
                    {"action_id": "action-1", "agent_id": "agent-1", "input_parameters": {"pod": "checkout", "force": "true"}},
                    {"action_id": "action-2"}
                ]
            }]
        })
    }

    #[test]
    fn test_runnable_uses_first_action() {
        let resource = AutomationPolicyResource::new();
        let policy = resource.map_state_to_data_object(Some(&plan()), None).unwrap();
        let configuration = &policy.type_configurations[0];
        assert_eq!(configuration.runnable.id, "action-1");
        assert_eq!(configuration.runnable.kind, "action");
        let actions = &configuration.runnable.run_configuration.actions;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].input_parameter_values[0].name, "force");
        assert!(actions[1].agent_id.is_empty());
        assert!(policy.trigger.scheduling.is_none());
    }

    #[test]
    fn test_state_round_trip() {
        let resource = AutomationPolicyResource::new();
        let plan = plan();
        let policy = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let state = resource.update_state(Some(&plan), &policy).unwrap();
        assert_eq!(state["type_configuration"][0]["action"][0]["input_parameters"]["pod"], "checkout");
        assert_eq!(state["type_configuration"][0]["action"][1]["agent_id"], Value::Null);
        let again = resource.map_state_to_data_object(Some(&state), None).unwrap();
        assert_eq!(policy, again);
    }

    #[test]
    fn test_schedule_trigger() {
        let resource = AutomationPolicyResource::new();
        let mut plan = plan();
        plan["trigger"] = json!({"id": "nightly", "type": "schedule"});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("trigger.scheduling"));

        plan["trigger"]["scheduling"] = json!({
            "start_time": 1700000000000i64, "duration": 1, "duration_unit": "HOUR", "recurrent_rule": "FREQ=DAILY"
        });
        let policy = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        let scheduling = policy.trigger.scheduling.unwrap();
        assert_eq!(scheduling.recurrent, Some(true));
        assert_eq!(scheduling.start_time, Some(1700000000000));
    }

    #[test]
    fn test_type_configuration_needs_action() {
        let resource = AutomationPolicyResource::new();
        let mut plan = plan();
        plan["type_configuration"][0]["action"] = json!([]);
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("type_configuration.0.action"));
    }
}
