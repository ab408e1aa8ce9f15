use std::collections::BTreeMap;

use serde_json::Value;

use super::{id_attribute, string_set};
use crate::error::ProviderError;
use crate::resource::{plan_or_state, unchanged_state, ResourceHandle, ResourceMetaData, StateUpgrader};
use crate::restapi::models::{Scheduling, SloCorrectionConfig};
use crate::restapi::{InstanaApi, RestResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

const DURATION_UNITS: &[&str] = &["millisecond", "second", "minute", "hour", "day", "week", "month"];

/// `instana_slo_correction_config`: a time window excluded from SLO evaluation.
pub struct SloCorrectionConfigResource {
    metadata: ResourceMetaData,
}

impl SloCorrectionConfigResource {
    /// Create the resource.
    pub fn new() -> Self {
        let scheduling = Block::new()
            .with_attribute(
                "start_time",
                Attribute::required_int64().with_description("Start of the window in milliseconds since the epoch"),
            )
            .with_attribute("duration", Attribute::required_int64())
            .with_attribute(
                "duration_unit",
                Attribute::required_string().with_validator(Validator::one_of(DURATION_UNITS)),
            )
            .with_attribute("recurrent_rule", Attribute::optional_string())
            .with_attribute("recurrent", Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed()));

        let schema = Schema::new(1)
            .with_description("SLO correction window of Instana")
            .with_attribute("id", id_attribute())
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::LengthBetween { min: 0, max: 256 }),
            )
            .with_attribute("description", Attribute::required_string())
            .with_attribute("active", Attribute::required_bool())
            .with_attribute("slo_ids", string_set(AttributeFlags::required()))
            .with_attribute("tags", string_set(AttributeFlags::optional()))
            .with_block(
                "scheduling",
                NestedBlock::list(scheduling).with_min_items(1).with_max_items(1),
            );

        Self {
            metadata: ResourceMetaData::new("slo_correction_config", schema),
        }
    }
}

impl Default for SloCorrectionConfigResource {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(values: &[String]) -> Vec<String> {
    let mut values = values.to_vec();
    values.sort();
    values
}

impl ResourceHandle for SloCorrectionConfigResource {
    type Object = SloCorrectionConfig;

    fn metadata(&self) -> &ResourceMetaData {
        &self.metadata
    }

    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<SloCorrectionConfig>> {
        api.slo_correction_configs()
    }

    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<SloCorrectionConfig, ProviderError> {
        let reader = ObjectReader::new(plan_or_state(plan, state)?)?;
        let Some(scheduling) = reader.nested("scheduling")? else {
            return Err(ProviderError::attribute("scheduling", "a scheduling block is required"));
        };
        let scheduling = Scheduling {
            start_time: scheduling.required("start_time")?,
            duration: scheduling.required("duration")?,
            duration_unit: scheduling.required::<String>("duration_unit")?.to_uppercase(),
            recurrent_rule: scheduling.optional("recurrent_rule")?,
            recurrent: scheduling.optional("recurrent")?.unwrap_or(false),
        };

        Ok(SloCorrectionConfig {
            id: reader.optional("id")?.unwrap_or_default(),
            name: reader.optional("name")?.unwrap_or_default(),
            description: reader.optional("description")?,
            active: reader.optional("active")?.unwrap_or(false),
            scheduling,
            slo_ids: sorted(&reader.optional::<Vec<String>>("slo_ids")?.unwrap_or_default()),
            tags: sorted(&reader.optional::<Vec<String>>("tags")?.unwrap_or_default()),
        })
    }

    fn update_state(
        &self,
        _plan: Option<&Value>,
        config: &SloCorrectionConfig,
    ) -> Result<Value, ProviderError> {
        let scheduling = &config.scheduling;
        let scheduling = ObjectWriter::new()
            .set("start_time", scheduling.start_time)
            .set("duration", scheduling.duration)
            .set("duration_unit", scheduling.duration_unit.to_lowercase())
            .set("recurrent_rule", scheduling.recurrent_rule.clone())
            .set("recurrent", scheduling.recurrent);
        let tags = sorted(&config.tags);

        Ok(ObjectWriter::new()
            .set("id", config.id.clone())
            .set("name", config.name.clone())
            .set("description", config.description.clone())
            .set("active", config.active)
            .set("slo_ids", sorted(&config.slo_ids))
            .set("tags", (!tags.is_empty()).then_some(tags))
            .set_blocks("scheduling", vec![scheduling])
            .into_value())
    }

    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::from([(0, unchanged_state as StateUpgrader)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duration_unit_case() {
        let resource = SloCorrectionConfigResource::new();
        let plan = json!({
            "id": "c1",
            "name": "maintenance",
            "description": "weekly patching",
            "active": true,
            "slo_ids": ["slo-2", "slo-1"],
            "scheduling": [{"start_time": 1700000000000i64, "duration": 2, "duration_unit": "hour"}]
        });
        let config = resource.map_state_to_data_object(Some(&plan), None).unwrap();
        assert_eq!(config.scheduling.duration_unit, "HOUR");
        assert_eq!(config.slo_ids, vec!["slo-1", "slo-2"]);

        let state = resource.update_state(Some(&plan), &config).unwrap();
        assert_eq!(state["scheduling"][0]["duration_unit"], "hour");
        assert_eq!(state["scheduling"][0]["recurrent"], false);
        assert_eq!(state["tags"], Value::Null);
    }

    #[test]
    fn test_scheduling_required() {
        let resource = SloCorrectionConfigResource::new();
        let plan = json!({"name": "n", "description": "d", "active": false, "slo_ids": []});
        let err = resource.map_state_to_data_object(Some(&plan), None).unwrap_err();
        assert_eq!(err.attribute_path(), Some("scheduling"));
    }
}
