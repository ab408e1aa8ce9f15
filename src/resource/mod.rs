//! The contract between concrete resources and the lifecycle engine.
//!
//! A resource supplies a [`ResourceMetaData`] descriptor and implements
//! [`ResourceHandle`]: which endpoint to talk to and how to translate between
//! the attribute tree and its [`DataObject`]. The [`ResourceFramework`]
//! turns a handle into a [`ManagedResource`] the provider can drive.

mod engine;
pub mod plan;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ProviderError;
use crate::restapi::{DataObject, InstanaApi, RestResource};
use crate::schema::Schema;

pub use engine::{generate_id, ManagedResource, ResourceFramework};

/// Prefix of every resource and data source type name.
pub const TYPE_NAME_PREFIX: &str = "instana_";

/// Name of the default id attribute.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Full type name of a resource or data source.
pub fn type_name(resource_name: &str) -> String {
    format!("{}{}", TYPE_NAME_PREFIX, resource_name)
}

/// Migrates a state of one schema version to the next.
pub type StateUpgrader = fn(Value) -> Result<Value, ProviderError>;

/// Upgrader for versions whose state layout did not change.
pub fn unchanged_state(state: Value) -> Result<Value, ProviderError> {
    Ok(state)
}

/// Static description of a resource.
#[derive(Debug, Clone)]
pub struct ResourceMetaData {
    /// Name without the `instana_` prefix.
    pub resource_name: &'static str,
    /// Attribute tree; its version is the current schema version.
    pub schema: Schema,
    /// Attribute holding the id used to read the resource.
    pub id_field: &'static str,
    /// The API assigns the id; none is generated before create.
    pub skip_id_generation: bool,
    /// The API offers no update; every change replaces the resource.
    pub create_only: bool,
}

impl ResourceMetaData {
    /// Describe a resource with a locally generated `id`.
    pub fn new(resource_name: &'static str, schema: Schema) -> Self {
        Self {
            resource_name,
            schema,
            id_field: DEFAULT_ID_FIELD,
            skip_id_generation: false,
            create_only: false,
        }
    }

    /// Read the resource by another attribute than `id`.
    pub fn with_id_field(mut self, id_field: &'static str) -> Self {
        self.id_field = id_field;
        self
    }

    /// Let the API assign the id.
    pub fn with_skip_id_generation(mut self) -> Self {
        self.skip_id_generation = true;
        self
    }

    /// Mark the resource as immutable.
    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    /// The full type name, e.g. `instana_alerting_channel`.
    pub fn type_name(&self) -> String {
        type_name(self.resource_name)
    }

    /// The current schema version.
    pub fn schema_version(&self) -> u64 {
        self.schema.version
    }
}

/// Behavior a concrete resource plugs into the lifecycle engine.
pub trait ResourceHandle: Send + Sync + 'static {
    /// The entity managed by this resource.
    type Object: DataObject;

    /// The static description of the resource.
    fn metadata(&self) -> &ResourceMetaData;

    /// Select the endpoint of the entity.
    fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<Self::Object>>;

    /// Fill values computed by the provider before the entity is created.
    fn set_computed_fields(&self, plan: &mut Value) -> Result<(), ProviderError> {
        let _ = plan;
        Ok(())
    }

    /// Build the entity from the plan, or from the state when there is no plan.
    fn map_state_to_data_object(
        &self,
        plan: Option<&Value>,
        state: Option<&Value>,
    ) -> Result<Self::Object, ProviderError>;

    /// Build the state from an entity returned by the API.
    ///
    /// The plan (on read, the prior state) lets the mapping keep configured
    /// values the API does not echo. The result never contains unknown values.
    fn update_state(&self, plan: Option<&Value>, object: &Self::Object) -> Result<Value, ProviderError>;

    /// Upgraders keyed by the schema version they migrate from.
    fn state_upgraders(&self) -> BTreeMap<u64, StateUpgrader> {
        BTreeMap::new()
    }
}

/// Pick the plan when present, the state otherwise.
pub fn plan_or_state<'a>(
    plan: Option<&'a Value>,
    state: Option<&'a Value>,
) -> Result<&'a Value, ProviderError> {
    plan.or(state)
        .ok_or_else(|| ProviderError::Internal("neither plan nor state given".to_string()))
}

/// Rename a top level attribute of a state, used by upgraders.
pub fn rename_attribute(mut state: Value, from: &str, to: &str) -> Value {
    if let Some(map) = state.as_object_mut() {
        if let Some(value) = map.remove(from) {
            map.insert(to.to_string(), value);
        }
    }
    state
}

/// Drop a top level attribute of a state, used by upgraders.
pub fn remove_attribute(mut state: Value, name: &str) -> Value {
    if let Some(map) = state.as_object_mut() {
        map.remove(name);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_name() {
        assert_eq!(type_name("api_token"), "instana_api_token");
        let meta = ResourceMetaData::new("group", Schema::new(1));
        assert_eq!(meta.type_name(), "instana_group");
        assert_eq!(meta.schema_version(), 1);
        assert_eq!(meta.id_field, "id");
        assert!(!meta.skip_id_generation);
    }

    #[test]
    fn test_rename_attribute() {
        let state = rename_attribute(json!({"full_name": "ci", "id": "1"}), "full_name", "name");
        assert_eq!(state, json!({"name": "ci", "id": "1"}));

        let untouched = rename_attribute(json!({"id": "1"}), "full_name", "name");
        assert_eq!(untouched, json!({"id": "1"}));
    }

    #[test]
    fn test_plan_or_state() {
        let plan = json!({"a": 1});
        let state = json!({"a": 2});
        assert_eq!(plan_or_state(Some(&plan), Some(&state)).unwrap(), &plan);
        assert_eq!(plan_or_state(None, Some(&state)).unwrap(), &state);
        assert!(plan_or_state(None, None).is_err());
    }
}
