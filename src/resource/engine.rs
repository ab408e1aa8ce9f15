//! The generic create/read/update/delete state machine.

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::plan::{plan_resource, strip_unknowns};
use super::{ResourceHandle, ResourceMetaData};
use crate::error::ProviderError;
use crate::provider::ProviderMeta;
use crate::restapi::{DataObject, ReadOnlyRestResource, RestResource};
use crate::schema::{Diagnostic, Schema};
use crate::types::PlanResult;
use crate::validation::validate;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 18;

/// Generate an id for entities whose id is chosen by the client.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// A resource as seen by the provider, independent of its entity type.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// The static description of the resource.
    fn metadata(&self) -> &ResourceMetaData;

    /// The schema of the resource.
    fn schema(&self) -> &Schema {
        &self.metadata().schema
    }

    /// Validate a configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    /// Compute the plan for a proposed state.
    fn plan(&self, prior: Option<&Value>, proposed: Value) -> PlanResult;

    /// Create the entity and return the new state.
    async fn create(
        &self,
        meta: Option<&ProviderMeta>,
        plan: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError>;

    /// Refresh the state; `None` when the entity no longer exists.
    async fn read(
        &self,
        meta: Option<&ProviderMeta>,
        state: Value,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update the entity and return the new state.
    async fn update(
        &self,
        meta: Option<&ProviderMeta>,
        prior: Value,
        plan: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError>;

    /// Delete the entity.
    ///
    /// An entity the API no longer knows counts as deleted: a not-found
    /// response returns `Ok(())` so the host can drop it from state.
    async fn delete(
        &self,
        meta: Option<&ProviderMeta>,
        state: Value,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// The state of an imported entity: only the id attribute is set.
    fn import(&self, id: &str) -> Result<Value, ProviderError>;

    /// Migrate a state stored with an older schema version.
    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError>;
}

/// Drives a [`ResourceHandle`] through the resource lifecycle.
pub struct ResourceFramework<H> {
    handle: H,
}

impl<H: ResourceHandle> ResourceFramework<H> {
    /// Wrap a handle.
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    /// The wrapped handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    fn meta<'a>(&self, meta: Option<&'a ProviderMeta>) -> Result<&'a ProviderMeta, ProviderError> {
        meta.ok_or(ProviderError::NotConfigured)
    }

    fn name(&self) -> &'static str {
        self.handle.metadata().resource_name
    }

    fn id_of<'a>(&self, state: &'a Value) -> Option<&'a str> {
        state
            .get(self.handle.metadata().id_field)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    fn set_id(&self, state: &mut Value, id: &str) -> Result<(), ProviderError> {
        let field = self.handle.metadata().id_field;
        match state.as_object_mut() {
            Some(map) => {
                map.insert(field.to_string(), Value::String(id.to_string()));
                Ok(())
            },
            None => Err(ProviderError::Internal(format!(
                "state of {} is not an object",
                self.name()
            ))),
        }
    }
}

#[async_trait]
impl<H: ResourceHandle> ManagedResource for ResourceFramework<H> {
    fn metadata(&self) -> &ResourceMetaData {
        self.handle.metadata()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let schema = &self.handle.metadata().schema;
        let mut diagnostics = validate(schema, config);
        if let Some(message) = &schema.deprecation_message {
            diagnostics.push(
                Diagnostic::warning(format!("Resource {} is deprecated", self.metadata().type_name()))
                    .with_detail(message.clone()),
            );
        }
        diagnostics
    }

    fn plan(&self, prior: Option<&Value>, proposed: Value) -> PlanResult {
        let metadata = self.handle.metadata();
        plan_resource(&metadata.schema, prior, proposed, metadata.create_only)
    }

    async fn create(
        &self,
        meta: Option<&ProviderMeta>,
        plan: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let meta = self.meta(meta)?;
        let metadata = self.handle.metadata();
        let mut plan = if plan.is_null() {
            Value::Object(Default::default())
        } else {
            plan
        };

        let generated = if metadata.skip_id_generation {
            None
        } else {
            let id = generate_id();
            self.set_id(&mut plan, &id)?;
            Some(id)
        };
        let partial = |err: ProviderError, plan: &Value| match generated {
            Some(_) => ProviderError::PartialState {
                state: strip_unknowns(plan),
                source: Box::new(err),
            },
            None => err,
        };

        if let Err(err) = self.handle.set_computed_fields(&mut plan) {
            return Err(partial(err, &plan));
        }
        let object = match self.handle.map_state_to_data_object(Some(&plan), None) {
            Ok(object) => object,
            Err(err) => return Err(partial(err, &plan)),
        };

        debug!(resource = self.name(), "creating entity");
        let created = match self
            .handle
            .rest_resource(&meta.api)
            .create(&object, cancel)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                warn!(resource = self.name(), error = %err, "create failed");
                return Err(partial(err.into(), &plan));
            },
        };

        let state = self.handle.update_state(Some(&plan), &created)?;
        let Some(id) = self.id_of(&state).map(str::to_string) else {
            return Err(ProviderError::Internal(format!(
                "created {} has no {}",
                self.name(),
                metadata.id_field
            )));
        };
        info!(resource = self.name(), id = %id, "created entity");
        Ok(state)
    }

    async fn read(
        &self,
        meta: Option<&ProviderMeta>,
        state: Value,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ProviderError> {
        let meta = self.meta(meta)?;
        let id_field = self.handle.metadata().id_field;
        let id = self
            .id_of(&state)
            .ok_or_else(|| ProviderError::attribute(id_field, "Resource ID is missing"))?;

        match self.handle.rest_resource(&meta.api).get_one(id, cancel).await {
            // The prior state stands in for the plan: values the API does not
            // echo stay as they were.
            Ok(object) => Ok(Some(self.handle.update_state(Some(&state), &object)?)),
            Err(err) if err.is_not_found() => {
                info!(resource = self.name(), id, "entity no longer exists, removing it from state");
                Ok(None)
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        meta: Option<&ProviderMeta>,
        prior: Value,
        plan: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let meta = self.meta(meta)?;
        let prior_id = self.id_of(&prior).map(str::to_string);

        let object = self
            .handle
            .map_state_to_data_object(Some(&plan), Some(&prior))?;
        debug!(resource = self.name(), id = object.id(), "updating entity");
        let updated = self
            .handle
            .rest_resource(&meta.api)
            .update(&object, cancel)
            .await?;

        let mut state = self.handle.update_state(Some(&plan), &updated)?;
        if let Some(id) = prior_id {
            self.set_id(&mut state, &id)?;
        }
        Ok(state)
    }

    async fn delete(
        &self,
        meta: Option<&ProviderMeta>,
        state: Value,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let meta = self.meta(meta)?;
        let object = self.handle.map_state_to_data_object(None, Some(&state))?;
        match self.handle.rest_resource(&meta.api).delete(&object, cancel).await {
            Ok(()) => {
                info!(resource = self.name(), id = object.id_for_resource_path(), "deleted entity");
                Ok(())
            },
            Err(err) if err.is_not_found() => {
                debug!(resource = self.name(), "entity already gone");
                Ok(())
            },
            Err(err) => Err(err.into()),
        }
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        if id.is_empty() {
            return Err(ProviderError::Validation("import id must not be empty".to_string()));
        }
        let mut state = Value::Object(Default::default());
        self.set_id(&mut state, id)?;
        Ok(state)
    }

    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        let current = self.handle.metadata().schema_version();
        if version > current {
            return Err(ProviderError::Validation(format!(
                "state of {} has schema version {} but the provider supports up to {}",
                self.name(),
                version,
                current
            )));
        }
        let upgraders = self.handle.state_upgraders();
        let mut state = state;
        for from in version..current {
            let upgrader = upgraders.get(&from).ok_or_else(|| {
                ProviderError::Internal(format!(
                    "no state upgrader of {} from version {}",
                    self.name(),
                    from
                ))
            })?;
            debug!(resource = self.name(), from, "upgrading state");
            state = upgrader(state)?;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restapi::models::{AlertingChannel, AlertingChannelKind};
    use crate::restapi::InstanaApi;
    use crate::schema::{Attribute, DiagnosticSeverity};
    use crate::value::{ObjectReader, ObjectWriter};
    use serde_json::json;

    struct LegacyChannel {
        metadata: ResourceMetaData,
    }

    impl LegacyChannel {
        fn new() -> Self {
            let schema = Schema::v0()
                .with_attribute("id", Attribute::computed_string())
                .with_attribute("name", Attribute::required_string())
                .with_deprecation_message("use instana_alerting_channel instead");
            Self {
                metadata: ResourceMetaData::new("alerting_channel_email", schema),
            }
        }
    }

    impl ResourceHandle for LegacyChannel {
        type Object = AlertingChannel;

        fn metadata(&self) -> &ResourceMetaData {
            &self.metadata
        }

        fn rest_resource(&self, api: &InstanaApi) -> Box<dyn RestResource<AlertingChannel>> {
            api.alerting_channels()
        }

        fn map_state_to_data_object(
            &self,
            plan: Option<&Value>,
            state: Option<&Value>,
        ) -> Result<AlertingChannel, ProviderError> {
            let reader = ObjectReader::new(crate::resource::plan_or_state(plan, state)?)?;
            Ok(AlertingChannel::new(
                reader.optional::<String>("id")?.unwrap_or_default(),
                reader.required::<String>("name")?,
                AlertingChannelKind::Email,
            ))
        }

        fn update_state(&self, _plan: Option<&Value>, channel: &AlertingChannel) -> Result<Value, ProviderError> {
            Ok(ObjectWriter::new()
                .set("id", channel.id.clone())
                .set("name", channel.name.clone())
                .into_value())
        }
    }

    #[test]
    fn test_generated_ids() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(generate_id(), id);
    }

    #[test]
    fn test_deprecated_resource_warns_on_validate() {
        let framework = ResourceFramework::new(LegacyChannel::new());
        let diagnostics = framework.validate(&json!({"name": "ops"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert!(diagnostics[0].summary.contains("instana_alerting_channel_email"));
    }

    #[test]
    fn test_import_sets_only_the_id() {
        let framework = ResourceFramework::new(LegacyChannel::new());
        assert_eq!(framework.import("chan-1").unwrap(), json!({"id": "chan-1"}));
        assert!(framework.import("").is_err());
    }

    #[tokio::test]
    async fn test_lifecycle_requires_configuration() {
        let framework = ResourceFramework::new(LegacyChannel::new());
        let cancel = CancellationToken::new();
        let err = framework
            .create(None, json!({"name": "ops"}), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));
        assert_eq!(framework.handle().metadata().resource_name, "alerting_channel_email");
    }
}
