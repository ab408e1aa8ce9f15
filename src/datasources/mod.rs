//! Read-only lookups of Instana entities.

mod alerting_channel;
mod automation_action;
mod builtin_event;
mod custom_event_specification;
mod host_agents;
mod synthetic_location;
mod user;
mod users;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::restapi::InstanaApi;
use crate::schema::{Block, Schema};

pub use alerting_channel::AlertingChannelDataSource;
pub use automation_action::AutomationActionDataSource;
pub use builtin_event::BuiltinEventDataSource;
pub use custom_event_specification::CustomEventSpecificationDataSource;
pub use host_agents::HostAgentsDataSource;
pub use synthetic_location::SyntheticLocationDataSource;
pub use user::UserDataSource;
pub use users::UsersDataSource;

/// A data source of the provider.
///
/// Data sources have no state of their own; every read queries the API with
/// the configured lookup keys and returns the full attribute tree.
#[async_trait]
pub trait DataSourceHandle: Send + Sync {
    /// Name without the provider prefix.
    fn name(&self) -> &'static str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Look up the entity matching the configuration.
    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError>;
}

/// Every data source of the provider.
pub fn all() -> Vec<Arc<dyn DataSourceHandle>> {
    vec![
        Arc::new(AlertingChannelDataSource::new()),
        Arc::new(AutomationActionDataSource),
        Arc::new(BuiltinEventDataSource),
        Arc::new(CustomEventSpecificationDataSource),
        Arc::new(HostAgentsDataSource),
        Arc::new(SyntheticLocationDataSource),
        Arc::new(UserDataSource),
        Arc::new(UsersDataSource),
    ]
}

/// A copy of a block where every attribute is computed.
///
/// Used to expose a resource schema as the result of a lookup.
pub(crate) fn computed_block(block: &Block) -> Block {
    let mut computed = Block::new();
    computed.description = block.description.clone();
    for (name, attr) in &block.attributes {
        let mut attr = attr.clone();
        attr.flags.required = false;
        attr.flags.optional = false;
        attr.flags.computed = true;
        attr.default = None;
        attr.validators.clear();
        attr.use_state_for_unknown = false;
        computed.attributes.insert(name.clone(), attr);
    }
    for (name, nested) in &block.blocks {
        let mut nested = nested.clone();
        nested.block = computed_block(&nested.block);
        nested.min_items = 0;
        computed.blocks.insert(name.clone(), nested);
    }
    computed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock, Validator};

    #[test]
    fn test_data_source_names_are_unique() {
        let mut names: Vec<&str> = all().iter().map(|d| d.name()).collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_computed_block() {
        let block = Block::new()
            .with_attribute(
                "kind",
                Attribute::required_string().with_validator(Validator::one_of(&["a"])),
            )
            .with_block(
                "inner",
                NestedBlock::list(Block::new().with_attribute("x", Attribute::optional_int64()))
                    .with_min_items(1),
            );
        let computed = computed_block(&block);
        let kind = &computed.attributes["kind"];
        assert!(kind.flags.computed && !kind.flags.required);
        assert!(kind.validators.is_empty());
        assert_eq!(computed.blocks["inner"].min_items, 0);
        assert!(computed.blocks["inner"].block.attributes["x"].flags.computed);
    }
}
