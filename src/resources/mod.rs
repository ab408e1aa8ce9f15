//! Managed Instana resources.

mod alert_common;
mod alerting_channel;
mod alerting_config;
mod api_token;
mod application_alert_config;
mod application_config;
mod automation_action;
mod automation_policy;
mod custom_dashboard;
mod custom_event_specification;
mod group;
mod infra_alert_config;
mod log_alert_config;
mod role;
mod sli_config;
mod slo_alert_config;
mod slo_config;
mod slo_correction_config;
mod synthetic_alert_config;
mod synthetic_test;
mod team;
mod website_alert_config;
mod website_monitoring_config;

use std::sync::Arc;

use serde_json::Value;

use crate::error::ProviderError;
use crate::resource::{ManagedResource, ResourceFramework};
use crate::restapi::models::{AccessRule, ACCESS_TYPES, RELATION_TYPES};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Validator};
use crate::tagfilter::{self, TagFilter};
use crate::value::{ObjectReader, ObjectWriter};

pub use alerting_channel::AlertingChannelResource;
pub use alerting_config::AlertingConfigResource;
pub use api_token::ApiTokenResource;
pub use application_alert_config::ApplicationAlertConfigResource;
pub use application_config::ApplicationConfigResource;
pub use automation_action::AutomationActionResource;
pub use automation_policy::AutomationPolicyResource;
pub use custom_dashboard::CustomDashboardResource;
pub use custom_event_specification::CustomEventSpecificationResource;
pub use group::GroupResource;
pub use infra_alert_config::InfraAlertConfigResource;
pub use log_alert_config::LogAlertConfigResource;
pub use role::RoleResource;
pub use sli_config::SliConfigResource;
pub use slo_alert_config::SloAlertConfigResource;
pub use slo_config::SloConfigResource;
pub use slo_correction_config::SloCorrectionConfigResource;
pub use synthetic_alert_config::SyntheticAlertConfigResource;
pub use synthetic_test::SyntheticTestResource;
pub use team::TeamResource;
pub use website_alert_config::WebsiteAlertConfigResource;
pub use website_monitoring_config::WebsiteMonitoringConfigResource;

/// Every resource of the provider.
pub fn all() -> Vec<Arc<dyn ManagedResource>> {
    vec![
        Arc::new(ResourceFramework::new(AlertingChannelResource::new())),
        Arc::new(ResourceFramework::new(AlertingConfigResource::new())),
        Arc::new(ResourceFramework::new(ApiTokenResource::new())),
        Arc::new(ResourceFramework::new(ApplicationAlertConfigResource::new())),
        Arc::new(ResourceFramework::new(ApplicationAlertConfigResource::global())),
        Arc::new(ResourceFramework::new(ApplicationConfigResource::new())),
        Arc::new(ResourceFramework::new(AutomationActionResource::new())),
        Arc::new(ResourceFramework::new(AutomationPolicyResource::new())),
        Arc::new(ResourceFramework::new(CustomDashboardResource::new())),
        Arc::new(ResourceFramework::new(CustomEventSpecificationResource::new())),
        Arc::new(ResourceFramework::new(GroupResource::new())),
        Arc::new(ResourceFramework::new(InfraAlertConfigResource::new())),
        Arc::new(ResourceFramework::new(LogAlertConfigResource::new())),
        Arc::new(ResourceFramework::new(RoleResource::new())),
        Arc::new(ResourceFramework::new(SliConfigResource::new())),
        Arc::new(ResourceFramework::new(SloAlertConfigResource::new())),
        Arc::new(ResourceFramework::new(SloConfigResource::new())),
        Arc::new(ResourceFramework::new(SloCorrectionConfigResource::new())),
        Arc::new(ResourceFramework::new(SyntheticAlertConfigResource::new())),
        Arc::new(ResourceFramework::new(SyntheticTestResource::new())),
        Arc::new(ResourceFramework::new(TeamResource::new())),
        Arc::new(ResourceFramework::new(WebsiteAlertConfigResource::new())),
        Arc::new(ResourceFramework::new(WebsiteMonitoringConfigResource::new())),
    ]
}

/// The computed `id` attribute kept stable across updates.
pub(crate) fn id_attribute() -> Attribute {
    Attribute::computed_string()
        .with_use_state_for_unknown()
        .with_description("The ID of the resource")
}

pub(crate) fn string_set(flags: AttributeFlags) -> Attribute {
    Attribute::new(AttributeType::set(AttributeType::String), flags)
}

pub(crate) fn string_list(flags: AttributeFlags) -> Attribute {
    Attribute::new(AttributeType::list(AttributeType::String), flags)
}

pub(crate) fn string_map(flags: AttributeFlags) -> Attribute {
    Attribute::new(AttributeType::map(AttributeType::String), flags)
}

/// Read a tag filter expression attribute into its wire form.
pub(crate) fn read_tag_filter(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<Option<TagFilter>, ProviderError> {
    match reader.optional::<String>(name)? {
        Some(expression) if !expression.trim().is_empty() => tagfilter::string_to_wire(&expression)
            .map(Some)
            .map_err(|err| ProviderError::attribute(reader.path(name), err.to_string())),
        _ => Ok(None),
    }
}

/// State value of a tag filter returned by the API.
///
/// The configured expression is kept when it is equivalent to the returned
/// filter so that formatting differences do not show up as drift.
pub(crate) fn tag_filter_state(
    filter: Option<&TagFilter>,
    configured: Option<String>,
) -> Result<Value, ProviderError> {
    let normalized = match filter {
        Some(filter) => tagfilter::normalize_string(filter)?,
        None => None,
    };
    Ok(match (normalized, configured) {
        (Some(normalized), Some(configured))
            if tagfilter::semantically_equal(&normalized, &configured) =>
        {
            Value::String(configured)
        },
        (Some(normalized), _) => Value::String(normalized),
        (None, _) => Value::Null,
    })
}

/// Read a configured attribute of the plan, if any.
pub(crate) fn planned<T: crate::value::FromAttribute>(
    plan: Option<&Value>,
    name: &str,
) -> Result<Option<T>, ProviderError> {
    match plan {
        Some(plan) => ObjectReader::new(plan)?.optional(name),
        None => Ok(None),
    }
}

/// Schema of an `access_rule` block.
pub(crate) fn access_rule_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute(
                "access_type",
                Attribute::required_string().with_validator(Validator::one_of(ACCESS_TYPES)),
            )
            .with_attribute(
                "related_id",
                Attribute::optional_string()
                    .with_validator(Validator::LengthBetween { min: 0, max: 64 }),
            )
            .with_attribute(
                "relation_type",
                Attribute::required_string().with_validator(Validator::one_of(RELATION_TYPES)),
            ),
    )
}

pub(crate) fn read_access_rules(
    reader: &ObjectReader<'_>,
    name: &str,
) -> Result<Vec<AccessRule>, ProviderError> {
    reader
        .nested_list(name)?
        .iter()
        .map(|rule| {
            Ok(AccessRule {
                access_type: rule.required("access_type")?,
                related_id: rule.optional::<String>("related_id")?.filter(|id| !id.is_empty()),
                relation_type: rule.required("relation_type")?,
            })
        })
        .collect()
}

pub(crate) fn access_rule_blocks(rules: &[AccessRule]) -> Vec<ObjectWriter> {
    rules
        .iter()
        .map(|rule| {
            ObjectWriter::new()
                .set("access_type", rule.access_type.clone())
                .set("related_id", rule.related_id.clone())
                .set("relation_type", rule.relation_type.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_names_are_unique() {
        let resources = all();
        let mut names: Vec<String> = resources.iter().map(|r| r.metadata().type_name()).collect();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_tag_filter_state_keeps_equivalent_configuration() {
        let wire = tagfilter::string_to_wire("call.name EQUALS 'a'").unwrap();
        let state = tag_filter_state(Some(&wire), Some("call.name EQUALS 'a'".to_string())).unwrap();
        assert_eq!(state, json!("call.name EQUALS 'a'"));

        let state = tag_filter_state(Some(&wire), Some("call.name EQUALS 'b'".to_string())).unwrap();
        assert_eq!(state, json!("call.name equals \"a\""));

        assert_eq!(tag_filter_state(None, None).unwrap(), Value::Null);
    }

    #[test]
    fn test_read_tag_filter_reports_attribute() {
        let value = json!({"tag_filter": "call.name EQUALS"});
        let reader = ObjectReader::new(&value).unwrap();
        let err = read_tag_filter(&reader, "tag_filter").unwrap_err();
        assert_eq!(err.attribute_path(), Some("tag_filter"));

        let value = json!({"tag_filter": "  "});
        let reader = ObjectReader::new(&value).unwrap();
        assert!(read_tag_filter(&reader, "tag_filter").unwrap().is_none());
    }

    #[test]
    fn test_access_rules_round_trip() {
        let value = json!({"access_rule": [
            {"access_type": "READ_WRITE", "related_id": "", "relation_type": "GLOBAL"},
            {"access_type": "READ", "related_id": "u1", "relation_type": "USER"}
        ]});
        let reader = ObjectReader::new(&value).unwrap();
        let rules = read_access_rules(&reader, "access_rule").unwrap();
        assert_eq!(rules[0].related_id, None);
        assert_eq!(rules[1].related_id.as_deref(), Some("u1"));

        let written = ObjectWriter::new()
            .set_blocks("access_rule", access_rule_blocks(&rules))
            .into_value();
        assert_eq!(written["access_rule"][1]["relation_type"], "USER");
        assert_eq!(written["access_rule"][0]["related_id"], Value::Null);
    }
}
