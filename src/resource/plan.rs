//! Plan computation shared by all resources.
//!
//! Starting from the proposed state the planner applies schema defaults,
//! keeps prior values that are semantically equal under a normalizer,
//! decides which computed attributes become unknown and reports the
//! resulting attribute changes.

use serde_json::{Map, Value};

use crate::schema::{Attribute, Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::value::{is_unknown, unknown};

/// Compute the plan of a resource.
///
/// `prior` is `None` on create. A null `proposed` plans the destruction.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: Value,
    create_only: bool,
) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let changes = prior
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let mut planned = proposed;
    prepare_block(&schema.block, prior, &mut planned);

    let mut changes = Vec::new();
    diff_block(&schema.block, prior, &planned, "", &mut changes);

    let keep_prior = prior.is_some() && changes.is_empty();
    fill_computed(&schema.block, prior, &mut planned, keep_prior, "", &mut changes);

    let requires_replace = prior.is_some()
        && changes.iter().any(|change| {
            (create_only && !is_computed_change(&schema.block, &change.path))
                || forces_replacement(&schema.block, &change.path)
        });

    if changes.is_empty() {
        PlanResult::no_change(planned)
    } else {
        PlanResult::with_changes(planned, changes, requires_replace)
    }
}

fn child<'a>(value: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    value
        .and_then(Value::as_object)
        .and_then(|m| m.get(name))
        .filter(|v| !v.is_null())
}

fn elements(value: &mut Value) -> Vec<&mut Value> {
    if value.is_object() {
        return vec![value];
    }
    match value {
        Value::Array(items) => items.iter_mut().collect(),
        _ => Vec::new(),
    }
}

fn prior_element<'a>(prior: Option<&'a Value>, index: usize) -> Option<&'a Value> {
    match prior {
        Some(Value::Array(items)) => items.get(index),
        Some(v @ Value::Object(_)) if index == 0 => Some(v),
        _ => None,
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn is_configurable(attr: &Attribute) -> bool {
    attr.flags.required || attr.flags.optional
}

/// Defaults and normalizer driven value retention.
fn prepare_block(block: &Block, prior: Option<&Value>, planned: &mut Value) {
    let Some(map) = planned.as_object_mut() else {
        return;
    };

    for (name, attr) in &block.attributes {
        let current = map.get(name).cloned().unwrap_or(Value::Null);
        if current.is_null() {
            if let (Some(default), true) = (&attr.default, is_configurable(attr)) {
                map.insert(name.clone(), default.clone());
            }
            continue;
        }
        if let (Some(normalizer), Some(prior_value)) = (&attr.normalizer, child(prior, name)) {
            if !is_unknown(&current) && normalizer.equivalent(prior_value, &current) {
                map.insert(name.clone(), prior_value.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        let prior_nested = child(prior, name);
        if let Some(value) = map.get_mut(name) {
            for (i, element) in elements(value).into_iter().enumerate() {
                prepare_block(&nested.block, prior_element(prior_nested, i), element);
            }
        }
    }
}

fn values_equal(attr: Option<&Attribute>, before: &Value, after: &Value) -> bool {
    if before == after {
        return true;
    }
    match attr.and_then(|a| a.normalizer.as_ref()) {
        Some(normalizer) => normalizer.equivalent(before, after),
        None => false,
    }
}

fn diff_block(
    block: &Block,
    prior: Option<&Value>,
    planned: &Value,
    path: &str,
    changes: &mut Vec<AttributeChange>,
) {
    for (name, attr) in &block.attributes {
        let after = child(Some(planned), name);
        if after.is_none() && attr.flags.computed {
            continue;
        }
        let before = child(prior, name);
        let attr_path = join(path, name);
        match (before, after) {
            (None, None) => {},
            (None, Some(after)) => changes.push(AttributeChange::added(attr_path, after.clone())),
            (Some(before), None) => {
                changes.push(AttributeChange::removed(attr_path, before.clone()))
            },
            (Some(before), Some(after)) => {
                if !values_equal(Some(attr), before, after) {
                    changes.push(AttributeChange::modified(
                        attr_path,
                        before.clone(),
                        after.clone(),
                    ));
                }
            },
        }
    }

    for (name, nested) in &block.blocks {
        let before = child(prior, name);
        let after = child(Some(planned), name);
        let block_path = join(path, name);
        match (before, after) {
            (None, None) => {},
            (None, Some(after)) => changes.push(AttributeChange::added(block_path, after.clone())),
            (Some(before), None) => {
                changes.push(AttributeChange::removed(block_path, before.clone()))
            },
            (Some(before), Some(after)) => match nested.nesting_mode {
                BlockNestingMode::Single => {
                    diff_block(&nested.block, Some(before), after, &block_path, changes)
                },
                BlockNestingMode::List | BlockNestingMode::Set | BlockNestingMode::Map => {
                    match (before.as_array(), after.as_array()) {
                        (Some(b), Some(a)) if a.len() == b.len() => {
                            for (i, (b, a)) in b.iter().zip(a).enumerate() {
                                diff_block(
                                    &nested.block,
                                    Some(b),
                                    a,
                                    &join(&block_path, &i.to_string()),
                                    changes,
                                );
                            }
                        },
                        _ if before != after => changes.push(AttributeChange::modified(
                            block_path,
                            before.clone(),
                            after.clone(),
                        )),
                        _ => {},
                    }
                },
            },
        }
    }
}

/// Decide the planned value of computed attributes left null by the config.
fn fill_computed(
    block: &Block,
    prior: Option<&Value>,
    planned: &mut Value,
    keep_prior: bool,
    path: &str,
    changes: &mut Vec<AttributeChange>,
) {
    let Some(map) = planned.as_object_mut() else {
        return;
    };

    for (name, attr) in &block.attributes {
        if !attr.flags.computed || !map.get(name).map_or(true, Value::is_null) {
            continue;
        }
        let prior_value = child(prior, name);
        match prior_value {
            Some(prior_value) if keep_prior || attr.use_state_for_unknown => {
                map.insert(name.clone(), prior_value.clone());
            },
            Some(prior_value) => {
                map.insert(name.clone(), unknown());
                changes.push(AttributeChange::modified(
                    join(path, name),
                    prior_value.clone(),
                    unknown(),
                ));
            },
            None => {
                map.insert(name.clone(), unknown());
            },
        }
    }

    for (name, nested) in &block.blocks {
        let prior_nested = child(prior, name);
        let block_path = join(path, name);
        if let Some(value) = map.get_mut(name) {
            for (i, element) in elements(value).into_iter().enumerate() {
                let element_path = match nested.nesting_mode {
                    BlockNestingMode::Single => block_path.clone(),
                    _ => join(&block_path, &i.to_string()),
                };
                fill_computed(
                    &nested.block,
                    prior_element(prior_nested, i),
                    element,
                    keep_prior,
                    &element_path,
                    changes,
                );
            }
        }
    }
}

/// Resolve a dotted change path to the attribute it names, if any.
fn attribute_at<'a>(block: &'a Block, path: &str) -> Option<&'a Attribute> {
    let mut current = block;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return current.attributes.get(segment);
        }
        if let Some(attr) = current.attributes.get(segment) {
            return Some(attr);
        }
        current = &current.blocks.get(segment)?.block;
        if segments.peek().is_some_and(|s| s.parse::<usize>().is_ok()) {
            segments.next();
        }
    }
    None
}

fn is_computed_change(block: &Block, path: &str) -> bool {
    attribute_at(block, path).is_some_and(|attr| attr.flags.computed && !is_configurable(attr))
}

fn forces_replacement(block: &Block, path: &str) -> bool {
    if let Some(attr) = attribute_at(block, path) {
        return attr.force_new;
    }
    block_has_force_new(block, path)
}

/// A whole block changed; it forces replacement when any attribute inside does.
fn block_has_force_new(block: &Block, path: &str) -> bool {
    let mut current = block;
    for segment in path.split('.') {
        if segment.parse::<usize>().is_ok() {
            continue;
        }
        match current.blocks.get(segment) {
            Some(nested) => current = &nested.block,
            None => return false,
        }
    }
    any_force_new(current)
}

fn any_force_new(block: &Block) -> bool {
    block.attributes.values().any(|a| a.force_new) || block.blocks.values().any(|b| any_force_new(&b.block))
}

/// Replace unknown values by null, used for states handed back after a failure.
pub fn strip_unknowns(value: &Value) -> Value {
    match value {
        v if is_unknown(v) => Value::Null,
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), strip_unknowns(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_unknowns).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, NestedBlock};
    use crate::value::UNKNOWN_VALUE;
    use serde_json::json;

    fn application_schema() -> Schema {
        Schema::new(4)
            .with_attribute("id", Attribute::computed_string().with_use_state_for_unknown())
            .with_attribute("label", Attribute::required_string())
            .with_attribute(
                "scope",
                Attribute::optional_string().with_default(json!("INCLUDE_NO_DOWNSTREAM")),
            )
            .with_attribute("tag_filter", Attribute::tag_filter(AttributeFlags::optional()))
            .with_attribute("region", Attribute::required_string().with_force_new())
            .with_attribute("revision", Attribute::computed_string())
    }

    #[test]
    fn test_create_marks_computed_unknown_and_applies_defaults() {
        let plan = plan_resource(
            &application_schema(),
            None,
            json!({"label": "shop", "region": "eu"}),
            false,
        );
        assert_eq!(plan.planned_state["id"], UNKNOWN_VALUE);
        assert_eq!(plan.planned_state["revision"], UNKNOWN_VALUE);
        assert_eq!(plan.planned_state["scope"], "INCLUDE_NO_DOWNSTREAM");
        assert!(!plan.requires_replace);
        assert!(plan.changes.iter().any(|c| c.path == "label"));
    }

    #[test]
    fn test_unchanged_update_keeps_prior_values() {
        let prior = json!({
            "id": "abc", "label": "shop", "scope": "INCLUDE_NO_DOWNSTREAM",
            "tag_filter": "call.name equals \"a\"", "region": "eu", "revision": "7"
        });
        let proposed = json!({
            "label": "shop", "tag_filter": "call.name EQUALS 'a'", "region": "eu"
        });
        let plan = plan_resource(&application_schema(), Some(&prior), proposed, false);
        assert!(plan.changes.is_empty(), "{:?}", plan.changes);
        assert_eq!(plan.planned_state["id"], "abc");
        assert_eq!(plan.planned_state["revision"], "7");
        assert_eq!(plan.planned_state["tag_filter"], "call.name equals \"a\"");
    }

    #[test]
    fn test_changed_update_keeps_state_for_unknown_only() {
        let prior = json!({"id": "abc", "label": "shop", "region": "eu", "revision": "7"});
        let plan = plan_resource(
            &application_schema(),
            Some(&prior),
            json!({"label": "store", "region": "eu"}),
            false,
        );
        assert_eq!(plan.planned_state["id"], "abc");
        assert_eq!(plan.planned_state["revision"], UNKNOWN_VALUE);
        assert!(!plan.requires_replace);
        assert!(plan.changes.iter().any(|c| c.path == "label"));
    }

    #[test]
    fn test_force_new_attribute_requires_replace() {
        let prior = json!({"id": "abc", "label": "shop", "region": "eu"});
        let plan = plan_resource(
            &application_schema(),
            Some(&prior),
            json!({"label": "shop", "region": "us"}),
            false,
        );
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_create_only_resource_replaces_on_any_change() {
        let prior = json!({"id": "abc", "label": "shop", "region": "eu"});
        let plan = plan_resource(
            &application_schema(),
            Some(&prior),
            json!({"label": "store", "region": "eu"}),
            true,
        );
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_nested_block_changes_use_indexed_paths() {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string().with_use_state_for_unknown())
            .with_block(
                "access_rule",
                NestedBlock::list(
                    crate::schema::Block::new()
                        .with_attribute("access_type", Attribute::required_string())
                        .with_attribute("relation_type", Attribute::required_string()),
                ),
            );
        let prior = json!({"id": "d1", "access_rule": [{"access_type": "READ", "relation_type": "GLOBAL"}]});
        let proposed = json!({"access_rule": [{"access_type": "READ_WRITE", "relation_type": "GLOBAL"}]});
        let plan = plan_resource(&schema, Some(&prior), proposed, false);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "access_rule.0.access_type");
    }

    #[test]
    fn test_destroy_plan() {
        let prior = json!({"id": "abc", "label": "shop"});
        let plan = plan_resource(&application_schema(), Some(&prior), Value::Null, false);
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
    }

    #[test]
    fn test_strip_unknowns() {
        let value = json!({"id": "abc", "rev": UNKNOWN_VALUE, "rules": [{"x": UNKNOWN_VALUE}]});
        assert_eq!(
            strip_unknowns(&value),
            json!({"id": "abc", "rev": null, "rules": [{"x": null}]})
        );
    }
}
