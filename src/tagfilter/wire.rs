//! JSON model of tag filters as exchanged with the Instana API.

use serde::{Deserialize, Serialize};

use super::ast::{EntityOrigin, LogicalOperator, Operator};

/// Discriminator of a wire node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFilterKind {
    /// A logical node with `elements`.
    #[serde(rename = "EXPRESSION")]
    Expression,
    /// A single predicate.
    #[serde(rename = "TAG_FILTER")]
    TagFilter,
    /// Anything the provider does not understand.
    #[serde(other)]
    Unsupported,
}

/// A node of a tag filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagFilter {
    /// Node discriminator.
    #[serde(rename = "type")]
    pub kind: TagFilterKind,
    /// `AND` or `OR` for expressions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<String>,
    /// Children of an expression.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<TagFilter>,
    /// Tag name of a predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// String value of a predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Numeric value of a predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_value: Option<i64>,
    /// Boolean value of a predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    /// Key of a key/value tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Value of a key/value tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Comparison operator of a predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Entity origin of a predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl TagFilter {
    fn empty(kind: TagFilterKind) -> Self {
        Self {
            kind,
            logical_operator: None,
            elements: Vec::new(),
            name: None,
            string_value: None,
            number_value: None,
            boolean_value: None,
            key: None,
            value: None,
            operator: None,
            entity: None,
        }
    }

    fn predicate(entity: EntityOrigin, name: &str, operator: Operator) -> Self {
        Self {
            name: Some(name.to_string()),
            operator: Some(operator.wire_name().to_string()),
            entity: Some(entity.wire_name().to_string()),
            ..Self::empty(TagFilterKind::TagFilter)
        }
    }

    /// A logical expression node.
    pub fn expression(operator: LogicalOperator, elements: Vec<TagFilter>) -> Self {
        Self {
            logical_operator: Some(operator.wire_name().to_string()),
            elements,
            ..Self::empty(TagFilterKind::Expression)
        }
    }

    /// A predicate comparing against a string.
    pub fn string(
        entity: EntityOrigin,
        name: &str,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Self::predicate(entity, name, operator)
        }
    }

    /// A predicate comparing against a number.
    pub fn number(entity: EntityOrigin, name: &str, operator: Operator, value: i64) -> Self {
        Self {
            number_value: Some(value),
            ..Self::predicate(entity, name, operator)
        }
    }

    /// A predicate comparing against a boolean.
    pub fn boolean(entity: EntityOrigin, name: &str, operator: Operator, value: bool) -> Self {
        Self {
            boolean_value: Some(value),
            ..Self::predicate(entity, name, operator)
        }
    }

    /// A key/value tag predicate.
    pub fn tag(
        entity: EntityOrigin,
        name: &str,
        operator: Operator,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        Self {
            string_value: Some(format!("{}={}", key, value)),
            key: Some(key),
            value: Some(value),
            ..Self::predicate(entity, name, operator)
        }
    }

    /// A predicate with a unary operator.
    pub fn unary(entity: EntityOrigin, name: &str, operator: Operator) -> Self {
        Self::predicate(entity, name, operator)
    }
}
