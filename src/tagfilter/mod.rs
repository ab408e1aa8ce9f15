//! The tag filter expression language.
//!
//! Tag filters scope Instana queries with boolean expressions over
//! `(entity, tag, operator, value)` predicates, for example:
//!
//! ```text
//! entity.type EQUALS 'service' AND (call.name CONTAINS "foo" OR call.name CONTAINS "bar")
//! ```
//!
//! The API returns filters as a JSON tree ([`TagFilter`]) in a canonical shape
//! that does not necessarily match what the user wrote. To avoid spurious
//! diffs, values read from the API are normalized into a canonical string
//! ([`normalize_string`]) and plan values are compared after the same
//! normalization ([`normalize_expression`]).
//!
//! ```
//! use terraform_provider_instana::tagfilter;
//!
//! let canonical = tagfilter::normalize_expression(
//!     r#"entity.type EQUALS "svc" AND (call.name CONTAINS "foo" OR call.name CONTAINS "bar")"#,
//! )
//! .unwrap();
//! assert_eq!(
//!     canonical,
//!     r#"(call.name contains "foo" or call.name contains "bar") and entity.type equals "svc""#
//! );
//! ```

pub mod ast;
pub mod lexer;
pub mod mapper;
pub mod normalize;
pub mod parser;
pub mod wire;

use std::fmt;

use thiserror::Error;

pub use ast::{EntityOrigin, Expression, LogicalOperator, Operator, Predicate, PredicateValue};
pub use mapper::{from_wire, to_wire};
pub use parser::{parse, MAX_NESTING_DEPTH};
pub use wire::{TagFilter, TagFilterKind};

/// The stage of the pipeline that rejected an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilterErrorKind {
    /// Bad token or unterminated string.
    Lex,
    /// Unexpected token or premature end of input.
    Parse,
    /// The wire tree could not be mapped to an expression.
    Map,
}

impl fmt::Display for TagFilterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex => f.write_str("lex"),
            Self::Parse => f.write_str("parse"),
            Self::Map => f.write_str("map"),
        }
    }
}

/// An error raised while lexing, parsing or mapping a tag filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error at offset {offset}: {message}")]
pub struct TagFilterError {
    /// Pipeline stage.
    pub kind: TagFilterErrorKind,
    /// Byte offset into the source string (0 for wire trees).
    pub offset: usize,
    /// One line description.
    pub message: String,
}

impl TagFilterError {
    /// Create a new error.
    pub fn new(kind: TagFilterErrorKind, offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn map(message: impl Into<String>) -> Self {
        Self::new(TagFilterErrorKind::Map, 0, message)
    }
}

/// Parse, normalize and serialize an expression string.
pub fn normalize_expression(input: &str) -> Result<String, TagFilterError> {
    Ok(parse(input)?.normalize().to_string())
}

/// Map a wire tree to its canonical string.
///
/// Returns `None` for an empty expression (no filter).
pub fn normalize_string(filter: &TagFilter) -> Result<Option<String>, TagFilterError> {
    Ok(from_wire(filter)?.map(|expr| expr.normalize().to_string()))
}

/// Parse an expression string and map it to the wire tree.
pub fn string_to_wire(input: &str) -> Result<TagFilter, TagFilterError> {
    Ok(to_wire(&parse(input)?))
}

/// Whether two expression strings normalize to the same canonical form.
///
/// Strings that fail to parse only compare equal when identical.
pub fn semantically_equal(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (normalize_expression(a), normalize_expression(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scenario() {
        let input =
            r#"entity.type EQUALS "svc" AND (call.name CONTAINS "foo" OR call.name CONTAINS "bar")"#;
        let canonical = normalize_expression(input).unwrap();
        assert_eq!(
            canonical,
            r#"(call.name contains "foo" or call.name contains "bar") and entity.type equals "svc""#
        );

        // serialize then parse yields the same tree
        let normalized = parse(input).unwrap().normalize();
        assert_eq!(parse(&canonical).unwrap().normalize(), normalized);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            "a.b EQUALS 'x'",
            "a.b@src NOT_EMPTY AND c.d > 5 OR e.f = true",
            "((a.b = 1)) and (c.d != 'x' or (e.f is_blank))",
            "kubernetes.label:app@dest STARTS_WITH 'web' AND x.y CONTAINS \"q\\\"uote\"",
        ];
        for input in inputs {
            let once = normalize_expression(input).unwrap();
            let twice = normalize_expression(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_normalize_string_of_empty_expression_is_none() {
        let filter = TagFilter::expression(LogicalOperator::Or, vec![]);
        assert_eq!(normalize_string(&filter).unwrap(), None);
    }

    #[test]
    fn test_normalize_string_of_number_predicate() {
        let filter = TagFilter::number(EntityOrigin::Destination, "name", Operator::Equals, 1234);
        assert_eq!(
            normalize_string(&filter).unwrap().as_deref(),
            Some("name@dest equals 1234")
        );
    }

    #[test]
    fn test_normalize_string_rejects_unsupported_type() {
        let raw = serde_json::json!({"type": "invalid"});
        let filter: TagFilter = serde_json::from_value(raw).unwrap();
        let err = normalize_string(&filter).unwrap_err();
        assert_eq!(err.kind, TagFilterErrorKind::Map);
    }

    #[test]
    fn test_semantically_equal() {
        assert!(semantically_equal(
            "b.b EQUALS 'x' AND a.a EQUALS 'y'",
            "a.a equals \"y\" and b.b = \"x\""
        ));
        assert!(!semantically_equal("a.a EQUALS 'y'", "a.a EQUALS 'z'"));
        assert!(!semantically_equal("a.a EQUALS", "a.a EQUALS 'z'"));
    }

    #[test]
    fn test_error_display() {
        let err = TagFilterError::new(TagFilterErrorKind::Lex, 7, "unterminated string");
        assert_eq!(err.to_string(), "lex error at offset 7: unterminated string");
    }
}
