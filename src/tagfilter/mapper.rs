//! Mapping between expressions and the wire model.

use super::ast::{
    EntityOrigin, Expression, LogicalExpression, LogicalOperator, Operator, Predicate,
    PredicateValue,
};
use super::wire::{TagFilter, TagFilterKind};
use super::TagFilterError;

/// Map an expression to its wire representation.
///
/// Brackets carry no meaning on the wire and are dropped; the tree shape
/// already encodes precedence.
pub fn to_wire(expr: &Expression) -> TagFilter {
    match expr {
        Expression::Bracket(inner) => to_wire(inner),
        Expression::Logical(LogicalExpression { operator, children }) => {
            TagFilter::expression(*operator, children.iter().map(to_wire).collect())
        },
        Expression::Predicate(p) => predicate_to_wire(p),
    }
}

fn predicate_to_wire(p: &Predicate) -> TagFilter {
    let mut filter = match (&p.key, &p.value) {
        (Some(key), Some(PredicateValue::String(value))) => {
            return TagFilter::tag(p.entity, &p.name, p.operator, key.clone(), value.clone())
        },
        (_, Some(PredicateValue::String(value))) => {
            TagFilter::string(p.entity, &p.name, p.operator, value.clone())
        },
        (_, Some(PredicateValue::Number(value))) => {
            TagFilter::number(p.entity, &p.name, p.operator, *value)
        },
        (_, Some(PredicateValue::Boolean(value))) => {
            TagFilter::boolean(p.entity, &p.name, p.operator, *value)
        },
        (_, None) => TagFilter::unary(p.entity, &p.name, p.operator),
    };
    filter.key = p.key.clone();
    filter
}

/// Map a wire tree back to an expression.
///
/// Returns `Ok(None)` when the tree is an expression without elements,
/// which the API uses for "no filter".
pub fn from_wire(filter: &TagFilter) -> Result<Option<Expression>, TagFilterError> {
    match filter.kind {
        TagFilterKind::Expression => {
            let operator = match filter.logical_operator.as_deref() {
                Some(name) => LogicalOperator::from_wire_name(name).ok_or_else(|| {
                    TagFilterError::map(format!("unsupported logical operator '{}'", name))
                })?,
                None if filter.elements.is_empty() => return Ok(None),
                None => return Err(TagFilterError::map("expression without logical operator")),
            };
            let mut children = Vec::with_capacity(filter.elements.len());
            for element in &filter.elements {
                if let Some(child) = from_wire(element)? {
                    children.push(child);
                }
            }
            if children.is_empty() {
                return Ok(None);
            }
            Ok(Some(Expression::logical(operator, children)))
        },
        TagFilterKind::TagFilter => predicate_from_wire(filter).map(|p| Some(p.into())),
        TagFilterKind::Unsupported => Err(TagFilterError::map("unsupported tag filter type")),
    }
}

fn predicate_from_wire(filter: &TagFilter) -> Result<Predicate, TagFilterError> {
    let name = filter
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TagFilterError::map("tag filter without name"))?;

    let operator = match filter.operator.as_deref() {
        Some(op) => Operator::from_wire_name(op)
            .ok_or_else(|| TagFilterError::map(format!("unsupported operator '{}'", op)))?,
        None => return Err(TagFilterError::map(format!("tag filter '{}' without operator", name))),
    };

    let entity = match filter.entity.as_deref() {
        Some(entity) => EntityOrigin::from_wire_name(entity)
            .ok_or_else(|| TagFilterError::map(format!("unsupported entity '{}'", entity)))?,
        None => EntityOrigin::NotApplicable,
    };

    let value = if operator.is_unary() {
        None
    } else {
        let value = if filter.key.is_some() && filter.value.is_some() {
            filter.value.clone().map(PredicateValue::String)
        } else if let Some(s) = &filter.string_value {
            Some(PredicateValue::String(s.clone()))
        } else if let Some(n) = filter.number_value {
            Some(PredicateValue::Number(n))
        } else {
            filter.boolean_value.map(PredicateValue::Boolean)
        };
        let value = value.ok_or_else(|| {
            TagFilterError::map(format!(
                "operator {} of tag filter '{}' requires a value",
                operator.wire_name(),
                name
            ))
        })?;
        if !operator.accepts(value.kind()) {
            return Err(TagFilterError::map(format!(
                "operator {} does not accept a {} value",
                operator.wire_name(),
                value.kind()
            )));
        }
        Some(value)
    };

    Ok(Predicate {
        entity,
        name,
        key: filter.key.clone(),
        operator,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagfilter::{parse, TagFilterErrorKind};

    #[test]
    fn test_wire_round_trip() {
        let inputs = [
            "a.b = 'x'",
            "a.b@src > 5 AND c.d@dest = false",
            "(a.b IS_EMPTY OR c.d NOT_BLANK) AND e.f:key = 'v'",
            "e.f:key@na = 12",
        ];
        for input in inputs {
            let expr = parse(input).unwrap().normalize();
            let back = from_wire(&to_wire(&expr)).unwrap().unwrap();
            assert_eq!(back.normalize(), expr, "round trip failed for {input}");
        }
    }

    #[test]
    fn test_digit_segments_render_and_reparse() {
        let filter = TagFilter::tag(
            EntityOrigin::NotApplicable,
            "kubernetes.label",
            Operator::Equals,
            "release.2",
            "x",
        );
        let expr = from_wire(&filter).unwrap().unwrap();
        let rendered = expr.to_string();
        assert_eq!(rendered, r#"kubernetes.label:release.2 equals "x""#);
        assert_eq!(parse(&rendered).unwrap().normalize(), expr.normalize());

        let filter = TagFilter::number(EntityOrigin::Source, "call.http.2xx", Operator::GreaterThan, 3);
        let expr = from_wire(&filter).unwrap().unwrap();
        let rendered = expr.to_string();
        assert_eq!(parse(&rendered).unwrap().normalize(), expr.normalize());

        let filter = TagFilter::tag(
            EntityOrigin::NotApplicable,
            "kubernetes.label",
            Operator::Equals,
            "2.release",
            "x",
        );
        let rendered = from_wire(&filter).unwrap().unwrap().to_string();
        assert_eq!(rendered, r#"kubernetes.label:"2.release" equals "x""#);
    }

    #[test]
    fn test_and_order_is_preserved_on_wire() {
        let expr = parse("z.z = 1 AND a.a = 2").unwrap();
        let wire = to_wire(&expr);
        assert_eq!(wire.elements[0].name.as_deref(), Some("z.z"));
        assert_eq!(wire.elements[1].name.as_deref(), Some("a.a"));
    }

    #[test]
    fn test_empty_expression_maps_to_none() {
        let filter = TagFilter::expression(LogicalOperator::And, vec![]);
        assert_eq!(from_wire(&filter).unwrap(), None);

        let nested = TagFilter::expression(
            LogicalOperator::Or,
            vec![TagFilter::expression(LogicalOperator::And, vec![])],
        );
        assert_eq!(from_wire(&nested).unwrap(), None);
    }

    #[test]
    fn test_from_wire_rejects_bad_operator() {
        let mut filter = TagFilter::string(EntityOrigin::Source, "a", Operator::Equals, "x");
        filter.operator = Some("LIKE".to_string());
        let err = from_wire(&filter).unwrap_err();
        assert_eq!(err.kind, TagFilterErrorKind::Map);
    }

    #[test]
    fn test_from_wire_rejects_missing_value() {
        let filter = TagFilter::unary(EntityOrigin::Source, "a", Operator::Contains);
        let err = from_wire(&filter).unwrap_err();
        assert!(err.message.contains("requires a value"));
    }

    #[test]
    fn test_from_wire_rejects_value_kind_mismatch() {
        let filter = TagFilter::string(EntityOrigin::Source, "a", Operator::GreaterThan, "x");
        let err = from_wire(&filter).unwrap_err();
        assert!(err.message.contains("does not accept"));
    }

    #[test]
    fn test_from_wire_defaults_entity() {
        let mut filter = TagFilter::string(EntityOrigin::Source, "a", Operator::Equals, "x");
        filter.entity = None;
        let Some(Expression::Predicate(p)) = from_wire(&filter).unwrap() else {
            panic!("expected predicate");
        };
        assert_eq!(p.entity, EntityOrigin::NotApplicable);
    }

    #[test]
    fn test_unary_ignores_values() {
        let mut filter = TagFilter::unary(EntityOrigin::Destination, "a", Operator::NotEmpty);
        filter.string_value = Some(String::new());
        let Some(Expression::Predicate(p)) = from_wire(&filter).unwrap() else {
            panic!("expected predicate");
        };
        assert_eq!(p.value, None);
    }
}
