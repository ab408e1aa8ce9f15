//! Canonicalization of expressions.

use super::ast::{Expression, LogicalExpression, LogicalOperator};

impl Expression {
    /// Rewrite the expression into its canonical form.
    ///
    /// Redundant brackets are dropped, nested logical nodes with the same
    /// operator are flattened, `AND` operands are stable-sorted by their
    /// serialized form and single operand nodes collapse to the operand.
    /// Brackets are re-inserted only around `OR` operands of an `AND`.
    pub fn normalize(&self) -> Expression {
        match self {
            Expression::Predicate(_) => self.clone(),
            Expression::Bracket(inner) => inner.normalize(),
            Expression::Logical(LogicalExpression { operator, children }) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    match child.normalize() {
                        Expression::Logical(nested) if nested.operator == *operator => {
                            flat.extend(nested.children)
                        },
                        other => flat.push(other),
                    }
                }
                if *operator == LogicalOperator::And {
                    let mut keyed: Vec<(String, Expression)> = flat
                        .into_iter()
                        .map(|child| {
                            let is_or = matches!(
                                &child,
                                Expression::Logical(l) if l.operator == LogicalOperator::Or
                            );
                            if is_or {
                                Expression::bracket(child)
                            } else {
                                child
                            }
                        })
                        .map(|child| (child.to_string(), child))
                        .collect();
                    keyed.sort_by(|a, b| a.0.cmp(&b.0));
                    flat = keyed.into_iter().map(|(_, child)| child).collect();
                }
                Expression::logical(*operator, flat)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tagfilter::parse;

    fn canonical(input: &str) -> String {
        parse(input).unwrap().normalize().to_string()
    }

    #[test]
    fn test_drops_redundant_brackets() {
        assert_eq!(canonical("((a.a = 1))"), "a.a equals 1");
        assert_eq!(
            canonical("(a.a = 1) OR (b.b = 2)"),
            "a.a equals 1 or b.b equals 2"
        );
    }

    #[test]
    fn test_flattens_and_sorts_and() {
        assert_eq!(
            canonical("c.c = 3 AND (b.b = 2 AND a.a = 1)"),
            "a.a equals 1 and b.b equals 2 and c.c equals 3"
        );
    }

    #[test]
    fn test_or_keeps_order() {
        assert_eq!(
            canonical("c.c = 3 OR (b.b = 2 OR a.a = 1)"),
            "c.c equals 3 or b.b equals 2 or a.a equals 1"
        );
    }

    #[test]
    fn test_keeps_brackets_for_or_inside_and() {
        assert_eq!(
            canonical("z.z = 1 AND (b.b = 2 OR a.a = 1)"),
            "(b.b equals 2 or a.a equals 1) and z.z equals 1"
        );
    }

    #[test]
    fn test_and_inside_or_needs_no_brackets() {
        assert_eq!(
            canonical("(b.b = 2 AND a.a = 1) OR c.c = 3"),
            "a.a equals 1 and b.b equals 2 or c.c equals 3"
        );
    }

    #[test]
    fn test_quoting_is_canonical() {
        assert_eq!(
            canonical(r#"a.a = 'it\'s "x"'"#),
            r#"a.a equals "it's \"x\"""#
        );
    }
}
