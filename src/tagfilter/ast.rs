//! Abstract syntax tree of tag filter expressions.

use std::fmt;

/// A tag filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A conjunction or disjunction of sub expressions.
    Logical(LogicalExpression),
    /// Explicit grouping with parentheses.
    Bracket(Box<Expression>),
    /// A single comparison.
    Predicate(Predicate),
}

/// Children joined by a single logical operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalExpression {
    /// `AND` or `OR`.
    pub operator: LogicalOperator,
    /// Operands, primary operand first.
    pub children: Vec<Expression>,
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

impl LogicalOperator {
    /// The wire name of the operator.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Parse a wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Which side of a call a tag is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityOrigin {
    /// `@src`
    Source,
    /// `@dest`
    Destination,
    /// No origin given (`@na`).
    #[default]
    NotApplicable,
}

impl EntityOrigin {
    /// The wire name used by the API.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Destination => "DESTINATION",
            Self::NotApplicable => "NOT_APPLICABLE",
        }
    }

    /// Parse a wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "SOURCE" => Some(Self::Source),
            "DESTINATION" => Some(Self::Destination),
            "NOT_APPLICABLE" => Some(Self::NotApplicable),
            _ => None,
        }
    }

    /// Parse the short form used after `@` in expressions (case-insensitive).
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "src" => Some(Self::Source),
            "dest" => Some(Self::Destination),
            "na" => Some(Self::NotApplicable),
            _ => None,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Source => "@src",
            Self::Destination => "@dest",
            Self::NotApplicable => "",
        }
    }
}

/// The kind of a predicate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A quoted string.
    String,
    /// An integer.
    Number,
    /// `true` or `false`.
    Boolean,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `EQUALS`, `=`
    Equals,
    /// `NOT_EQUAL`, `!=`
    NotEqual,
    /// `CONTAINS`
    Contains,
    /// `NOT_CONTAIN`
    NotContain,
    /// `STARTS_WITH`
    StartsWith,
    /// `ENDS_WITH`
    EndsWith,
    /// `NOT_STARTS_WITH`
    NotStartsWith,
    /// `NOT_ENDS_WITH`
    NotEndsWith,
    /// `GREATER_OR_EQUAL_THAN`, `>=`
    GreaterOrEqualThan,
    /// `LESS_OR_EQUAL_THAN`, `<=`
    LessOrEqualThan,
    /// `GREATER_THAN`, `>`
    GreaterThan,
    /// `LESS_THAN`, `<`
    LessThan,
    /// `IS_EMPTY`
    IsEmpty,
    /// `NOT_EMPTY`
    NotEmpty,
    /// `IS_BLANK`
    IsBlank,
    /// `NOT_BLANK`
    NotBlank,
}

impl Operator {
    /// All supported operators.
    pub const ALL: [Operator; 16] = [
        Self::Equals,
        Self::NotEqual,
        Self::Contains,
        Self::NotContain,
        Self::StartsWith,
        Self::EndsWith,
        Self::NotStartsWith,
        Self::NotEndsWith,
        Self::GreaterOrEqualThan,
        Self::LessOrEqualThan,
        Self::GreaterThan,
        Self::LessThan,
        Self::IsEmpty,
        Self::NotEmpty,
        Self::IsBlank,
        Self::NotBlank,
    ];

    /// The wire name used by the API.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEqual => "NOT_EQUAL",
            Self::Contains => "CONTAINS",
            Self::NotContain => "NOT_CONTAIN",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::NotStartsWith => "NOT_STARTS_WITH",
            Self::NotEndsWith => "NOT_ENDS_WITH",
            Self::GreaterOrEqualThan => "GREATER_OR_EQUAL_THAN",
            Self::LessOrEqualThan => "LESS_OR_EQUAL_THAN",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThan => "LESS_THAN",
            Self::IsEmpty => "IS_EMPTY",
            Self::NotEmpty => "NOT_EMPTY",
            Self::IsBlank => "IS_BLANK",
            Self::NotBlank => "NOT_BLANK",
        }
    }

    /// Parse a wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.wire_name() == name)
    }

    /// Parse an operator keyword (case-insensitive) or symbolic alias.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "=" | "==" => return Some(Self::Equals),
            "!=" => return Some(Self::NotEqual),
            ">=" => return Some(Self::GreaterOrEqualThan),
            "<=" => return Some(Self::LessOrEqualThan),
            ">" => return Some(Self::GreaterThan),
            "<" => return Some(Self::LessThan),
            _ => {},
        }
        let upper = word.to_ascii_uppercase();
        Self::from_wire_name(&upper)
    }

    /// Whether the operator takes no value.
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Self::IsEmpty | Self::NotEmpty | Self::IsBlank | Self::NotBlank
        )
    }

    /// Whether the operator accepts a value of the given kind.
    pub fn accepts(&self, kind: ValueKind) -> bool {
        match self {
            Self::Equals | Self::NotEqual => true,
            Self::Contains
            | Self::NotContain
            | Self::StartsWith
            | Self::EndsWith
            | Self::NotStartsWith
            | Self::NotEndsWith => kind == ValueKind::String,
            Self::GreaterOrEqualThan | Self::LessOrEqualThan | Self::GreaterThan | Self::LessThan => {
                kind == ValueKind::Number
            },
            Self::IsEmpty | Self::NotEmpty | Self::IsBlank | Self::NotBlank => false,
        }
    }

    fn keyword(&self) -> String {
        self.wire_name().to_ascii_lowercase()
    }
}

/// The value compared against a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateValue {
    /// A string literal.
    String(String),
    /// An integer literal.
    Number(i64),
    /// A boolean literal.
    Boolean(bool),
}

impl PredicateValue {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Number(_) => ValueKind::Number,
            Self::Boolean(_) => ValueKind::Boolean,
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write_quoted(f, s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// A single comparison of a tag against a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Origin of the tag.
    pub entity: EntityOrigin,
    /// Dotted tag name, e.g. `call.http.status`.
    pub name: String,
    /// Key for key/value tags such as `kubernetes.label:app`.
    pub key: Option<String>,
    /// Comparison operator.
    pub operator: Operator,
    /// Value, absent for unary operators.
    pub value: Option<PredicateValue>,
}

impl Predicate {
    /// Create a binary predicate.
    pub fn new(
        entity: EntityOrigin,
        name: impl Into<String>,
        operator: Operator,
        value: PredicateValue,
    ) -> Self {
        Self {
            entity,
            name: name.into(),
            key: None,
            operator,
            value: Some(value),
        }
    }

    /// Create a unary predicate.
    pub fn unary(entity: EntityOrigin, name: impl Into<String>, operator: Operator) -> Self {
        Self {
            entity,
            name: name.into(),
            key: None,
            operator,
            value: None,
        }
    }

    /// Set the tag key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(key) = &self.key {
            f.write_str(":")?;
            if is_plain_key(key) {
                f.write_str(key)?;
            } else {
                write_quoted(f, key)?;
            }
        }
        write!(f, "{} {}", self.entity.suffix(), self.operator.keyword())?;
        if let Some(value) = &self.value {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

impl Expression {
    /// Build a logical node, collapsing a single operand to itself.
    pub fn logical(operator: LogicalOperator, mut children: Vec<Expression>) -> Self {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        Self::Logical(LogicalExpression { operator, children })
    }

    /// Wrap an expression in brackets.
    pub fn bracket(inner: Expression) -> Self {
        Self::Bracket(Box::new(inner))
    }

    /// Nesting depth of the tree (a predicate has depth 1).
    pub fn depth(&self) -> usize {
        match self {
            Self::Predicate(_) => 1,
            Self::Bracket(inner) => 1 + inner.depth(),
            Self::Logical(l) => 1 + l.children.iter().map(Expression::depth).max().unwrap_or(0),
        }
    }
}

impl From<Predicate> for Expression {
    fn from(p: Predicate) -> Self {
        Self::Predicate(p)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(p) => write!(f, "{}", p),
            Self::Bracket(inner) => write!(f, "({})", inner),
            Self::Logical(l) => {
                for (i, child) in l.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", l.operator.keyword())?;
                    }
                    // an OR operand of an AND needs parentheses to keep its meaning
                    let needs_parens = l.operator == LogicalOperator::And
                        && matches!(
                            child,
                            Expression::Logical(LogicalExpression {
                                operator: LogicalOperator::Or,
                                ..
                            })
                        );
                    if needs_parens {
                        write!(f, "({})", child)?;
                    } else {
                        write!(f, "{}", child)?;
                    }
                }
                Ok(())
            },
        }
    }
}

/// Whether `key` lexes back as a dotted identifier.
///
/// The first segment must start like an identifier; later segments may also
/// start with a digit.
fn is_plain_key(key: &str) -> bool {
    key.split('.').enumerate().all(|(i, segment)| {
        let starts_segment =
            |c: char| c.is_ascii_alphabetic() || c == '_' || (i > 0 && c.is_ascii_digit());
        segment.starts_with(starts_segment)
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
    })
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            other => write!(f, "{}", other)?,
        }
    }
    f.write_str("\"")
}
