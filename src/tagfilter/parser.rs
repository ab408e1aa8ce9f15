//! Recursive descent parser for tag filter expressions.
//!
//! ```text
//! expr      := or-expr
//! or-expr   := and-expr ( 'OR' and-expr )*
//! and-expr  := unary ( 'AND' unary )*
//! unary     := '(' expr ')' | predicate
//! predicate := tag comparison-op value?
//! tag       := identifier ( '.' identifier )* ( ':' key )? ( '@' origin )?
//! value     := quoted-string | number | boolean
//! ```

use super::ast::{EntityOrigin, Expression, LogicalOperator, Operator, Predicate, PredicateValue};
use super::lexer::{tokenize, Token, TokenKind};
use super::{TagFilterError, TagFilterErrorKind};

/// Maximum number of nested parentheses accepted by [`parse`].
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parse an expression string into an [`Expression`].
pub fn parse(input: &str) -> Result<Expression, TagFilterError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: input.len(),
    };
    let expr = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(
            token.offset,
            format!("unexpected {}", describe(&token.kind)),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> TagFilterError {
        TagFilterError::new(TagFilterErrorKind::Parse, offset, message)
    }

    fn unexpected_end(&self, expected: &str) -> TagFilterError {
        self.error_at(self.end, format!("unexpected end of input, expected {}", expected))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Token { kind: TokenKind::Ident(word), .. }) if word.eq_ignore_ascii_case(keyword)
        )
    }

    fn or_expr(&mut self) -> Result<Expression, TagFilterError> {
        let mut children = vec![self.and_expr()?];
        while self.peek_keyword("or") {
            self.pos += 1;
            children.push(self.and_expr()?);
        }
        Ok(Expression::logical(LogicalOperator::Or, children))
    }

    fn and_expr(&mut self) -> Result<Expression, TagFilterError> {
        let mut children = vec![self.unary()?];
        while self.peek_keyword("and") {
            self.pos += 1;
            children.push(self.unary()?);
        }
        Ok(Expression::logical(LogicalOperator::And, children))
    }

    fn unary(&mut self) -> Result<Expression, TagFilterError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::LeftParen,
                offset,
            }) => {
                let open = *offset;
                self.pos += 1;
                self.depth += 1;
                if self.depth > MAX_NESTING_DEPTH {
                    return Err(self.error_at(
                        open,
                        format!("expression nested deeper than {} levels", MAX_NESTING_DEPTH),
                    ));
                }
                let inner = self.or_expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RightParen,
                        ..
                    }) => Ok(Expression::bracket(inner)),
                    Some(token) => Err(self.error_at(
                        token.offset,
                        format!("expected ')' but found {}", describe(&token.kind)),
                    )),
                    None => Err(self.unexpected_end("')'")),
                }
            },
            Some(_) => self.predicate().map(Expression::Predicate),
            None => Err(self.unexpected_end("a predicate")),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, TagFilterError> {
        let name = self.dotted_identifier("a tag name")?;

        let key = if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Colon)) {
            self.pos += 1;
            Some(self.key()?)
        } else {
            None
        };

        let entity = if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::At)) {
            self.pos += 1;
            match self.next() {
                Some(Token {
                    kind: TokenKind::Ident(word),
                    offset,
                }) => EntityOrigin::from_short_name(&word).ok_or_else(|| {
                    self.error_at(
                        offset,
                        format!("unknown entity origin '{}', expected src, dest or na", word),
                    )
                })?,
                Some(token) => {
                    return Err(self.error_at(
                        token.offset,
                        format!("expected entity origin but found {}", describe(&token.kind)),
                    ))
                },
                None => return Err(self.unexpected_end("an entity origin")),
            }
        } else {
            EntityOrigin::NotApplicable
        };

        let operator = match self.next() {
            Some(Token {
                kind: TokenKind::Ident(word),
                offset,
            }) => Operator::from_keyword(&word)
                .ok_or_else(|| self.error_at(offset, format!("unknown operator '{}'", word)))?,
            Some(Token {
                kind: TokenKind::Symbol(symbol),
                offset,
            }) => Operator::from_keyword(symbol)
                .ok_or_else(|| self.error_at(offset, format!("unknown operator '{}'", symbol)))?,
            Some(token) => {
                return Err(self.error_at(
                    token.offset,
                    format!("expected operator but found {}", describe(&token.kind)),
                ))
            },
            None => return Err(self.unexpected_end("an operator")),
        };

        let value = if operator.is_unary() {
            None
        } else {
            Some(self.value(operator)?)
        };

        Ok(Predicate {
            entity,
            name,
            key,
            operator,
            value,
        })
    }

    fn dotted_identifier(&mut self, expected: &str) -> Result<String, TagFilterError> {
        let mut name = match self.next() {
            Some(Token {
                kind: TokenKind::Ident(word),
                ..
            }) => word,
            Some(token) => {
                return Err(self.error_at(
                    token.offset,
                    format!("expected {} but found {}", expected, describe(&token.kind)),
                ))
            },
            None => return Err(self.unexpected_end(expected)),
        };
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Dot)) {
            self.pos += 1;
            match self.next() {
                Some(Token {
                    kind: TokenKind::Ident(word),
                    ..
                }) => {
                    name.push('.');
                    name.push_str(&word);
                },
                Some(token) => {
                    return Err(self.error_at(
                        token.offset,
                        format!("expected identifier after '.' but found {}", describe(&token.kind)),
                    ))
                },
                None => return Err(self.unexpected_end("an identifier after '.'")),
            }
        }
        Ok(name)
    }

    fn key(&mut self) -> Result<String, TagFilterError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Str(_),
                ..
            }) => match self.next() {
                Some(Token {
                    kind: TokenKind::Str(s),
                    ..
                }) => Ok(s),
                _ => Err(self.unexpected_end("a tag key")),
            },
            _ => self.dotted_identifier("a tag key"),
        }
    }

    fn value(&mut self, operator: Operator) -> Result<PredicateValue, TagFilterError> {
        let (value, offset) = match self.next() {
            Some(Token {
                kind: TokenKind::Str(s),
                offset,
            }) => (PredicateValue::String(s), offset),
            Some(Token {
                kind: TokenKind::Number(n),
                offset,
            }) => (PredicateValue::Number(n), offset),
            Some(Token {
                kind: TokenKind::Ident(word),
                offset,
            }) if word.eq_ignore_ascii_case("true") || word.eq_ignore_ascii_case("false") => (
                PredicateValue::Boolean(word.eq_ignore_ascii_case("true")),
                offset,
            ),
            Some(token) => {
                return Err(self.error_at(
                    token.offset,
                    format!(
                        "expected value for operator {} but found {}",
                        operator.wire_name(),
                        describe(&token.kind)
                    ),
                ))
            },
            None => {
                return Err(self.unexpected_end(&format!(
                    "a value for operator {}",
                    operator.wire_name()
                )))
            },
        };
        if !operator.accepts(value.kind()) {
            return Err(self.error_at(
                offset,
                format!(
                    "operator {} does not accept a {} value",
                    operator.wire_name(),
                    value.kind()
                ),
            ));
        }
        Ok(value)
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::LeftParen => "'('".to_string(),
        TokenKind::RightParen => "')'".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::At => "'@'".to_string(),
        TokenKind::Ident(word) => format!("'{}'", word),
        TokenKind::Str(s) => format!("string \"{}\"", s),
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Symbol(s) => format!("'{}'", s),
    }
}
