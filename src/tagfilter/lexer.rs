//! Tokenizer for tag filter expressions.

use super::{TagFilterError, TagFilterErrorKind};

/// Kinds of tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `@`
    At,
    /// Identifier or keyword.
    Ident(String),
    /// Quoted string with escapes resolved.
    Str(String),
    /// Integer literal.
    Number(i64),
    /// Symbolic comparison operator such as `>=`.
    Symbol(&'static str),
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// Byte offset into the input.
    pub offset: usize,
}

/// Split an expression into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, TagFilterError> {
    let mut lexer = Lexer {
        input,
        chars: input.char_indices().peekable(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<(), TagFilterError> {
        while let Some(&(offset, c)) = self.chars.peek() {
            let kind = match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                },
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                '.' => self.single(TokenKind::Dot),
                ':' => self.single(TokenKind::Colon),
                '@' => self.single(TokenKind::At),
                '"' | '\'' => self.string(offset, c)?,
                '=' | '!' | '<' | '>' => self.symbol(offset, c)?,
                '-' => self.number(offset)?,
                c if c.is_ascii_digit() && self.follows_dot(offset) => self.ident(offset),
                c if c.is_ascii_digit() => self.number(offset)?,
                c if is_ident_start(c) => self.ident(offset),
                other => {
                    return Err(TagFilterError::new(
                        TagFilterErrorKind::Lex,
                        offset,
                        format!("unexpected character '{}'", other),
                    ))
                },
            };
            self.tokens.push(Token { kind, offset });
        }
        Ok(())
    }

    /// A segment of a dotted name, like the `2xx` in `call.http.2xx`.
    fn follows_dot(&self, offset: usize) -> bool {
        matches!(
            self.tokens.last(),
            Some(Token { kind: TokenKind::Dot, offset: dot }) if dot + 1 == offset
        )
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.chars.next();
        kind
    }

    fn string(&mut self, start: usize, quote: char) -> Result<TokenKind, TagFilterError> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(TokenKind::Str(value)),
                Some((pos, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => {
                        return Err(TagFilterError::new(
                            TagFilterErrorKind::Lex,
                            pos,
                            "dangling escape at end of input",
                        ))
                    },
                },
                Some((_, c)) => value.push(c),
                None => {
                    return Err(TagFilterError::new(
                        TagFilterErrorKind::Lex,
                        start,
                        "unterminated string",
                    ))
                },
            }
        }
    }

    fn symbol(&mut self, offset: usize, first: char) -> Result<TokenKind, TagFilterError> {
        self.chars.next();
        let followed_by_eq = matches!(self.chars.peek(), Some(&(_, '=')));
        let symbol = match (first, followed_by_eq) {
            ('=', true) => "==",
            ('=', false) => "=",
            ('!', true) => "!=",
            ('<', true) => "<=",
            ('<', false) => "<",
            ('>', true) => ">=",
            ('>', false) => ">",
            _ => {
                return Err(TagFilterError::new(
                    TagFilterErrorKind::Lex,
                    offset,
                    format!("unexpected character '{}'", first),
                ))
            },
        };
        if followed_by_eq {
            self.chars.next();
        }
        Ok(TokenKind::Symbol(symbol))
    }

    fn number(&mut self, offset: usize) -> Result<TokenKind, TagFilterError> {
        let mut end = offset;
        if let Some(&(pos, '-')) = self.chars.peek() {
            self.chars.next();
            end = pos + 1;
        }
        while let Some(&(pos, c)) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.chars.next();
            end = pos + 1;
        }
        let text = &self.input[offset..end];
        text.parse::<i64>().map(TokenKind::Number).map_err(|_| {
            TagFilterError::new(
                TagFilterErrorKind::Lex,
                offset,
                format!("invalid number '{}'", text),
            )
        })
    }

    fn ident(&mut self, offset: usize) -> TokenKind {
        let mut end = offset;
        while let Some(&(pos, c)) = self.chars.peek() {
            if !is_ident_continue(c) {
                break;
            }
            self.chars.next();
            end = pos + c.len_utf8();
        }
        TokenKind::Ident(self.input[offset..end].to_string())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '/'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_predicate() {
        assert_eq!(
            kinds("call.name@dest CONTAINS 'foo'"),
            vec![
                TokenKind::Ident("call".into()),
                TokenKind::Dot,
                TokenKind::Ident("name".into()),
                TokenKind::At,
                TokenKind::Ident("dest".into()),
                TokenKind::Ident("CONTAINS".into()),
                TokenKind::Str("foo".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_symbols_and_numbers() {
        assert_eq!(
            kinds("a >= -12 != 3 < 4"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Symbol(">="),
                TokenKind::Number(-12),
                TokenKind::Symbol("!="),
                TokenKind::Number(3),
                TokenKind::Symbol("<"),
                TokenKind::Number(4),
            ]
        );
    }

    #[test]
    fn test_tokenize_escapes() {
        assert_eq!(
            kinds(r#""a \"b\" \\c" 'it\'s'"#),
            vec![
                TokenKind::Str(r#"a "b" \c"#.into()),
                TokenKind::Str("it's".into()),
            ]
        );
    }

    #[test]
    fn test_offsets() {
        let tokens = tokenize("(a = 1)").unwrap();
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 1, 3, 5, 6]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("a = 'oops").unwrap_err();
        assert_eq!(err.kind, TagFilterErrorKind::Lex);
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_bad_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.kind, TagFilterErrorKind::Lex);
        assert_eq!(err.offset, 2);

        let err = tokenize("a ! b").unwrap_err();
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_digit_segment_after_dot() {
        assert_eq!(
            kinds("call.http.2xx"),
            vec![
                TokenKind::Ident("call".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("http".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("2xx".to_string()),
            ]
        );
        assert_eq!(
            kinds("a = 2"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Symbol("="),
                TokenKind::Number(2),
            ]
        );
    }

    #[test]
    fn test_number_overflow() {
        let err = tokenize("a = 99999999999999999999").unwrap_err();
        assert!(err.message.contains("invalid number"));
    }
}
