//! Tokenizer.
//!
//! Placeholders are not re-detected here: the tokenizer is handed the
//! extractor's descriptors and emits a placeholder token wherever one
//! starts, so the tree always agrees with extraction.

use std::collections::HashMap;

use nom::IResult;

use crate::dialect::Dialect;
use crate::error::{KilnError, KilnResult};
use crate::params::{ParamRef, ParameterDescriptor, Span};
use crate::scan;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Word { value: String, quote: Option<char> },
    Number(String),
    String(String),
    Placeholder(ParamRef),
    Comma,
    LParen,
    RParen,
    /// `[` where it does not open a quoted identifier.
    LBracket,
    RBracket,
    Period,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Concat,
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    DoubleColon,
    Arrow,
    LongArrow,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl TokenKind {
    /// Whether this is the unquoted keyword `kw` (case-insensitive).
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, TokenKind::Word { value, quote: None } if value.eq_ignore_ascii_case(kw))
    }
}

/// A comment found while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Comment {
    pub text: String,
    pub span: Span,
    pub block: bool,
    /// Starts immediately after a string literal, as in `'admin'--`.
    pub after_string: bool,
    /// Nothing but an optional `;` follows it.
    pub trailing: bool,
}

pub struct Tokenizer<'a> {
    sql: &'a str,
    dialect: Dialect,
    placeholders: HashMap<usize, &'a ParameterDescriptor>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(sql: &'a str, dialect: Dialect, descriptors: &'a [ParameterDescriptor]) -> Self {
        Self {
            sql,
            dialect,
            placeholders: descriptors.iter().map(|d| (d.span.start, d)).collect(),
        }
    }

    pub fn tokenize(&self) -> KilnResult<(Vec<Token>, Vec<Comment>)> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut comments = Vec::new();
        let mut pos = 0;

        while pos < self.sql.len() {
            if let Some(descriptor) = self.placeholders.get(&pos) {
                tokens.push(Token {
                    kind: TokenKind::Placeholder(descriptor.key()),
                    span: descriptor.span,
                });
                pos = descriptor.span.end;
                continue;
            }

            let rest = &self.sql[pos..];
            let Some(c) = rest.chars().next() else { break };

            if c.is_whitespace() {
                pos += c.len_utf8();
                continue;
            }

            if let Some(comment) = self.comment(rest, pos)? {
                let after_string = matches!(
                    tokens.last(),
                    Some(Token { kind: TokenKind::String(_), span }) if span.end == pos
                );
                pos = comment.span.end;
                comments.push(Comment {
                    after_string,
                    ..comment
                });
                continue;
            }

            let (kind, len) = self.token(rest, pos)?;
            tokens.push(Token {
                kind,
                span: Span {
                    start: pos,
                    end: pos + len,
                },
            });
            pos += len;
        }

        for comment in &mut comments {
            comment.trailing = tokens
                .iter()
                .filter(|t| t.span.start >= comment.span.end)
                .all(|t| t.kind == TokenKind::Semicolon);
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span {
                start: self.sql.len(),
                end: self.sql.len(),
            },
        });
        Ok((tokens, comments))
    }

    fn comment(&self, rest: &str, pos: usize) -> KilnResult<Option<Comment>> {
        let make = |raw: &str, block: bool| Comment {
            text: raw.to_string(),
            span: Span {
                start: pos,
                end: pos + raw.len(),
            },
            block,
            after_string: false,
            trailing: false,
        };
        if rest.starts_with("--") || (self.dialect.hash_comments() && rest.starts_with('#')) {
            let (_, raw) = scan::line_comment(rest, self.dialect.hash_comments())
                .map_err(|_| self.error(pos, "malformed comment"))?;
            return Ok(Some(make(raw, false)));
        }
        if rest.starts_with("/*") {
            let (_, raw) =
                scan::block_comment(rest).map_err(|_| self.error(pos, "unterminated block comment"))?;
            return Ok(Some(make(raw, true)));
        }
        Ok(None)
    }

    fn token(&self, rest: &str, pos: usize) -> KilnResult<(TokenKind, usize)> {
        let dialect = self.dialect;
        let Some(c) = rest.chars().next() else {
            return Err(self.error(pos, "unexpected end of input"));
        };

        if c == '\'' {
            return self.string(rest, pos, '\'', dialect.backslash_escapes());
        }
        if c == '"' && dialect.double_quoted_strings() {
            return self.string(rest, pos, '"', dialect.backslash_escapes());
        }
        if let Some((open, close)) = dialect.identifier_quotes().iter().find(|(open, _)| *open == c) {
            let (_, raw) = scan::quoted(rest, *open, *close, false)
                .map_err(|_| self.error(pos, "unterminated quoted identifier"))?;
            return Ok((
                TokenKind::Word {
                    value: scan::unquote(raw, *close, false),
                    quote: Some(*open),
                },
                raw.len(),
            ));
        }
        if c == '$' && dialect.dollar_quoted_strings() {
            if let Ok((_, raw)) = scan::dollar_quoted(rest) {
                let delimiter_len = raw[1..].find('$').map_or(1, |i| i + 2);
                let body = &raw[delimiter_len..raw.len() - delimiter_len];
                return Ok((TokenKind::String(body.to_string()), raw.len()));
            }
        }
        if c.is_ascii_digit() || (c == '.' && rest[1..].starts_with(|d: char| d.is_ascii_digit())) {
            let result: IResult<&str, &str> = scan::number(rest);
            let (_, raw) = result.map_err(|_| self.error(pos, "malformed number"))?;
            return Ok((TokenKind::Number(raw.to_string()), raw.len()));
        }
        if scan::is_ident_start(c) {
            let (_, word) = scan::word(rest).map_err(|_| self.error(pos, "malformed word"))?;
            // E'..' escape strings and N'..' national strings
            let after = &rest[word.len()..];
            if after.starts_with('\'') && matches!(word, "E" | "e" | "N" | "n") {
                let backslash = dialect.backslash_escapes() || word.eq_ignore_ascii_case("e");
                let (kind, len) = self.string(after, pos + word.len(), '\'', backslash)?;
                return Ok((kind, word.len() + len));
            }
            return Ok((
                TokenKind::Word {
                    value: word.to_string(),
                    quote: None,
                },
                word.len(),
            ));
        }
        if rest.starts_with("@@") {
            let name = scan::identifier(&rest[2..])
                .map(|(_, n)| n)
                .map_err(|_| self.error(pos, "malformed system variable"))?;
            return Ok((
                TokenKind::Word {
                    value: format!("@@{}", name),
                    quote: None,
                },
                name.len() + 2,
            ));
        }

        let two = rest.get(..2).unwrap_or("");
        let three = rest.get(..3).unwrap_or("");
        let (kind, len) = match (three, two, c) {
            ("->>", _, _) => (TokenKind::LongArrow, 3),
            (_, "->", _) => (TokenKind::Arrow, 2),
            (_, "::", _) => (TokenKind::DoubleColon, 2),
            (_, "||", _) => (TokenKind::Concat, 2),
            (_, "<>", _) | (_, "!=", _) => (TokenKind::Neq, 2),
            (_, "<=", _) => (TokenKind::LtEq, 2),
            (_, ">=", _) => (TokenKind::GtEq, 2),
            (_, "==", _) => (TokenKind::Eq, 2),
            (_, "%%", _) => (TokenKind::Percent, 2),
            (_, _, ',') => (TokenKind::Comma, 1),
            (_, _, '(') => (TokenKind::LParen, 1),
            (_, _, ')') => (TokenKind::RParen, 1),
            (_, _, '[') => (TokenKind::LBracket, 1),
            (_, _, ']') => (TokenKind::RBracket, 1),
            (_, _, '.') => (TokenKind::Period, 1),
            (_, _, ';') => (TokenKind::Semicolon, 1),
            (_, _, '*') => (TokenKind::Star, 1),
            (_, _, '+') => (TokenKind::Plus, 1),
            (_, _, '-') => (TokenKind::Minus, 1),
            (_, _, '/') => (TokenKind::Slash, 1),
            (_, _, '%') => (TokenKind::Percent, 1),
            (_, _, '=') => (TokenKind::Eq, 1),
            (_, _, '<') => (TokenKind::Lt, 1),
            (_, _, '>') => (TokenKind::Gt, 1),
            _ => {
                return Err(KilnError::parse(
                    pos,
                    c.to_string(),
                    format!("unexpected character '{}' in {} SQL", c, dialect),
                ));
            }
        };
        Ok((kind, len))
    }

    fn string(&self, rest: &str, pos: usize, quote: char, backslash: bool) -> KilnResult<(TokenKind, usize)> {
        let (_, raw) =
            scan::quoted(rest, quote, quote, backslash).map_err(|_| self.error(pos, "unterminated string literal"))?;
        Ok((TokenKind::String(scan::unquote(raw, quote, backslash)), raw.len()))
    }

    fn error(&self, pos: usize, message: &str) -> KilnError {
        let token: String = self.sql[pos..].chars().take(12).collect();
        KilnError::parse(pos, token, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterExtractor;

    fn kinds(sql: &str, dialect: Dialect) -> Vec<TokenKind> {
        let descriptors = ParameterExtractor::for_dialect(dialect).extract(sql);
        let (tokens, _) = Tokenizer::new(sql, dialect, &descriptors).tokenize().unwrap();
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn word(value: &str) -> TokenKind {
        TokenKind::Word {
            value: value.into(),
            quote: None,
        }
    }

    #[test]
    fn test_tokenize_select_with_placeholder() {
        assert_eq!(
            kinds("SELECT a FROM t WHERE x = $1", Dialect::Postgres),
            vec![
                word("SELECT"),
                word("a"),
                word("FROM"),
                word("t"),
                word("WHERE"),
                word("x"),
                TokenKind::Eq,
                TokenKind::Placeholder(ParamRef::Position(0)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_quoted_identifiers_per_dialect() {
        assert_eq!(
            kinds("`order`", Dialect::MySQL)[0],
            TokenKind::Word {
                value: "order".into(),
                quote: Some('`')
            }
        );
        assert_eq!(
            kinds("[my col]", Dialect::SqlServer)[0],
            TokenKind::Word {
                value: "my col".into(),
                quote: Some('[')
            }
        );
        assert_eq!(kinds("\"x\"", Dialect::MySQL)[0], TokenKind::String("x".into()));
    }

    #[test]
    fn test_brackets_outside_identifier_quotes() {
        assert_eq!(
            kinds("ARRAY[1]", Dialect::Postgres),
            vec![
                word("ARRAY"),
                TokenKind::LBracket,
                TokenKind::Number("1".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("[1]", Dialect::SQLite)[0],
            TokenKind::Word {
                value: "1".into(),
                quote: Some('[')
            }
        );
    }

    #[test]
    fn test_strings_and_operators() {
        assert_eq!(
            kinds("E'a\\'b' || $$x$$::text", Dialect::Postgres),
            vec![
                TokenKind::String("a'b".into()),
                TokenKind::Concat,
                TokenKind::String("x".into()),
                TokenKind::DoubleColon,
                word("text"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_recorded() {
        let sql = "SELECT * FROM users WHERE name = 'admin'-- AND pw = 'x'";
        let descriptors = ParameterExtractor::for_dialect(Dialect::Postgres).extract(sql);
        let (_, comments) = Tokenizer::new(sql, Dialect::Postgres, &descriptors)
            .tokenize()
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].after_string);
        assert!(comments[0].trailing);
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let sql = "SELECT 'abc";
        let err = Tokenizer::new(sql, Dialect::Postgres, &[]).tokenize().unwrap_err();
        assert!(matches!(err, KilnError::Parse { position: 7, .. }));
    }
}
