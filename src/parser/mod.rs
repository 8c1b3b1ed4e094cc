//! SQL parser.
//!
//! A hand-written recursive-descent parser over the tokens produced by
//! [`tokens::Tokenizer`]. Expressions use precedence climbing. Parsing is
//! always done for an explicit dialect, which decides lexical rules and a
//! few syntax forms (`TOP`, `::`, `ON DUPLICATE KEY`).
//!
//! | File | Grammar |
//! |------|---------|
//! | `query.rs` | SELECT, set operations, CTEs, FROM/JOIN |
//! | `expr.rs` | Expressions, functions, windows, data types |
//! | `dml.rs` | INSERT, UPDATE, DELETE |
//! | `ddl.rs` | CREATE, DROP, ALTER, TRUNCATE |

mod ddl;
mod dml;
mod expr;
mod query;
pub mod tokens;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::ast::{Ident, ObjectName, Statement};
use crate::dialect::Dialect;
use crate::error::{KilnError, KilnResult};
use crate::params::{ParameterDescriptor, ParameterExtractor};

pub use tokens::{Comment, Token, TokenKind};

/// Nesting limit for expressions and subqueries. Each operator folded into
/// a chain (`a OR b OR c`) counts as one level, since the tree it builds is
/// as deep as the chain is long.
const MAX_DEPTH: usize = 64;

/// Keywords that never start an expression and are never implicit aliases.
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CROSS", "DESC", "DISTINCT", "DO", "ELSE",
    "END", "ESCAPE", "EXCEPT", "FETCH", "FILTER", "FOR", "FROM", "FULL", "GROUP", "HAVING", "ILIKE",
    "IN", "INNER", "INTERSECT", "INTO", "IS", "JOIN", "LATERAL", "LEFT", "LIKE", "LIMIT", "NATURAL",
    "NOT", "NULLS", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "RETURNING",
    "RIGHT", "SELECT", "SET", "THEN", "TOP", "UNION", "USING", "VALUES", "WHEN", "WHERE", "WINDOW",
    "WITH",
];

/// Whether `word` is reserved for grammar purposes.
pub fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

/// A parsed statement plus the comments seen in its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub statement: Statement,
    pub comments: Vec<Comment>,
}

/// Parse exactly one statement.
///
/// `descriptors` are the placeholders extracted from `sql`; each becomes a
/// placeholder node. A trailing `;` is allowed, a second statement is not.
pub fn parse(sql: &str, dialect: Dialect, descriptors: &[ParameterDescriptor]) -> KilnResult<ParsedStatement> {
    let (tokens, comments) = tokens::Tokenizer::new(sql, dialect, descriptors).tokenize()?;
    let mut parser = Parser::new(sql, tokens, dialect);
    if parser.peek() == &TokenKind::Eof {
        return Err(parser.error("empty statement"));
    }
    let statement = parser.parse_statement()?;
    if parser.consume(&TokenKind::Semicolon) {
        while parser.consume(&TokenKind::Semicolon) {}
        if parser.peek() != &TokenKind::Eof {
            return Err(parser.error("multiple statements are not supported"));
        }
    }
    if parser.peek() != &TokenKind::Eof {
        return Err(parser.error("unexpected trailing input"));
    }
    tracing::trace!(dialect = %dialect, kind = ?statement.kind(), "parsed statement");
    Ok(ParsedStatement { statement, comments })
}

/// Parse using the dialect's recognized placeholder styles.
pub fn parse_sql(sql: &str, dialect: Dialect) -> KilnResult<ParsedStatement> {
    let descriptors = ParameterExtractor::for_dialect(dialect).extract(sql);
    parse(sql, dialect, &descriptors)
}

pub(crate) struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    index: usize,
    dialect: Dialect,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str, tokens: Vec<Token>, dialect: Dialect) -> Self {
        Self {
            sql,
            tokens,
            index: 0,
            dialect,
            depth: 0,
        }
    }

    fn parse_statement(&mut self) -> KilnResult<Statement> {
        let kind = self.peek().clone();
        match &kind {
            TokenKind::Word { value, quote: None } => match value.to_ascii_uppercase().as_str() {
                "SELECT" | "WITH" | "VALUES" => Ok(Statement::Query(Box::new(self.parse_query()?))),
                "INSERT" => self.parse_insert(),
                "UPDATE" => self.parse_update(),
                "DELETE" => self.parse_delete(),
                "CREATE" => self.parse_create(),
                "DROP" => self.parse_drop(),
                "ALTER" => self.parse_alter(),
                "TRUNCATE" => self.parse_truncate(),
                _ => Err(self.error("expected a statement")),
            },
            TokenKind::LParen => Ok(Statement::Query(Box::new(self.parse_query()?))),
            _ => Err(self.error("expected a statement")),
        }
    }

    // ---- token helpers ----

    fn peek(&self) -> &TokenKind {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.index + n)
            .or_else(|| self.tokens.last())
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn next(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> KilnResult<()> {
        if self.consume(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", what)))
        }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        self.peek().is_keyword(kw)
    }

    fn parse_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Consume the whole keyword sequence or nothing.
    fn parse_keywords(&mut self, kws: &[&str]) -> bool {
        let matched = kws.iter().enumerate().all(|(i, kw)| self.peek_nth(i).is_keyword(kw));
        if matched {
            self.index += kws.len();
        }
        matched
    }

    fn expect_keyword(&mut self, kw: &str) -> KilnResult<()> {
        if self.parse_keyword(kw) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", kw)))
        }
    }

    fn expect_keywords(&mut self, kws: &[&str]) -> KilnResult<()> {
        for kw in kws {
            self.expect_keyword(kw)?;
        }
        Ok(())
    }

    /// One of the listed keywords, returned uppercased.
    fn parse_one_of(&mut self, kws: &[&str]) -> Option<String> {
        let found = kws.iter().find(|kw| self.is_keyword(kw)).map(|kw| kw.to_string());
        if found.is_some() {
            self.index += 1;
        }
        found
    }

    fn parse_identifier(&mut self) -> KilnResult<Ident> {
        match self.peek().clone() {
            TokenKind::Word { value, quote } => {
                if quote.is_none() && is_reserved(&value) {
                    return Err(self.error("expected an identifier, found a keyword"));
                }
                self.index += 1;
                Ok(Ident {
                    value,
                    quote_style: quote,
                })
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    fn parse_object_name(&mut self) -> KilnResult<ObjectName> {
        let mut parts = vec![self.parse_identifier()?];
        while self.consume(&TokenKind::Period) {
            parts.push(self.parse_identifier()?);
        }
        Ok(ObjectName(parts))
    }

    fn parse_comma_separated<T>(&mut self, mut f: impl FnMut(&mut Self) -> KilnResult<T>) -> KilnResult<Vec<T>> {
        let mut items = vec![f(self)?];
        while self.consume(&TokenKind::Comma) {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// `(a, b, c)`
    fn parse_parenthesized_identifiers(&mut self) -> KilnResult<Vec<Ident>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let idents = self.parse_comma_separated(Self::parse_identifier)?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(idents)
    }

    /// `[AS] alias`, where a bare alias must not be a reserved keyword.
    fn parse_optional_alias(&mut self) -> KilnResult<Option<Ident>> {
        if self.parse_keyword("AS") {
            return self.parse_identifier().map(Some);
        }
        match self.peek() {
            TokenKind::Word { value, quote } if quote.is_some() || !is_reserved(value) => {
                self.parse_identifier().map(Some)
            }
            _ => Ok(None),
        }
    }

    fn enter(&mut self) -> KilnResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("statement nesting is too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.leave_n(1);
    }

    fn leave_n(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    fn error(&self, message: &str) -> KilnError {
        let (position, token) = match self.tokens.get(self.index) {
            Some(Token {
                kind: TokenKind::Eof, ..
            })
            | None => (self.sql.len(), "end of input".to_string()),
            Some(token) => (token.span.start, self.sql[token.span.start..token.span.end].to_string()),
        };
        KilnError::parse(position, token, message)
    }
}
