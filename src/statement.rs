//! Statements: the unit of work handed to a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! A statement never changes after construction. Binding arguments with
//! [`Statement::bind`] consumes the statement and returns a new one, and
//! compiling it produces a separate [`CompiledStatement`](crate::pipeline::CompiledStatement).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ast;
use crate::config::StatementConfig;
use crate::dialect::Dialect;
use crate::params::Params;

/// Where the statement text came from.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementSource {
    /// Raw SQL text.
    Sql(String),
    /// A tree built in code. Parsing is skipped.
    Ast(Box<ast::Statement>),
    /// A named query loaded from a file.
    File(LoadedQuery),
}

/// A named query read from a SQL file, with the checksum of its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedQuery {
    pub name: String,
    pub sql: String,
    /// Overrides the configured dialect when set.
    pub dialect: Option<Dialect>,
    /// Hex SHA-256 of `sql`.
    pub checksum: String,
}

impl LoadedQuery {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = format!("{:x}", Sha256::digest(sql.as_bytes()));
        Self {
            name: name.into(),
            sql,
            dialect: None,
            checksum,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    source: StatementSource,
    config: Arc<StatementConfig>,
    params: Params,
}

impl Statement {
    pub fn new(source: StatementSource, config: impl Into<Arc<StatementConfig>>) -> Self {
        Self {
            source,
            config: config.into(),
            params: Params::None,
        }
    }

    /// Statement from SQL text.
    pub fn sql(sql: impl Into<String>, config: impl Into<Arc<StatementConfig>>) -> Self {
        Self::new(StatementSource::Sql(sql.into()), config)
    }

    /// Statement from a tree built in code.
    pub fn ast(statement: ast::Statement, config: impl Into<Arc<StatementConfig>>) -> Self {
        Self::new(StatementSource::Ast(Box::new(statement)), config)
    }

    /// Statement from a loaded query file.
    pub fn file(query: LoadedQuery, config: impl Into<Arc<StatementConfig>>) -> Self {
        Self::new(StatementSource::File(query), config)
    }

    /// The same statement with `params` as its arguments.
    pub fn bind(self, params: Params) -> Self {
        Self { params, ..self }
    }

    pub fn source(&self) -> &StatementSource {
        &self.source
    }

    pub fn config(&self) -> &StatementConfig {
        &self.config
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Source dialect: a file's declared dialect, else the configured one.
    pub fn dialect(&self) -> Dialect {
        match &self.source {
            StatementSource::File(LoadedQuery {
                dialect: Some(dialect),
                ..
            }) => *dialect,
            _ => self.config.dialect,
        }
    }

    /// SQL text, when the statement has any.
    pub fn text(&self) -> Option<&str> {
        match &self.source {
            StatementSource::Sql(sql) => Some(sql),
            StatementSource::File(query) => Some(&query.sql),
            StatementSource::Ast(_) => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            StatementSource::Sql(sql) => f.write_str(sql),
            StatementSource::Ast(statement) => write!(f, "{}", statement),
            StatementSource::File(query) => write!(f, "-- {}\n{}", query.name, query.sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_file_checksum_and_dialect_override() {
        let a = LoadedQuery::new("get_user", "SELECT * FROM users WHERE id = :id");
        let b = LoadedQuery::new("get_user", "SELECT * FROM users WHERE id = :id ");
        assert_eq!(a.checksum.len(), 64);
        assert_ne!(a.checksum, b.checksum);

        let config = Arc::new(StatementConfig::for_dialect(Dialect::Postgres));
        let stmt = Statement::file(a.with_dialect(Dialect::SQLite), Arc::clone(&config));
        assert_eq!(stmt.dialect(), Dialect::SQLite);
        assert_eq!(Statement::sql("SELECT 1", config).dialect(), Dialect::Postgres);
    }

    #[test]
    fn test_bind_returns_new_statement() {
        let stmt = Statement::sql("SELECT ?", StatementConfig::default());
        let bound = stmt.clone().bind(Params::positional([5]));
        assert_eq!(stmt.params(), &Params::None);
        assert_eq!(bound.params().len(), 1);
        assert_eq!(bound.text(), Some("SELECT ?"));
    }
}
