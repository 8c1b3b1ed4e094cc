//! # sqlkiln
//!
//! > **Parse once, validate once, compile once.**
//!
//! sqlkiln takes SQL text (or a tree built in code), extracts its
//! placeholders, parses it for an explicit dialect, runs security,
//! performance and DML-safety checks, applies rewrites, and compiles the
//! result into SQL for a target dialect and placeholder style together with
//! the parameter values that go with it. Compiled plans are cached by
//! fingerprint, so the second call with the same text skips straight to
//! binding.
//!
//! ## Quick Example
//!
//! ```
//! use sqlkiln::prelude::*;
//!
//! let pipeline = Pipeline::default();
//! let stmt = Statement::sql(
//!     "SELECT id FROM t WHERE x = ? LIMIT 10",
//!     StatementConfig::for_dialect(Dialect::Postgres),
//! )
//! .bind(Params::positional([5]));
//!
//! let out = pipeline.compile(&stmt).unwrap();
//! assert_eq!(out.sql, "SELECT id FROM t WHERE x = $1 LIMIT 10");
//! assert_eq!(out.parameters, Parameters::Positional(vec![Value::Int(5)]));
//! ```
//!
//! ## Stages
//!
//! | Stage | Module |
//! |-------|--------|
//! | Parameter extraction | [`params`] |
//! | Parsing | [`parser`] |
//! | Validation | [`validator`] |
//! | Transformation | [`transformer`] |
//! | Compilation | [`transpiler`] |
//! | Caching | [`cache`] |

pub mod ast;
pub mod cache;
pub mod config;
pub mod dialect;
pub mod error;
pub mod params;
pub mod parser;
pub mod pipeline;
pub mod scan;
pub mod statement;
pub mod transformer;
pub mod transpiler;
pub mod validator;

pub mod prelude {
    pub use crate::cache::{CacheConfig, CacheService, CacheStats};
    pub use crate::config::{Settings, StatementConfig};
    pub use crate::dialect::Dialect;
    pub use crate::error::*;
    pub use crate::params::{ParameterStyle, Parameters, Params, Value};
    pub use crate::pipeline::{CompiledStatement, Pipeline};
    pub use crate::statement::{LoadedQuery, Statement, StatementSource};
    pub use crate::transformer::{SoftDeleteFilter, TenantFilter, Transformer};
    pub use crate::validator::{FindingKind, Severity, ValidationFinding, ValidatorMode};
}

/// Parse one SQL statement written for `dialect`.
///
/// # Example
///
/// ```
/// use sqlkiln::dialect::Dialect;
///
/// let parsed = sqlkiln::parse("SELECT id FROM users WHERE active = TRUE", Dialect::Postgres).unwrap();
/// assert_eq!(parsed.statement.to_string(), "SELECT id FROM users WHERE active = TRUE");
/// ```
pub fn parse(sql: &str, dialect: dialect::Dialect) -> error::KilnResult<parser::ParsedStatement> {
    parser::parse_sql(sql, dialect)
}

/// Translate SQL from one dialect to another, keeping placeholders in the
/// target dialect's default style. No validation, no caching.
///
/// ```
/// use sqlkiln::dialect::Dialect;
///
/// let sql = sqlkiln::transpile("SELECT a FROM t WHERE b = ?", Dialect::MySQL, Dialect::Postgres).unwrap();
/// assert_eq!(sql, "SELECT a FROM t WHERE b = $1");
/// ```
pub fn transpile(sql: &str, from: dialect::Dialect, to: dialect::Dialect) -> error::KilnResult<String> {
    let parsed = parser::parse_sql(sql, from)?;
    Ok(transpiler::compile(&parsed.statement, to, to.default_parameter_style())?.sql)
}
