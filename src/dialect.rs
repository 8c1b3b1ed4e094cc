//! SQL dialects.
//!
//! A dialect is always supplied by the caller; nothing here infers one from
//! SQL content. Each dialect carries its lexical rules (quoting, comments,
//! string escapes), the parameter styles its drivers understand, and a
//! [`SqlGenerator`] used when rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KilnError;
use crate::params::ParameterStyle;
use crate::transpiler::SqlGenerator;
use crate::transpiler::sql::*;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySQL,
    MariaDB,
    SQLite,
    DuckDB,
    Oracle,
    SqlServer,
    Snowflake,
    BigQuery,
    Redshift,
    CockroachDB,
    Spanner,
    ClickHouse,
    Generic,
}

impl Dialect {
    /// Every dialect, in declaration order.
    pub const ALL: [Dialect; 14] = [
        Dialect::Postgres,
        Dialect::MySQL,
        Dialect::MariaDB,
        Dialect::SQLite,
        Dialect::DuckDB,
        Dialect::Oracle,
        Dialect::SqlServer,
        Dialect::Snowflake,
        Dialect::BigQuery,
        Dialect::Redshift,
        Dialect::CockroachDB,
        Dialect::Spanner,
        Dialect::ClickHouse,
        Dialect::Generic,
    ];

    /// Canonical lowercase name, as accepted in config files.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySQL => "mysql",
            Dialect::MariaDB => "mariadb",
            Dialect::SQLite => "sqlite",
            Dialect::DuckDB => "duckdb",
            Dialect::Oracle => "oracle",
            Dialect::SqlServer => "sqlserver",
            Dialect::Snowflake => "snowflake",
            Dialect::BigQuery => "bigquery",
            Dialect::Redshift => "redshift",
            Dialect::CockroachDB => "cockroachdb",
            Dialect::Spanner => "spanner",
            Dialect::ClickHouse => "clickhouse",
            Dialect::Generic => "generic",
        }
    }

    /// The SQL generator for this dialect.
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::Postgres => Box::new(PostgresGenerator::new()),
            Dialect::Redshift => Box::new(PostgresGenerator::redshift()),
            Dialect::CockroachDB => Box::new(PostgresGenerator::cockroach()),
            Dialect::MySQL => Box::new(MySqlGenerator::new()),
            Dialect::MariaDB => Box::new(MySqlGenerator::mariadb()),
            Dialect::SQLite => Box::new(SqliteGenerator::new()),
            Dialect::DuckDB => Box::new(DuckDbGenerator::new()),
            Dialect::Oracle => Box::new(OracleGenerator::new()),
            Dialect::SqlServer => Box::new(SqlServerGenerator::new()),
            Dialect::Snowflake => Box::new(SnowflakeGenerator::new()),
            Dialect::BigQuery => Box::new(BigQueryGenerator::new()),
            Dialect::Spanner => Box::new(BigQueryGenerator::spanner()),
            Dialect::ClickHouse => Box::new(ClickHouseGenerator::new()),
            Dialect::Generic => Box::new(GenericGenerator::new()),
        }
    }

    /// Identifier quote pairs recognized by the tokenizer, canonical pair first.
    pub fn identifier_quotes(&self) -> &'static [(char, char)] {
        match self {
            Dialect::MySQL | Dialect::MariaDB | Dialect::BigQuery | Dialect::Spanner => {
                &[('`', '`')]
            }
            Dialect::SQLite => &[('"', '"'), ('`', '`'), ('[', ']')],
            Dialect::SqlServer => &[('[', ']'), ('"', '"')],
            Dialect::ClickHouse => &[('"', '"'), ('`', '`')],
            Dialect::Generic => &[('"', '"'), ('`', '`'), ('[', ']')],
            _ => &[('"', '"')],
        }
    }

    /// Whether `"..."` is a string literal rather than a quoted identifier.
    pub fn double_quoted_strings(&self) -> bool {
        matches!(self, Dialect::MySQL | Dialect::MariaDB | Dialect::BigQuery | Dialect::Spanner)
    }

    /// Whether backslash escapes are honoured inside string literals.
    pub fn backslash_escapes(&self) -> bool {
        matches!(
            self,
            Dialect::MySQL | Dialect::MariaDB | Dialect::BigQuery | Dialect::Spanner | Dialect::ClickHouse
        )
    }

    /// Whether `#` starts a line comment.
    pub fn hash_comments(&self) -> bool {
        matches!(self, Dialect::MySQL | Dialect::MariaDB | Dialect::BigQuery)
    }

    /// Whether `$tag$ ... $tag$` strings are recognized.
    pub fn dollar_quoted_strings(&self) -> bool {
        matches!(
            self,
            Dialect::Postgres
                | Dialect::Redshift
                | Dialect::CockroachDB
                | Dialect::DuckDB
                | Dialect::Snowflake
                | Dialect::Generic
        )
    }

    /// Whether `expr::type` cast shorthand is valid.
    pub fn supports_double_colon_cast(&self) -> bool {
        matches!(
            self,
            Dialect::Postgres
                | Dialect::Redshift
                | Dialect::CockroachDB
                | Dialect::DuckDB
                | Dialect::Snowflake
                | Dialect::Generic
        )
    }

    /// Placeholder style the dialect's drivers expect by default.
    pub fn default_parameter_style(&self) -> ParameterStyle {
        match self {
            Dialect::Postgres | Dialect::Redshift | Dialect::CockroachDB => ParameterStyle::Numeric,
            Dialect::Oracle => ParameterStyle::NamedColon,
            Dialect::SqlServer | Dialect::BigQuery | Dialect::Spanner => ParameterStyle::NamedAt,
            Dialect::ClickHouse => ParameterStyle::Pyformat,
            Dialect::MySQL
            | Dialect::MariaDB
            | Dialect::SQLite
            | Dialect::DuckDB
            | Dialect::Snowflake
            | Dialect::Generic => ParameterStyle::Qmark,
        }
    }

    /// Placeholder styles recognized in input SQL unless configured otherwise.
    pub fn recognized_parameter_styles(&self) -> &'static [ParameterStyle] {
        use ParameterStyle::*;
        match self {
            Dialect::Postgres => &[Numeric, Qmark, NamedColon],
            Dialect::Redshift => &[Numeric, Format, Pyformat],
            Dialect::CockroachDB => &[Numeric, Qmark],
            Dialect::MySQL | Dialect::MariaDB => &[Qmark, Format, Pyformat],
            Dialect::SQLite => &[Qmark, NamedColon, NamedAt, NamedDollar],
            Dialect::DuckDB => &[Qmark, Numeric, NamedDollar],
            Dialect::Oracle => &[NamedColon, PositionalColon],
            Dialect::SqlServer => &[NamedAt, Qmark],
            Dialect::Snowflake => &[Qmark, PositionalColon, NamedColon, Format, Pyformat],
            Dialect::BigQuery => &[NamedAt, Qmark],
            Dialect::Spanner => &[NamedAt],
            Dialect::ClickHouse => &[Pyformat, Format],
            Dialect::Generic => &[
                Qmark,
                Numeric,
                NamedColon,
                PositionalColon,
                NamedAt,
                NamedDollar,
                Format,
                Pyformat,
            ],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dialect = match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Dialect::Postgres,
            "mysql" => Dialect::MySQL,
            "mariadb" => Dialect::MariaDB,
            "sqlite" | "sqlite3" => Dialect::SQLite,
            "duckdb" => Dialect::DuckDB,
            "oracle" => Dialect::Oracle,
            "sqlserver" | "mssql" | "tsql" => Dialect::SqlServer,
            "snowflake" => Dialect::Snowflake,
            "bigquery" => Dialect::BigQuery,
            "redshift" => Dialect::Redshift,
            "cockroachdb" | "cockroach" => Dialect::CockroachDB,
            "spanner" => Dialect::Spanner,
            "clickhouse" => Dialect::ClickHouse,
            "generic" | "ansi" => Dialect::Generic,
            other => return Err(KilnError::config(format!("unknown dialect '{}'", other))),
        };
        Ok(dialect)
    }
}
