//! Per-dialect SQL generators.

pub mod bigquery;
pub mod clickhouse;
pub mod duckdb;
pub mod generic;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod snowflake;
pub mod sqlite;
pub mod sqlserver;

pub use bigquery::BigQueryGenerator;
pub use clickhouse::ClickHouseGenerator;
pub use duckdb::DuckDbGenerator;
pub use generic::GenericGenerator;
pub use mysql::MySqlGenerator;
pub use oracle::OracleGenerator;
pub use postgres::PostgresGenerator;
pub use snowflake::SnowflakeGenerator;
pub use sqlite::SqliteGenerator;
pub use sqlserver::SqlServerGenerator;
