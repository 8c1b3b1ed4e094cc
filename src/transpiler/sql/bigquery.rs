use crate::dialect::Dialect;
use crate::transpiler::traits::{SqlGenerator, quote_with};

/// BigQuery and Cloud Spanner (GoogleSQL).
pub struct BigQueryGenerator {
    dialect: Dialect,
}

impl Default for BigQueryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl BigQueryGenerator {
    pub fn new() -> Self {
        Self {
            dialect: Dialect::BigQuery,
        }
    }

    pub fn spanner() -> Self {
        Self {
            dialect: Dialect::Spanner,
        }
    }
}

impl SqlGenerator for BigQueryGenerator {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '`', '`')
    }

    fn string_concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    // Spanner's THEN RETURN is not RETURNING
    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_array_literal(&self) -> bool {
        true
    }
}
