use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

pub struct DuckDbGenerator;

impl Default for DuckDbGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDbGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for DuckDbGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDB
    }

    fn fuzzy_operator(&self) -> Option<&str> {
        Some("ILIKE")
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_on_conflict(&self) -> bool {
        true
    }

    fn supports_json_arrows(&self) -> bool {
        true
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn supports_array_literal(&self) -> bool {
        true
    }
}
