use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

pub struct ClickHouseGenerator;

impl Default for ClickHouseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClickHouseGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for ClickHouseGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::ClickHouse
    }

    fn fuzzy_operator(&self) -> Option<&str> {
        Some("ILIKE")
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "true".to_string() } else { "false".to_string() }
    }
}
