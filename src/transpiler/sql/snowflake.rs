use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

pub struct SnowflakeGenerator;

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SnowflakeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for SnowflakeGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Snowflake
    }

    fn fuzzy_operator(&self) -> Option<&str> {
        Some("ILIKE")
    }
}
