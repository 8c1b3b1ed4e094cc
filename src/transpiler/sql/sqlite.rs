use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

pub struct SqliteGenerator;

impl Default for SqliteGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
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

    fn extract(&self, _field: &str, _source: &str) -> Option<String> {
        None
    }
}
