use crate::dialect::Dialect;
use crate::transpiler::traits::{SqlGenerator, quote_with};

pub struct SqlServerGenerator;

impl Default for SqlServerGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlServerGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for SqlServerGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '[', ']')
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn string_concat(&self, parts: &[String]) -> String {
        parts.join(" + ")
    }

    fn offset_before_limit(&self) -> bool {
        true
    }

    fn limit_offset(&self, limit: Option<&str>, offset: Option<&str>) -> String {
        let mut sql = format!(" OFFSET {} ROWS", offset.unwrap_or("0"));
        if let Some(n) = limit {
            sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", n));
        }
        sql
    }

    fn limit_requires_order_by(&self) -> bool {
        true
    }

    fn supports_top(&self) -> bool {
        true
    }

    fn extract(&self, field: &str, source: &str) -> Option<String> {
        Some(format!("DATEPART({}, {})", field, source))
    }
}
