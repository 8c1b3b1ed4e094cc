use crate::ast::LockStrength;
use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

pub struct OracleGenerator;

impl Default for OracleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for OracleGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn offset_before_limit(&self) -> bool {
        true
    }

    /// Oracle 12c row limiting.
    fn limit_offset(&self, limit: Option<&str>, offset: Option<&str>) -> String {
        let mut sql = String::new();
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {} ROWS", n));
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", n));
        }
        sql
    }

    fn supports_lock_strength(&self, strength: LockStrength) -> bool {
        strength == LockStrength::Update
    }
}
