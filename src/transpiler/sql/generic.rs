use crate::ast::LockStrength;
use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

/// ANSI-leaning output, also used for `Display`.
pub struct GenericGenerator;

impl Default for GenericGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for GenericGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Generic
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

    fn supports_duplicate_key(&self) -> bool {
        true
    }

    fn supports_json_arrows(&self) -> bool {
        true
    }

    fn supports_top(&self) -> bool {
        true
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn supports_array_literal(&self) -> bool {
        true
    }

    fn supports_lock_strength(&self, _strength: LockStrength) -> bool {
        true
    }
}
