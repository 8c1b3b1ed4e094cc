use crate::ast::LockStrength;
use crate::dialect::Dialect;
use crate::transpiler::traits::{SqlGenerator, quote_with};

/// MySQL and MariaDB.
pub struct MySqlGenerator {
    dialect: Dialect,
}

impl Default for MySqlGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlGenerator {
    pub fn new() -> Self {
        Self {
            dialect: Dialect::MySQL,
        }
    }

    pub fn mariadb() -> Self {
        Self {
            dialect: Dialect::MariaDB,
        }
    }
}

impl SqlGenerator for MySqlGenerator {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '`', '`')
    }

    fn string_concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn supports_full_join(&self) -> bool {
        false
    }

    fn supports_duplicate_key(&self) -> bool {
        true
    }

    fn supports_json_arrows(&self) -> bool {
        self.dialect == Dialect::MySQL
    }

    // MariaDB 10.5+ has INSERT/DELETE ... RETURNING
    fn supports_returning(&self) -> bool {
        self.dialect == Dialect::MariaDB
    }

    // MariaDB spells FOR SHARE as LOCK IN SHARE MODE
    fn supports_lock_strength(&self, strength: LockStrength) -> bool {
        match strength {
            LockStrength::Update => true,
            LockStrength::Share => self.dialect == Dialect::MySQL,
            LockStrength::NoKeyUpdate | LockStrength::KeyShare => false,
        }
    }

    /// `<=>` is the null-safe equality operator.
    fn is_distinct_from(&self, left: &str, right: &str, negated: bool) -> String {
        if negated {
            format!("{} <=> {}", left, right)
        } else {
            format!("NOT ({} <=> {})", left, right)
        }
    }
}
