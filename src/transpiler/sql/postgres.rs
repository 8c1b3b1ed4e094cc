use crate::ast::LockStrength;
use crate::dialect::Dialect;
use crate::transpiler::traits::SqlGenerator;

/// PostgreSQL and the wire-compatible Redshift and CockroachDB.
pub struct PostgresGenerator {
    dialect: Dialect,
}

impl Default for PostgresGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresGenerator {
    pub fn new() -> Self {
        Self {
            dialect: Dialect::Postgres,
        }
    }

    pub fn redshift() -> Self {
        Self {
            dialect: Dialect::Redshift,
        }
    }

    pub fn cockroach() -> Self {
        Self {
            dialect: Dialect::CockroachDB,
        }
    }
}

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn fuzzy_operator(&self) -> Option<&str> {
        Some("ILIKE")
    }

    fn supports_returning(&self) -> bool {
        self.dialect != Dialect::Redshift
    }

    fn supports_on_conflict(&self) -> bool {
        self.dialect != Dialect::Redshift
    }

    fn supports_json_arrows(&self) -> bool {
        self.dialect != Dialect::Redshift
    }

    fn supports_distinct_on(&self) -> bool {
        self.dialect != Dialect::Redshift
    }

    fn supports_array_literal(&self) -> bool {
        self.dialect != Dialect::Redshift
    }

    fn supports_lock_strength(&self, _strength: LockStrength) -> bool {
        self.dialect != Dialect::Redshift
    }
}
