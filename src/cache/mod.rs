//! Statement cache.
//!
//! | Tier | Key | Value |
//! |------|-----|-------|
//! | `sql` | SQL text, dialect, pipeline flags, target style | [`CachedPlan`] |
//! | `ast` | SQL text, dialect, pipeline flags | [`CachedAst`] |
//! | `builder` | serialized tree, dialect, flags, target style | [`CachedPlan`] |
//! | `file` | query name, content checksum, dialect, flags, target style | [`CachedPlan`] |
//!
//! Entries never expire. They leave a tier through LRU eviction once the tier
//! holds more than [`CacheConfig::max_entries`], through [`CacheService::clear`],
//! or, for files, when a query name is seen with a new checksum.

mod fingerprint;
mod stats;
mod tier;

pub use fingerprint::{Fingerprint, KeyMaterial};
pub use stats::{CacheStats, TierStats};
pub use tier::CacheTier;

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ast::Statement;
use crate::error::KilnResult;
use crate::params::InputShape;
use crate::transpiler::CompiledPlan;
use crate::validator::ValidationFinding;

/// Cache sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries per tier.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

/// A compiled statement and the advisory findings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPlan {
    pub plan: CompiledPlan,
    pub findings: Vec<ValidationFinding>,
}

/// A validated, transformed tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAst {
    pub statement: Statement,
    pub findings: Vec<ValidationFinding>,
    /// Arguments the original SQL text expects.
    pub shape: InputShape,
}

struct FileRecord {
    checksum: String,
    fingerprints: Vec<Fingerprint>,
}

/// Shared by every pipeline that should reuse compiled statements.
pub struct CacheService {
    config: CacheConfig,
    sql: CacheTier<CachedPlan>,
    ast: CacheTier<CachedAst>,
    builder: CacheTier<CachedPlan>,
    file: CacheTier<CachedPlan>,
    file_index: DashMap<String, FileRecord>,
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheService {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            sql: CacheTier::new("sql", config.max_entries),
            ast: CacheTier::new("ast", config.max_entries),
            builder: CacheTier::new("builder", config.max_entries),
            file: CacheTier::new("file", config.max_entries),
            file_index: DashMap::new(),
        }
    }

    pub fn shared(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn sql(&self) -> &CacheTier<CachedPlan> {
        &self.sql
    }

    pub fn ast(&self) -> &CacheTier<CachedAst> {
        &self.ast
    }

    pub fn builder(&self) -> &CacheTier<CachedPlan> {
        &self.builder
    }

    pub fn file(&self) -> &CacheTier<CachedPlan> {
        &self.file
    }

    /// Compute-or-wait in the file tier, first dropping entries built from
    /// an older checksum of the same query name.
    pub fn file_plan<F>(
        &self,
        name: &str,
        checksum: &str,
        material: &KeyMaterial,
        compute: F,
    ) -> KilnResult<Arc<CachedPlan>>
    where
        F: FnOnce() -> KilnResult<CachedPlan>,
    {
        self.invalidate_stale_file(name, checksum);
        let plan = self.file.get_or_compute(material, compute)?;

        let fingerprint = material.fingerprint();
        let mut record = self.file_index.entry(name.to_string()).or_insert_with(|| FileRecord {
            checksum: checksum.to_string(),
            fingerprints: Vec::new(),
        });
        if record.checksum == checksum && !record.fingerprints.contains(&fingerprint) {
            record.fingerprints.push(fingerprint);
        }
        Ok(plan)
    }

    /// Remove entries for `name` whose checksum differs from `checksum`.
    /// Returns how many entries were dropped.
    pub fn invalidate_stale_file(&self, name: &str, checksum: &str) -> usize {
        let Some((_, record)) = self.file_index.remove_if(name, |_, record| record.checksum != checksum) else {
            return 0;
        };
        let removed = record
            .fingerprints
            .iter()
            .filter(|fp| self.file.remove_fingerprint(fp))
            .count();
        tracing::warn!(
            query = name,
            old = %record.checksum,
            new = checksum,
            removed,
            "query file changed, invalidated cached plans"
        );
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            sql: self.sql.stats(),
            ast: self.ast.stats(),
            builder: self.builder.stats(),
            file: self.file.stats(),
        }
    }

    pub fn reset_stats(&self) {
        self.sql.reset_stats();
        self.ast.reset_stats();
        self.builder.reset_stats();
        self.file.reset_stats();
    }

    /// Drop every entry in every tier.
    pub fn clear(&self) {
        self.sql.clear();
        self.ast.clear();
        self.builder.clear();
        self.file.clear();
        self.file_index.clear();
        tracing::debug!("statement cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::dialect::Dialect;
    use crate::params::ParameterStyle;

    fn plan(sql: &str) -> CachedPlan {
        CachedPlan {
            plan: CompiledPlan {
                sql: sql.to_string(),
                dialect: Dialect::Postgres,
                style: ParameterStyle::Numeric,
                slots: Vec::new(),
                shape: InputShape::Empty,
            },
            findings: Vec::new(),
        }
    }

    fn file_key(name: &str, checksum: &str) -> KeyMaterial {
        KeyMaterial::new("file").field("name", name).field("checksum", checksum)
    }

    #[test]
    fn test_changed_file_invalidates_old_plans() {
        let cache = CacheService::default();
        let old = file_key("get_user", "aaa");
        cache.file_plan("get_user", "aaa", &old, || Ok(plan("SELECT 1"))).unwrap();
        assert!(cache.file().contains(&old));

        let new = file_key("get_user", "bbb");
        let fresh = cache.file_plan("get_user", "bbb", &new, || Ok(plan("SELECT 2"))).unwrap();
        assert_eq!(fresh.plan.sql, "SELECT 2");
        assert!(!cache.file().contains(&old));
        assert_eq!(cache.file().len(), 1);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = CacheService::new(CacheConfig { max_entries: 5 });
        let key = KeyMaterial::new("sql").field("sql", "SELECT 1");
        cache.sql().get_or_compute(&key, || Ok(plan("SELECT 1"))).unwrap();
        cache.sql().get_or_compute(&key, || Ok(plan("SELECT 1"))).unwrap();

        let stats = cache.stats();
        assert_eq!((stats.sql.hits, stats.sql.misses, stats.sql.entries), (1, 1, 1));
        assert_eq!(stats.total().entries, 1);

        cache.clear();
        assert_eq!(cache.stats().sql.entries, 0);
        cache.reset_stats();
        assert_eq!(cache.stats().total(), TierStats::default());
    }
}
