//! Cache statistics.

use serde::Serialize;

/// Counters for one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

impl TierStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Counters for every tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub sql: TierStats,
    pub ast: TierStats,
    pub builder: TierStats,
    pub file: TierStats,
}

impl CacheStats {
    pub fn tiers(&self) -> [(&'static str, TierStats); 4] {
        [
            ("sql", self.sql),
            ("ast", self.ast),
            ("builder", self.builder),
            ("file", self.file),
        ]
    }

    /// Sum over all tiers.
    pub fn total(&self) -> TierStats {
        self.tiers()
            .iter()
            .fold(TierStats::default(), |acc, (_, t)| TierStats {
                hits: acc.hits + t.hits,
                misses: acc.misses + t.misses,
                entries: acc.entries + t.entries,
                evictions: acc.evictions + t.evictions,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = TierStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 75.0);
        assert_eq!(TierStats::default().hit_rate(), 0.0);
    }
}
