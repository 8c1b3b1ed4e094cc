//! Transformers.
//!
//! A transformer is a pure `Statement -> Statement` rewrite. The pipeline
//! runs custom transformers in registration order, then the built-in
//! [`LiteralParameterizer`] when literal parameterization is enabled. Every
//! transformer reports a [`fingerprint`](Transformer::fingerprint) so cached
//! trees are keyed by the exact rewrite chain that produced them.

mod literals;
mod predicates;

pub use literals::LiteralParameterizer;
pub use predicates::{SoftDeleteFilter, TenantFilter};

use std::sync::Arc;

use crate::ast::Statement;

pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Identity plus configuration. Two transformers with equal
    /// fingerprints must rewrite identically.
    fn fingerprint(&self) -> String {
        self.name().to_string()
    }

    fn transform(&self, statement: Statement) -> Statement;
}

/// Apply transformers in order.
pub fn apply(transformers: &[Arc<dyn Transformer>], statement: Statement) -> Statement {
    transformers.iter().fold(statement, |stmt, transformer| {
        tracing::trace!(transformer = transformer.name(), "transforming");
        transformer.transform(stmt)
    })
}

/// Combined fingerprint of a transformer chain.
pub fn chain_fingerprint(transformers: &[Arc<dyn Transformer>]) -> String {
    transformers
        .iter()
        .map(|t| t.fingerprint())
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::dialect::Dialect;
    use crate::parser::parse_sql;

    #[test]
    fn test_chain_order_and_fingerprint() {
        let chain: Vec<Arc<dyn Transformer>> = vec![
            Arc::new(SoftDeleteFilter::new("users", "deleted_at")),
            Arc::new(LiteralParameterizer::new()),
        ];
        assert_eq!(
            chain_fingerprint(&chain),
            "soft_delete(users.deleted_at)|literal_parameterizer"
        );

        let stmt = parse_sql("SELECT id FROM users WHERE name = 'x'", Dialect::Postgres)
            .unwrap()
            .statement;
        assert_eq!(
            apply(&chain, stmt).to_string(),
            "SELECT id FROM users WHERE name = $1 AND deleted_at IS NULL"
        );
    }
}
