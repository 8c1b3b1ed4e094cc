//! Literal parameterization.
//!
//! Lifts string, numeric and boolean literals out of predicates, VALUES rows
//! and assignments into [`Placeholder::Literal`] nodes, so statements that
//! differ only in their literals share one compiled plan. NULL, typed
//! strings, function arguments, projections, ORDER/GROUP BY, LIMIT/OFFSET
//! and DDL are left alone. Existing placeholders are never rewritten, which
//! makes the pass idempotent.

use super::Transformer;
use crate::ast::visit::{self, VisitorMut};
use crate::ast::{Expr, Literal, Placeholder, Statement, StatementKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralParameterizer;

impl LiteralParameterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for LiteralParameterizer {
    fn name(&self) -> &'static str {
        "literal_parameterizer"
    }

    fn transform(&self, mut statement: Statement) -> Statement {
        if statement.kind() == StatementKind::Ddl {
            return statement;
        }
        let mut lifter = Lifter { lifted: 0 };
        lifter.visit_statement_mut(&mut statement);
        tracing::trace!(lifted = lifter.lifted, "parameterized literals");
        statement
    }
}

struct Lifter {
    lifted: usize,
}

impl VisitorMut for Lifter {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Literal(Literal::Null) | Expr::Placeholder(_) | Expr::TypedString { .. } => {}
            Expr::Literal(literal) => {
                if let Some(value) = literal.to_value() {
                    *expr = Expr::Placeholder(Placeholder::Literal(value));
                    self.lifted += 1;
                }
            }
            Expr::Function(_) | Expr::Extract { .. } => visit::walk_subqueries_mut(self, expr),
            _ => visit::walk_expr_mut(self, expr),
        }
    }
}
