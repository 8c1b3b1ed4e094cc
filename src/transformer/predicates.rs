//! Row filters injected into every read or write of a table.

use super::Transformer;
use crate::ast::builders::{and, binary, conjoin, is_null, value};
use crate::ast::visit::{self, VisitorMut};
use crate::ast::{
    BinaryOperator, Expr, Ident, JoinConstraint, Literal, ObjectName, Select, Statement, StatementKind, TableFactor,
};
use crate::params::Value;

/// Hides soft-deleted rows: adds `<column> IS NULL` wherever `table` is read,
/// updated or deleted from.
#[derive(Debug, Clone)]
pub struct SoftDeleteFilter {
    table: String,
    column: String,
}

impl SoftDeleteFilter {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_lowercase(),
            column: column.to_string(),
        }
    }
}

impl Transformer for SoftDeleteFilter {
    fn name(&self) -> &'static str {
        "soft_delete"
    }

    fn fingerprint(&self) -> String {
        format!("soft_delete({}.{})", self.table, self.column)
    }

    fn transform(&self, statement: Statement) -> Statement {
        let column = Ident::new(self.column.clone());
        inject(statement, std::slice::from_ref(&self.table), &|qualifier: Option<Ident>| {
            is_null(column_ref(qualifier, &column))
        })
    }
}

/// Restricts rows to one tenant: adds `<column> = <value>` wherever one of
/// `tables` is read, updated or deleted from.
#[derive(Debug, Clone)]
pub struct TenantFilter {
    column: String,
    value: Value,
    tables: Vec<String>,
}

impl TenantFilter {
    pub fn new<I, S>(column: &str, value: impl Into<Value>, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tables: Vec<String> = tables.into_iter().map(|t| t.as_ref().to_lowercase()).collect();
        tables.sort();
        tables.dedup();
        Self {
            column: column.to_string(),
            value: value.into(),
            tables,
        }
    }
}

impl Transformer for TenantFilter {
    fn name(&self) -> &'static str {
        "tenant"
    }

    fn fingerprint(&self) -> String {
        format!(
            "tenant({}={:?} on {})",
            self.column,
            self.value,
            self.tables.join(",")
        )
    }

    fn transform(&self, statement: Statement) -> Statement {
        let column = Ident::new(self.column.clone());
        inject(statement, &self.tables, &|qualifier: Option<Ident>| {
            binary(column_ref(qualifier, &column), BinaryOperator::Eq, value(self.value.clone()))
        })
    }
}

fn column_ref(qualifier: Option<Ident>, column: &Ident) -> Expr {
    match qualifier {
        Some(q) => Expr::CompoundIdentifier(vec![q, column.clone()]),
        None => Expr::Identifier(column.clone()),
    }
}

type MakePredicate<'a> = &'a dyn Fn(Option<Ident>) -> Expr;

fn inject(mut statement: Statement, tables: &[String], make: MakePredicate<'_>) -> Statement {
    if statement.kind() == StatementKind::Ddl {
        return statement;
    }
    let mut injector = Injector { tables, make };
    injector.visit_statement_mut(&mut statement);
    statement
}

struct Injector<'a> {
    tables: &'a [String],
    make: MakePredicate<'a>,
}

impl Injector<'_> {
    fn matches(&self, name: &ObjectName) -> bool {
        self.tables.contains(&name.base_name())
    }
}

impl VisitorMut for Injector<'_> {
    fn visit_statement_mut(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Update(update) if self.matches(&update.table) => {
                let predicate = (self.make)(update.alias.clone());
                update.selection = Some(conjoin(update.selection.take(), predicate));
            }
            Statement::Delete(delete) if self.matches(&delete.table) => {
                let predicate = (self.make)(delete.alias.clone());
                delete.selection = Some(conjoin(delete.selection.take(), predicate));
            }
            _ => {}
        }
        visit::walk_statement_mut(self, stmt);
    }

    fn visit_select_mut(&mut self, select: &mut Select) {
        // nested queries first, so injected predicates are not walked again
        visit::walk_select_mut(self, select);

        let qualify = select.from.len() > 1 || select.from.iter().any(|t| !t.joins.is_empty());
        let mut filters = Vec::new();
        for table in &mut select.from {
            if let Some(ident) = self.matching_reference(&table.relation, qualify) {
                filters.push((self.make)(ident));
            }
            for join in &mut table.joins {
                let Some(ident) = self.matching_reference(&join.relation, true) else {
                    continue;
                };
                let predicate = (self.make)(ident);
                match &mut join.constraint {
                    JoinConstraint::On(on) => {
                        let existing = std::mem::replace(on, Expr::Literal(Literal::Null));
                        *on = and(parenthesize_or(existing), predicate);
                    }
                    _ => filters.push(predicate),
                }
            }
        }
        for predicate in filters {
            select.selection = Some(conjoin(select.selection.take(), predicate));
        }
    }
}

impl Injector<'_> {
    /// `Some(qualifier)` when the factor is a matching table.
    fn matching_reference(&self, factor: &TableFactor, qualify: bool) -> Option<Option<Ident>> {
        match factor {
            TableFactor::Table { name, alias } if self.matches(name) => Some(if qualify {
                alias.clone().or_else(|| name.0.last().cloned())
            } else {
                alias.clone()
            }),
            _ => None,
        }
    }
}

fn parenthesize_or(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        } => Expr::Nested(Box::new(expr)),
        other => other,
    }
}
