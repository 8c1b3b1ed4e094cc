//! Expression tree.
//!
//! Produced by the parser or built directly by query builders; consumed by
//! validators, transformers and the transpiler. Every node is serializable so
//! builder-produced trees can be fingerprinted for the builder cache tier.

pub mod builders;
mod ddl;
mod dml;
mod expr;
mod query;
pub mod visit;

pub use ddl::*;
pub use dml::*;
pub use expr::*;
pub use query::*;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::ParamRef;

/// An identifier, remembering whether it was quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ident {
    pub value: String,
    pub quote_style: Option<char>,
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quote_style: None,
        }
    }

    pub fn quoted(value: impl Into<String>, quote: char) -> Self {
        Self {
            value: value.into(),
            quote_style: Some(quote),
        }
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Ident::new(value)
    }
}

/// Possibly qualified object name: `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectName(pub Vec<Ident>);

impl ObjectName {
    /// Split a dotted name into unquoted parts.
    pub fn new(dotted: &str) -> Self {
        ObjectName(dotted.split('.').map(Ident::new).collect())
    }

    /// Last part, case-folded, for name comparisons.
    pub fn base_name(&self) -> String {
        self.0
            .last()
            .map(|i| i.value.to_lowercase())
            .unwrap_or_default()
    }

    /// All parts joined with dots, case-folded.
    pub fn normalized(&self) -> String {
        self.0
            .iter()
            .map(|i| i.value.to_lowercase())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A single SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Query(Box<Query>),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    CreateView(CreateView),
    Drop(Drop),
    AlterTable(AlterTable),
    Truncate(Truncate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Query(_) => StatementKind::Select,
            Statement::Insert(_) => StatementKind::Insert,
            Statement::Update(_) => StatementKind::Update,
            Statement::Delete(_) => StatementKind::Delete,
            Statement::CreateTable(_)
            | Statement::CreateIndex(_)
            | Statement::CreateView(_)
            | Statement::Drop(_)
            | Statement::AlterTable(_)
            | Statement::Truncate(_) => StatementKind::Ddl,
        }
    }

    /// Caller-bound placeholder references, in traversal order.
    pub fn param_refs(&self) -> Vec<ParamRef> {
        struct Collect(Vec<ParamRef>);
        impl visit::Visitor for Collect {
            fn visit_expr(&mut self, expr: &Expr) {
                if let Expr::Placeholder(Placeholder::Param(r)) = expr {
                    self.0.push(r.clone());
                }
                visit::walk_expr(self, expr);
            }
        }
        let mut collect = Collect(Vec::new());
        visit::Visitor::visit_statement(&mut collect, self);
        collect.0
    }

    /// Number of placeholder nodes of any kind.
    pub fn placeholder_count(&self) -> usize {
        struct Count(usize);
        impl visit::Visitor for Count {
            fn visit_expr(&mut self, expr: &Expr) {
                if let Expr::Placeholder(_) = expr {
                    self.0 += 1;
                }
                visit::walk_expr(self, expr);
            }
        }
        let mut count = Count(0);
        visit::Visitor::visit_statement(&mut count, self);
        count.0
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = crate::transpiler::display_statement(self).map_err(|_| fmt::Error)?;
        f.write_str(&sql)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = crate::transpiler::display_expr(self).map_err(|_| fmt::Error)?;
        f.write_str(&sql)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = crate::transpiler::display_query(self).map_err(|_| fmt::Error)?;
        f.write_str(&sql)
    }
}
