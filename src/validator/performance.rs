//! Query shapes that tend to be slow.

use std::collections::HashMap;

use super::{FindingKind, ValidationContext, ValidationFinding, Validator};
use crate::ast::visit::{self, Visitor};
use crate::ast::{
    BinaryOperator, Expr, FunctionArgs, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
};

/// Functions that collapse a whole result into one row.
const AGGREGATES: &[&str] = &[
    "count", "sum", "avg", "min", "max", "bool_and", "bool_or", "every", "string_agg", "array_agg",
    "group_concat", "listagg", "stddev", "variance",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceValidator;

impl PerformanceValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for PerformanceValidator {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn kind(&self) -> FindingKind {
        FindingKind::Performance
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationFinding> {
        let mut walker = SelectWalker {
            in_dml: !matches!(ctx.statement, Statement::Query(_)),
            in_exists: false,
            findings: Vec::new(),
        };
        walker.visit_statement(ctx.statement);

        let mut findings = walker.findings;
        if let Statement::Query(query) = ctx.statement {
            if !query.is_bounded() && reads_rows(&query.body) && !aggregate_only(&query.body) {
                findings.push(
                    finding("unbounded_select", "query returns every matching row (no LIMIT)")
                        .at("query", "missing LIMIT"),
                );
            }
        }
        findings
    }
}

fn finding(code: &str, message: impl Into<String>) -> ValidationFinding {
    ValidationFinding::new(FindingKind::Performance, code, message)
}

struct SelectWalker {
    /// Inside an INSERT/UPDATE/DELETE.
    in_dml: bool,
    /// Inside `EXISTS (...)`, where `SELECT *` is idiomatic.
    in_exists: bool,
    findings: Vec<ValidationFinding>,
}

impl Visitor for SelectWalker {
    fn visit_select(&mut self, select: &Select) {
        if !self.in_exists
            && select
                .projection
                .iter()
                .any(|item| matches!(item, SelectItem::Wildcard | SelectItem::QualifiedWildcard(_)))
        {
            self.findings.push(
                finding("select_star", "SELECT * fetches every column")
                    .at("SELECT", "*"),
            );
        }

        if let Some(names) = disconnected_tables(select) {
            self.findings.push(
                finding(
                    "cartesian_product",
                    format!("tables {} are not joined by any predicate", names.join(", ")),
                )
                .at("FROM", names.join(", ")),
            );
        }

        if self.in_dml && !select.from.is_empty() && select.selection.is_none() {
            self.findings.push(
                finding(
                    "unfiltered_subselect",
                    "SELECT without WHERE feeds a data-modifying statement",
                )
                .at("FROM", from_snippet(&select.from)),
            );
        }

        visit::walk_select(self, select);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Exists { subquery, .. } = expr {
            let outer = std::mem::replace(&mut self.in_exists, true);
            self.visit_query(subquery);
            self.in_exists = outer;
            return;
        }
        visit::walk_expr(self, expr);
    }
}

/// Names of comma-listed FROM items that no WHERE equality connects, when
/// there are any.
fn disconnected_tables(select: &Select) -> Option<Vec<String>> {
    if select.from.len() < 2 {
        return None;
    }

    // every reference name in a FROM item maps to that item
    let mut owner: HashMap<String, usize> = HashMap::new();
    for (index, table) in select.from.iter().enumerate() {
        for factor in std::iter::once(&table.relation).chain(table.joins.iter().map(|j| &j.relation)) {
            if let Some(name) = factor.reference_name() {
                owner.insert(name.to_lowercase(), index);
            }
        }
    }

    let mut groups: Vec<usize> = (0..select.from.len()).collect();
    if let Some(selection) = &select.selection {
        let mut links = Vec::new();
        join_links(selection, &mut links);
        for (left, right) in links {
            if let (Some(&a), Some(&b)) = (owner.get(&left), owner.get(&right)) {
                union(&mut groups, a, b);
            }
        }
    }

    let root = find(&mut groups, 0);
    let connected = (1..select.from.len()).all(|i| find(&mut groups, i) == root);
    if connected {
        return None;
    }
    Some(
        select
            .from
            .iter()
            .filter_map(|t| t.relation.reference_name().map(str::to_string))
            .collect(),
    )
}

/// Qualifier pairs of `a.x = b.y` comparisons reachable through ANDs.
fn join_links(expr: &Expr, out: &mut Vec<(String, String)>) {
    match expr.unnested() {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            join_links(left, out);
            join_links(right, out);
        }
        Expr::BinaryOp { left, op, right } if op.is_comparison() => {
            if let (Some(a), Some(b)) = (qualifier(left), qualifier(right)) {
                if a != b {
                    out.push((a, b));
                }
            }
        }
        _ => {}
    }
}

fn qualifier(expr: &Expr) -> Option<String> {
    match expr.unnested() {
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            parts.get(parts.len() - 2).map(|p| p.value.to_lowercase())
        }
        _ => None,
    }
}

fn find(groups: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while groups[root] != root {
        root = groups[root];
    }
    groups[i] = root;
    root
}

fn union(groups: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(groups, a), find(groups, b));
    groups[ra] = rb;
}

fn from_snippet(from: &[TableWithJoins]) -> String {
    from.iter()
        .filter_map(|t| match &t.relation {
            TableFactor::Table { name, .. } => Some(name.normalized()),
            TableFactor::Derived { alias, .. } => alias.as_ref().map(|a| a.value.clone()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether any branch of the body reads a table.
fn reads_rows(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => !select.from.is_empty(),
        SetExpr::Query(query) => !query.is_bounded() && reads_rows(&query.body),
        SetExpr::SetOperation { left, right, .. } => reads_rows(left) || reads_rows(right),
        SetExpr::Values(_) => false,
    }
}

/// A plain select whose projection is all aggregates and has no GROUP BY
/// returns exactly one row.
fn aggregate_only(body: &SetExpr) -> bool {
    let SetExpr::Select(select) = body else {
        return false;
    };
    select.group_by.is_empty()
        && !select.projection.is_empty()
        && select.projection.iter().all(|item| match item {
            SelectItem::Expr {
                expr: Expr::Function(function),
                ..
            } => {
                function.over.is_none()
                    && (matches!(function.args, FunctionArgs::Star)
                        || AGGREGATES.contains(&function.name.base_name().as_str()))
            }
            _ => false,
        })
}
