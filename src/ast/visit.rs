//! Tree traversal.
//!
//! [`Visitor`] walks a tree read-only; [`VisitorMut`] walks it mutably. Both
//! call back on statements, queries, selects, table factors and expressions.
//! Predicates (WHERE, HAVING, JOIN ON) get their own hook carrying the
//! clause, which defaults to visiting the expression.

use super::*;

/// The clause a predicate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Clause {
    Where,
    Having,
    JoinOn,
}

impl Clause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Clause::Where => "WHERE",
            Clause::Having => "HAVING",
            Clause::JoinOn => "JOIN ON",
        }
    }
}

pub trait Visitor {
    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt)
    }

    fn visit_query(&mut self, query: &Query) {
        walk_query(self, query)
    }

    fn visit_select(&mut self, select: &Select) {
        walk_select(self, select)
    }

    fn visit_table_factor(&mut self, factor: &TableFactor) {
        walk_table_factor(self, factor)
    }

    fn visit_predicate(&mut self, _clause: Clause, expr: &Expr) {
        self.visit_expr(expr)
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr)
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(v: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Query(query) => v.visit_query(query),
        Statement::Insert(insert) => {
            match &insert.source {
                InsertSource::Values(rows) => {
                    for expr in rows.iter().flatten() {
                        v.visit_expr(expr);
                    }
                }
                InsertSource::Query(query) => v.visit_query(query),
                InsertSource::DefaultValues => {}
            }
            match &insert.on_conflict {
                Some(OnConflict::Conflict {
                    action:
                        ConflictAction::DoUpdate {
                            assignments,
                            selection,
                        },
                    ..
                }) => {
                    for a in assignments {
                        v.visit_expr(&a.value);
                    }
                    if let Some(selection) = selection {
                        v.visit_predicate(Clause::Where, selection);
                    }
                }
                Some(OnConflict::DuplicateKeyUpdate(assignments)) => {
                    for a in assignments {
                        v.visit_expr(&a.value);
                    }
                }
                _ => {}
            }
            walk_select_items(v, &insert.returning);
        }
        Statement::Update(update) => {
            for a in &update.assignments {
                v.visit_expr(&a.value);
            }
            for table in &update.from {
                walk_table_with_joins(v, table);
            }
            if let Some(selection) = &update.selection {
                v.visit_predicate(Clause::Where, selection);
            }
            walk_select_items(v, &update.returning);
        }
        Statement::Delete(delete) => {
            for table in &delete.using {
                walk_table_with_joins(v, table);
            }
            if let Some(selection) = &delete.selection {
                v.visit_predicate(Clause::Where, selection);
            }
            walk_select_items(v, &delete.returning);
        }
        Statement::CreateTable(create) => {
            for column in &create.columns {
                walk_column_def(v, column);
            }
            for constraint in &create.constraints {
                if let ConstraintKind::Check(expr) = &constraint.kind {
                    v.visit_expr(expr);
                }
            }
            if let Some(query) = &create.query {
                v.visit_query(query);
            }
        }
        Statement::CreateIndex(index) => {
            for column in &index.columns {
                v.visit_expr(&column.expr);
            }
        }
        Statement::CreateView(view) => v.visit_query(&view.query),
        Statement::AlterTable(alter) => {
            for op in &alter.operations {
                match op {
                    AlterTableOperation::AddColumn(column) => walk_column_def(v, column),
                    AlterTableOperation::AlterColumn {
                        change: ColumnChange::SetDefault(expr),
                        ..
                    } => v.visit_expr(expr),
                    _ => {}
                }
            }
        }
        Statement::Drop(_) | Statement::Truncate(_) => {}
    }
}

fn walk_column_def<V: Visitor + ?Sized>(v: &mut V, column: &ColumnDef) {
    for option in &column.options {
        match option {
            ColumnOption::Default(expr) | ColumnOption::Check(expr) => v.visit_expr(expr),
            _ => {}
        }
    }
}

fn walk_select_items<V: Visitor + ?Sized>(v: &mut V, items: &[SelectItem]) {
    for item in items {
        if let SelectItem::Expr { expr, .. } = item {
            v.visit_expr(expr);
        }
    }
}

pub fn walk_query<V: Visitor + ?Sized>(v: &mut V, query: &Query) {
    if let Some(with) = &query.with {
        for cte in &with.ctes {
            v.visit_query(&cte.query);
        }
    }
    walk_set_expr(v, &query.body);
    for order in &query.order_by {
        v.visit_expr(&order.expr);
    }
    if let Some(limit) = &query.limit {
        v.visit_expr(limit);
    }
    if let Some(offset) = &query.offset {
        v.visit_expr(offset);
    }
}

pub fn walk_set_expr<V: Visitor + ?Sized>(v: &mut V, body: &SetExpr) {
    match body {
        SetExpr::Select(select) => v.visit_select(select),
        SetExpr::Query(query) => v.visit_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(v, left);
            walk_set_expr(v, right);
        }
        SetExpr::Values(rows) => {
            for expr in rows.iter().flatten() {
                v.visit_expr(expr);
            }
        }
    }
}

pub fn walk_select<V: Visitor + ?Sized>(v: &mut V, select: &Select) {
    if let Some(top) = &select.top {
        v.visit_expr(top);
    }
    for expr in &select.distinct_on {
        v.visit_expr(expr);
    }
    walk_select_items(v, &select.projection);
    for table in &select.from {
        walk_table_with_joins(v, table);
    }
    if let Some(selection) = &select.selection {
        v.visit_predicate(Clause::Where, selection);
    }
    for expr in &select.group_by {
        v.visit_expr(expr);
    }
    if let Some(having) = &select.having {
        v.visit_predicate(Clause::Having, having);
    }
    for window in &select.windows {
        walk_window_spec(v, &window.spec);
    }
}

pub fn walk_table_with_joins<V: Visitor + ?Sized>(v: &mut V, table: &TableWithJoins) {
    v.visit_table_factor(&table.relation);
    for join in &table.joins {
        v.visit_table_factor(&join.relation);
        if let JoinConstraint::On(expr) = &join.constraint {
            v.visit_predicate(Clause::JoinOn, expr);
        }
    }
}

pub fn walk_table_factor<V: Visitor + ?Sized>(v: &mut V, factor: &TableFactor) {
    if let TableFactor::Derived { subquery, .. } = factor {
        v.visit_query(subquery);
    }
}

fn walk_window_spec<V: Visitor + ?Sized>(v: &mut V, spec: &WindowSpec) {
    for expr in &spec.partition_by {
        v.visit_expr(expr);
    }
    for order in &spec.order_by {
        v.visit_expr(&order.expr);
    }
    if let Some(frame) = &spec.frame {
        for bound in std::iter::once(&frame.start).chain(frame.end.as_ref()) {
            if let FrameBound::Preceding(Some(expr)) | FrameBound::Following(Some(expr)) = bound {
                v.visit_expr(expr);
            }
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Identifier(_)
        | Expr::CompoundIdentifier(_)
        | Expr::Literal(_)
        | Expr::TypedString { .. }
        | Expr::Placeholder(_) => {}
        Expr::BinaryOp { left, right, .. } | Expr::IsDistinctFrom { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::IsNull { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::Extract { expr, .. } => v.visit_expr(expr),
        Expr::Tuple(items) | Expr::Array(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        Expr::InList { expr, list, .. } => {
            v.visit_expr(expr);
            for item in list {
                v.visit_expr(item);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            v.visit_expr(expr);
            v.visit_query(subquery);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            v.visit_expr(expr);
            v.visit_expr(low);
            v.visit_expr(high);
        }
        Expr::Like { expr, pattern, .. } => {
            v.visit_expr(expr);
            v.visit_expr(pattern);
        }
        Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => v.visit_query(subquery),
        Expr::Function(func) => {
            if let FunctionArgs::List(args) = &func.args {
                for arg in args {
                    v.visit_expr(arg);
                }
            }
            if let Some(filter) = &func.filter {
                v.visit_expr(filter);
            }
            if let Some(WindowType::Spec(spec)) = &func.over {
                walk_window_spec(v, spec);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
        } => {
            if let Some(operand) = operand {
                v.visit_expr(operand);
            }
            for (when, then) in conditions {
                v.visit_expr(when);
                v.visit_expr(then);
            }
            if let Some(else_result) = else_result {
                v.visit_expr(else_result);
            }
        }
    }
}

/// Mutable counterpart of [`Visitor`].
///
/// The default walk reaches every place a rewrite may touch: WHERE, HAVING
/// and JOIN ON predicates, INSERT values, assignments, derived tables, CTEs
/// and subqueries nested in projections. Projections themselves, ORDER BY,
/// GROUP BY and LIMIT/OFFSET are left alone, as is DDL apart from view and
/// `CREATE TABLE AS` queries.
pub trait VisitorMut {
    fn visit_statement_mut(&mut self, stmt: &mut Statement) {
        walk_statement_mut(self, stmt)
    }

    fn visit_query_mut(&mut self, query: &mut Query) {
        walk_query_mut(self, query)
    }

    fn visit_select_mut(&mut self, select: &mut Select) {
        walk_select_mut(self, select)
    }

    fn visit_predicate_mut(&mut self, _clause: Clause, expr: &mut Expr) {
        self.visit_expr_mut(expr)
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr)
    }
}

pub fn walk_statement_mut<V: VisitorMut + ?Sized>(v: &mut V, stmt: &mut Statement) {
    match stmt {
        Statement::Query(query) => v.visit_query_mut(query),
        Statement::Insert(insert) => {
            match &mut insert.source {
                InsertSource::Values(rows) => {
                    for expr in rows.iter_mut().flatten() {
                        v.visit_expr_mut(expr);
                    }
                }
                InsertSource::Query(query) => v.visit_query_mut(query),
                InsertSource::DefaultValues => {}
            }
            match &mut insert.on_conflict {
                Some(OnConflict::Conflict {
                    action:
                        ConflictAction::DoUpdate {
                            assignments,
                            selection,
                        },
                    ..
                }) => {
                    for a in assignments {
                        v.visit_expr_mut(&mut a.value);
                    }
                    if let Some(selection) = selection {
                        v.visit_predicate_mut(Clause::Where, selection);
                    }
                }
                Some(OnConflict::DuplicateKeyUpdate(assignments)) => {
                    for a in assignments {
                        v.visit_expr_mut(&mut a.value);
                    }
                }
                _ => {}
            }
        }
        Statement::Update(update) => {
            for a in &mut update.assignments {
                v.visit_expr_mut(&mut a.value);
            }
            for table in &mut update.from {
                walk_table_with_joins_mut(v, table);
            }
            if let Some(selection) = &mut update.selection {
                v.visit_predicate_mut(Clause::Where, selection);
            }
        }
        Statement::Delete(delete) => {
            for table in &mut delete.using {
                walk_table_with_joins_mut(v, table);
            }
            if let Some(selection) = &mut delete.selection {
                v.visit_predicate_mut(Clause::Where, selection);
            }
        }
        Statement::CreateView(view) => v.visit_query_mut(&mut view.query),
        Statement::CreateTable(create) => {
            if let Some(query) = &mut create.query {
                v.visit_query_mut(query);
            }
        }
        Statement::CreateIndex(_)
        | Statement::Drop(_)
        | Statement::AlterTable(_)
        | Statement::Truncate(_) => {}
    }
}

pub fn walk_query_mut<V: VisitorMut + ?Sized>(v: &mut V, query: &mut Query) {
    if let Some(with) = &mut query.with {
        for cte in &mut with.ctes {
            v.visit_query_mut(&mut cte.query);
        }
    }
    walk_set_expr_mut(v, &mut query.body);
}

pub fn walk_set_expr_mut<V: VisitorMut + ?Sized>(v: &mut V, body: &mut SetExpr) {
    match body {
        SetExpr::Select(select) => v.visit_select_mut(select),
        SetExpr::Query(query) => v.visit_query_mut(query),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr_mut(v, left);
            walk_set_expr_mut(v, right);
        }
        SetExpr::Values(rows) => {
            for expr in rows.iter_mut().flatten() {
                v.visit_expr_mut(expr);
            }
        }
    }
}

/// Walks the parts of a select that can hold predicates or subqueries:
/// FROM (derived tables, JOIN ON), WHERE, HAVING, and subqueries in the
/// projection.
pub fn walk_select_mut<V: VisitorMut + ?Sized>(v: &mut V, select: &mut Select) {
    for item in &mut select.projection {
        if let SelectItem::Expr { expr, .. } = item {
            walk_subqueries_mut(v, expr);
        }
    }
    for table in &mut select.from {
        walk_table_with_joins_mut(v, table);
    }
    if let Some(selection) = &mut select.selection {
        v.visit_predicate_mut(Clause::Where, selection);
    }
    if let Some(having) = &mut select.having {
        v.visit_predicate_mut(Clause::Having, having);
    }
}

pub fn walk_table_with_joins_mut<V: VisitorMut + ?Sized>(v: &mut V, table: &mut TableWithJoins) {
    if let TableFactor::Derived { subquery, .. } = &mut table.relation {
        v.visit_query_mut(subquery);
    }
    for join in &mut table.joins {
        if let TableFactor::Derived { subquery, .. } = &mut join.relation {
            v.visit_query_mut(subquery);
        }
        if let JoinConstraint::On(expr) = &mut join.constraint {
            v.visit_predicate_mut(Clause::JoinOn, expr);
        }
    }
}

/// Visit only the subqueries nested in an expression.
pub fn walk_subqueries_mut<V: VisitorMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => v.visit_query_mut(query),
        Expr::InSubquery { expr, subquery, .. } => {
            walk_subqueries_mut(v, expr);
            v.visit_query_mut(subquery);
        }
        other => {
            for_each_child_mut(other, &mut |child: &mut Expr| walk_subqueries_mut(v, child));
        }
    }
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match expr {
        Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => v.visit_query_mut(query),
        Expr::InSubquery { expr, subquery, .. } => {
            v.visit_expr_mut(expr);
            v.visit_query_mut(subquery);
        }
        other => for_each_child_mut(other, &mut |child: &mut Expr| v.visit_expr_mut(child)),
    }
}

/// Apply `f` to each direct child expression (not into subqueries).
fn for_each_child_mut(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    match expr {
        Expr::Identifier(_)
        | Expr::CompoundIdentifier(_)
        | Expr::Literal(_)
        | Expr::TypedString { .. }
        | Expr::Placeholder(_)
        | Expr::Subquery(_)
        | Expr::Exists { .. } => {}
        Expr::InSubquery { expr, .. } => f(expr),
        Expr::BinaryOp { left, right, .. } | Expr::IsDistinctFrom { left, right, .. } => {
            f(left);
            f(right);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::IsNull { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::Extract { expr, .. } => f(expr),
        Expr::Tuple(items) | Expr::Array(items) => items.iter_mut().for_each(f),
        Expr::InList { expr, list, .. } => {
            f(expr);
            list.iter_mut().for_each(f);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            f(expr);
            f(low);
            f(high);
        }
        Expr::Like { expr, pattern, .. } => {
            f(expr);
            f(pattern);
        }
        Expr::Function(func) => {
            if let FunctionArgs::List(args) = &mut func.args {
                args.iter_mut().for_each(&mut *f);
            }
            if let Some(filter) = &mut func.filter {
                f(filter);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
        } => {
            if let Some(operand) = operand {
                f(operand);
            }
            for (when, then) in conditions {
                f(when);
                f(then);
            }
            if let Some(else_result) = else_result {
                f(else_result);
            }
        }
    }
}
