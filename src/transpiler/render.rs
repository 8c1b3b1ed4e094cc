//! Tree to SQL text.
//!
//! Everything is rendered strictly left to right so placeholder numbering
//! and slot order follow the output text.

use crate::ast::*;
use crate::error::{KilnError, KilnResult};
use crate::params::ParameterStyle;

use super::placeholders::PlaceholderWriter;
use super::traits::SqlGenerator;

const PREC_OR: u8 = 5;
const PREC_AND: u8 = 10;
const PREC_NOT: u8 = 15;
const PREC_COMPARE: u8 = 20;
const PREC_ADD: u8 = 30;
const PREC_MUL: u8 = 40;
const PREC_UNARY: u8 = 45;
const PREC_POSTFIX: u8 = 50;
const PREC_ATOM: u8 = 100;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinaryOp { op, .. } => binary_precedence(*op),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            ..
        } => PREC_NOT,
        Expr::UnaryOp { .. } => PREC_UNARY,
        Expr::IsNull { .. }
        | Expr::IsDistinctFrom { .. }
        | Expr::InList { .. }
        | Expr::InSubquery { .. }
        | Expr::Between { .. }
        | Expr::Like { .. } => PREC_COMPARE,
        Expr::Cast { shorthand: true, .. } => PREC_POSTFIX,
        _ => PREC_ATOM,
    }
}

fn binary_precedence(op: BinaryOperator) -> u8 {
    match op {
        BinaryOperator::Or => PREC_OR,
        BinaryOperator::And => PREC_AND,
        BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::StringConcat => PREC_ADD,
        BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => PREC_MUL,
        BinaryOperator::Arrow | BinaryOperator::LongArrow => PREC_POSTFIX,
        _ => PREC_COMPARE,
    }
}

pub(crate) struct Renderer<'a> {
    generator: &'a dyn SqlGenerator,
    writer: PlaceholderWriter,
    escape_percent: bool,
}

impl<'a> Renderer<'a> {
    pub fn new(generator: &'a dyn SqlGenerator, writer: PlaceholderWriter) -> Self {
        let escape_percent = matches!(writer.style(), ParameterStyle::Format | ParameterStyle::Pyformat);
        Self {
            generator,
            writer,
            escape_percent,
        }
    }

    pub fn into_writer(self) -> PlaceholderWriter {
        self.writer
    }

    fn unsupported(&self, what: &str) -> KilnError {
        KilnError::compilation(format!("{} is not supported by {}", what, self.generator.dialect()))
    }

    /// `%` is the placeholder marker in printf-style output.
    fn percent(&self, text: String) -> String {
        if self.escape_percent {
            text.replace('%', "%%")
        } else {
            text
        }
    }

    // ---- statements ----

    pub fn statement(&mut self, statement: &Statement) -> KilnResult<String> {
        match statement {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => self.insert(insert),
            Statement::Update(update) => self.update(update),
            Statement::Delete(delete) => self.delete(delete),
            Statement::CreateTable(create) => self.create_table(create),
            Statement::CreateIndex(create) => self.create_index(create),
            Statement::CreateView(create) => {
                let mut sql = String::from("CREATE ");
                if create.or_replace {
                    sql.push_str("OR REPLACE ");
                }
                sql.push_str("VIEW ");
                sql.push_str(&self.object_name(&create.name));
                if !create.columns.is_empty() {
                    sql.push_str(&format!(" ({})", self.idents(&create.columns)));
                }
                sql.push_str(" AS ");
                sql.push_str(&self.query(&create.query)?);
                Ok(sql)
            }
            Statement::Drop(drop) => {
                let mut sql = format!("DROP {} ", drop.object_type.as_str());
                if drop.if_exists {
                    sql.push_str("IF EXISTS ");
                }
                let names: Vec<String> = drop.names.iter().map(|n| self.object_name(n)).collect();
                sql.push_str(&names.join(", "));
                if drop.cascade {
                    sql.push_str(" CASCADE");
                }
                Ok(sql)
            }
            Statement::AlterTable(alter) => self.alter_table(alter),
            Statement::Truncate(truncate) => {
                let names: Vec<String> = truncate.names.iter().map(|n| self.object_name(n)).collect();
                Ok(format!("TRUNCATE TABLE {}", names.join(", ")))
            }
        }
    }

    pub fn query(&mut self, query: &Query) -> KilnResult<String> {
        let mut sql = String::new();
        if let Some(with) = &query.with {
            sql.push_str("WITH ");
            if with.recursive {
                sql.push_str("RECURSIVE ");
            }
            let mut ctes = Vec::with_capacity(with.ctes.len());
            for cte in &with.ctes {
                let mut text = self.ident(&cte.name);
                if !cte.columns.is_empty() {
                    text.push_str(&format!(" ({})", self.idents(&cte.columns)));
                }
                text.push_str(&format!(" AS ({})", self.query(&cte.query)?));
                ctes.push(text);
            }
            sql.push_str(&ctes.join(", "));
            sql.push(' ');
        }

        // TOP becomes a row limit where the dialect has no TOP
        let folded_top = match &query.body {
            SetExpr::Select(select) if !self.generator.supports_top() && query.limit.is_none() => {
                select.top.as_ref()
            }
            _ => None,
        };
        sql.push_str(&self.set_expr(&query.body, folded_top.is_none(), 0)?);

        let limit = query.limit.as_ref().or(folded_top);
        if !query.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by_list(&query.order_by)?);
        } else if (limit.is_some() || query.offset.is_some()) && self.generator.limit_requires_order_by() {
            sql.push_str(" ORDER BY (SELECT NULL)");
        }

        if limit.is_some() || query.offset.is_some() {
            let (limit, offset) = if self.generator.offset_before_limit() {
                let offset = query.offset.as_ref().map(|e| self.expr(e)).transpose()?;
                let limit = limit.map(|e| self.expr(e)).transpose()?;
                (limit, offset)
            } else {
                let limit = limit.map(|e| self.expr(e)).transpose()?;
                let offset = query.offset.as_ref().map(|e| self.expr(e)).transpose()?;
                (limit, offset)
            };
            sql.push_str(&self.generator.limit_offset(limit.as_deref(), offset.as_deref()));
        }
        for lock in &query.locks {
            sql.push_str(&self.lock_clause(lock)?);
        }
        Ok(sql)
    }

    fn lock_clause(&self, lock: &LockClause) -> KilnResult<String> {
        if !self.generator.supports_lock_strength(lock.strength) {
            return Err(self.unsupported(&format!("FOR {}", lock.strength.as_str())));
        }
        let mut sql = format!(" FOR {}", lock.strength.as_str());
        if !lock.of.is_empty() {
            let names: Vec<String> = lock.of.iter().map(|n| self.object_name(n)).collect();
            sql.push_str(" OF ");
            sql.push_str(&names.join(", "));
        }
        match lock.wait {
            Some(LockWait::Nowait) => sql.push_str(" NOWAIT"),
            Some(LockWait::SkipLocked) => sql.push_str(" SKIP LOCKED"),
            None => {}
        }
        Ok(sql)
    }

    fn set_expr(&mut self, body: &SetExpr, with_top: bool, parent_prec: u8) -> KilnResult<String> {
        match body {
            SetExpr::Select(select) => self.select(select, with_top),
            SetExpr::Query(query) => Ok(format!("({})", self.query(query)?)),
            SetExpr::Values(rows) => Ok(format!("VALUES {}", self.rows(rows)?)),
            SetExpr::SetOperation { op, all, left, right } => {
                let prec = match op {
                    SetOperator::Intersect => 20,
                    _ => 10,
                };
                let left = self.set_expr(left, true, prec - 1)?;
                let right = self.set_expr(right, true, prec)?;
                let text = format!("{} {}{} {}", left, op.as_str(), if *all { " ALL" } else { "" }, right);
                if prec <= parent_prec {
                    Ok(format!("({})", text))
                } else {
                    Ok(text)
                }
            }
        }
    }

    fn select(&mut self, select: &Select, with_top: bool) -> KilnResult<String> {
        let mut sql = String::from("SELECT ");
        if !select.distinct_on.is_empty() {
            if !self.generator.supports_distinct_on() {
                return Err(self.unsupported("DISTINCT ON"));
            }
            sql.push_str(&format!("DISTINCT ON ({}) ", self.expr_list(&select.distinct_on)?));
        } else if select.distinct {
            sql.push_str("DISTINCT ");
        }
        if let (Some(top), true) = (&select.top, with_top) {
            if !self.generator.supports_top() {
                return Err(self.unsupported("TOP in a set operation"));
            }
            match top {
                Expr::Literal(Literal::Number(n)) => sql.push_str(&format!("TOP {} ", n)),
                other => sql.push_str(&format!("TOP ({}) ", self.expr(other)?)),
            }
        }
        sql.push_str(&self.select_items(&select.projection)?);
        if !select.from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from_list(&select.from)?);
        }
        if let Some(selection) = &select.selection {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(selection)?);
        }
        if !select.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.expr_list(&select.group_by)?);
        }
        if let Some(having) = &select.having {
            sql.push_str(" HAVING ");
            sql.push_str(&self.expr(having)?);
        }
        if !select.windows.is_empty() {
            let mut windows = Vec::with_capacity(select.windows.len());
            for window in &select.windows {
                windows.push(format!("{} AS ({})", self.ident(&window.name), self.window_spec(&window.spec)?));
            }
            sql.push_str(" WINDOW ");
            sql.push_str(&windows.join(", "));
        }
        Ok(sql)
    }

    fn select_items(&mut self, items: &[SelectItem]) -> KilnResult<String> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(match item {
                SelectItem::Wildcard => "*".to_string(),
                SelectItem::QualifiedWildcard(name) => format!("{}.*", self.object_name(name)),
                SelectItem::Expr { expr, alias } => {
                    let mut text = self.expr(expr)?;
                    if let Some(alias) = alias {
                        text.push_str(" AS ");
                        text.push_str(&self.ident(alias));
                    }
                    text
                }
            });
        }
        Ok(out.join(", "))
    }

    fn from_list(&mut self, from: &[TableWithJoins]) -> KilnResult<String> {
        let mut out = Vec::with_capacity(from.len());
        for table in from {
            out.push(self.table_with_joins(table)?);
        }
        Ok(out.join(", "))
    }

    fn table_with_joins(&mut self, table: &TableWithJoins) -> KilnResult<String> {
        let mut sql = self.table_factor(&table.relation)?;
        for join in &table.joins {
            let natural = matches!(join.constraint, JoinConstraint::Natural);
            let keyword = match join.operator {
                JoinOperator::Inner => "JOIN",
                JoinOperator::Left => "LEFT JOIN",
                JoinOperator::Right => "RIGHT JOIN",
                JoinOperator::Full => {
                    if !self.generator.supports_full_join() {
                        return Err(self.unsupported("FULL JOIN"));
                    }
                    "FULL JOIN"
                }
                JoinOperator::Cross => "CROSS JOIN",
            };
            sql.push(' ');
            if natural {
                sql.push_str("NATURAL ");
            }
            sql.push_str(keyword);
            sql.push(' ');
            sql.push_str(&self.table_factor(&join.relation)?);
            match &join.constraint {
                JoinConstraint::On(expr) => {
                    sql.push_str(" ON ");
                    sql.push_str(&self.expr(expr)?);
                }
                JoinConstraint::Using(columns) => {
                    sql.push_str(&format!(" USING ({})", self.idents(columns)));
                }
                JoinConstraint::Natural | JoinConstraint::None => {}
            }
        }
        Ok(sql)
    }

    fn table_factor(&mut self, factor: &TableFactor) -> KilnResult<String> {
        let (mut sql, alias) = match factor {
            TableFactor::Table { name, alias } => (self.object_name(name), alias),
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
            } => {
                let prefix = if *lateral { "LATERAL " } else { "" };
                (format!("{}({})", prefix, self.query(subquery)?), alias)
            }
        };
        if let Some(alias) = alias {
            sql.push(' ');
            sql.push_str(&self.ident(alias));
        }
        Ok(sql)
    }

    fn insert(&mut self, insert: &Insert) -> KilnResult<String> {
        let mut sql = format!("INSERT INTO {}", self.object_name(&insert.table));
        if !insert.columns.is_empty() {
            sql.push_str(&format!(" ({})", self.idents(&insert.columns)));
        }
        match &insert.source {
            InsertSource::Values(rows) => {
                sql.push_str(" VALUES ");
                sql.push_str(&self.rows(rows)?);
            }
            InsertSource::Query(query) => {
                sql.push(' ');
                sql.push_str(&self.query(query)?);
            }
            InsertSource::DefaultValues => sql.push_str(" DEFAULT VALUES"),
        }
        match &insert.on_conflict {
            None => {}
            Some(OnConflict::Conflict { target, action }) => {
                if !self.generator.supports_on_conflict() {
                    return Err(self.unsupported("ON CONFLICT"));
                }
                sql.push_str(" ON CONFLICT");
                if !target.is_empty() {
                    sql.push_str(&format!(" ({})", self.idents(target)));
                }
                match action {
                    ConflictAction::DoNothing => sql.push_str(" DO NOTHING"),
                    ConflictAction::DoUpdate {
                        assignments,
                        selection,
                    } => {
                        sql.push_str(" DO UPDATE SET ");
                        sql.push_str(&self.assignments(assignments)?);
                        if let Some(selection) = selection {
                            sql.push_str(" WHERE ");
                            sql.push_str(&self.expr(selection)?);
                        }
                    }
                }
            }
            Some(OnConflict::DuplicateKeyUpdate(assignments)) => {
                if !self.generator.supports_duplicate_key() {
                    return Err(self.unsupported("ON DUPLICATE KEY UPDATE"));
                }
                sql.push_str(" ON DUPLICATE KEY UPDATE ");
                sql.push_str(&self.assignments(assignments)?);
            }
        }
        sql.push_str(&self.returning(&insert.returning)?);
        Ok(sql)
    }

    fn update(&mut self, update: &Update) -> KilnResult<String> {
        let mut sql = format!("UPDATE {}", self.object_name(&update.table));
        if let Some(alias) = &update.alias {
            sql.push(' ');
            sql.push_str(&self.ident(alias));
        }
        sql.push_str(" SET ");
        sql.push_str(&self.assignments(&update.assignments)?);
        if !update.from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from_list(&update.from)?);
        }
        if let Some(selection) = &update.selection {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(selection)?);
        }
        sql.push_str(&self.returning(&update.returning)?);
        Ok(sql)
    }

    fn delete(&mut self, delete: &Delete) -> KilnResult<String> {
        let mut sql = format!("DELETE FROM {}", self.object_name(&delete.table));
        if let Some(alias) = &delete.alias {
            sql.push(' ');
            sql.push_str(&self.ident(alias));
        }
        if !delete.using.is_empty() {
            sql.push_str(" USING ");
            sql.push_str(&self.from_list(&delete.using)?);
        }
        if let Some(selection) = &delete.selection {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(selection)?);
        }
        sql.push_str(&self.returning(&delete.returning)?);
        Ok(sql)
    }

    fn returning(&mut self, items: &[SelectItem]) -> KilnResult<String> {
        if items.is_empty() {
            return Ok(String::new());
        }
        if !self.generator.supports_returning() {
            return Err(self.unsupported("RETURNING"));
        }
        Ok(format!(" RETURNING {}", self.select_items(items)?))
    }

    fn assignments(&mut self, assignments: &[Assignment]) -> KilnResult<String> {
        let mut out = Vec::with_capacity(assignments.len());
        for a in assignments {
            out.push(format!("{} = {}", self.ident(&a.column), self.expr(&a.value)?));
        }
        Ok(out.join(", "))
    }

    fn rows(&mut self, rows: &[Vec<Expr>]) -> KilnResult<String> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(format!("({})", self.expr_list(row)?));
        }
        Ok(out.join(", "))
    }

    // ---- DDL ----

    fn create_table(&mut self, create: &CreateTable) -> KilnResult<String> {
        let mut sql = String::from("CREATE ");
        if create.temporary {
            sql.push_str("TEMPORARY ");
        }
        sql.push_str("TABLE ");
        if create.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.object_name(&create.name));
        if let Some(query) = &create.query {
            sql.push_str(" AS ");
            sql.push_str(&self.query(query)?);
            return Ok(sql);
        }
        let mut defs = Vec::new();
        for column in &create.columns {
            defs.push(self.column_def(column)?);
        }
        for constraint in &create.constraints {
            defs.push(self.table_constraint(constraint)?);
        }
        sql.push_str(&format!(" ({})", defs.join(", ")));
        Ok(sql)
    }

    fn column_def(&mut self, column: &ColumnDef) -> KilnResult<String> {
        let mut sql = format!("{} {}", self.ident(&column.name), column.data_type.0);
        for option in &column.options {
            sql.push(' ');
            match option {
                ColumnOption::Null => sql.push_str("NULL"),
                ColumnOption::NotNull => sql.push_str("NOT NULL"),
                ColumnOption::PrimaryKey => sql.push_str("PRIMARY KEY"),
                ColumnOption::Unique => sql.push_str("UNIQUE"),
                ColumnOption::Default(expr) => {
                    sql.push_str("DEFAULT ");
                    sql.push_str(&self.expr(expr)?);
                }
                ColumnOption::References {
                    table,
                    columns,
                    on_delete,
                } => {
                    sql.push_str("REFERENCES ");
                    sql.push_str(&self.object_name(table));
                    if !columns.is_empty() {
                        sql.push_str(&format!(" ({})", self.idents(columns)));
                    }
                    if let Some(action) = on_delete {
                        sql.push_str(" ON DELETE ");
                        sql.push_str(action.as_str());
                    }
                }
                ColumnOption::Check(expr) => sql.push_str(&format!("CHECK ({})", self.expr(expr)?)),
                ColumnOption::AutoIncrement(keyword) => sql.push_str(keyword),
            }
        }
        Ok(sql)
    }

    fn table_constraint(&mut self, constraint: &TableConstraint) -> KilnResult<String> {
        let mut sql = String::new();
        if let Some(name) = &constraint.name {
            sql.push_str(&format!("CONSTRAINT {} ", self.ident(name)));
        }
        match &constraint.kind {
            ConstraintKind::PrimaryKey(columns) => sql.push_str(&format!("PRIMARY KEY ({})", self.idents(columns))),
            ConstraintKind::Unique(columns) => sql.push_str(&format!("UNIQUE ({})", self.idents(columns))),
            ConstraintKind::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                on_delete,
            } => {
                sql.push_str(&format!(
                    "FOREIGN KEY ({}) REFERENCES {}",
                    self.idents(columns),
                    self.object_name(foreign_table)
                ));
                if !referred_columns.is_empty() {
                    sql.push_str(&format!(" ({})", self.idents(referred_columns)));
                }
                if let Some(action) = on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_str());
                }
            }
            ConstraintKind::Check(expr) => sql.push_str(&format!("CHECK ({})", self.expr(expr)?)),
        }
        Ok(sql)
    }

    fn create_index(&mut self, create: &CreateIndex) -> KilnResult<String> {
        let mut sql = String::from("CREATE ");
        if create.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if create.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        if let Some(name) = &create.name {
            sql.push_str(&self.ident(name));
            sql.push(' ');
        }
        sql.push_str(&format!(
            "ON {} ({})",
            self.object_name(&create.table),
            self.order_by_list(&create.columns)?
        ));
        Ok(sql)
    }

    fn alter_table(&mut self, alter: &AlterTable) -> KilnResult<String> {
        let mut operations = Vec::with_capacity(alter.operations.len());
        for operation in &alter.operations {
            operations.push(match operation {
                AlterTableOperation::AddColumn(column) => format!("ADD COLUMN {}", self.column_def(column)?),
                AlterTableOperation::DropColumn { name, if_exists } => format!(
                    "DROP COLUMN {}{}",
                    if *if_exists { "IF EXISTS " } else { "" },
                    self.ident(name)
                ),
                AlterTableOperation::RenameColumn { old, new } => {
                    format!("RENAME COLUMN {} TO {}", self.ident(old), self.ident(new))
                }
                AlterTableOperation::RenameTable(name) => format!("RENAME TO {}", self.object_name(name)),
                AlterTableOperation::AlterColumn { name, change } => {
                    let change = match change {
                        ColumnChange::SetType(data_type) => format!("TYPE {}", data_type.0),
                        ColumnChange::SetDefault(expr) => format!("SET DEFAULT {}", self.expr(expr)?),
                        ColumnChange::DropDefault => "DROP DEFAULT".to_string(),
                        ColumnChange::SetNotNull => "SET NOT NULL".to_string(),
                        ColumnChange::DropNotNull => "DROP NOT NULL".to_string(),
                    };
                    format!("ALTER COLUMN {} {}", self.ident(name), change)
                }
            });
        }
        Ok(format!(
            "ALTER TABLE {} {}",
            self.object_name(&alter.name),
            operations.join(", ")
        ))
    }

    // ---- expressions ----

    pub fn expr(&mut self, expr: &Expr) -> KilnResult<String> {
        match expr {
            Expr::Identifier(ident) => Ok(self.ident(ident)),
            Expr::CompoundIdentifier(parts) => Ok(parts.iter().map(|p| self.ident(p)).collect::<Vec<_>>().join(".")),
            Expr::Literal(literal) => Ok(self.literal(literal)),
            Expr::TypedString { data_type, value } => Ok(format!(
                "{} {}",
                data_type.0,
                self.percent(self.generator.string_literal(value))
            )),
            Expr::Placeholder(placeholder) => Ok(self.writer.write(placeholder)),
            Expr::BinaryOp { left, op, right } => self.binary(left, *op, right),
            Expr::UnaryOp { op, expr } => {
                let operand = match op {
                    UnaryOperator::Not => self.operand(expr, PREC_NOT)?,
                    _ => self.operand(expr, PREC_UNARY)?,
                };
                Ok(match op {
                    UnaryOperator::Not => format!("NOT {}", operand),
                    // keep `- -1` from turning into a `--` comment
                    UnaryOperator::Minus if operand.starts_with('-') => format!("- {}", operand),
                    UnaryOperator::Minus => format!("-{}", operand),
                    UnaryOperator::Plus => format!("+{}", operand),
                })
            }
            Expr::Nested(inner) => Ok(format!("({})", self.expr(inner)?)),
            Expr::Tuple(items) => Ok(format!("({})", self.expr_list(items)?)),
            Expr::IsNull { expr, negated } => Ok(format!(
                "{} IS {}NULL",
                self.operand(expr, PREC_COMPARE + 1)?,
                if *negated { "NOT " } else { "" }
            )),
            Expr::IsDistinctFrom { left, right, negated } => {
                let left = self.operand(left, PREC_COMPARE + 1)?;
                let right = self.operand(right, PREC_COMPARE + 1)?;
                Ok(self.generator.is_distinct_from(&left, &right, *negated))
            }
            Expr::InList { expr, list, negated } => {
                let left = self.operand(expr, PREC_COMPARE + 1)?;
                Ok(format!(
                    "{} {}IN ({})",
                    left,
                    if *negated { "NOT " } else { "" },
                    self.expr_list(list)?
                ))
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let left = self.operand(expr, PREC_COMPARE + 1)?;
                Ok(format!(
                    "{} {}IN ({})",
                    left,
                    if *negated { "NOT " } else { "" },
                    self.query(subquery)?
                ))
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let subject = self.operand(expr, PREC_COMPARE + 1)?;
                let low = self.operand(low, PREC_COMPARE + 1)?;
                let high = self.operand(high, PREC_COMPARE + 1)?;
                Ok(format!(
                    "{} {}BETWEEN {} AND {}",
                    subject,
                    if *negated { "NOT " } else { "" },
                    low,
                    high
                ))
            }
            Expr::Like {
                expr,
                negated,
                case_insensitive,
                pattern,
                escape,
            } => self.like(expr, *negated, *case_insensitive, pattern, escape.as_deref()),
            Expr::Exists { subquery, negated } => Ok(format!(
                "{}EXISTS ({})",
                if *negated { "NOT " } else { "" },
                self.query(subquery)?
            )),
            Expr::Subquery(query) => Ok(format!("({})", self.query(query)?)),
            Expr::Function(function) => self.function(function),
            Expr::Case {
                operand,
                conditions,
                else_result,
            } => {
                let mut sql = String::from("CASE");
                if let Some(operand) = operand {
                    sql.push(' ');
                    sql.push_str(&self.expr(operand)?);
                }
                for (condition, result) in conditions {
                    sql.push_str(&format!(" WHEN {} THEN {}", self.expr(condition)?, self.expr(result)?));
                }
                if let Some(else_result) = else_result {
                    sql.push_str(&format!(" ELSE {}", self.expr(else_result)?));
                }
                sql.push_str(" END");
                Ok(sql)
            }
            Expr::Cast {
                expr,
                data_type,
                shorthand,
            } => {
                if *shorthand && self.generator.dialect().supports_double_colon_cast() {
                    Ok(format!("{}::{}", self.operand(expr, PREC_POSTFIX)?, data_type.0))
                } else {
                    Ok(format!("CAST({} AS {})", self.expr(expr)?, data_type.0))
                }
            }
            Expr::Extract { field, expr } => {
                let source = self.expr(expr)?;
                self.generator
                    .extract(field, &source)
                    .ok_or_else(|| self.unsupported(&format!("EXTRACT({})", field)))
            }
            Expr::Array(items) => {
                if !self.generator.supports_array_literal() {
                    return Err(self.unsupported("ARRAY[...]"));
                }
                Ok(format!("ARRAY[{}]", self.expr_list(items)?))
            }
        }
    }

    /// Render a child, parenthesized when it binds looser than `min_prec`.
    fn operand(&mut self, expr: &Expr, min_prec: u8) -> KilnResult<String> {
        let text = self.expr(expr)?;
        if precedence(expr) < min_prec {
            Ok(format!("({})", text))
        } else {
            Ok(text)
        }
    }

    fn binary(&mut self, left: &Expr, op: BinaryOperator, right: &Expr) -> KilnResult<String> {
        if op == BinaryOperator::StringConcat {
            let mut parts = Vec::new();
            collect_concat(left, &mut parts);
            collect_concat(right, &mut parts);
            let mut rendered = Vec::with_capacity(parts.len());
            for part in parts {
                rendered.push(self.operand(part, PREC_ADD + 1)?);
            }
            return Ok(self.generator.string_concat(&rendered));
        }
        if matches!(op, BinaryOperator::Arrow | BinaryOperator::LongArrow) && !self.generator.supports_json_arrows() {
            return Err(self.unsupported(&format!("JSON operator '{}'", op.as_str())));
        }
        let prec = binary_precedence(op);
        let left = self.operand(left, prec)?;
        let right = self.operand(right, prec + 1)?;
        let op_text = self.percent(op.as_str().to_string());
        Ok(format!("{} {} {}", left, op_text, right))
    }

    fn like(
        &mut self,
        expr: &Expr,
        negated: bool,
        case_insensitive: bool,
        pattern: &Expr,
        escape: Option<&str>,
    ) -> KilnResult<String> {
        let not = if negated { "NOT " } else { "" };
        let fuzzy = self.generator.fuzzy_operator().map(str::to_string);
        let mut sql = match (case_insensitive, fuzzy) {
            (false, _) => {
                let subject = self.operand(expr, PREC_COMPARE + 1)?;
                let pattern = self.operand(pattern, PREC_COMPARE + 1)?;
                format!("{} {}LIKE {}", subject, not, pattern)
            }
            (true, Some(operator)) => {
                let subject = self.operand(expr, PREC_COMPARE + 1)?;
                let pattern = self.operand(pattern, PREC_COMPARE + 1)?;
                format!("{} {}{} {}", subject, not, operator, pattern)
            }
            (true, None) => {
                let subject = self.expr(expr)?;
                let pattern = self.expr(pattern)?;
                format!("LOWER({}) {}LIKE LOWER({})", subject, not, pattern)
            }
        };
        if let Some(escape) = escape {
            sql.push_str(" ESCAPE ");
            sql.push_str(&self.percent(self.generator.string_literal(escape)));
        }
        Ok(sql)
    }

    fn function(&mut self, function: &Function) -> KilnResult<String> {
        let name = function
            .name
            .0
            .iter()
            .map(|part| match part.quote_style {
                Some(_) => self.generator.quote_identifier(&part.value),
                None => part.value.clone(),
            })
            .collect::<Vec<_>>()
            .join(".");
        let args = match &function.args {
            FunctionArgs::Star => "*".to_string(),
            FunctionArgs::List(args) => self.expr_list(args)?,
        };
        let mut sql = format!("{}({}{})", name, if function.distinct { "DISTINCT " } else { "" }, args);
        if let Some(filter) = &function.filter {
            sql.push_str(&format!(" FILTER (WHERE {})", self.expr(filter)?));
        }
        match &function.over {
            None => {}
            Some(WindowType::Named(name)) => sql.push_str(&format!(" OVER {}", self.ident(name))),
            Some(WindowType::Spec(spec)) => sql.push_str(&format!(" OVER ({})", self.window_spec(spec)?)),
        }
        Ok(sql)
    }

    fn window_spec(&mut self, spec: &WindowSpec) -> KilnResult<String> {
        let mut parts = Vec::new();
        if !spec.partition_by.is_empty() {
            parts.push(format!("PARTITION BY {}", self.expr_list(&spec.partition_by)?));
        }
        if !spec.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by_list(&spec.order_by)?));
        }
        if let Some(frame) = &spec.frame {
            let units = match frame.units {
                FrameUnits::Rows => "ROWS",
                FrameUnits::Range => "RANGE",
                FrameUnits::Groups => "GROUPS",
            };
            let start = self.frame_bound(&frame.start)?;
            match &frame.end {
                Some(end) => {
                    let end = self.frame_bound(end)?;
                    parts.push(format!("{} BETWEEN {} AND {}", units, start, end));
                }
                None => parts.push(format!("{} {}", units, start)),
            }
        }
        Ok(parts.join(" "))
    }

    fn frame_bound(&mut self, bound: &FrameBound) -> KilnResult<String> {
        Ok(match bound {
            FrameBound::CurrentRow => "CURRENT ROW".to_string(),
            FrameBound::Preceding(None) => "UNBOUNDED PRECEDING".to_string(),
            FrameBound::Following(None) => "UNBOUNDED FOLLOWING".to_string(),
            FrameBound::Preceding(Some(n)) => format!("{} PRECEDING", self.expr(n)?),
            FrameBound::Following(Some(n)) => format!("{} FOLLOWING", self.expr(n)?),
        })
    }

    fn order_by_list(&mut self, items: &[OrderByExpr]) -> KilnResult<String> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut text = self.expr(&item.expr)?;
            match item.asc {
                Some(true) => text.push_str(" ASC"),
                Some(false) => text.push_str(" DESC"),
                None => {}
            }
            match item.nulls_first {
                Some(true) => text.push_str(" NULLS FIRST"),
                Some(false) => text.push_str(" NULLS LAST"),
                None => {}
            }
            out.push(text);
        }
        Ok(out.join(", "))
    }

    fn expr_list(&mut self, exprs: &[Expr]) -> KilnResult<String> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            out.push(self.expr(expr)?);
        }
        Ok(out.join(", "))
    }

    fn literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Number(n) => n.clone(),
            Literal::String(s) => self.percent(self.generator.string_literal(s)),
            Literal::Boolean(b) => self.generator.bool_literal(*b),
            Literal::Null => "NULL".to_string(),
        }
    }

    fn ident(&self, ident: &Ident) -> String {
        let text = match ident.quote_style {
            Some(_) => self.generator.quote_identifier(&ident.value),
            None => self.generator.escape_identifier(&ident.value),
        };
        self.percent(text)
    }

    fn idents(&self, idents: &[Ident]) -> String {
        idents.iter().map(|i| self.ident(i)).collect::<Vec<_>>().join(", ")
    }

    fn object_name(&self, name: &ObjectName) -> String {
        name.0.iter().map(|i| self.ident(i)).collect::<Vec<_>>().join(".")
    }
}

/// Flatten a left-leaning `||` chain in operand order.
fn collect_concat<'e>(expr: &'e Expr, parts: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::StringConcat,
            right,
        } => {
            collect_concat(left, parts);
            collect_concat(right, parts);
        }
        other => parts.push(other),
    }
}
