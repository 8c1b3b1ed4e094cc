//! Shorthand constructors for building trees in code.
//!
//! ```
//! use sqlkiln::ast::builders::*;
//!
//! let query = select(&["id", "email"], "users").filter(eq(col("id"), param(0)));
//! assert_eq!(query.to_string(), "SELECT id, email FROM users WHERE id = $1");
//! ```

use super::*;
use crate::params::Value;

/// Column reference; dotted names become compound identifiers.
pub fn col(name: &str) -> Expr {
    if name.contains('.') {
        Expr::CompoundIdentifier(name.split('.').map(Ident::new).collect())
    } else {
        Expr::Identifier(Ident::new(name))
    }
}

pub fn int(n: i64) -> Expr {
    Expr::Literal(Literal::Number(n.to_string()))
}

pub fn text(s: impl Into<String>) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn boolean(b: bool) -> Expr {
    Expr::Literal(Literal::Boolean(b))
}

pub fn null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Literal expression for a bound value. Values without a literal form
/// become lifted placeholders carrying the value.
pub fn value(v: Value) -> Expr {
    match v {
        Value::Null => null(),
        Value::Bool(b) => boolean(b),
        Value::Int(n) => int(n),
        Value::Text(s) => text(s),
        other => Expr::Placeholder(Placeholder::Literal(other)),
    }
}

/// Positional placeholder (0-based argument index).
pub fn param(index: usize) -> Expr {
    Expr::Placeholder(Placeholder::Param(ParamRef::Position(index)))
}

/// Named placeholder.
pub fn named(name: impl Into<String>) -> Expr {
    Expr::Placeholder(Placeholder::Param(ParamRef::Name(name.into())))
}

pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOperator::Eq, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOperator::And, right)
}

pub fn or(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOperator::Or, right)
}

pub fn is_null(expr: Expr) -> Expr {
    Expr::IsNull {
        expr: Box::new(expr),
        negated: false,
    }
}

/// `AND` the predicate onto an optional existing one, parenthesizing an
/// existing `OR` so precedence is kept.
pub fn conjoin(existing: Option<Expr>, predicate: Expr) -> Expr {
    match existing {
        None => predicate,
        Some(expr @ Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        }) => and(Expr::Nested(Box::new(expr)), predicate),
        Some(expr) => and(expr, predicate),
    }
}

pub fn table(name: &str) -> TableWithJoins {
    TableWithJoins {
        relation: TableFactor::Table {
            name: ObjectName::new(name),
            alias: None,
        },
        joins: Vec::new(),
    }
}

/// `SELECT columns FROM table`; an empty column list selects `*`.
pub fn select(columns: &[&str], from: &str) -> Query {
    let projection = if columns.is_empty() {
        vec![SelectItem::Wildcard]
    } else {
        columns
            .iter()
            .map(|c| SelectItem::Expr {
                expr: col(c),
                alias: None,
            })
            .collect()
    };
    Query::new(SetExpr::Select(Box::new(Select {
        projection,
        from: vec![table(from)],
        ..Default::default()
    })))
}

impl Query {
    /// Add a WHERE predicate (ANDed onto any existing one) to a plain select.
    pub fn filter(mut self, predicate: Expr) -> Self {
        if let SetExpr::Select(select) = &mut self.body {
            select.selection = Some(conjoin(select.selection.take(), predicate));
        }
        self
    }

    pub fn order_by(mut self, expr: Expr, asc: bool) -> Self {
        self.order_by.push(OrderByExpr {
            expr,
            asc: Some(asc),
            nulls_first: None,
        });
        self
    }

    pub fn limit(mut self, limit: Expr) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn into_statement(self) -> Statement {
        Statement::Query(Box::new(self))
    }
}

/// `DELETE FROM table [WHERE predicate]`
pub fn delete(from: &str, predicate: Option<Expr>) -> Statement {
    Statement::Delete(Delete {
        table: ObjectName::new(from),
        alias: None,
        using: Vec::new(),
        selection: predicate,
        returning: Vec::new(),
    })
}

/// `UPDATE table SET col = value, ... [WHERE predicate]`
pub fn update(table: &str, assignments: Vec<(&str, Expr)>, predicate: Option<Expr>) -> Statement {
    Statement::Update(Update {
        table: ObjectName::new(table),
        alias: None,
        assignments: assignments
            .into_iter()
            .map(|(column, value)| Assignment {
                column: Ident::new(column),
                value,
            })
            .collect(),
        from: Vec::new(),
        selection: predicate,
        returning: Vec::new(),
    })
}

/// `INSERT INTO table (columns) VALUES (row), ...`
pub fn insert(table: &str, columns: &[&str], rows: Vec<Vec<Expr>>) -> Statement {
    Statement::Insert(Insert {
        table: ObjectName::new(table),
        columns: columns.iter().map(|c| Ident::new(*c)).collect(),
        source: InsertSource::Values(rows),
        on_conflict: None,
        returning: Vec::new(),
    })
}
