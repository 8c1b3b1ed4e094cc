//! Expressions.

use serde::{Deserialize, Serialize};

use super::{Ident, ObjectName, OrderByExpr, Query};
use crate::params::{ParamRef, Value};

/// A literal as written in SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric text, kept verbatim.
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    /// The bound value this literal stands for. `None` for NULL and for
    /// numbers that fit neither i64 nor f64.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Literal::Number(text) => text
                .parse::<i64>()
                .map(Value::Int)
                .ok()
                .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::Float)),
            Literal::String(s) => Some(Value::Text(s.clone())),
            Literal::Boolean(b) => Some(Value::Bool(*b)),
            Literal::Null => None,
        }
    }
}

/// A placeholder in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Placeholder {
    /// Bound by the caller.
    Param(ParamRef),
    /// Lifted from a literal; carries its value.
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    StringConcat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    /// `->`
    Arrow,
    /// `->>`
    LongArrow,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::StringConcat => "||",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Arrow => "->",
            BinaryOperator::LongArrow => "->>",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

/// A function call, optionally aggregate or windowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: ObjectName,
    pub distinct: bool,
    pub args: FunctionArgs,
    pub filter: Option<Box<Expr>>,
    pub over: Option<WindowType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionArgs {
    /// `count(*)`
    Star,
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowType {
    /// `OVER w`
    Named(Ident),
    /// `OVER (...)`
    Spec(WindowSpec),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub frame: Option<WindowFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    /// Present for `BETWEEN start AND end`.
    pub end: Option<FrameBound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameUnits {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameBound {
    CurrentRow,
    /// `None` is UNBOUNDED.
    Preceding(Option<Box<Expr>>),
    Following(Option<Box<Expr>>),
}

/// Column or expression type name, kept as written (e.g. `VARCHAR(255)`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType(pub String);

/// SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Identifier(Ident),
    /// `t.col`, `schema.t.col`
    CompoundIdentifier(Vec<Ident>),
    Literal(Literal),
    /// `DATE '2024-01-01'`, `INTERVAL '1 day'`
    TypedString { data_type: DataType, value: String },
    Placeholder(Placeholder),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    /// Parenthesized expression.
    Nested(Box<Expr>),
    /// Row value `(a, b)`.
    Tuple(Vec<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// `a IS [NOT] DISTINCT FROM b`
    IsDistinctFrom {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        negated: bool,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    Like {
        expr: Box<Expr>,
        negated: bool,
        case_insensitive: bool,
        pattern: Box<Expr>,
        escape: Option<String>,
    },
    Exists {
        subquery: Box<Query>,
        negated: bool,
    },
    Subquery(Box<Query>),
    Function(Function),
    Case {
        operand: Option<Box<Expr>>,
        conditions: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
        /// Written as `expr::type`.
        shorthand: bool,
    },
    /// `EXTRACT(field FROM expr)`; the field is kept uppercased.
    Extract {
        field: String,
        expr: Box<Expr>,
    },
    /// `ARRAY[a, b]`
    Array(Vec<Expr>),
}

impl Expr {
    /// Whether this is a literal (not a placeholder).
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    /// Unwrap any number of parentheses.
    pub fn unnested(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Nested(inner) = expr {
            expr = inner;
        }
        expr
    }
}
