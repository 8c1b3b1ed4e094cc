//! Expression grammar (precedence climbing).

use super::{Parser, TokenKind, is_reserved};

/// Reserved words that are also ordinary function names when called.
/// `VALUES(col)` is MySQL's reference to the row being inserted.
const CALLABLE_KEYWORDS: &[&str] = &["LEFT", "RIGHT", "VALUES"];
use crate::ast::*;
use crate::error::KilnResult;

const PREC_OR: u8 = 5;
const PREC_AND: u8 = 10;
const PREC_NOT: u8 = 15;
const PREC_COMPARE: u8 = 20;
const PREC_ADD: u8 = 30;
const PREC_MUL: u8 = 40;
const PREC_UNARY: u8 = 45;
const PREC_POSTFIX: u8 = 50;

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> KilnResult<Expr> {
        self.parse_subexpr(0)
    }

    fn parse_subexpr(&mut self, min_prec: u8) -> KilnResult<Expr> {
        self.enter()?;
        let mut expr = self.parse_prefix()?;
        let mut folds = 0;
        loop {
            let prec = self.next_precedence();
            if prec == 0 || prec <= min_prec {
                break;
            }
            self.enter()?;
            folds += 1;
            expr = self.parse_infix(expr, prec)?;
        }
        self.leave_n(folds + 1);
        Ok(expr)
    }

    fn next_precedence(&self) -> u8 {
        match self.peek() {
            TokenKind::Word { value, quote: None } => match value.to_ascii_uppercase().as_str() {
                "OR" => PREC_OR,
                "AND" => PREC_AND,
                "NOT" => {
                    let next = self.peek_nth(1);
                    if ["IN", "LIKE", "ILIKE", "BETWEEN"].iter().any(|kw| next.is_keyword(kw)) {
                        PREC_COMPARE
                    } else {
                        0
                    }
                }
                "IS" | "IN" | "LIKE" | "ILIKE" | "BETWEEN" => PREC_COMPARE,
                _ => 0,
            },
            TokenKind::Eq
            | TokenKind::Neq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => PREC_COMPARE,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Concat => PREC_ADD,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => PREC_MUL,
            TokenKind::DoubleColon | TokenKind::Arrow | TokenKind::LongArrow => PREC_POSTFIX,
            _ => 0,
        }
    }

    fn parse_infix(&mut self, left: Expr, prec: u8) -> KilnResult<Expr> {
        let token = self.next();
        let op = match &token {
            TokenKind::Eq => Some(BinaryOperator::Eq),
            TokenKind::Neq => Some(BinaryOperator::NotEq),
            TokenKind::Lt => Some(BinaryOperator::Lt),
            TokenKind::LtEq => Some(BinaryOperator::LtEq),
            TokenKind::Gt => Some(BinaryOperator::Gt),
            TokenKind::GtEq => Some(BinaryOperator::GtEq),
            TokenKind::Plus => Some(BinaryOperator::Plus),
            TokenKind::Minus => Some(BinaryOperator::Minus),
            TokenKind::Concat => Some(BinaryOperator::StringConcat),
            TokenKind::Star => Some(BinaryOperator::Multiply),
            TokenKind::Slash => Some(BinaryOperator::Divide),
            TokenKind::Percent => Some(BinaryOperator::Modulo),
            TokenKind::Arrow => Some(BinaryOperator::Arrow),
            TokenKind::LongArrow => Some(BinaryOperator::LongArrow),
            t if t.is_keyword("AND") => Some(BinaryOperator::And),
            t if t.is_keyword("OR") => Some(BinaryOperator::Or),
            _ => None,
        };
        if let Some(op) = op {
            let right = self.parse_subexpr(prec)?;
            return Ok(Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        if token == TokenKind::DoubleColon {
            if !self.dialect.supports_double_colon_cast() {
                self.index -= 1;
                return Err(self.error(&format!("'::' casts are not valid {} syntax", self.dialect)));
            }
            let data_type = self.parse_data_type()?;
            return Ok(Expr::Cast {
                expr: Box::new(left),
                data_type,
                shorthand: true,
            });
        }

        if token.is_keyword("IS") {
            let negated = self.parse_keyword("NOT");
            if self.parse_keywords(&["DISTINCT", "FROM"]) {
                let right = self.parse_subexpr(PREC_COMPARE)?;
                return Ok(Expr::IsDistinctFrom {
                    left: Box::new(left),
                    right: Box::new(right),
                    negated,
                });
            }
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = token.is_keyword("NOT");
        let keyword = if negated { self.next() } else { token };
        if keyword.is_keyword("IN") {
            return self.parse_in(left, negated);
        }
        if keyword.is_keyword("BETWEEN") {
            let low = self.parse_subexpr(PREC_COMPARE)?;
            self.expect_keyword("AND")?;
            let high = self.parse_subexpr(PREC_COMPARE)?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                negated,
                low: Box::new(low),
                high: Box::new(high),
            });
        }
        if keyword.is_keyword("LIKE") || keyword.is_keyword("ILIKE") {
            let pattern = self.parse_subexpr(PREC_COMPARE)?;
            let escape = if self.parse_keyword("ESCAPE") {
                match self.next() {
                    TokenKind::String(s) => Some(s),
                    _ => {
                        self.index -= 1;
                        return Err(self.error("expected a string after ESCAPE"));
                    }
                }
            } else {
                None
            };
            return Ok(Expr::Like {
                expr: Box::new(left),
                negated,
                case_insensitive: keyword.is_keyword("ILIKE"),
                pattern: Box::new(pattern),
                escape,
            });
        }

        self.index -= 1;
        Err(self.error("unexpected operator"))
    }

    fn parse_in(&mut self, expr: Expr, negated: bool) -> KilnResult<Expr> {
        self.expect(&TokenKind::LParen, "'(' after IN")?;
        if self.is_keyword("SELECT") || self.is_keyword("WITH") {
            let subquery = self.parse_query()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(Expr::InSubquery {
                expr: Box::new(expr),
                subquery: Box::new(subquery),
                negated,
            });
        }
        if self.peek() == &TokenKind::RParen {
            return Err(self.error("IN list must not be empty"));
        }
        let list = self.parse_comma_separated(Self::parse_expr)?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::InList {
            expr: Box::new(expr),
            list,
            negated,
        })
    }

    fn parse_prefix(&mut self) -> KilnResult<Expr> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.index += 1;
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.index += 1;
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Placeholder(r) => {
                self.index += 1;
                Ok(Expr::Placeholder(Placeholder::Param(r)))
            }
            TokenKind::Minus | TokenKind::Plus => {
                let op = if self.next() == TokenKind::Minus {
                    UnaryOperator::Minus
                } else {
                    UnaryOperator::Plus
                };
                let expr = self.parse_subexpr(PREC_UNARY)?;
                Ok(Expr::UnaryOp {
                    op,
                    expr: Box::new(expr),
                })
            }
            TokenKind::LParen => self.parse_parenthesized(),
            TokenKind::Word { value, quote } => {
                if quote.is_none() {
                    if let Some(expr) = self.parse_keyword_prefix(&value)? {
                        return Ok(expr);
                    }
                }
                self.parse_identifier_expr()
            }
            _ => Err(self.error("expected an expression")),
        }
    }

    /// Keyword-led expressions. `None` when the word is an ordinary name.
    fn parse_keyword_prefix(&mut self, word: &str) -> KilnResult<Option<Expr>> {
        let upper = word.to_ascii_uppercase();
        let expr = match upper.as_str() {
            "NULL" => {
                self.index += 1;
                Expr::Literal(Literal::Null)
            }
            "TRUE" | "FALSE" => {
                self.index += 1;
                Expr::Literal(Literal::Boolean(upper == "TRUE"))
            }
            "NOT" => {
                self.index += 1;
                if self.parse_keyword("EXISTS") {
                    return self.parse_exists(true).map(Some);
                }
                let expr = self.parse_subexpr(PREC_NOT)?;
                Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(expr),
                }
            }
            "EXISTS" => {
                self.index += 1;
                return self.parse_exists(false).map(Some);
            }
            "CASE" => {
                self.index += 1;
                self.parse_case()?
            }
            "CAST" if self.peek_nth(1) == &TokenKind::LParen => {
                self.index += 2;
                let expr = self.parse_expr()?;
                self.expect_keyword("AS")?;
                let data_type = self.parse_data_type()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Expr::Cast {
                    expr: Box::new(expr),
                    data_type,
                    shorthand: false,
                }
            }
            "EXTRACT" if self.peek_nth(1) == &TokenKind::LParen => {
                self.index += 2;
                let field = match self.next() {
                    TokenKind::Word { value, .. } => value.to_ascii_uppercase(),
                    TokenKind::String(value) => value.to_ascii_uppercase(),
                    _ => {
                        self.index -= 1;
                        return Err(self.error("expected a date part after EXTRACT("));
                    }
                };
                self.expect_keyword("FROM")?;
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Expr::Extract {
                    field,
                    expr: Box::new(expr),
                }
            }
            "ARRAY" if self.peek_nth(1) == &TokenKind::LBracket => {
                self.index += 2;
                let items = if self.peek() == &TokenKind::RBracket {
                    Vec::new()
                } else {
                    self.parse_comma_separated(Self::parse_expr)?
                };
                self.expect(&TokenKind::RBracket, "']'")?;
                Expr::Array(items)
            }
            "DATE" | "TIME" | "TIMESTAMP" | "INTERVAL" => match self.peek_nth(1).clone() {
                TokenKind::String(value) => {
                    self.index += 2;
                    Expr::TypedString {
                        data_type: DataType(upper),
                        value,
                    }
                }
                _ => return Ok(None),
            },
            _ if is_reserved(word)
                && !(self.peek_nth(1) == &TokenKind::LParen
                    && CALLABLE_KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))) =>
            {
                return Err(self.error("expected an expression, found a keyword"));
            }
            _ => return Ok(None),
        };
        Ok(Some(expr))
    }

    fn parse_exists(&mut self, negated: bool) -> KilnResult<Expr> {
        self.expect(&TokenKind::LParen, "'(' after EXISTS")?;
        let subquery = self.parse_query()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::Exists {
            subquery: Box::new(subquery),
            negated,
        })
    }

    fn parse_case(&mut self) -> KilnResult<Expr> {
        let operand = if self.is_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut conditions = Vec::new();
        while self.parse_keyword("WHEN") {
            let condition = self.parse_expr()?;
            self.expect_keyword("THEN")?;
            let result = self.parse_expr()?;
            conditions.push((condition, result));
        }
        if conditions.is_empty() {
            return Err(self.error("expected WHEN"));
        }
        let else_result = if self.parse_keyword("ELSE") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;
        Ok(Expr::Case {
            operand,
            conditions,
            else_result,
        })
    }

    fn parse_parenthesized(&mut self) -> KilnResult<Expr> {
        self.expect(&TokenKind::LParen, "'('")?;
        if self.is_keyword("SELECT") || self.is_keyword("WITH") {
            let query = self.parse_query()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(Expr::Subquery(Box::new(query)));
        }
        let first = self.parse_expr()?;
        if self.consume(&TokenKind::Comma) {
            let mut items = vec![first];
            items.extend(self.parse_comma_separated(Self::parse_expr)?);
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(Expr::Tuple(items));
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::Nested(Box::new(first)))
    }

    /// Column reference or function call.
    fn parse_identifier_expr(&mut self) -> KilnResult<Expr> {
        let mut parts = vec![self.parse_name_part()?];
        while self.peek() == &TokenKind::Period
            && matches!(self.peek_nth(1), TokenKind::Word { .. })
        {
            self.index += 1;
            parts.push(self.parse_name_part()?);
        }
        if self.peek() == &TokenKind::LParen {
            return self.parse_function(ObjectName(parts));
        }
        if parts.len() == 1 {
            let ident = parts.remove(0);
            if ident.quote_style.is_none() && is_reserved(&ident.value) {
                self.index -= 1;
                return Err(self.error("expected an expression, found a keyword"));
            }
            Ok(Expr::Identifier(ident))
        } else {
            Ok(Expr::CompoundIdentifier(parts))
        }
    }

    /// Any word, reserved or not, as a name part.
    fn parse_name_part(&mut self) -> KilnResult<Ident> {
        match self.next() {
            TokenKind::Word { value, quote } => Ok(Ident {
                value,
                quote_style: quote,
            }),
            _ => {
                self.index -= 1;
                Err(self.error("expected a name"))
            }
        }
    }

    fn parse_function(&mut self, name: ObjectName) -> KilnResult<Expr> {
        self.expect(&TokenKind::LParen, "'('")?;
        let distinct = self.parse_keyword("DISTINCT");
        if !distinct {
            self.parse_keyword("ALL");
        }
        let args = if self.consume(&TokenKind::Star) {
            FunctionArgs::Star
        } else if self.peek() == &TokenKind::RParen {
            FunctionArgs::List(Vec::new())
        } else {
            FunctionArgs::List(self.parse_comma_separated(Self::parse_expr)?)
        };
        self.expect(&TokenKind::RParen, "')'")?;

        let filter = if self.is_keyword("FILTER") && self.peek_nth(1) == &TokenKind::LParen {
            self.index += 2;
            self.expect_keyword("WHERE")?;
            let filter = self.parse_expr()?;
            self.expect(&TokenKind::RParen, "')'")?;
            Some(Box::new(filter))
        } else {
            None
        };

        let over = if self.parse_keyword("OVER") {
            if self.consume(&TokenKind::LParen) {
                let spec = self.parse_window_spec()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Some(WindowType::Spec(spec))
            } else {
                Some(WindowType::Named(self.parse_identifier()?))
            }
        } else {
            None
        };

        Ok(Expr::Function(Function {
            name,
            distinct,
            args,
            filter,
            over,
        }))
    }

    /// Body of a window specification, without the parentheses.
    pub(super) fn parse_window_spec(&mut self) -> KilnResult<WindowSpec> {
        let partition_by = if self.parse_keywords(&["PARTITION", "BY"]) {
            self.parse_comma_separated(Self::parse_expr)?
        } else {
            Vec::new()
        };
        let order_by = if self.parse_keywords(&["ORDER", "BY"]) {
            self.parse_comma_separated(Self::parse_order_by_expr)?
        } else {
            Vec::new()
        };
        let frame = match self.parse_one_of(&["ROWS", "RANGE", "GROUPS"]).as_deref() {
            Some(units) => {
                let units = match units {
                    "ROWS" => FrameUnits::Rows,
                    "RANGE" => FrameUnits::Range,
                    _ => FrameUnits::Groups,
                };
                if self.parse_keyword("BETWEEN") {
                    let start = self.parse_frame_bound()?;
                    self.expect_keyword("AND")?;
                    let end = self.parse_frame_bound()?;
                    Some(WindowFrame {
                        units,
                        start,
                        end: Some(end),
                    })
                } else {
                    Some(WindowFrame {
                        units,
                        start: self.parse_frame_bound()?,
                        end: None,
                    })
                }
            }
            None => None,
        };
        Ok(WindowSpec {
            partition_by,
            order_by,
            frame,
        })
    }

    fn parse_frame_bound(&mut self) -> KilnResult<FrameBound> {
        if self.parse_keywords(&["CURRENT", "ROW"]) {
            return Ok(FrameBound::CurrentRow);
        }
        let offset = if self.parse_keyword("UNBOUNDED") {
            None
        } else {
            Some(Box::new(self.parse_subexpr(PREC_COMPARE)?))
        };
        if self.parse_keyword("PRECEDING") {
            Ok(FrameBound::Preceding(offset))
        } else if self.parse_keyword("FOLLOWING") {
            Ok(FrameBound::Following(offset))
        } else {
            Err(self.error("expected PRECEDING or FOLLOWING"))
        }
    }

    pub(super) fn parse_order_by_expr(&mut self) -> KilnResult<OrderByExpr> {
        let expr = self.parse_expr()?;
        let asc = if self.parse_keyword("ASC") {
            Some(true)
        } else if self.parse_keyword("DESC") {
            Some(false)
        } else {
            None
        };
        let nulls_first = if self.parse_keywords(&["NULLS", "FIRST"]) {
            Some(true)
        } else if self.parse_keywords(&["NULLS", "LAST"]) {
            Some(false)
        } else {
            None
        };
        Ok(OrderByExpr { expr, asc, nulls_first })
    }

    /// A type name as written: `INT`, `VARCHAR(255)`, `DOUBLE PRECISION`,
    /// `TIMESTAMP(3) WITH TIME ZONE`, `INT UNSIGNED`.
    pub(super) fn parse_data_type(&mut self) -> KilnResult<DataType> {
        let mut words = vec![self.parse_name_part()?.value];
        let first = words[0].to_ascii_uppercase();
        match first.as_str() {
            "DOUBLE" if self.is_keyword("PRECISION") => words.push(self.parse_name_part()?.value),
            "CHARACTER" | "CHAR" if self.is_keyword("VARYING") => words.push(self.parse_name_part()?.value),
            _ => {}
        }
        let mut text = words.join(" ");

        if self.consume(&TokenKind::LParen) {
            let mut args = Vec::new();
            loop {
                match self.next() {
                    TokenKind::Number(n) => args.push(n),
                    TokenKind::Word { value, quote: None } => args.push(value),
                    _ => {
                        self.index -= 1;
                        return Err(self.error("expected a type modifier"));
                    }
                }
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "')'")?;
            text = format!("{}({})", text, args.join(", "));
        }

        if matches!(first.as_str(), "TIMESTAMP" | "TIME") {
            if self.parse_keywords(&["WITH", "TIME", "ZONE"]) {
                text.push_str(" WITH TIME ZONE");
            } else if self.parse_keywords(&["WITHOUT", "TIME", "ZONE"]) {
                text.push_str(" WITHOUT TIME ZONE");
            }
        }
        if self.parse_keyword("UNSIGNED") {
            text.push_str(" UNSIGNED");
        }
        Ok(DataType(text))
    }
}
