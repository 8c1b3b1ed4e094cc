//! Query grammar: WITH, SELECT, set operations, FROM and joins.

use super::{Parser, TokenKind};
use crate::ast::*;
use crate::dialect::Dialect;
use crate::error::KilnResult;

impl Parser<'_> {
    pub(super) fn parse_query(&mut self) -> KilnResult<Query> {
        self.enter()?;
        let with = if self.parse_keyword("WITH") {
            Some(self.parse_with()?)
        } else {
            None
        };
        let body = self.parse_set_expr(0)?;
        let order_by = if self.parse_keywords(&["ORDER", "BY"]) {
            self.parse_comma_separated(Self::parse_order_by_expr)?
        } else {
            Vec::new()
        };

        let mut limit = None;
        let mut offset = None;
        loop {
            if self.parse_keyword("LIMIT") {
                if self.parse_keyword("ALL") {
                    continue;
                }
                let first = self.parse_expr()?;
                // MySQL `LIMIT offset, count`
                if self.consume(&TokenKind::Comma) {
                    offset = Some(first);
                    limit = Some(self.parse_expr()?);
                } else {
                    limit = Some(first);
                }
            } else if self.parse_keyword("OFFSET") {
                offset = Some(self.parse_expr()?);
                let _ = self.parse_one_of(&["ROW", "ROWS"]);
            } else if self.parse_keyword("FETCH") {
                if self.parse_one_of(&["FIRST", "NEXT"]).is_none() {
                    return Err(self.error("expected FIRST or NEXT"));
                }
                limit = Some(self.parse_expr()?);
                if self.parse_one_of(&["ROW", "ROWS"]).is_none() {
                    return Err(self.error("expected ROWS"));
                }
                self.expect_keyword("ONLY")?;
            } else {
                break;
            }
        }
        let mut locks = Vec::new();
        while self.is_keyword("FOR") {
            locks.push(self.parse_lock_clause()?);
        }
        self.leave();
        Ok(Query {
            with,
            body,
            order_by,
            limit,
            offset,
            locks,
        })
    }

    /// `FOR UPDATE | NO KEY UPDATE | SHARE | KEY SHARE [OF t, ...] [NOWAIT | SKIP LOCKED]`
    fn parse_lock_clause(&mut self) -> KilnResult<LockClause> {
        self.expect_keyword("FOR")?;
        let strength = if self.parse_keyword("UPDATE") {
            LockStrength::Update
        } else if self.parse_keyword("SHARE") {
            LockStrength::Share
        } else if self.parse_keywords(&["NO", "KEY", "UPDATE"]) {
            LockStrength::NoKeyUpdate
        } else if self.parse_keywords(&["KEY", "SHARE"]) {
            LockStrength::KeyShare
        } else {
            return Err(self.error("expected UPDATE or SHARE after FOR"));
        };
        let of = if self.parse_keyword("OF") {
            self.parse_comma_separated(Self::parse_object_name)?
        } else {
            Vec::new()
        };
        let wait = if self.parse_keyword("NOWAIT") {
            Some(LockWait::Nowait)
        } else if self.parse_keywords(&["SKIP", "LOCKED"]) {
            Some(LockWait::SkipLocked)
        } else {
            None
        };
        Ok(LockClause { strength, of, wait })
    }

    fn parse_with(&mut self) -> KilnResult<With> {
        let recursive = self.parse_keyword("RECURSIVE");
        let ctes = self.parse_comma_separated(|p| {
            let name = p.parse_identifier()?;
            let columns = if p.peek() == &TokenKind::LParen {
                p.parse_parenthesized_identifiers()?
            } else {
                Vec::new()
            };
            p.expect_keyword("AS")?;
            p.expect(&TokenKind::LParen, "'('")?;
            let query = p.parse_query()?;
            p.expect(&TokenKind::RParen, "')'")?;
            Ok(Cte {
                name,
                columns,
                query: Box::new(query),
            })
        })?;
        Ok(With { recursive, ctes })
    }

    fn parse_set_expr(&mut self, min_prec: u8) -> KilnResult<SetExpr> {
        let mut left = self.parse_set_operand()?;
        let mut folds = 0;
        loop {
            let (op, prec) = match self.peek() {
                t if t.is_keyword("UNION") => (SetOperator::Union, 10),
                t if t.is_keyword("EXCEPT") => (SetOperator::Except, 10),
                t if t.is_keyword("INTERSECT") => (SetOperator::Intersect, 20),
                _ => break,
            };
            if prec <= min_prec {
                break;
            }
            self.enter()?;
            folds += 1;
            self.index += 1;
            let all = self.parse_keyword("ALL");
            if !all {
                self.parse_keyword("DISTINCT");
            }
            let right = self.parse_set_expr(prec)?;
            left = SetExpr::SetOperation {
                op,
                all,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.leave_n(folds);
        Ok(left)
    }

    fn parse_set_operand(&mut self) -> KilnResult<SetExpr> {
        if self.parse_keyword("SELECT") {
            return Ok(SetExpr::Select(Box::new(self.parse_select()?)));
        }
        if self.parse_keyword("VALUES") {
            let rows = self.parse_comma_separated(Self::parse_values_row)?;
            return Ok(SetExpr::Values(rows));
        }
        if self.consume(&TokenKind::LParen) {
            let query = self.parse_query()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(SetExpr::Query(Box::new(query)));
        }
        Err(self.error("expected SELECT, VALUES or '('"))
    }

    /// `(expr, ...)`
    pub(super) fn parse_values_row(&mut self) -> KilnResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let row = self.parse_comma_separated(Self::parse_expr)?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(row)
    }

    /// Everything after the SELECT keyword.
    fn parse_select(&mut self) -> KilnResult<Select> {
        let distinct = self.parse_keyword("DISTINCT");
        if !distinct {
            self.parse_keyword("ALL");
        }
        let distinct_on = if distinct && self.parse_keyword("ON") {
            self.expect(&TokenKind::LParen, "'(' after DISTINCT ON")?;
            let exprs = self.parse_comma_separated(Self::parse_expr)?;
            self.expect(&TokenKind::RParen, "')'")?;
            exprs
        } else {
            Vec::new()
        };
        let top = if self.dialect == Dialect::SqlServer && self.parse_keyword("TOP") {
            if self.consume(&TokenKind::LParen) {
                let n = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Some(n)
            } else {
                match self.next() {
                    TokenKind::Number(n) => Some(Expr::Literal(Literal::Number(n))),
                    TokenKind::Placeholder(r) => Some(Expr::Placeholder(Placeholder::Param(r))),
                    _ => {
                        self.index -= 1;
                        return Err(self.error("expected a row count after TOP"));
                    }
                }
            }
        } else {
            None
        };

        let projection = self.parse_comma_separated(Self::parse_select_item)?;

        let from = if self.parse_keyword("FROM") {
            self.parse_comma_separated(Self::parse_table_with_joins)?
        } else {
            Vec::new()
        };
        let selection = if self.parse_keyword("WHERE") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let group_by = if self.parse_keywords(&["GROUP", "BY"]) {
            self.parse_comma_separated(Self::parse_expr)?
        } else {
            Vec::new()
        };
        let having = if self.parse_keyword("HAVING") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let windows = if self.parse_keyword("WINDOW") {
            self.parse_comma_separated(|p| {
                let name = p.parse_identifier()?;
                p.expect_keyword("AS")?;
                p.expect(&TokenKind::LParen, "'('")?;
                let spec = p.parse_window_spec()?;
                p.expect(&TokenKind::RParen, "')'")?;
                Ok(NamedWindow { name, spec })
            })?
        } else {
            Vec::new()
        };

        Ok(Select {
            distinct,
            distinct_on,
            top,
            projection,
            from,
            selection,
            group_by,
            having,
            windows,
        })
    }

    pub(super) fn parse_select_item(&mut self) -> KilnResult<SelectItem> {
        if self.consume(&TokenKind::Star) {
            return Ok(SelectItem::Wildcard);
        }
        // t.* and schema.t.*
        let mut n = 0;
        while matches!(self.peek_nth(n), TokenKind::Word { .. }) && self.peek_nth(n + 1) == &TokenKind::Period {
            n += 2;
        }
        if n > 0 && self.peek_nth(n) == &TokenKind::Star {
            let mut parts = Vec::new();
            for _ in 0..n / 2 {
                parts.push(self.parse_name_part_for_wildcard()?);
                self.index += 1;
            }
            self.index += 1;
            return Ok(SelectItem::QualifiedWildcard(ObjectName(parts)));
        }

        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn parse_name_part_for_wildcard(&mut self) -> KilnResult<Ident> {
        match self.next() {
            TokenKind::Word { value, quote } => Ok(Ident {
                value,
                quote_style: quote,
            }),
            _ => {
                self.index -= 1;
                Err(self.error("expected a table name"))
            }
        }
    }

    pub(super) fn parse_table_with_joins(&mut self) -> KilnResult<TableWithJoins> {
        let relation = self.parse_table_factor()?;
        let mut joins = Vec::new();
        loop {
            let natural = self.parse_keyword("NATURAL");
            let operator = if self.parse_keyword("JOIN") {
                JoinOperator::Inner
            } else if self.parse_keywords(&["INNER", "JOIN"]) {
                JoinOperator::Inner
            } else if self.parse_keyword("LEFT") {
                self.parse_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinOperator::Left
            } else if self.parse_keyword("RIGHT") {
                self.parse_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinOperator::Right
            } else if self.parse_keyword("FULL") {
                self.parse_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinOperator::Full
            } else if self.parse_keywords(&["CROSS", "JOIN"]) {
                JoinOperator::Cross
            } else if natural {
                return Err(self.error("expected JOIN after NATURAL"));
            } else {
                break;
            };

            let relation = self.parse_table_factor()?;
            let constraint = if natural {
                JoinConstraint::Natural
            } else if operator == JoinOperator::Cross {
                JoinConstraint::None
            } else if self.parse_keyword("ON") {
                JoinConstraint::On(self.parse_expr()?)
            } else if self.parse_keyword("USING") {
                JoinConstraint::Using(self.parse_parenthesized_identifiers()?)
            } else {
                JoinConstraint::None
            };
            joins.push(Join {
                operator,
                relation,
                constraint,
            });
        }
        Ok(TableWithJoins { relation, joins })
    }

    fn parse_table_factor(&mut self) -> KilnResult<TableFactor> {
        let lateral = self.parse_keyword("LATERAL");
        if self.consume(&TokenKind::LParen) {
            let subquery = self.parse_query()?;
            self.expect(&TokenKind::RParen, "')'")?;
            let alias = self.parse_optional_alias()?;
            return Ok(TableFactor::Derived {
                lateral,
                subquery: Box::new(subquery),
                alias,
            });
        }
        if lateral {
            return Err(self.error("expected '(' after LATERAL"));
        }
        let name = self.parse_object_name()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableFactor::Table { name, alias })
    }
}
