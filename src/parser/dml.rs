//! INSERT, UPDATE and DELETE grammar.

use super::{Parser, TokenKind};
use crate::ast::*;
use crate::error::KilnResult;

impl Parser<'_> {
    pub(super) fn parse_insert(&mut self) -> KilnResult<Statement> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.parse_object_name()?;

        let columns_follow = self.peek() == &TokenKind::LParen
            && !self.peek_nth(1).is_keyword("SELECT")
            && !self.peek_nth(1).is_keyword("WITH");
        let columns = if columns_follow {
            self.parse_parenthesized_identifiers()?
        } else {
            Vec::new()
        };

        let source = if self.parse_keywords(&["DEFAULT", "VALUES"]) {
            InsertSource::DefaultValues
        } else if self.parse_keyword("VALUES") {
            InsertSource::Values(self.parse_comma_separated(Self::parse_values_row)?)
        } else if self.is_keyword("SELECT") || self.is_keyword("WITH") || self.peek() == &TokenKind::LParen {
            InsertSource::Query(Box::new(self.parse_query()?))
        } else {
            return Err(self.error("expected VALUES or a query"));
        };

        let on_conflict = if self.parse_keywords(&["ON", "CONFLICT"]) {
            let target = if self.peek() == &TokenKind::LParen {
                self.parse_parenthesized_identifiers()?
            } else {
                Vec::new()
            };
            self.expect_keyword("DO")?;
            let action = if self.parse_keyword("NOTHING") {
                ConflictAction::DoNothing
            } else {
                self.expect_keywords(&["UPDATE", "SET"])?;
                let assignments = self.parse_comma_separated(Self::parse_assignment)?;
                let selection = if self.parse_keyword("WHERE") {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                ConflictAction::DoUpdate {
                    assignments,
                    selection,
                }
            };
            Some(OnConflict::Conflict { target, action })
        } else if self.parse_keywords(&["ON", "DUPLICATE", "KEY", "UPDATE"]) {
            Some(OnConflict::DuplicateKeyUpdate(
                self.parse_comma_separated(Self::parse_assignment)?,
            ))
        } else {
            None
        };

        let returning = self.parse_returning()?;
        Ok(Statement::Insert(Insert {
            table,
            columns,
            source,
            on_conflict,
            returning,
        }))
    }

    pub(super) fn parse_update(&mut self) -> KilnResult<Statement> {
        self.expect_keyword("UPDATE")?;
        let table = self.parse_object_name()?;
        let alias = self.parse_optional_alias()?;
        self.expect_keyword("SET")?;
        let assignments = self.parse_comma_separated(Self::parse_assignment)?;
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
        let returning = self.parse_returning()?;
        Ok(Statement::Update(Update {
            table,
            alias,
            assignments,
            from,
            selection,
            returning,
        }))
    }

    pub(super) fn parse_delete(&mut self) -> KilnResult<Statement> {
        self.expect_keyword("DELETE")?;
        self.parse_keyword("FROM");
        let table = self.parse_object_name()?;
        let alias = self.parse_optional_alias()?;
        let using = if self.parse_keyword("USING") {
            self.parse_comma_separated(Self::parse_table_with_joins)?
        } else {
            Vec::new()
        };
        let selection = if self.parse_keyword("WHERE") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let returning = self.parse_returning()?;
        Ok(Statement::Delete(Delete {
            table,
            alias,
            using,
            selection,
            returning,
        }))
    }

    /// `col = expr`; a qualified target keeps only the column part.
    fn parse_assignment(&mut self) -> KilnResult<Assignment> {
        let mut column = self.parse_identifier()?;
        while self.consume(&TokenKind::Period) {
            column = self.parse_identifier()?;
        }
        self.expect(&TokenKind::Eq, "'='")?;
        let value = self.parse_expr()?;
        Ok(Assignment { column, value })
    }

    fn parse_returning(&mut self) -> KilnResult<Vec<SelectItem>> {
        if self.parse_keyword("RETURNING") {
            self.parse_comma_separated(Self::parse_select_item)
        } else {
            Ok(Vec::new())
        }
    }
}
