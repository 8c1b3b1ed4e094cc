//! CREATE, DROP, ALTER and TRUNCATE grammar.

use super::{Parser, TokenKind};
use crate::ast::*;
use crate::error::KilnResult;

impl Parser<'_> {
    pub(super) fn parse_create(&mut self) -> KilnResult<Statement> {
        self.expect_keyword("CREATE")?;
        let or_replace = self.parse_keywords(&["OR", "REPLACE"]);
        let temporary = self.parse_one_of(&["TEMP", "TEMPORARY"]).is_some();
        let unique = self.parse_keyword("UNIQUE");

        if self.parse_keyword("TABLE") {
            return self.parse_create_table(temporary);
        }
        if self.parse_keyword("INDEX") {
            return self.parse_create_index(unique);
        }
        if self.parse_keyword("VIEW") {
            let name = self.parse_object_name()?;
            let columns = if self.peek() == &TokenKind::LParen {
                self.parse_parenthesized_identifiers()?
            } else {
                Vec::new()
            };
            self.expect_keyword("AS")?;
            let query = self.parse_query()?;
            return Ok(Statement::CreateView(CreateView {
                or_replace,
                name,
                columns,
                query: Box::new(query),
            }));
        }
        Err(self.error("expected TABLE, INDEX or VIEW"))
    }

    fn parse_create_table(&mut self, temporary: bool) -> KilnResult<Statement> {
        let if_not_exists = self.parse_keywords(&["IF", "NOT", "EXISTS"]);
        let name = self.parse_object_name()?;

        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        let mut query = None;
        if self.parse_keyword("AS") {
            query = Some(Box::new(self.parse_query()?));
        } else {
            self.expect(&TokenKind::LParen, "'('")?;
            loop {
                if let Some(constraint) = self.parse_table_constraint()? {
                    constraints.push(constraint);
                } else {
                    columns.push(self.parse_column_def()?);
                }
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "')'")?;
        }
        Ok(Statement::CreateTable(CreateTable {
            temporary,
            if_not_exists,
            name,
            columns,
            constraints,
            query,
        }))
    }

    fn parse_create_index(&mut self, unique: bool) -> KilnResult<Statement> {
        let if_not_exists = self.parse_keywords(&["IF", "NOT", "EXISTS"]);
        let name = if self.is_keyword("ON") {
            None
        } else {
            Some(self.parse_identifier()?)
        };
        self.expect_keyword("ON")?;
        let table = self.parse_object_name()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let columns = self.parse_comma_separated(Self::parse_order_by_expr)?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Statement::CreateIndex(CreateIndex {
            unique,
            if_not_exists,
            name,
            table,
            columns,
        }))
    }

    pub(super) fn parse_column_def(&mut self) -> KilnResult<ColumnDef> {
        let name = self.parse_identifier()?;
        let data_type = self.parse_data_type()?;
        let mut options = Vec::new();
        loop {
            if self.parse_keyword("CONSTRAINT") {
                self.parse_identifier()?;
            }
            let option = if self.parse_keywords(&["NOT", "NULL"]) {
                ColumnOption::NotNull
            } else if self.parse_keyword("NULL") {
                ColumnOption::Null
            } else if self.parse_keywords(&["PRIMARY", "KEY"]) {
                ColumnOption::PrimaryKey
            } else if self.parse_keyword("UNIQUE") {
                ColumnOption::Unique
            } else if self.parse_keyword("DEFAULT") {
                ColumnOption::Default(self.parse_expr()?)
            } else if self.parse_keyword("CHECK") {
                ColumnOption::Check(self.parse_parenthesized_expr()?)
            } else if self.parse_keyword("REFERENCES") {
                let table = self.parse_object_name()?;
                let columns = if self.peek() == &TokenKind::LParen {
                    self.parse_parenthesized_identifiers()?
                } else {
                    Vec::new()
                };
                let on_delete = self.parse_on_delete()?;
                ColumnOption::References {
                    table,
                    columns,
                    on_delete,
                }
            } else if let Some(kw) = self.parse_one_of(&["AUTOINCREMENT", "AUTO_INCREMENT", "IDENTITY"]) {
                ColumnOption::AutoIncrement(kw)
            } else {
                break;
            };
            options.push(option);
        }
        Ok(ColumnDef {
            name,
            data_type,
            options,
        })
    }

    fn parse_table_constraint(&mut self) -> KilnResult<Option<TableConstraint>> {
        let starts_constraint = ["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK"]
            .iter()
            .any(|kw| self.is_keyword(kw));
        if !starts_constraint {
            return Ok(None);
        }
        let name = if self.parse_keyword("CONSTRAINT") {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let kind = if self.parse_keywords(&["PRIMARY", "KEY"]) {
            ConstraintKind::PrimaryKey(self.parse_parenthesized_identifiers()?)
        } else if self.parse_keyword("UNIQUE") {
            ConstraintKind::Unique(self.parse_parenthesized_identifiers()?)
        } else if self.parse_keywords(&["FOREIGN", "KEY"]) {
            let columns = self.parse_parenthesized_identifiers()?;
            self.expect_keyword("REFERENCES")?;
            let foreign_table = self.parse_object_name()?;
            let referred_columns = if self.peek() == &TokenKind::LParen {
                self.parse_parenthesized_identifiers()?
            } else {
                Vec::new()
            };
            let on_delete = self.parse_on_delete()?;
            ConstraintKind::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                on_delete,
            }
        } else if self.parse_keyword("CHECK") {
            ConstraintKind::Check(self.parse_parenthesized_expr()?)
        } else {
            return Err(self.error("expected PRIMARY KEY, UNIQUE, FOREIGN KEY or CHECK"));
        };
        Ok(Some(TableConstraint { name, kind }))
    }

    fn parse_on_delete(&mut self) -> KilnResult<Option<ReferentialAction>> {
        if !self.parse_keywords(&["ON", "DELETE"]) {
            return Ok(None);
        }
        let action = if self.parse_keyword("CASCADE") {
            ReferentialAction::Cascade
        } else if self.parse_keyword("RESTRICT") {
            ReferentialAction::Restrict
        } else if self.parse_keywords(&["SET", "NULL"]) {
            ReferentialAction::SetNull
        } else if self.parse_keywords(&["SET", "DEFAULT"]) {
            ReferentialAction::SetDefault
        } else if self.parse_keywords(&["NO", "ACTION"]) {
            ReferentialAction::NoAction
        } else {
            return Err(self.error("expected a referential action"));
        };
        Ok(Some(action))
    }

    fn parse_parenthesized_expr(&mut self) -> KilnResult<Expr> {
        self.expect(&TokenKind::LParen, "'('")?;
        let expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    pub(super) fn parse_drop(&mut self) -> KilnResult<Statement> {
        self.expect_keyword("DROP")?;
        let object_type = match self
            .parse_one_of(&["TABLE", "VIEW", "INDEX", "SCHEMA", "SEQUENCE"])
            .as_deref()
        {
            Some("TABLE") => ObjectType::Table,
            Some("VIEW") => ObjectType::View,
            Some("INDEX") => ObjectType::Index,
            Some("SCHEMA") => ObjectType::Schema,
            Some(_) => ObjectType::Sequence,
            None => return Err(self.error("expected TABLE, VIEW, INDEX, SCHEMA or SEQUENCE")),
        };
        let if_exists = self.parse_keywords(&["IF", "EXISTS"]);
        let names = self.parse_comma_separated(Self::parse_object_name)?;
        let cascade = self.parse_keyword("CASCADE");
        if !cascade {
            self.parse_keyword("RESTRICT");
        }
        Ok(Statement::Drop(Drop {
            object_type,
            if_exists,
            names,
            cascade,
        }))
    }

    pub(super) fn parse_alter(&mut self) -> KilnResult<Statement> {
        self.expect_keywords(&["ALTER", "TABLE"])?;
        let name = self.parse_object_name()?;
        let operations = self.parse_comma_separated(Self::parse_alter_operation)?;
        Ok(Statement::AlterTable(AlterTable { name, operations }))
    }

    fn parse_alter_operation(&mut self) -> KilnResult<AlterTableOperation> {
        if self.parse_keyword("ADD") {
            self.parse_keyword("COLUMN");
            return Ok(AlterTableOperation::AddColumn(self.parse_column_def()?));
        }
        if self.parse_keyword("DROP") {
            self.parse_keyword("COLUMN");
            let if_exists = self.parse_keywords(&["IF", "EXISTS"]);
            let name = self.parse_identifier()?;
            return Ok(AlterTableOperation::DropColumn { name, if_exists });
        }
        if self.parse_keyword("RENAME") {
            if self.parse_keyword("TO") {
                return Ok(AlterTableOperation::RenameTable(self.parse_object_name()?));
            }
            self.parse_keyword("COLUMN");
            let old = self.parse_identifier()?;
            self.expect_keyword("TO")?;
            let new = self.parse_identifier()?;
            return Ok(AlterTableOperation::RenameColumn { old, new });
        }
        if self.parse_keyword("ALTER") {
            self.parse_keyword("COLUMN");
            let name = self.parse_identifier()?;
            let change = if self.parse_keywords(&["SET", "DATA", "TYPE"]) || self.parse_keyword("TYPE") {
                ColumnChange::SetType(self.parse_data_type()?)
            } else if self.parse_keywords(&["SET", "DEFAULT"]) {
                ColumnChange::SetDefault(self.parse_expr()?)
            } else if self.parse_keywords(&["DROP", "DEFAULT"]) {
                ColumnChange::DropDefault
            } else if self.parse_keywords(&["SET", "NOT", "NULL"]) {
                ColumnChange::SetNotNull
            } else if self.parse_keywords(&["DROP", "NOT", "NULL"]) {
                ColumnChange::DropNotNull
            } else {
                return Err(self.error("expected TYPE, SET or DROP"));
            };
            return Ok(AlterTableOperation::AlterColumn { name, change });
        }
        Err(self.error("expected ADD, DROP, RENAME or ALTER"))
    }

    pub(super) fn parse_truncate(&mut self) -> KilnResult<Statement> {
        self.expect_keyword("TRUNCATE")?;
        self.parse_keyword("TABLE");
        let names = self.parse_comma_separated(Self::parse_object_name)?;
        Ok(Statement::Truncate(Truncate { names }))
    }
}
