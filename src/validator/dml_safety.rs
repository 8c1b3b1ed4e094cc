//! Statements that touch every row of a table.

use super::{FindingKind, ValidationContext, ValidationFinding, Validator, constant_truth, snippet};
use crate::ast::{Expr, ObjectName, Statement};

#[derive(Debug, Clone, Copy, Default)]
pub struct DmlSafetyValidator;

impl DmlSafetyValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for DmlSafetyValidator {
    fn name(&self) -> &'static str {
        "dml_safety"
    }

    fn kind(&self) -> FindingKind {
        FindingKind::DmlSafety
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationFinding> {
        match ctx.statement {
            Statement::Update(update) => missing_where("UPDATE", &update.table, update.selection.as_ref()),
            Statement::Delete(delete) => missing_where("DELETE", &delete.table, delete.selection.as_ref()),
            Statement::Truncate(truncate) => truncate
                .names
                .iter()
                .map(|table| {
                    ValidationFinding::new(
                        FindingKind::DmlSafety,
                        "truncate",
                        format!("TRUNCATE removes every row of {}", table.normalized()),
                    )
                    .at("TRUNCATE", table.normalized())
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn missing_where(verb: &str, table: &ObjectName, selection: Option<&Expr>) -> Vec<ValidationFinding> {
    let message = match selection {
        None => format!("{} on {} has no WHERE clause", verb, table.normalized()),
        Some(predicate) if constant_truth(predicate) == Some(true) => format!(
            "{} on {} has a WHERE clause that is always true ({})",
            verb,
            table.normalized(),
            snippet(predicate)
        ),
        Some(_) => return Vec::new(),
    };
    vec![
        ValidationFinding::new(FindingKind::DmlSafety, "missing_where", message)
            .at(verb, table.normalized()),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::builders::*;
    use crate::dialect::Dialect;
    use crate::parser::parse_sql;

    fn run(statement: &Statement) -> Vec<ValidationFinding> {
        let ctx = ValidationContext {
            statement,
            comments: &[],
            dialect: Dialect::Postgres,
        };
        DmlSafetyValidator::new().validate(&ctx)
    }

    #[test]
    fn test_delete_without_where() {
        let findings = run(&delete("t", None));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "missing_where");
        assert_eq!(findings[0].message, "DELETE on t has no WHERE clause");
    }

    #[test]
    fn test_update_with_tautology_where() {
        let stmt = parse_sql("UPDATE accounts SET balance = 0 WHERE 1 = 1", Dialect::Postgres)
            .unwrap()
            .statement;
        let findings = run(&stmt);
        assert_eq!(
            findings[0].message,
            "UPDATE on accounts has a WHERE clause that is always true (1 = 1)"
        );
    }

    #[test]
    fn test_filtered_dml_and_truncate() {
        assert!(run(&delete("t", Some(eq(col("id"), param(0))))).is_empty());
        let stmt = parse_sql("TRUNCATE TABLE logs, audit", Dialect::Postgres).unwrap().statement;
        let codes: Vec<String> = run(&stmt).into_iter().map(|f| f.code).collect();
        assert_eq!(codes, vec!["truncate", "truncate"]);
    }
}
