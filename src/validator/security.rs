//! Injection-shaped patterns.

use super::{FindingKind, ValidationContext, ValidationFinding, Validator, constant_truth, snippet};
use crate::ast::visit::{self, Clause, Visitor};
use crate::ast::{
    BinaryOperator, Expr, ObjectName, Query, Select, SelectItem, SetExpr, SetOperator, TableFactor, TableWithJoins,
};
use crate::parser::tokens::Comment;

/// Functions that read files, run commands, reach other servers, or stall.
const DANGEROUS_FUNCTIONS: &[&str] = &[
    "xp_cmdshell",
    "xp_regread",
    "xp_dirtree",
    "sp_oacreate",
    "sp_execute_external_script",
    "pg_read_file",
    "pg_read_binary_file",
    "pg_ls_dir",
    "pg_sleep",
    "lo_import",
    "lo_export",
    "load_file",
    "sleep",
    "benchmark",
    "waitfor",
    "dblink",
    "dblink_exec",
    "utl_http.request",
    "utl_inaddr.get_host_address",
    "dbms_pipe.receive_message",
    "sys_exec",
    "sys_eval",
];

/// Schemas and tables holding catalog metadata.
const CATALOG_SCHEMAS: &[&str] = &["information_schema", "pg_catalog", "mysql", "sys", "performance_schema"];
const CATALOG_TABLES: &[&str] = &[
    "sqlite_master",
    "sqlite_schema",
    "sqlite_temp_master",
    "all_tables",
    "all_tab_columns",
    "user_tables",
    "user_tab_columns",
    "sysobjects",
    "syscolumns",
    "pg_user",
    "pg_shadow",
    "pg_authid",
    "pg_tables",
];

/// Words that make a trailing comment look like a cut-off statement.
const SQL_WORDS: &[&str] = &[
    "select", "union", "insert", "update", "delete", "drop", "where", " or ", " and ", "--",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityValidator;

impl SecurityValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for SecurityValidator {
    fn name(&self) -> &'static str {
        "security"
    }

    fn kind(&self) -> FindingKind {
        FindingKind::Security
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationFinding> {
        let mut walker = SecurityWalker {
            clause: None,
            findings: Vec::new(),
        };
        walker.visit_statement(ctx.statement);

        let mut findings = walker.findings;
        findings.extend(ctx.comments.iter().filter_map(comment_finding));
        findings
    }
}

fn finding(code: &str, message: impl Into<String>) -> ValidationFinding {
    ValidationFinding::new(FindingKind::Security, code, message)
}

struct SecurityWalker {
    clause: Option<Clause>,
    findings: Vec<ValidationFinding>,
}

impl Visitor for SecurityWalker {
    fn visit_query(&mut self, query: &Query) {
        self.check_union(&query.body);
        visit::walk_query(self, query);
    }

    fn visit_predicate(&mut self, clause: Clause, expr: &Expr) {
        let outer = self.clause.replace(clause);
        self.visit_expr(expr);
        self.clause = outer;
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryOp {
                op: BinaryOperator::Or,
                ..
            } => {
                // one finding per always-true disjunct, located at the whole chain
                let disjuncts = or_chain(expr);
                let clause = self.clause.map_or("expression", |c| c.as_str());
                for side in &disjuncts {
                    if constant_truth(side) == Some(true) {
                        self.findings.push(
                            finding(
                                "tautology",
                                format!("always-true condition 'OR {}'", snippet(side)),
                            )
                            .at(clause, snippet(expr)),
                        );
                    }
                }
                for side in disjuncts {
                    self.visit_expr(side);
                }
                return;
            }
            Expr::Function(function) if is_dangerous(&function.name) => {
                self.findings.push(
                    finding(
                        "dangerous_function",
                        format!("call to restricted function '{}'", function.name.normalized()),
                    )
                    .at(self.clause.map_or("expression", |c| c.as_str()), snippet(expr)),
                );
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

/// Operands of a chain of unparenthesized ORs, left to right.
fn or_chain(expr: &Expr) -> Vec<&Expr> {
    let mut out = Vec::new();
    let mut stack = vec![expr];
    while let Some(node) = stack.pop() {
        match node {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right,
            } => {
                stack.push(right.as_ref());
                stack.push(left.as_ref());
            }
            other => out.push(other),
        }
    }
    out
}

impl SecurityWalker {
    fn check_union(&mut self, body: &SetExpr) {
        let SetExpr::SetOperation {
            op: SetOperator::Union,
            ..
        } = body
        else {
            return;
        };
        let mut branches = Vec::new();
        union_branches(body, &mut branches);

        let any_reads_table = branches.iter().any(|s| !s.from.is_empty());
        for select in &branches {
            if let Some(table) = select.from.iter().flat_map(relations).find(|n| is_catalog(n)) {
                self.findings.push(
                    finding(
                        "union_exfiltration",
                        format!("UNION branch reads system catalog '{}'", table.normalized()),
                    )
                    .at("UNION", table.normalized()),
                );
            } else if any_reads_table && constant_projection(select) {
                self.findings.push(
                    finding(
                        "union_exfiltration",
                        "UNION branch projects only NULL or constant columns",
                    )
                    .at("UNION", projection_snippet(select)),
                );
            }
        }
    }
}

/// Selects joined by UNION at this level, left to right.
fn union_branches<'a>(body: &'a SetExpr, out: &mut Vec<&'a Select>) {
    match body {
        SetExpr::Select(select) => out.push(select),
        SetExpr::SetOperation { left, right, .. } => {
            union_branches(left, out);
            union_branches(right, out);
        }
        // nested set operations are checked when their own query is visited
        SetExpr::Query(query) => {
            if let SetExpr::Select(select) = &query.body {
                out.push(select);
            }
        }
        SetExpr::Values(_) => {}
    }
}

fn relations(table: &TableWithJoins) -> impl Iterator<Item = &ObjectName> {
    std::iter::once(&table.relation)
        .chain(table.joins.iter().map(|j| &j.relation))
        .filter_map(|factor| match factor {
            TableFactor::Table { name, .. } => Some(name),
            TableFactor::Derived { .. } => None,
        })
}

fn is_catalog(name: &ObjectName) -> bool {
    let base = name.base_name();
    let schema = name
        .0
        .len()
        .checked_sub(2)
        .and_then(|i| name.0.get(i))
        .map(|i| i.value.to_lowercase());
    schema.is_some_and(|s| CATALOG_SCHEMAS.contains(&s.as_str())) || CATALOG_TABLES.contains(&base.as_str())
}

fn constant_projection(select: &Select) -> bool {
    !select.projection.is_empty()
        && select.projection.iter().all(|item| match item {
            SelectItem::Expr { expr, .. } => matches!(
                expr.unnested(),
                Expr::Literal(_) | Expr::Placeholder(_) | Expr::TypedString { .. }
            ),
            _ => false,
        })
}

fn projection_snippet(select: &Select) -> String {
    select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::Expr { expr, .. } => snippet(expr),
            SelectItem::Wildcard => "*".to_string(),
            SelectItem::QualifiedWildcard(name) => format!("{}.*", name.normalized()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_dangerous(name: &ObjectName) -> bool {
    let full = name.normalized();
    DANGEROUS_FUNCTIONS.contains(&full.as_str()) || DANGEROUS_FUNCTIONS.contains(&name.base_name().as_str())
}

fn comment_finding(comment: &Comment) -> Option<ValidationFinding> {
    if comment.after_string {
        return Some(
            finding("comment_truncation", "comment directly follows a string literal")
                .at("comment", comment.text.clone()),
        );
    }
    if comment.block || !comment.trailing {
        return None;
    }
    let body = comment
        .text
        .trim_start_matches(['-', '#'])
        .to_lowercase();
    let suspicious = body.contains('\'')
        || body.contains('"')
        || body.contains(';')
        || SQL_WORDS.iter().any(|w| format!(" {} ", body).contains(w));
    suspicious.then(|| {
        finding("comment_truncation", "trailing comment hides SQL text")
            .at("comment", comment.text.clone())
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::dialect::Dialect;
    use crate::parser::parse_sql;

    fn codes(sql: &str, dialect: Dialect) -> Vec<String> {
        let parsed = parse_sql(sql, dialect).unwrap();
        let ctx = ValidationContext {
            statement: &parsed.statement,
            comments: &parsed.comments,
            dialect,
        };
        SecurityValidator::new()
            .validate(&ctx)
            .into_iter()
            .map(|f| f.code)
            .collect()
    }

    #[test]
    fn test_tautology_is_located() {
        let parsed = parse_sql("SELECT * FROM users WHERE id = 1 OR 1=1", Dialect::Postgres).unwrap();
        let ctx = ValidationContext {
            statement: &parsed.statement,
            comments: &parsed.comments,
            dialect: Dialect::Postgres,
        };
        let findings = SecurityValidator::new().validate(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "tautology");
        assert_eq!(findings[0].message, "always-true condition 'OR 1 = 1'");
        let location = findings[0].location.clone().unwrap();
        assert_eq!(location.clause, "WHERE");
        assert_eq!(location.snippet, "id = 1 OR 1 = 1");
    }

    #[test]
    fn test_tautology_in_or_chain_is_reported_once() {
        let parsed = parse_sql("SELECT * FROM t WHERE 1=1 OR a=1 OR b=2", Dialect::Postgres).unwrap();
        let ctx = ValidationContext {
            statement: &parsed.statement,
            comments: &parsed.comments,
            dialect: Dialect::Postgres,
        };
        let findings = SecurityValidator::new().validate(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "always-true condition 'OR 1 = 1'");
        assert_eq!(findings[0].location.clone().unwrap().snippet, "1 = 1 OR a = 1 OR b = 2");
    }

    #[test]
    fn test_each_tautology_in_chain_is_reported() {
        assert_eq!(
            codes("SELECT * FROM t WHERE a = 1 OR 'x'='x' OR b = 2 OR 2>1", Dialect::MySQL),
            vec!["tautology", "tautology"]
        );
        // a parenthesized chain is its own chain
        assert_eq!(
            codes("SELECT * FROM t WHERE a = 1 AND (b = 2 OR 1=1)", Dialect::Postgres),
            vec!["tautology"]
        );
    }

    #[test]
    fn test_string_tautology_in_subquery() {
        assert_eq!(
            codes(
                "SELECT id FROM a WHERE id IN (SELECT a_id FROM b WHERE name = $1 OR 'x' = 'x')",
                Dialect::Postgres
            ),
            vec!["tautology"]
        );
        assert!(codes("SELECT id FROM a WHERE x = 1 OR y = 2", Dialect::Postgres).is_empty());
        // a constant that is not a disjunct is left to other checks
        assert!(codes("SELECT id FROM a WHERE 1 = 1 AND x = 2", Dialect::Postgres).is_empty());
    }

    #[test]
    fn test_comment_truncation() {
        assert_eq!(
            codes("SELECT * FROM users WHERE name = 'admin'-- AND password = 'x'", Dialect::Postgres),
            vec!["comment_truncation"]
        );
        assert_eq!(
            codes("SELECT * FROM users WHERE id = 1 # ' OR ''='", Dialect::MySQL),
            vec!["comment_truncation"]
        );
        assert!(codes("SELECT * FROM users -- list everyone", Dialect::Postgres).is_empty());
        assert!(codes("SELECT /* hint */ id FROM users", Dialect::Postgres).is_empty());
    }

    #[test]
    fn test_union_exfiltration() {
        assert_eq!(
            codes(
                "SELECT name FROM products WHERE id = 1 UNION SELECT table_name FROM information_schema.tables",
                Dialect::Postgres
            ),
            vec!["union_exfiltration"]
        );
        assert_eq!(
            codes("SELECT a, b FROM t UNION ALL SELECT NULL, NULL", Dialect::Postgres),
            vec!["union_exfiltration"]
        );
        assert!(codes("SELECT a FROM t UNION SELECT a FROM u", Dialect::Postgres).is_empty());
    }

    #[test]
    fn test_dangerous_functions() {
        assert_eq!(
            codes("SELECT pg_sleep(10)", Dialect::Postgres),
            vec!["dangerous_function"]
        );
        assert_eq!(
            codes("SELECT * FROM t WHERE id = 1 AND sleep(5) = 0", Dialect::MySQL),
            vec!["dangerous_function"]
        );
        assert!(codes("SELECT lower(name) FROM t", Dialect::Postgres).is_empty());
    }
}
