//! Validators.
//!
//! Read-only passes over a parsed statement. Each validator reports
//! [`ValidationFinding`]s; whether a finding blocks compilation is decided by
//! [`ValidatorSettings`], per validator kind:
//!
//! | Kind | Default | Codes |
//! |------|---------|-------|
//! | security | block | `tautology`, `comment_truncation`, `union_exfiltration`, `dangerous_function` |
//! | performance | warn | `cartesian_product`, `select_star`, `unbounded_select`, `unfiltered_subselect` |
//! | dml_safety | block | `missing_where`, `truncate` |

mod dml_safety;
mod performance;
mod security;

pub use dml_safety::DmlSafetyValidator;
pub use performance::PerformanceValidator;
pub use security::SecurityValidator;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::{BinaryOperator, Expr, Literal, Statement, UnaryOperator};
use crate::dialect::Dialect;
use crate::error::{KilnError, KilnResult};
use crate::parser::tokens::Comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Security,
    Performance,
    DmlSafety,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FindingKind::Security => "security",
            FindingKind::Performance => "performance",
            FindingKind::DmlSafety => "dml_safety",
        })
    }
}

/// Whether a finding aborts compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Advisory,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Blocking => "blocking",
            Severity::Advisory => "advisory",
        })
    }
}

/// How a validator's findings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    Block,
    Warn,
    Off,
}

impl ValidatorMode {
    pub fn severity(&self) -> Option<Severity> {
        match self {
            ValidatorMode::Block => Some(Severity::Blocking),
            ValidatorMode::Warn => Some(Severity::Advisory),
            ValidatorMode::Off => None,
        }
    }
}

impl FromStr for ValidatorMode {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" | "blocking" => Ok(ValidatorMode::Block),
            "warn" | "advisory" => Ok(ValidatorMode::Warn),
            "off" | "none" => Ok(ValidatorMode::Off),
            other => Err(KilnError::config(format!(
                "unknown validator mode '{}' (expected block, warn or off)",
                other
            ))),
        }
    }
}

/// Per-kind severity overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub security: ValidatorMode,
    pub performance: ValidatorMode,
    pub dml_safety: ValidatorMode,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            security: ValidatorMode::Block,
            performance: ValidatorMode::Warn,
            dml_safety: ValidatorMode::Block,
        }
    }
}

impl ValidatorSettings {
    pub fn mode(&self, kind: FindingKind) -> ValidatorMode {
        match kind {
            FindingKind::Security => self.security,
            FindingKind::Performance => self.performance,
            FindingKind::DmlSafety => self.dml_safety,
        }
    }

    pub fn with_mode(mut self, kind: FindingKind, mode: ValidatorMode) -> Self {
        match kind {
            FindingKind::Security => self.security = mode,
            FindingKind::Performance => self.performance = mode,
            FindingKind::DmlSafety => self.dml_safety = mode,
        }
        self
    }
}

/// Where in the statement a finding applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Clause name, e.g. `WHERE` or `FROM`.
    pub clause: String,
    /// The offending fragment, rendered as SQL.
    pub snippet: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.clause, self.snippet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub severity: Severity,
    /// Stable identifier, e.g. `tautology`.
    pub code: String,
    pub message: String,
    pub location: Option<Location>,
}

impl ValidationFinding {
    /// An advisory finding; the runner assigns the configured severity.
    pub fn new(kind: FindingKind, code: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Advisory,
            code: code.to_string(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at(self, clause: &str, snippet: impl Into<String>) -> Self {
        Self {
            location: Some(Location {
                clause: clause.to_string(),
                snippet: snippet.into(),
            }),
            ..self
        }
    }

    pub fn with_severity(self, severity: Severity) -> Self {
        Self { severity, ..self }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}:{}] {}", self.severity, self.kind, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

/// What a validator sees.
pub struct ValidationContext<'a> {
    pub statement: &'a Statement,
    /// Comments from the source text; empty for builder-produced trees.
    pub comments: &'a [Comment],
    pub dialect: Dialect,
}

/// A read-only pass over a statement.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Which [`ValidatorSettings`] entry governs this validator.
    fn kind(&self) -> FindingKind;

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationFinding>;
}

/// Validators run in registration order.
pub struct ValidatorSet {
    validators: Vec<Box<dyn Validator>>,
}

impl Default for ValidatorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorSet {
    /// The three built-in validators.
    pub fn new() -> Self {
        let mut set = Self::empty();
        set.register(Box::new(SecurityValidator::new()));
        set.register(Box::new(PerformanceValidator::new()));
        set.register(Box::new(DmlSafetyValidator::new()));
        set
    }

    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn register(&mut self, validator: Box<dyn Validator>) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Registered validator names, for cache keys.
    pub fn fingerprint(&self) -> String {
        self.validators
            .iter()
            .map(|v| v.name())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Run every enabled validator once and stamp findings with the
    /// configured severity.
    pub fn run(&self, ctx: &ValidationContext<'_>, settings: &ValidatorSettings) -> ValidationReport {
        let mut findings = Vec::new();
        for validator in &self.validators {
            let Some(severity) = settings.mode(validator.kind()).severity() else {
                continue;
            };
            let found = validator.validate(ctx);
            tracing::trace!(validator = validator.name(), findings = found.len(), "validated");
            findings.extend(found.into_iter().map(|f| f.with_severity(severity)));
        }
        ValidationReport { findings }
    }
}

/// Findings from one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn has_blocking(&self) -> bool {
        self.findings.iter().any(ValidationFinding::is_blocking)
    }

    /// Fail with every blocking finding, or return the advisory ones.
    pub fn into_result(self) -> KilnResult<Vec<ValidationFinding>> {
        let (blocking, advisory): (Vec<_>, Vec<_>) =
            self.findings.into_iter().partition(ValidationFinding::is_blocking);
        if blocking.is_empty() {
            Ok(advisory)
        } else {
            Err(KilnError::Validation { findings: blocking })
        }
    }
}

/// Run the built-in validators over a statement.
pub fn validate(
    statement: &Statement,
    comments: &[Comment],
    dialect: Dialect,
    settings: &ValidatorSettings,
) -> ValidationReport {
    let ctx = ValidationContext {
        statement,
        comments,
        dialect,
    };
    ValidatorSet::new().run(&ctx, settings)
}

/// Truth value of an expression built only from constants, if it has one.
pub(crate) fn constant_truth(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Nested(inner) => constant_truth(inner),
        Expr::Literal(Literal::Boolean(b)) => Some(*b),
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => constant_truth(expr).map(|b| !b),
        Expr::IsNull { expr, negated } => match expr.unnested() {
            Expr::Literal(Literal::Null) => Some(!negated),
            Expr::Literal(_) => Some(*negated),
            _ => None,
        },
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => match (constant_truth(left), constant_truth(right)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            BinaryOperator::Or => match (constant_truth(left), constant_truth(right)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            op if op.is_comparison() => compare_literals(left.unnested(), *op, right.unnested()),
            _ => None,
        },
        _ => None,
    }
}

fn compare_literals(left: &Expr, op: BinaryOperator, right: &Expr) -> Option<bool> {
    let (Expr::Literal(l), Expr::Literal(r)) = (left, right) else {
        return None;
    };
    let ordering = match (l, r) {
        (Literal::Null, _) | (_, Literal::Null) => return None,
        (Literal::String(a), Literal::String(b)) => a.cmp(b),
        (Literal::Boolean(a), Literal::Boolean(b)) => a.cmp(b),
        _ => {
            let a = numeric(l)?;
            let b = numeric(r)?;
            a.partial_cmp(&b)?
        }
    };
    Some(match op {
        BinaryOperator::Eq => ordering.is_eq(),
        BinaryOperator::NotEq => ordering.is_ne(),
        BinaryOperator::Lt => ordering.is_lt(),
        BinaryOperator::LtEq => ordering.is_le(),
        BinaryOperator::Gt => ordering.is_gt(),
        BinaryOperator::GtEq => ordering.is_ge(),
        _ => return None,
    })
}

/// Numeric reading of a literal, with the loose string coercion most
/// engines apply when comparing a string to a number.
fn numeric(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Number(text) => text.parse().ok(),
        Literal::String(text) => text.trim().parse().ok(),
        Literal::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Literal::Null => None,
    }
}

/// Rendered SQL for a finding's location.
pub(crate) fn snippet(expr: &Expr) -> String {
    expr.to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_sql;

    fn predicate(sql: &str) -> Expr {
        let stmt = parse_sql(&format!("SELECT 1 FROM t WHERE {}", sql), Dialect::Postgres)
            .unwrap()
            .statement;
        let Statement::Query(q) = stmt else {
            panic!("expected a query");
        };
        let crate::ast::SetExpr::Select(s) = q.body else {
            panic!("expected a select");
        };
        s.selection.unwrap()
    }

    #[test]
    fn test_constant_truth() {
        assert_eq!(constant_truth(&predicate("1 = 1")), Some(true));
        assert_eq!(constant_truth(&predicate("'x' = 'x'")), Some(true));
        assert_eq!(constant_truth(&predicate("'1' = 1")), Some(true));
        assert_eq!(constant_truth(&predicate("2 > 3")), Some(false));
        assert_eq!(constant_truth(&predicate("NOT (1 <> 1)")), Some(true));
        assert_eq!(constant_truth(&predicate("a = 1 OR 2 >= 2")), Some(true));
        assert_eq!(constant_truth(&predicate("a = 1")), None);
        assert_eq!(constant_truth(&predicate("NULL = NULL")), None);
        assert_eq!(constant_truth(&predicate("NULL IS NULL")), Some(true));
    }

    #[test]
    fn test_modes_and_severity() {
        let settings = ValidatorSettings::default();
        assert_eq!(settings.mode(FindingKind::Security), ValidatorMode::Block);
        assert_eq!(settings.mode(FindingKind::Performance), ValidatorMode::Warn);
        let settings = settings.with_mode(FindingKind::DmlSafety, ValidatorMode::Off);
        assert_eq!(settings.dml_safety.severity(), None);
        assert_eq!("warn".parse::<ValidatorMode>().unwrap(), ValidatorMode::Warn);
        assert!("loud".parse::<ValidatorMode>().is_err());
    }

    #[test]
    fn test_report_collects_every_blocking_finding() {
        let parsed = parse_sql("DELETE FROM t WHERE a = 1 OR 1 = 1", Dialect::Postgres).unwrap();
        let report = validate(
            &parsed.statement,
            &parsed.comments,
            Dialect::Postgres,
            &ValidatorSettings::default(),
        );
        let err = report.into_result().unwrap_err();
        let codes: Vec<&str> = err.findings().iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["tautology", "missing_where"]);
    }

    #[test]
    fn test_off_validators_do_not_run() {
        let parsed = parse_sql("DELETE FROM t", Dialect::Postgres).unwrap();
        let settings = ValidatorSettings::default().with_mode(FindingKind::DmlSafety, ValidatorMode::Off);
        let report = validate(&parsed.statement, &parsed.comments, Dialect::Postgres, &settings);
        assert!(report.findings.is_empty());
    }
}
