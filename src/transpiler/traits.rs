//! Transpiler traits and utilities.

use crate::ast::LockStrength;
use crate::dialect::Dialect;

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "order",
    "group",
    "user",
    "table",
    "select",
    "from",
    "where",
    "join",
    "left",
    "right",
    "inner",
    "outer",
    "on",
    "and",
    "or",
    "not",
    "null",
    "true",
    "false",
    "limit",
    "offset",
    "as",
    "in",
    "is",
    "like",
    "between",
    "having",
    "union",
    "all",
    "distinct",
    "case",
    "when",
    "then",
    "else",
    "end",
    "create",
    "alter",
    "drop",
    "insert",
    "update",
    "delete",
    "index",
    "key",
    "primary",
    "foreign",
    "references",
    "default",
    "constraint",
    "check",
];

/// Whether an unquoted identifier part must be quoted to survive rendering:
/// reserved words, special characters, or a leading digit. System variables
/// (`@@version`) are left alone.
pub fn needs_quoting(name: &str) -> bool {
    if name.starts_with("@@") {
        return false;
    }
    let lower = name.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || name.is_empty()
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_' && c != '$')
        || name.chars().next().map(|c| c.is_numeric()).unwrap_or(false)
}

/// Wrap `name` in `open`/`close`, doubling any embedded closing quote.
pub fn quote_with(name: &str, open: char, close: char) -> String {
    let doubled: String = [close, close].iter().collect();
    format!("{}{}{}", open, name.replace(close, &doubled), close)
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Quote an identifier part unconditionally.
    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"', '"')
    }

    /// Quote an identifier part only when required.
    fn escape_identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            self.quote_identifier(name)
        } else {
            name.to_string()
        }
    }

    /// Get the boolean literal (TRUE/FALSE vs 1/0).
    fn bool_literal(&self, val: bool) -> String {
        if val { "TRUE".to_string() } else { "FALSE".to_string() }
    }

    /// Render a string literal.
    fn string_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self.dialect().backslash_escapes() => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Generate string concatenation expression (e.g. `a || b` vs `CONCAT(a, b)`).
    fn string_concat(&self, parts: &[String]) -> String {
        parts.join(" || ")
    }

    /// Row limiting clause with a leading space, from rendered expressions.
    fn limit_offset(&self, limit: Option<&str>, offset: Option<&str>) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }

    /// Whether [`limit_offset`](Self::limit_offset) writes the offset first.
    fn offset_before_limit(&self) -> bool {
        false
    }

    /// Whether [`limit_offset`](Self::limit_offset) output needs an ORDER BY.
    fn limit_requires_order_by(&self) -> bool {
        false
    }

    /// Native case-insensitive LIKE operator, if any.
    fn fuzzy_operator(&self) -> Option<&str> {
        None
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn supports_full_join(&self) -> bool {
        true
    }

    /// `ON CONFLICT ... DO NOTHING | DO UPDATE`
    fn supports_on_conflict(&self) -> bool {
        false
    }

    /// `ON DUPLICATE KEY UPDATE`
    fn supports_duplicate_key(&self) -> bool {
        false
    }

    /// `->` and `->>`
    fn supports_json_arrows(&self) -> bool {
        false
    }

    /// `SELECT TOP n`
    fn supports_top(&self) -> bool {
        false
    }

    /// `SELECT DISTINCT ON (...)`
    fn supports_distinct_on(&self) -> bool {
        false
    }

    /// `ARRAY[...]`
    fn supports_array_literal(&self) -> bool {
        false
    }

    /// Row lock clauses (`FOR UPDATE`, `FOR SHARE`, ...).
    fn supports_lock_strength(&self, _strength: LockStrength) -> bool {
        false
    }

    /// `a IS [NOT] DISTINCT FROM b` from rendered operands.
    fn is_distinct_from(&self, left: &str, right: &str, negated: bool) -> String {
        format!("{} IS {}DISTINCT FROM {}", left, if negated { "NOT " } else { "" }, right)
    }

    /// Date part extraction from a rendered source. `None` when the dialect
    /// has no equivalent.
    fn extract(&self, field: &str, source: &str) -> Option<String> {
        Some(format!("EXTRACT({} FROM {})", field, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_quoting() {
        assert!(needs_quoting("order"));
        assert!(needs_quoting("User"));
        assert!(needs_quoting("my col"));
        assert!(needs_quoting("1st"));
        assert!(!needs_quoting("users"));
        assert!(!needs_quoting("created_at"));
        assert!(!needs_quoting("@@version"));
    }

    #[test]
    fn test_quote_with_doubles_closing_quote() {
        assert_eq!(quote_with("a\"b", '"', '"'), "\"a\"\"b\"");
        assert_eq!(quote_with("x]y", '[', ']'), "[x]]y]");
    }
}
