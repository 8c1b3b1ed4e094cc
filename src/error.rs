//! Error types for sqlkiln.

use std::fmt;

use thiserror::Error;

use crate::validator::ValidationFinding;

/// The main error type for pipeline operations.
///
/// Errors are `Clone` because a single compilation may be shared by every
/// caller waiting on the same cache fingerprint.
#[derive(Debug, Clone, Error)]
pub enum KilnError {
    /// Caller-supplied arguments do not match the extracted placeholders.
    #[error("Parameter mismatch: {0}")]
    ParameterMismatch(ParameterMismatch),

    /// SQL text is not valid in the declared dialect.
    #[error("Parse error at position {position} near '{token}': {message}")]
    Parse {
        position: usize,
        token: String,
        message: String,
    },

    /// One or more blocking validation findings.
    #[error("Validation failed with {} blocking finding(s): {}", .findings.len(), summarize(.findings))]
    Validation { findings: Vec<ValidationFinding> },

    /// The tree cannot be rendered in the requested dialect or style.
    #[error("Compilation error: {0}")]
    Compilation(String),

    /// A fingerprint matched an entry built from different key material.
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (config files).
    #[error("IO error: {0}")]
    Io(String),
}

impl KilnError {
    /// Create a parse error at the given byte position.
    pub fn parse(position: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            token: token.into(),
            message: message.into(),
        }
    }

    /// Create a compilation error.
    pub fn compilation(message: impl Into<String>) -> Self {
        Self::Compilation(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Blocking findings carried by a validation error.
    pub fn findings(&self) -> &[ValidationFinding] {
        match self {
            Self::Validation { findings } => findings,
            _ => &[],
        }
    }
}

impl From<ParameterMismatch> for KilnError {
    fn from(mismatch: ParameterMismatch) -> Self {
        Self::ParameterMismatch(mismatch)
    }
}

impl From<std::io::Error> for KilnError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

fn summarize(findings: &[ValidationFinding]) -> String {
    findings
        .iter()
        .map(|f| format!("[{}:{}] {}", f.kind, f.code, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Details of a caller/placeholder disagreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterMismatch {
    /// Positional argument count differs from the placeholder count.
    Count { expected: usize, supplied: usize },
    /// Named placeholders without a supplied value, and supplied names without a placeholder.
    Names {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Named arguments supplied for positional placeholders.
    ExpectedPositional { placeholders: usize },
    /// Positional arguments supplied for named placeholders.
    ExpectedNamed { names: Vec<String> },
    /// Placeholders from incompatible families in one statement.
    MixedStyles { styles: Vec<String> },
}

impl fmt::Display for ParameterMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { expected, supplied } => write!(
                f,
                "statement has {} positional placeholder(s) but {} argument(s) were supplied",
                expected, supplied
            ),
            Self::Names {
                missing,
                unexpected,
            } => {
                let mut parts = Vec::new();
                if !missing.is_empty() {
                    parts.push(format!("missing value(s) for {}", missing.join(", ")));
                }
                if !unexpected.is_empty() {
                    parts.push(format!(
                        "no placeholder for argument(s) {}",
                        unexpected.join(", ")
                    ));
                }
                write!(f, "{}", parts.join("; "))
            }
            Self::ExpectedPositional { placeholders } => write!(
                f,
                "named arguments supplied but the statement has {} positional placeholder(s)",
                placeholders
            ),
            Self::ExpectedNamed { names } => write!(
                f,
                "positional arguments supplied but the statement expects named values for {}",
                names.join(", ")
            ),
            Self::MixedStyles { styles } => write!(
                f,
                "positional and named placeholders cannot be mixed (found {})",
                styles.join(", ")
            ),
        }
    }
}

/// Result type alias for pipeline operations.
pub type KilnResult<T> = Result<T, KilnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KilnError::parse(5, "FORM", "expected FROM");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5 near 'FORM': expected FROM"
        );
    }

    #[test]
    fn test_mismatch_display() {
        let err = KilnError::from(ParameterMismatch::Count {
            expected: 2,
            supplied: 1,
        });
        assert_eq!(
            err.to_string(),
            "Parameter mismatch: statement has 2 positional placeholder(s) but 1 argument(s) were supplied"
        );

        let names = ParameterMismatch::Names {
            missing: vec!["id".into()],
            unexpected: vec!["name".into()],
        };
        assert_eq!(
            names.to_string(),
            "missing value(s) for id; no placeholder for argument(s) name"
        );
    }
}
