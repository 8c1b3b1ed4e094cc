//! Parameters: placeholder styles, extracted descriptors, caller input and
//! compiled output.
//!
//! | Style             | Syntax      | Family     |
//! |-------------------|-------------|------------|
//! | `qmark`           | `?`         | sequential |
//! | `format`          | `%s`        | sequential |
//! | `numeric`         | `$1`        | numbered   |
//! | `positional_colon`| `:1`        | numbered   |
//! | `named_colon`     | `:name`     | named      |
//! | `named_at`        | `@name`     | named      |
//! | `named_dollar`    | `$name`     | named      |
//! | `pyformat`        | `%(name)s`  | named      |

mod extractor;
mod shape;
mod value;

pub use extractor::ParameterExtractor;
pub use shape::InputShape;
pub use value::{SemanticType, Value};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KilnError, KilnResult};

/// Textual convention used for placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStyle {
    Qmark,
    Numeric,
    NamedColon,
    PositionalColon,
    NamedAt,
    NamedDollar,
    Format,
    Pyformat,
}

/// How placeholders of a style are matched to caller arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleFamily {
    /// Each occurrence consumes the next argument.
    Sequential,
    /// Occurrences carry a 1-based argument index.
    Numbered,
    /// Occurrences carry an argument name.
    Named,
}

impl ParameterStyle {
    pub const ALL: [ParameterStyle; 8] = [
        ParameterStyle::Qmark,
        ParameterStyle::Numeric,
        ParameterStyle::NamedColon,
        ParameterStyle::PositionalColon,
        ParameterStyle::NamedAt,
        ParameterStyle::NamedDollar,
        ParameterStyle::Format,
        ParameterStyle::Pyformat,
    ];

    pub fn family(&self) -> StyleFamily {
        match self {
            ParameterStyle::Qmark | ParameterStyle::Format => StyleFamily::Sequential,
            ParameterStyle::Numeric | ParameterStyle::PositionalColon => StyleFamily::Numbered,
            ParameterStyle::NamedColon
            | ParameterStyle::NamedAt
            | ParameterStyle::NamedDollar
            | ParameterStyle::Pyformat => StyleFamily::Named,
        }
    }

    /// Whether compiled parameters for this style are a name-keyed map.
    pub fn is_named(&self) -> bool {
        self.family() == StyleFamily::Named
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParameterStyle::Qmark => "qmark",
            ParameterStyle::Numeric => "numeric",
            ParameterStyle::NamedColon => "named_colon",
            ParameterStyle::PositionalColon => "positional_colon",
            ParameterStyle::NamedAt => "named_at",
            ParameterStyle::NamedDollar => "named_dollar",
            ParameterStyle::Format => "format",
            ParameterStyle::Pyformat => "pyformat",
        }
    }

    /// Render a placeholder. `number` is 1-based; `name` is used by named styles.
    pub fn render(&self, number: usize, name: &str) -> String {
        match self {
            ParameterStyle::Qmark => "?".to_string(),
            ParameterStyle::Format => "%s".to_string(),
            ParameterStyle::Numeric => format!("${}", number),
            ParameterStyle::PositionalColon => format!(":{}", number),
            ParameterStyle::NamedColon => format!(":{}", name),
            ParameterStyle::NamedAt => format!("@{}", name),
            ParameterStyle::NamedDollar => format!("${}", name),
            ParameterStyle::Pyformat => format!("%({})s", name),
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterStyle {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let style = match s.trim().to_ascii_lowercase().as_str() {
            "qmark" | "?" => ParameterStyle::Qmark,
            "numeric" | "$1" | "numbered" => ParameterStyle::Numeric,
            "named_colon" | ":name" => ParameterStyle::NamedColon,
            "positional_colon" | ":1" => ParameterStyle::PositionalColon,
            "named_at" | "@name" => ParameterStyle::NamedAt,
            "named_dollar" | "$name" => ParameterStyle::NamedDollar,
            "format" | "%s" => ParameterStyle::Format,
            "pyformat" | "%(name)s" => ParameterStyle::Pyformat,
            other => {
                return Err(KilnError::config(format!("unknown parameter style '{}'", other)));
            }
        };
        Ok(style)
    }
}

/// How a placeholder is bound by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRef {
    /// 0-based argument index.
    Position(usize),
    /// Argument name.
    Name(String),
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRef::Position(i) => write!(f, "#{}", i + 1),
            ParamRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Byte range of a placeholder in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One placeholder occurrence found by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Occurrence order in the text, 0-based.
    pub ordinal: usize,
    pub style: ParameterStyle,
    /// 0-based argument index for sequential and numbered styles.
    pub position: Option<usize>,
    /// Argument name for named styles.
    pub name: Option<String>,
    pub span: Span,
    /// Bound value, once bound.
    pub value: Option<Value>,
    pub semantic_type: SemanticType,
}

impl ParameterDescriptor {
    /// The caller-binding key of this occurrence.
    pub fn key(&self) -> ParamRef {
        match (&self.name, self.position) {
            (Some(name), _) => ParamRef::Name(name.clone()),
            (None, Some(position)) => ParamRef::Position(position),
            (None, None) => ParamRef::Position(self.ordinal),
        }
    }
}

/// Bind caller values onto extracted descriptors.
///
/// Fails with a parameter mismatch before any value is attached.
pub fn bind_descriptors(
    descriptors: &[ParameterDescriptor],
    params: &Params,
) -> KilnResult<Vec<ParameterDescriptor>> {
    InputShape::from_descriptors(descriptors)?.check(params)?;
    Ok(descriptors
        .iter()
        .map(|d| {
            let value = params.get(&d.key()).cloned();
            let semantic_type = value
                .as_ref()
                .map(Value::semantic_type)
                .unwrap_or_default();
            ParameterDescriptor {
                value,
                semantic_type,
                ..d.clone()
            }
        })
        .collect())
}

/// Values supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &ParamRef) -> Option<&Value> {
        match (self, key) {
            (Params::Positional(values), ParamRef::Position(i)) => values.get(*i),
            (Params::Named(values), ParamRef::Name(name)) => values.get(name),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compiled parameters, shaped by the target style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Parameters {
    pub fn len(&self) -> usize {
        match self {
            Parameters::Positional(values) => values.len(),
            Parameters::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Parameters::Positional(values) => Some(values),
            Parameters::Named(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Parameters::Named(values) => Some(values),
            Parameters::Positional(_) => None,
        }
    }

    /// Semantic types in output order (map order for named output).
    pub fn semantic_types(&self) -> Vec<SemanticType> {
        match self {
            Parameters::Positional(values) => values.iter().map(Value::semantic_type).collect(),
            Parameters::Named(values) => values.values().map(Value::semantic_type).collect(),
        }
    }
}
