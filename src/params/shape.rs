//! What a statement expects from its caller.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ParamRef, ParameterDescriptor, ParameterStyle, Params, StyleFamily};
use crate::error::ParameterMismatch;

/// The arguments a statement expects, derived once per statement and kept in
/// cached plans so a cache hit can check a call's arguments without
/// re-extracting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputShape {
    /// No placeholders.
    #[default]
    Empty,
    /// `count` positional arguments, one per occurrence.
    Sequential { count: usize },
    /// `count` positional arguments addressed by index.
    Numbered { count: usize },
    /// Named arguments.
    Named { names: BTreeSet<String> },
}

impl InputShape {
    /// Shape implied by extracted placeholders. Mixing families is an error.
    pub fn from_descriptors(descriptors: &[ParameterDescriptor]) -> Result<Self, ParameterMismatch> {
        let Some(first) = descriptors.first() else {
            return Ok(InputShape::Empty);
        };
        let family = first.style.family();
        if descriptors.iter().any(|d| d.style.family() != family) {
            let mut styles: Vec<String> = descriptors.iter().map(|d| d.style.to_string()).collect();
            styles.sort();
            styles.dedup();
            return Err(ParameterMismatch::MixedStyles { styles });
        }

        Ok(match family {
            StyleFamily::Sequential => InputShape::Sequential {
                count: descriptors.len(),
            },
            StyleFamily::Numbered => InputShape::Numbered {
                count: descriptors
                    .iter()
                    .filter_map(|d| d.position)
                    .max()
                    .map_or(0, |max| max + 1),
            },
            StyleFamily::Named => InputShape::Named {
                names: descriptors.iter().filter_map(|d| d.name.clone()).collect(),
            },
        })
    }

    /// As [`from_descriptors`](Self::from_descriptors), also rejecting any
    /// placeholder outside the family of the declared input style.
    pub fn from_declared(
        descriptors: &[ParameterDescriptor],
        declared: Option<ParameterStyle>,
    ) -> Result<Self, ParameterMismatch> {
        if let Some(declared) = declared {
            if descriptors.iter().any(|d| d.style.family() != declared.family()) {
                let mut styles: Vec<String> = descriptors.iter().map(|d| d.style.to_string()).collect();
                styles.push(declared.to_string());
                styles.sort();
                styles.dedup();
                return Err(ParameterMismatch::MixedStyles { styles });
            }
        }
        Self::from_descriptors(descriptors)
    }

    /// Shape implied by placeholder references in a tree.
    pub fn from_refs<'a>(refs: impl IntoIterator<Item = &'a ParamRef>) -> Result<Self, ParameterMismatch> {
        let mut max_position: Option<usize> = None;
        let mut names = BTreeSet::new();
        for r in refs {
            match r {
                ParamRef::Position(i) => {
                    max_position = Some(max_position.map_or(*i, |m| m.max(*i)));
                }
                ParamRef::Name(name) => {
                    names.insert(name.clone());
                }
            }
        }
        match (max_position, names.is_empty()) {
            (None, true) => Ok(InputShape::Empty),
            (Some(max), true) => Ok(InputShape::Numbered { count: max + 1 }),
            (None, false) => Ok(InputShape::Named { names }),
            (Some(_), false) => Err(ParameterMismatch::MixedStyles {
                styles: vec!["named".to_string(), "positional".to_string()],
            }),
        }
    }

    /// Number of distinct arguments expected.
    pub fn expected(&self) -> usize {
        match self {
            InputShape::Empty => 0,
            InputShape::Sequential { count } | InputShape::Numbered { count } => *count,
            InputShape::Named { names } => names.len(),
        }
    }

    /// Check caller arguments against this shape.
    pub fn check(&self, params: &Params) -> Result<(), ParameterMismatch> {
        match (self, params) {
            (InputShape::Empty, Params::None) => Ok(()),
            (InputShape::Empty, Params::Positional(values)) => expect_count(0, values.len()),
            (InputShape::Empty, Params::Named(values)) => {
                if values.is_empty() {
                    Ok(())
                } else {
                    Err(ParameterMismatch::Names {
                        missing: Vec::new(),
                        unexpected: values.keys().cloned().collect(),
                    })
                }
            }
            (InputShape::Sequential { count } | InputShape::Numbered { count }, params) => {
                match params {
                    Params::None => expect_count(*count, 0),
                    Params::Positional(values) => expect_count(*count, values.len()),
                    Params::Named(values) if values.is_empty() => expect_count(*count, 0),
                    Params::Named(_) => Err(ParameterMismatch::ExpectedPositional {
                        placeholders: *count,
                    }),
                }
            }
            (InputShape::Named { names }, params) => match params {
                Params::Named(values) => {
                    let missing: Vec<String> = names
                        .iter()
                        .filter(|n| !values.contains_key(*n))
                        .cloned()
                        .collect();
                    let unexpected: Vec<String> = values
                        .keys()
                        .filter(|k| !names.contains(*k))
                        .cloned()
                        .collect();
                    if missing.is_empty() && unexpected.is_empty() {
                        Ok(())
                    } else {
                        Err(ParameterMismatch::Names {
                            missing,
                            unexpected,
                        })
                    }
                }
                Params::Positional(values) if !values.is_empty() => {
                    Err(ParameterMismatch::ExpectedNamed {
                        names: names.iter().cloned().collect(),
                    })
                }
                _ => Err(ParameterMismatch::Names {
                    missing: names.iter().cloned().collect(),
                    unexpected: Vec::new(),
                }),
            },
        }
    }
}

fn expect_count(expected: usize, supplied: usize) -> Result<(), ParameterMismatch> {
    if expected == supplied {
        Ok(())
    } else {
        Err(ParameterMismatch::Count { expected, supplied })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::params::{ParameterExtractor, ParameterStyle};

    fn shape(sql: &str, styles: &[ParameterStyle]) -> Result<InputShape, ParameterMismatch> {
        let extractor = ParameterExtractor::new(Dialect::Generic, styles.iter().copied());
        InputShape::from_descriptors(&extractor.extract(sql))
    }

    #[test]
    fn test_numbered_shape_uses_highest_index() {
        let s = shape("SELECT $2, $1, $2", &[ParameterStyle::Numeric]).unwrap();
        assert_eq!(s, InputShape::Numbered { count: 2 });
        assert!(s.check(&Params::positional([1, 2])).is_ok());
        assert_eq!(
            s.check(&Params::positional([1])),
            Err(ParameterMismatch::Count {
                expected: 2,
                supplied: 1
            })
        );
    }

    #[test]
    fn test_mixed_families_rejected() {
        let err = shape(
            "SELECT * FROM t WHERE a = ? AND b = :b",
            &[ParameterStyle::Qmark, ParameterStyle::NamedColon],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParameterMismatch::MixedStyles {
                styles: vec!["named_colon".into(), "qmark".into()]
            }
        );
    }

    #[test]
    fn test_declared_style_restricts_family() {
        let extractor = ParameterExtractor::new(
            Dialect::Generic,
            [ParameterStyle::Qmark, ParameterStyle::NamedColon],
        );
        let descriptors = extractor.extract("SELECT * FROM t WHERE a = ?");
        assert_eq!(
            InputShape::from_declared(&descriptors, Some(ParameterStyle::NamedColon)),
            Err(ParameterMismatch::MixedStyles {
                styles: vec!["named_colon".into(), "qmark".into()]
            })
        );
        // same family is fine
        assert_eq!(
            InputShape::from_declared(&descriptors, Some(ParameterStyle::Format)),
            Ok(InputShape::Sequential { count: 1 })
        );
        assert_eq!(
            InputShape::from_declared(&descriptors, None),
            Ok(InputShape::Sequential { count: 1 })
        );
    }

    #[test]
    fn test_named_reports_missing_and_unexpected() {
        let s = shape("SELECT :a, @b", &[ParameterStyle::NamedColon, ParameterStyle::NamedAt]).unwrap();
        let err = s.check(&Params::named([("a", 1), ("c", 3)])).unwrap_err();
        assert_eq!(
            err,
            ParameterMismatch::Names {
                missing: vec!["b".into()],
                unexpected: vec!["c".into()]
            }
        );
        assert!(matches!(
            s.check(&Params::positional([1, 2])),
            Err(ParameterMismatch::ExpectedNamed { .. })
        ));
    }

    #[test]
    fn test_empty_shape() {
        assert!(InputShape::Empty.check(&Params::None).is_ok());
        assert!(InputShape::Empty.check(&Params::positional([1])).is_err());
    }
}
