//! Placeholder numbering and naming for compiled output.
//!
//! The writer sees placeholders in render order and decides what each one
//! looks like in the target style and which output parameter slot, if any,
//! it opens:
//!
//! - sequential styles (`?`, `%s`) open one slot per occurrence;
//! - numbered styles (`$n`, `:n`) give each distinct caller parameter one
//!   number, in first-occurrence order, and reuse it;
//! - named styles keep caller names and synthesize `param_N` for positional
//!   parameters and lifted literals, skipping names already in use.
//!
//! Lifted literals always open a fresh slot.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ast::Placeholder;
use crate::params::{ParamRef, ParameterStyle, StyleFamily, Value};

/// Where an output parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotSource {
    /// The caller's argument.
    Param(ParamRef),
    /// A value lifted out of the SQL text.
    Literal(Value),
}

/// One output parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSlot {
    /// Output name, for named styles.
    pub name: Option<String>,
    pub source: SlotSource,
}

pub struct PlaceholderWriter {
    style: ParameterStyle,
    slots: Vec<ParamSlot>,
    numbers: HashMap<ParamRef, usize>,
    names: HashMap<ParamRef, String>,
    used_names: HashSet<String>,
    next_synthesized: usize,
}

impl PlaceholderWriter {
    /// `taken` are caller parameter names already present in the statement.
    pub fn new<I>(style: ParameterStyle, taken: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            style,
            slots: Vec::new(),
            numbers: HashMap::new(),
            names: HashMap::new(),
            used_names: taken.into_iter().collect(),
            next_synthesized: 0,
        }
    }

    pub fn style(&self) -> ParameterStyle {
        self.style
    }

    /// Render one placeholder occurrence.
    pub fn write(&mut self, placeholder: &Placeholder) -> String {
        match placeholder {
            Placeholder::Param(r) => self.write_param(r),
            Placeholder::Literal(value) => self.write_literal(value),
        }
    }

    fn write_param(&mut self, r: &ParamRef) -> String {
        match self.style.family() {
            StyleFamily::Sequential => {
                self.slots.push(ParamSlot {
                    name: None,
                    source: SlotSource::Param(r.clone()),
                });
                self.style.render(self.slots.len(), "")
            }
            StyleFamily::Numbered => {
                if let Some(number) = self.numbers.get(r) {
                    return self.style.render(*number, "");
                }
                self.slots.push(ParamSlot {
                    name: None,
                    source: SlotSource::Param(r.clone()),
                });
                let number = self.slots.len();
                self.numbers.insert(r.clone(), number);
                self.style.render(number, "")
            }
            StyleFamily::Named => {
                if let Some(name) = self.names.get(r) {
                    return self.style.render(0, name);
                }
                let name = match r {
                    ParamRef::Name(name) => {
                        self.used_names.insert(name.clone());
                        name.clone()
                    }
                    ParamRef::Position(_) => self.synthesize_name(),
                };
                self.names.insert(r.clone(), name.clone());
                self.slots.push(ParamSlot {
                    name: Some(name.clone()),
                    source: SlotSource::Param(r.clone()),
                });
                self.style.render(0, &name)
            }
        }
    }

    fn write_literal(&mut self, value: &Value) -> String {
        let name = self.style.is_named().then(|| self.synthesize_name());
        self.slots.push(ParamSlot {
            name: name.clone(),
            source: SlotSource::Literal(value.clone()),
        });
        self.style.render(self.slots.len(), name.as_deref().unwrap_or(""))
    }

    fn synthesize_name(&mut self) -> String {
        loop {
            self.next_synthesized += 1;
            let candidate = format!("param_{}", self.next_synthesized);
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub fn finish(self) -> Vec<ParamSlot> {
        self.slots
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn pos(i: usize) -> Placeholder {
        Placeholder::Param(ParamRef::Position(i))
    }

    fn name(n: &str) -> Placeholder {
        Placeholder::Param(ParamRef::Name(n.into()))
    }

    fn lit(n: i64) -> Placeholder {
        Placeholder::Literal(Value::Int(n))
    }

    #[test]
    fn test_sequential_repeats_slots() {
        let mut w = PlaceholderWriter::new(ParameterStyle::Qmark, []);
        let out: Vec<String> = [pos(0), pos(0), lit(5)].iter().map(|p| w.write(p)).collect();
        assert_eq!(out, vec!["?", "?", "?"]);
        assert_eq!(w.finish().len(), 3);
    }

    #[test]
    fn test_numbered_reuses_numbers_in_first_occurrence_order() {
        let mut w = PlaceholderWriter::new(ParameterStyle::Numeric, []);
        let out: Vec<String> = [pos(1), pos(0), pos(1), lit(7)].iter().map(|p| w.write(p)).collect();
        assert_eq!(out, vec!["$1", "$2", "$1", "$3"]);
        let slots = w.finish();
        assert_eq!(
            slots.iter().map(|s| s.source.clone()).collect::<Vec<_>>(),
            vec![
                SlotSource::Param(ParamRef::Position(1)),
                SlotSource::Param(ParamRef::Position(0)),
                SlotSource::Literal(Value::Int(7)),
            ]
        );
    }

    #[test]
    fn test_named_keeps_caller_names_and_avoids_collisions() {
        let mut w = PlaceholderWriter::new(ParameterStyle::NamedColon, ["param_1".to_string()]);
        let out: Vec<String> = [name("id"), lit(1), name("id"), pos(0)].iter().map(|p| w.write(p)).collect();
        assert_eq!(out, vec![":id", ":param_2", ":id", ":param_3"]);
        assert_eq!(w.finish().len(), 3);
    }

    #[test]
    fn test_pyformat_names() {
        let mut w = PlaceholderWriter::new(ParameterStyle::Pyformat, []);
        assert_eq!(w.write(&lit(1)), "%(param_1)s");
        assert_eq!(w.write(&name("user")), "%(user)s");
    }
}
