//! SQL Transpiler.
//!
//! Renders a tree for a target dialect and placeholder style. Output is a
//! pure function of (tree, dialect, style): the same inputs always give
//! byte-identical SQL and the same slot list, which is what makes compiled
//! plans safe to cache.

pub mod placeholders;
mod render;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Placeholder, Query, Statement};
use crate::dialect::Dialect;
use crate::error::{KilnError, KilnResult};
use crate::params::{InputShape, ParamRef, ParameterDescriptor, ParameterStyle, Parameters, Params, Value};

pub use placeholders::{ParamSlot, PlaceholderWriter, SlotSource};
pub use traits::{RESERVED_WORDS, SqlGenerator, needs_quoting};

use render::Renderer;

/// SQL text plus the recipe for building its parameters from caller input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
    pub sql: String,
    pub dialect: Dialect,
    pub style: ParameterStyle,
    /// Output parameters in placeholder order.
    pub slots: Vec<ParamSlot>,
    /// Arguments the caller must supply.
    pub shape: InputShape,
}

impl CompiledPlan {
    /// Build output parameters for one call.
    ///
    /// The caller's arguments are checked against [`shape`](Self::shape)
    /// first, so a cached plan still rejects a wrong argument list.
    pub fn bind(&self, params: &Params) -> KilnResult<Parameters> {
        self.shape.check(params)?;
        if self.style.is_named() {
            let mut values = BTreeMap::new();
            for slot in &self.slots {
                let name = slot
                    .name
                    .clone()
                    .ok_or_else(|| KilnError::compilation("named output slot without a name"))?;
                values.insert(name, self.slot_value(slot, params)?);
            }
            Ok(Parameters::Named(values))
        } else {
            let mut values = Vec::with_capacity(self.slots.len());
            for slot in &self.slots {
                values.push(self.slot_value(slot, params)?);
            }
            Ok(Parameters::Positional(values))
        }
    }

    fn slot_value(&self, slot: &ParamSlot, params: &Params) -> KilnResult<Value> {
        match &slot.source {
            SlotSource::Literal(value) => Ok(value.clone()),
            SlotSource::Param(r) => params
                .get(r)
                .cloned()
                .ok_or_else(|| KilnError::compilation(format!("no value bound for parameter {}", r))),
        }
    }

    /// Number of distinct placeholders in [`sql`](Self::sql).
    pub fn placeholder_count(&self) -> usize {
        self.slots.len()
    }
}

/// Compile a tree for `dialect`, writing placeholders in `style`.
pub fn compile(statement: &Statement, dialect: Dialect, style: ParameterStyle) -> KilnResult<CompiledPlan> {
    let refs = statement.param_refs();
    let shape = InputShape::from_refs(&refs)?;
    let taken = refs.iter().filter_map(|r| match r {
        ParamRef::Name(name) => Some(name.clone()),
        ParamRef::Position(_) => None,
    });
    let generator = dialect.generator();
    let mut renderer = Renderer::new(generator.as_ref(), PlaceholderWriter::new(style, taken));
    let sql = renderer.statement(statement)?;
    let slots = renderer.into_writer().finish();
    tracing::debug!(dialect = %dialect, style = %style, params = slots.len(), "compiled statement");
    Ok(CompiledPlan {
        sql,
        dialect,
        style,
        slots,
        shape,
    })
}

/// Rewrite placeholders in place without parsing.
///
/// Used when parsing is disabled: the text between placeholders is copied
/// verbatim, so a target style that needs `%` escaping is refused unless the
/// source already used printf-style placeholders.
pub fn rewrite_placeholders(
    sql: &str,
    descriptors: &[ParameterDescriptor],
    dialect: Dialect,
    style: ParameterStyle,
) -> KilnResult<CompiledPlan> {
    let shape = InputShape::from_descriptors(descriptors)?;
    let printf_target = matches!(style, ParameterStyle::Format | ParameterStyle::Pyformat);
    let printf_source = descriptors
        .iter()
        .any(|d| matches!(d.style, ParameterStyle::Format | ParameterStyle::Pyformat));

    let taken = descriptors.iter().filter_map(|d| d.name.clone());
    let mut writer = PlaceholderWriter::new(style, taken);
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for descriptor in descriptors {
        let between = &sql[cursor..descriptor.span.start];
        if printf_target && !printf_source && between.contains('%') {
            return Err(KilnError::compilation(
                "cannot escape '%' for a printf-style target without parsing",
            ));
        }
        out.push_str(between);
        out.push_str(&writer.write(&Placeholder::Param(descriptor.key())));
        cursor = descriptor.span.end;
    }
    let tail = &sql[cursor..];
    if printf_target && !printf_source && tail.contains('%') {
        return Err(KilnError::compilation(
            "cannot escape '%' for a printf-style target without parsing",
        ));
    }
    out.push_str(tail);

    Ok(CompiledPlan {
        sql: out,
        dialect,
        style,
        slots: writer.finish(),
        shape,
    })
}

fn display_renderer_output<F>(f: F) -> KilnResult<String>
where
    F: FnOnce(&mut Renderer<'_>) -> KilnResult<String>,
{
    let generator = sql::GenericGenerator::new();
    let mut renderer = Renderer::new(
        &generator,
        PlaceholderWriter::new(ParameterStyle::Numeric, std::iter::empty()),
    );
    f(&mut renderer)
}

/// Generic-dialect text with `$n` placeholders, as used by `Display`.
pub fn display_statement(statement: &Statement) -> KilnResult<String> {
    display_renderer_output(|r| r.statement(statement))
}

pub fn display_query(query: &Query) -> KilnResult<String> {
    display_renderer_output(|r| r.query(query))
}

pub fn display_expr(expr: &Expr) -> KilnResult<String> {
    display_renderer_output(|r| r.expr(expr))
}
