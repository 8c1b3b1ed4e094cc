mod rendering;

use crate::dialect::Dialect;
use crate::params::ParameterStyle;
use crate::parser::parse_sql;
use crate::transpiler::{CompiledPlan, compile};

/// Parse in `from`, compile for `to`.
fn transpile(sql: &str, from: Dialect, to: Dialect, style: ParameterStyle) -> CompiledPlan {
    let parsed = parse_sql(sql, from).unwrap();
    compile(&parsed.statement, to, style).unwrap()
}
