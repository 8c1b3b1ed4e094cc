use pretty_assertions::assert_eq;

use super::transpile;
use crate::ast::builders::*;
use crate::dialect::Dialect;
use crate::params::{ParameterExtractor, ParameterStyle, Parameters, Params, Value};
use crate::transpiler::{compile, rewrite_placeholders};

#[test]
fn test_qmark_to_numeric() {
    let plan = transpile(
        "SELECT id FROM t WHERE x = ?",
        Dialect::Postgres,
        Dialect::Postgres,
        ParameterStyle::Numeric,
    );
    assert_eq!(plan.sql, "SELECT id FROM t WHERE x = $1");
    assert_eq!(
        plan.bind(&Params::positional([5])).unwrap(),
        Parameters::Positional(vec![Value::Int(5)])
    );
}

#[test]
fn test_numbered_input_reuse() {
    let sql = "SELECT * FROM t WHERE a = $2 OR b = $1 OR c = $2";
    let plan = transpile(sql, Dialect::Postgres, Dialect::SQLite, ParameterStyle::Qmark);
    assert_eq!(plan.sql, "SELECT * FROM t WHERE a = ? OR b = ? OR c = ?");
    assert_eq!(
        plan.bind(&Params::positional(["one", "two"])).unwrap(),
        Parameters::Positional(vec!["two".into(), "one".into(), "two".into()])
    );

    let plan = transpile(sql, Dialect::Postgres, Dialect::Postgres, ParameterStyle::Numeric);
    assert_eq!(plan.sql, "SELECT * FROM t WHERE a = $1 OR b = $2 OR c = $1");
    assert_eq!(plan.placeholder_count(), 2);
}

#[test]
fn test_positional_to_named() {
    let plan = transpile(
        "SELECT * FROM t WHERE a = ? AND b = ?",
        Dialect::Postgres,
        Dialect::SqlServer,
        ParameterStyle::NamedAt,
    );
    assert_eq!(plan.sql, "SELECT * FROM t WHERE a = @param_1 AND b = @param_2");
    let Parameters::Named(values) = plan.bind(&Params::positional([1, 2])).unwrap() else {
        panic!("expected named parameters");
    };
    assert_eq!(values.get("param_1"), Some(&Value::Int(1)));
    assert_eq!(values.get("param_2"), Some(&Value::Int(2)));
}

#[test]
fn test_named_keeps_caller_names() {
    let plan = transpile(
        "UPDATE users SET name = :name WHERE id = :id",
        Dialect::Postgres,
        Dialect::ClickHouse,
        ParameterStyle::Pyformat,
    );
    assert_eq!(plan.sql, "UPDATE users SET name = %(name)s WHERE id = %(id)s");
}

#[test]
fn test_percent_is_escaped_for_printf_targets() {
    let plan = transpile(
        "SELECT a % 2 FROM t WHERE name LIKE 'x%'",
        Dialect::Postgres,
        Dialect::MySQL,
        ParameterStyle::Format,
    );
    assert_eq!(plan.sql, "SELECT a %% 2 FROM t WHERE name LIKE 'x%%'");
}

#[test]
fn test_full_query_round_trips_unchanged() {
    let sql = "WITH r AS (SELECT id FROM a) \
               SELECT id, row_number() OVER (PARTITION BY g ORDER BY id DESC) AS rn FROM r \
               WHERE id IN (1, 2) GROUP BY id HAVING count(*) > 1 ORDER BY id LIMIT 5";
    let plan = transpile(sql, Dialect::Postgres, Dialect::Postgres, ParameterStyle::Numeric);
    assert_eq!(plan.sql, sql);

    let upsert = "INSERT INTO users (email) VALUES ($1) ON CONFLICT (email) DO NOTHING RETURNING id";
    assert_eq!(
        transpile(upsert, Dialect::Postgres, Dialect::Postgres, ParameterStyle::Numeric).sql,
        upsert
    );
}

#[test]
fn test_builder_trees_get_needed_parentheses() {
    let predicate = and(or(eq(col("a"), int(1)), eq(col("b"), int(2))), eq(col("c"), int(3)));
    assert_eq!(predicate.to_string(), "(a = 1 OR b = 2) AND c = 3");

    let query = select(&["id", "email"], "users").filter(eq(col("id"), param(0)));
    assert_eq!(query.to_string(), "SELECT id, email FROM users WHERE id = $1");
}

#[test]
fn test_compile_is_deterministic() {
    let stmt = crate::parser::parse_sql(
        "SELECT u.id FROM users u JOIN orders o ON o.uid = u.id WHERE o.total > $1 AND u.name = $2",
        Dialect::Postgres,
    )
    .unwrap()
    .statement;
    let first = compile(&stmt, Dialect::Postgres, ParameterStyle::NamedColon).unwrap();
    let second = compile(&stmt, Dialect::Postgres, ParameterStyle::NamedColon).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_lexical_rewrite() {
    let sql = "SELECT * FROM t WHERE a = :a AND b = :b";
    let descriptors = ParameterExtractor::for_dialect(Dialect::Postgres).extract(sql);
    let plan = rewrite_placeholders(sql, &descriptors, Dialect::Postgres, ParameterStyle::Qmark).unwrap();
    assert_eq!(plan.sql, "SELECT * FROM t WHERE a = ? AND b = ?");
    assert_eq!(
        plan.bind(&Params::named([("a", 1), ("b", 2)])).unwrap(),
        Parameters::Positional(vec![Value::Int(1), Value::Int(2)])
    );

    let sql = "SELECT * FROM t WHERE a LIKE '5%' AND b = ?";
    let descriptors = ParameterExtractor::for_dialect(Dialect::MySQL).extract(sql);
    assert!(rewrite_placeholders(sql, &descriptors, Dialect::MySQL, ParameterStyle::Format).is_err());
}
