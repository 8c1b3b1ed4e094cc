use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlkiln::ast::builders::{and, col, eq, int, param, select};
use sqlkiln::error::ParameterMismatch;
use sqlkiln::params::ParameterExtractor;
use sqlkiln::prelude::*;
use sqlkiln::transpiler::compile;

fn postgres() -> Arc<StatementConfig> {
    Arc::new(StatementConfig::for_dialect(Dialect::Postgres))
}

#[test]
fn test_qmark_input_numbered_output() {
    let pipeline = Pipeline::default();
    let stmt = Statement::sql("SELECT id FROM t WHERE x = ?", postgres()).bind(Params::positional([5]));
    let out = pipeline.compile(&stmt).unwrap();

    assert_eq!(out.sql, "SELECT id FROM t WHERE x = $1");
    assert_eq!(out.parameters, Parameters::Positional(vec![Value::Int(5)]));
    // unbounded read is advisory by default
    assert_eq!(
        out.findings.iter().map(|f| f.code.as_str()).collect::<Vec<_>>(),
        vec!["unbounded_select"]
    );
}

#[test]
fn test_second_compile_skips_the_parser() {
    let pipeline = Pipeline::default();
    let sql = "SELECT id FROM t WHERE x = ? LIMIT 10";
    let first = pipeline
        .compile(&Statement::sql(sql, postgres()).bind(Params::positional([1])))
        .unwrap();
    let second = pipeline
        .compile(&Statement::sql(sql, postgres()).bind(Params::positional([2])))
        .unwrap();

    assert_eq!(pipeline.parse_count(), 1);
    assert_eq!(first.sql, second.sql);
    assert_eq!(second.parameters, Parameters::Positional(vec![Value::Int(2)]));
}

#[test]
fn test_cache_hits_match_the_first_miss() {
    let pipeline = Pipeline::default();
    let stmt = Statement::sql(
        "SELECT u.id, o.total FROM users u JOIN orders o ON o.user_id = u.id WHERE u.id = $1 LIMIT 5",
        postgres(),
    )
    .bind(Params::positional([7]));

    let first = pipeline.compile(&stmt).unwrap();
    for _ in 0..5 {
        assert_eq!(pipeline.compile(&stmt).unwrap(), first);
    }
    let stats = pipeline.cache().stats();
    assert_eq!((stats.sql.misses, stats.sql.hits), (1, 5));
    assert_eq!(stats.ast.misses, 1);
}

#[test]
fn test_extraction_is_stable() {
    let extractor = ParameterExtractor::for_dialect(Dialect::Postgres);
    let sql = "SELECT ':not_me', $1 FROM t -- $2\nWHERE a = $2 AND b::text = $1";
    let once = extractor.extract(sql);
    let twice = extractor.extract(sql);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
}

#[test]
fn test_compiler_is_pure() {
    let parsed = sqlkiln::parse(
        "WITH recent AS (SELECT * FROM orders WHERE placed_at > $1) \
         SELECT customer_id, sum(total) OVER (PARTITION BY customer_id) FROM recent",
        Dialect::Postgres,
    )
    .unwrap();
    let a = compile(&parsed.statement, Dialect::MySQL, ParameterStyle::Qmark).unwrap();
    let b = compile(&parsed.statement, Dialect::MySQL, ParameterStyle::Qmark).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_placeholder_count_matches_parameters_everywhere() {
    let tree = select(&["a"], "t")
        .filter(and(eq(col("b"), param(0)), eq(col("c"), param(1))))
        .limit(int(1))
        .into_statement();

    for dialect in Dialect::ALL {
        for style in ParameterStyle::ALL {
            let config = StatementConfig::builder()
                .dialect(dialect)
                .target_style(style)
                .build()
                .unwrap();
            let out = Pipeline::default()
                .compile(&Statement::ast(tree.clone(), config).bind(Params::positional(["x", "y"])))
                .unwrap_or_else(|e| panic!("{} / {}: {}", dialect, style, e));

            let found = ParameterExtractor::new(Dialect::Generic, [style]).extract(&out.sql);
            assert_eq!(
                found.len(),
                out.parameters.len(),
                "{} / {}: {}",
                dialect,
                style,
                out.sql
            );
        }
    }
}

#[test]
fn test_missing_where_blocks_or_warns() {
    let pipeline = Pipeline::default();
    let err = pipeline
        .compile(&Statement::sql("DELETE FROM t", postgres()))
        .unwrap_err();
    let KilnError::Validation { findings } = err else {
        panic!("expected a validation error, got {:?}", err);
    };
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code, "missing_where");
    assert_eq!(findings[0].severity, Severity::Blocking);

    let warn = StatementConfig::builder()
        .validator(FindingKind::DmlSafety, ValidatorMode::Warn)
        .build()
        .unwrap();
    let out = pipeline.compile(&Statement::sql("DELETE FROM t", warn)).unwrap();
    assert_eq!(out.sql, "DELETE FROM t");
    assert_eq!(out.findings.len(), 1);
    assert_eq!(out.findings[0].severity, Severity::Advisory);
}

#[test]
fn test_failed_validation_is_not_cached() {
    let pipeline = Pipeline::default();
    for _ in 0..2 {
        assert!(pipeline.compile(&Statement::sql("DELETE FROM t", postgres())).is_err());
    }
    assert_eq!(pipeline.parse_count(), 2);
    assert_eq!(pipeline.cache().stats().total().entries, 0);
}

#[test]
fn test_tautology_is_blocked() {
    let pipeline = Pipeline::default();
    let err = pipeline
        .compile(&Statement::sql("SELECT * FROM users WHERE id = 1 OR 1=1", postgres()))
        .unwrap_err();

    let findings = err.findings();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, FindingKind::Security);
    assert_eq!(findings[0].code, "tautology");
    let location = findings[0].location.as_ref().unwrap();
    assert_eq!(location.clause, "WHERE");
    assert_eq!(location.snippet, "id = 1 OR 1 = 1");
}

#[test]
fn test_every_blocking_finding_is_reported() {
    let pipeline = Pipeline::default();
    let err = pipeline
        .compile(&Statement::sql("UPDATE accounts SET balance = 0 WHERE 1 = 1 OR x = 2", postgres()))
        .unwrap_err();
    let mut codes: Vec<&str> = err.findings().iter().map(|f| f.code.as_str()).collect();
    codes.sort();
    assert_eq!(codes, vec!["missing_where", "tautology"]);
}

#[test]
fn test_parameter_mismatches() {
    let pipeline = Pipeline::default();
    let sql = "SELECT id FROM t WHERE x = ? LIMIT 1";

    let err = pipeline
        .compile(&Statement::sql(sql, postgres()).bind(Params::positional([1, 2])))
        .unwrap_err();
    assert!(matches!(
        err,
        KilnError::ParameterMismatch(ParameterMismatch::Count {
            expected: 1,
            supplied: 2
        })
    ));

    let err = pipeline
        .compile(
            &Statement::sql("SELECT id FROM t WHERE x = :x LIMIT 1", postgres())
                .bind(Params::named([("x", 1), ("y", 2)])),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        KilnError::ParameterMismatch(ParameterMismatch::Names { ref missing, ref unexpected })
            if missing.is_empty() && unexpected == &vec!["y".to_string()]
    ));

    let err = pipeline
        .compile(&Statement::sql("SELECT id FROM t WHERE x = ? AND y = :y", postgres()))
        .unwrap_err();
    assert!(matches!(
        err,
        KilnError::ParameterMismatch(ParameterMismatch::MixedStyles { .. })
    ));
}

#[test]
fn test_declared_style_rejects_other_families() {
    let pipeline = Pipeline::default();
    let sql = "SELECT id FROM t WHERE x = ? LIMIT 1";
    assert!(pipeline
        .compile(&Statement::sql(sql, postgres()).bind(Params::positional([1])))
        .is_ok());

    let declared = StatementConfig::builder()
        .dialect(Dialect::Postgres)
        .parameter_style(ParameterStyle::NamedColon)
        .build()
        .unwrap();
    let err = pipeline
        .compile(&Statement::sql(sql, declared).bind(Params::positional([1])))
        .unwrap_err();
    assert!(matches!(
        err,
        KilnError::ParameterMismatch(ParameterMismatch::MixedStyles { ref styles })
            if styles == &vec!["named_colon".to_string(), "qmark".to_string()]
    ));

    let text_only = StatementConfig::builder()
        .dialect(Dialect::Postgres)
        .text_only()
        .parameter_style(ParameterStyle::NamedColon)
        .build()
        .unwrap();
    let err = pipeline
        .compile(&Statement::sql(sql, text_only).bind(Params::positional([1])))
        .unwrap_err();
    assert!(matches!(
        err,
        KilnError::ParameterMismatch(ParameterMismatch::MixedStyles { .. })
    ));

    let named = StatementConfig::builder()
        .dialect(Dialect::Postgres)
        .parameter_style(ParameterStyle::NamedColon)
        .build()
        .unwrap();
    let out = pipeline
        .compile(&Statement::sql("SELECT id FROM t WHERE x = :x LIMIT 1", named).bind(Params::named([("x", 1)])))
        .unwrap();
    assert_eq!(out.sql, "SELECT id FROM t WHERE x = $1 LIMIT 1");
}

#[test]
fn test_long_predicate_chains() {
    let pipeline = Pipeline::default();
    let terms: Vec<String> = (0..40).map(|i| format!("status = {}", i)).collect();
    let sql = format!("SELECT id FROM t WHERE {} LIMIT 1", terms.join(" OR "));
    let out = pipeline.compile(&Statement::sql(sql.as_str(), postgres())).unwrap();
    assert_eq!(out.sql, sql);

    // deeper than the parser allows: an error, not a crash
    let unchecked = StatementConfig::builder()
        .dialect(Dialect::Postgres)
        .validation(false)
        .build()
        .unwrap();
    let terms: Vec<String> = (0..5000).map(|i| format!("status = {}", i)).collect();
    let sql = format!("SELECT id FROM t WHERE {}", terms.join(" OR "));
    let err = pipeline
        .compile(&Statement::sql(sql.as_str(), unchecked))
        .unwrap_err();
    assert!(matches!(err, KilnError::Parse { .. }), "{:?}", err);
}

#[test]
fn test_parse_errors_fail_closed() {
    let err = Pipeline::default()
        .compile(&Statement::sql("SELECT id FROM WHERE", postgres()))
        .unwrap_err();
    assert!(matches!(err, KilnError::Parse { .. }), "{:?}", err);
}

#[test]
fn test_literal_parameterization_shares_sql() {
    let pipeline = Pipeline::default();
    let config = Arc::new(
        StatementConfig::builder()
            .dialect(Dialect::MySQL)
            .literal_parameterization(true)
            .build()
            .unwrap(),
    );

    let a = pipeline
        .compile(&Statement::sql(
            "SELECT name FROM users WHERE id = 5 AND status = 'active' LIMIT 10",
            Arc::clone(&config),
        ))
        .unwrap();
    let b = pipeline
        .compile(&Statement::sql(
            "SELECT name FROM users WHERE id = 6 AND status = 'gone' LIMIT 10",
            config,
        ))
        .unwrap();

    assert_eq!(a.sql, "SELECT name FROM users WHERE id = ? AND status = ? LIMIT 10");
    assert_eq!(a.sql, b.sql);
    // plans are keyed by source text, so each literal variant parses once
    assert_eq!(pipeline.parse_count(), 2);
    assert_eq!(
        a.parameters,
        Parameters::Positional(vec![Value::Int(5), Value::from("active")])
    );
    assert_eq!(
        b.parameters,
        Parameters::Positional(vec![Value::Int(6), Value::from("gone")])
    );
}

#[test]
fn test_custom_transformer_then_literals() {
    let pipeline = Pipeline::default().with_transformer(SoftDeleteFilter::new("users", "deleted_at"));
    let config = StatementConfig::builder()
        .literal_parameterization(true)
        .build()
        .unwrap();
    let out = pipeline
        .compile(&Statement::sql("SELECT id FROM users WHERE name = 'bob' LIMIT 1", config))
        .unwrap();
    assert_eq!(
        out.sql,
        "SELECT id FROM users WHERE name = $1 AND deleted_at IS NULL LIMIT 1"
    );
    assert_eq!(out.parameters, Parameters::Positional(vec![Value::from("bob")]));
}

#[test]
fn test_named_output_keeps_caller_names() {
    let config = StatementConfig::builder()
        .dialect(Dialect::Postgres)
        .target_style(ParameterStyle::NamedAt)
        .literal_parameterization(true)
        .build()
        .unwrap();
    let out = Pipeline::default()
        .compile(
            &Statement::sql("SELECT id FROM t WHERE owner = :owner AND kind = 'a' LIMIT 1", config)
                .bind(Params::named([("owner", 3)])),
        )
        .unwrap();

    assert_eq!(out.sql, "SELECT id FROM t WHERE owner = @owner AND kind = @param_1 LIMIT 1");
    let map = out.parameters.as_map().unwrap();
    assert_eq!(map.get("owner"), Some(&Value::Int(3)));
    assert_eq!(map.get("param_1"), Some(&Value::from("a")));
}

#[test]
fn test_file_queries_follow_their_checksum() {
    let pipeline = Pipeline::default();
    let v1 = LoadedQuery::new("get_user", "SELECT id FROM users WHERE id = ? LIMIT 1");
    let v2 = LoadedQuery::new("get_user", "SELECT id, email FROM users WHERE id = ? LIMIT 1");

    let out = pipeline
        .compile(&Statement::file(v1.clone(), postgres()).bind(Params::positional([1])))
        .unwrap();
    assert_eq!(out.sql, "SELECT id FROM users WHERE id = $1 LIMIT 1");
    pipeline
        .compile(&Statement::file(v1, postgres()).bind(Params::positional([1])))
        .unwrap();
    assert_eq!(pipeline.cache().stats().file.hits, 1);

    let out = pipeline
        .compile(&Statement::file(v2, postgres()).bind(Params::positional([1])))
        .unwrap();
    assert_eq!(out.sql, "SELECT id, email FROM users WHERE id = $1 LIMIT 1");
    assert_eq!(pipeline.cache().stats().file.entries, 1);
}

#[test]
fn test_file_dialect_override_translates() {
    let query = LoadedQuery::new("recent", "SELECT TOP 5 id FROM events WHERE kind = @kind ORDER BY id")
        .with_dialect(Dialect::SqlServer);
    let out = Pipeline::default()
        .compile(&Statement::file(query, postgres()).bind(Params::named([("kind", "click")])))
        .unwrap();
    assert_eq!(out.sql, "SELECT id FROM events WHERE kind = $1 ORDER BY id LIMIT 5");
    assert_eq!(out.dialect, Dialect::Postgres);
}

#[test]
fn test_clear_forces_recompile() {
    let pipeline = Pipeline::default();
    let stmt = Statement::sql("SELECT 1 LIMIT 1", postgres());
    pipeline.compile(&stmt).unwrap();
    pipeline.cache().clear();
    pipeline.compile(&stmt).unwrap();
    assert_eq!(pipeline.parse_count(), 2);
}

#[test]
fn test_transpile_shortcut() {
    assert_eq!(
        sqlkiln::transpile("SELECT a || b FROM t WHERE c = $1", Dialect::Postgres, Dialect::MySQL).unwrap(),
        "SELECT CONCAT(a, b) FROM t WHERE c = ?"
    );
}
