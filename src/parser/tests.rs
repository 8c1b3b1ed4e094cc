use pretty_assertions::assert_eq;

use super::*;
use crate::ast::builders::*;
use crate::ast::*;
use crate::params::ParamRef;

fn parse_pg(sql: &str) -> Statement {
    parse_sql(sql, Dialect::Postgres).unwrap().statement
}

fn query(sql: &str, dialect: Dialect) -> Query {
    match parse_sql(sql, dialect).unwrap().statement {
        Statement::Query(q) => *q,
        other => panic!("expected a query, got {:?}", other),
    }
}

fn select(q: &Query) -> &Select {
    match &q.body {
        SetExpr::Select(s) => s,
        other => panic!("expected a select, got {:?}", other),
    }
}

#[test]
fn test_simple_select() {
    let q = query("SELECT id, name AS n FROM users WHERE id = $1", Dialect::Postgres);
    let s = select(&q);
    assert_eq!(
        s.projection,
        vec![
            SelectItem::Expr {
                expr: col("id"),
                alias: None
            },
            SelectItem::Expr {
                expr: col("name"),
                alias: Some(Ident::new("n"))
            },
        ]
    );
    assert_eq!(s.selection, Some(eq(col("id"), param(0))));
}

#[test]
fn test_operator_precedence() {
    let q = query("SELECT 1 FROM t WHERE a = 1 OR b = 2 AND NOT c = 3", Dialect::Postgres);
    let expected = or(
        eq(col("a"), int(1)),
        and(
            eq(col("b"), int(2)),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(eq(col("c"), int(3))),
            },
        ),
    );
    assert_eq!(select(&q).selection, Some(expected));

    let q = query("SELECT a + b * c - d FROM t", Dialect::Postgres);
    let expected = binary(
        binary(col("a"), BinaryOperator::Plus, binary(col("b"), BinaryOperator::Multiply, col("c"))),
        BinaryOperator::Minus,
        col("d"),
    );
    assert_eq!(
        select(&q).projection[0],
        SelectItem::Expr {
            expr: expected,
            alias: None
        }
    );
}

#[test]
fn test_predicates() {
    let q = query(
        "SELECT * FROM t WHERE a BETWEEN 1 AND 5 AND b NOT IN (1, 2) AND c ILIKE 'x%' AND d IS NOT NULL",
        Dialect::Postgres,
    );
    let mut conjuncts = Vec::new();
    let mut current = select(&q).selection.clone().unwrap();
    while let Expr::BinaryOp {
        left,
        op: BinaryOperator::And,
        right,
    } = current
    {
        conjuncts.push(*right);
        current = *left;
    }
    conjuncts.push(current);
    conjuncts.reverse();

    assert_eq!(conjuncts.len(), 4);
    assert!(matches!(&conjuncts[0], Expr::Between { negated: false, .. }));
    assert!(matches!(&conjuncts[1], Expr::InList { negated: true, list, .. } if list.len() == 2));
    assert!(matches!(
        &conjuncts[2],
        Expr::Like {
            case_insensitive: true,
            ..
        }
    ));
    assert!(matches!(&conjuncts[3], Expr::IsNull { negated: true, .. }));
}

#[test]
fn test_joins_and_subqueries() {
    let q = query(
        "SELECT u.id, o.* FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         WHERE EXISTS (SELECT 1 FROM payments p WHERE p.order_id = o.id)",
        Dialect::Postgres,
    );
    let s = select(&q);
    assert_eq!(s.projection[1], SelectItem::QualifiedWildcard(ObjectName::new("o")));
    assert_eq!(s.from.len(), 1);
    assert_eq!(s.from[0].joins.len(), 1);
    assert_eq!(s.from[0].joins[0].operator, JoinOperator::Left);
    assert_eq!(s.from[0].relation.reference_name(), Some("u"));
    assert!(matches!(s.selection, Some(Expr::Exists { negated: false, .. })));
}

#[test]
fn test_cte_union_order_limit() {
    let q = query(
        "WITH recent AS (SELECT id FROM a) SELECT id FROM recent UNION ALL SELECT id FROM b ORDER BY id DESC LIMIT 10 OFFSET 5",
        Dialect::Postgres,
    );
    assert_eq!(q.with.as_ref().map(|w| w.ctes.len()), Some(1));
    assert!(matches!(
        q.body,
        SetExpr::SetOperation {
            op: SetOperator::Union,
            all: true,
            ..
        }
    ));
    assert_eq!(q.order_by[0].asc, Some(false));
    assert_eq!(q.limit, Some(int(10)));
    assert_eq!(q.offset, Some(int(5)));
}

#[test]
fn test_mysql_limit_offset_form() {
    let q = query("SELECT a FROM t LIMIT 20, 10", Dialect::MySQL);
    assert_eq!(q.limit, Some(int(10)));
    assert_eq!(q.offset, Some(int(20)));
}

#[test]
fn test_sqlserver_top() {
    let q = query("SELECT TOP 5 name FROM [users]", Dialect::SqlServer);
    let s = select(&q);
    assert_eq!(s.top, Some(int(5)));
    assert_eq!(
        s.from[0].relation,
        TableFactor::Table {
            name: ObjectName(vec![Ident::quoted("users", '[')]),
            alias: None
        }
    );
    assert!(q.is_bounded());
}

#[test]
fn test_window_function() {
    let q = query(
        "SELECT row_number() OVER (PARTITION BY dept ORDER BY salary DESC ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM emp",
        Dialect::Postgres,
    );
    let SelectItem::Expr {
        expr: Expr::Function(f),
        ..
    } = &select(&q).projection[0]
    else {
        panic!("expected a function");
    };
    let Some(WindowType::Spec(spec)) = &f.over else {
        panic!("expected a window spec");
    };
    assert_eq!(spec.partition_by, vec![col("dept")]);
    assert_eq!(
        spec.frame,
        Some(WindowFrame {
            units: FrameUnits::Rows,
            start: FrameBound::Preceding(None),
            end: Some(FrameBound::CurrentRow),
        })
    );
}

#[test]
fn test_casts() {
    let q = query("SELECT CAST(a AS VARCHAR(10)), b::timestamp with time zone FROM t", Dialect::Postgres);
    let s = select(&q);
    assert!(matches!(
        &s.projection[0],
        SelectItem::Expr { expr: Expr::Cast { data_type, shorthand: false, .. }, .. } if data_type.0 == "VARCHAR(10)"
    ));
    assert!(matches!(
        &s.projection[1],
        SelectItem::Expr { expr: Expr::Cast { data_type, shorthand: true, .. }, .. }
            if data_type.0 == "timestamp WITH TIME ZONE"
    ));

    let err = parse_sql("SELECT a::int FROM t", Dialect::MySQL).unwrap_err();
    assert!(matches!(err, KilnError::Parse { .. }));
}

#[test]
fn test_insert_with_conflict_and_returning() {
    let stmt = parse_pg(
        "INSERT INTO users (email, name) VALUES ($1, $2) \
         ON CONFLICT (email) DO UPDATE SET name = $2 RETURNING id",
    );
    let Statement::Insert(insert) = stmt else {
        panic!("expected insert");
    };
    assert_eq!(insert.columns, vec![Ident::new("email"), Ident::new("name")]);
    assert_eq!(insert.source, InsertSource::Values(vec![vec![param(0), param(1)]]));
    assert!(matches!(
        insert.on_conflict,
        Some(OnConflict::Conflict {
            action: ConflictAction::DoUpdate { .. },
            ..
        })
    ));
    assert_eq!(insert.returning.len(), 1);
}

#[test]
fn test_mysql_duplicate_key() {
    let stmt = parse_sql(
        "INSERT INTO counters (k, n) VALUES (?, 1) ON DUPLICATE KEY UPDATE n = n + 1",
        Dialect::MySQL,
    )
    .unwrap()
    .statement;
    let Statement::Insert(insert) = stmt else {
        panic!("expected insert");
    };
    assert!(matches!(insert.on_conflict, Some(OnConflict::DuplicateKeyUpdate(ref a)) if a.len() == 1));
}

#[test]
fn test_update_and_delete() {
    assert_eq!(
        parse_pg("UPDATE users SET name = :name WHERE id = :id"),
        update("users", vec![("name", named("name"))], Some(eq(col("id"), named("id"))))
    );
    assert_eq!(parse_pg("DELETE FROM sessions"), delete("sessions", None));
}

#[test]
fn test_ddl() {
    let stmt = parse_pg(
        "CREATE TABLE IF NOT EXISTS users (\
           id BIGINT PRIMARY KEY, \
           email VARCHAR(255) NOT NULL UNIQUE, \
           org_id INT REFERENCES orgs (id) ON DELETE CASCADE, \
           created_at TIMESTAMP DEFAULT now(), \
           CONSTRAINT email_check CHECK (email LIKE '%@%'))",
    );
    let Statement::CreateTable(table) = stmt else {
        panic!("expected create table");
    };
    assert!(table.if_not_exists);
    assert_eq!(table.columns.len(), 4);
    assert_eq!(table.columns[1].options, vec![ColumnOption::NotNull, ColumnOption::Unique]);
    assert_eq!(table.constraints.len(), 1);

    assert!(matches!(parse_pg("DROP TABLE IF EXISTS a, b CASCADE"), Statement::Drop(d) if d.names.len() == 2 && d.cascade));
    assert!(matches!(parse_pg("TRUNCATE TABLE logs"), Statement::Truncate(_)));
    assert!(matches!(
        parse_pg("ALTER TABLE users ADD COLUMN age INT, RENAME COLUMN name TO full_name"),
        Statement::AlterTable(a) if a.operations.len() == 2
    ));
    assert!(matches!(
        parse_pg("CREATE UNIQUE INDEX idx_email ON users (email)"),
        Statement::CreateIndex(i) if i.unique
    ));
}

#[test]
fn test_placeholders_follow_extraction() {
    // `?` is recognized for SQLite, not for Oracle
    let stmt = parse_sql("SELECT * FROM t WHERE a = ? AND b = ?", Dialect::SQLite)
        .unwrap()
        .statement;
    assert_eq!(stmt.param_refs(), vec![ParamRef::Position(0), ParamRef::Position(1)]);
    assert!(parse_sql("SELECT * FROM t WHERE a = ?", Dialect::Oracle).is_err());

    // Inside strings and comments nothing is a placeholder
    let stmt = parse_pg("SELECT '$1' FROM t /* $2 */ WHERE a = $1");
    assert_eq!(stmt.param_refs(), vec![ParamRef::Position(0)]);
}

#[test]
fn test_comments_are_kept() {
    let parsed = parse_sql("SELECT * FROM users WHERE name = 'x' -- trailing", Dialect::Postgres).unwrap();
    assert_eq!(parsed.comments.len(), 1);
    assert!(parsed.comments[0].trailing);
    assert!(!parsed.comments[0].after_string);
}

#[test]
fn test_parse_errors() {
    let err = parse_sql("SELECT FROM WHERE", Dialect::Postgres).unwrap_err();
    assert!(matches!(err, KilnError::Parse { position: 7, ref token, .. } if token == "FROM"));

    let err = parse_sql("SELECT 1; DROP TABLE users", Dialect::Postgres).unwrap_err();
    assert!(err.to_string().contains("multiple statements"));

    assert!(parse_sql("", Dialect::Postgres).is_err());
    assert!(parse_sql("SELECT * FROM t WHERE a IN ()", Dialect::Postgres).is_err());
    assert!(parse_sql("SELECT (1 + 2 FROM t", Dialect::Postgres).is_err());

    // a trailing semicolon is fine
    assert!(parse_sql("SELECT 1;", Dialect::Postgres).is_ok());
}

#[test]
fn test_deep_nesting_is_rejected() {
    let sql = format!("SELECT {}1{}", "(".repeat(500), ")".repeat(500));
    let err = parse_sql(&sql, Dialect::Postgres).unwrap_err();
    assert!(err.to_string().contains("too deep"));
}

#[test]
fn test_long_or_chain_is_rejected() {
    let terms: Vec<String> = (0..3000).map(|i| format!("a = {}", i)).collect();
    let sql = format!("SELECT * FROM t WHERE {}", terms.join(" OR "));
    let err = parse_sql(&sql, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, KilnError::Parse { .. }));
    assert!(err.to_string().contains("too deep"));

    let parts: Vec<&str> = std::iter::repeat_n("SELECT 1", 500).collect();
    let err = parse_sql(&parts.join(" UNION ALL "), Dialect::Postgres).unwrap_err();
    assert!(err.to_string().contains("too deep"));
}

#[test]
fn test_moderate_or_chain_is_accepted() {
    let terms: Vec<String> = (0..40).map(|i| format!("a = {}", i)).collect();
    let q = query(&format!("SELECT * FROM t WHERE {}", terms.join(" OR ")), Dialect::Postgres);
    assert!(select(&q).selection.is_some());
}

#[test]
fn test_reserved_words_are_not_function_names() {
    for sql in [
        "SELECT WHERE(1) FROM t",
        "SELECT SELECT(1)",
        "SELECT * FROM t WHERE a = 1 AND FROM(2) = 1",
        "SELECT ORDER(x) FROM t",
    ] {
        let err = parse_sql(sql, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, KilnError::Parse { .. }), "{}", sql);
    }

    // LEFT and RIGHT are string functions too
    let q = query("SELECT left(name, 2), RIGHT(name, 1) FROM t", Dialect::Postgres);
    assert_eq!(select(&q).projection.len(), 2);
    assert!(matches!(
        &select(&q).projection[0],
        SelectItem::Expr { expr: Expr::Function(f), .. } if f.name == ObjectName::new("left")
    ));
}

#[test]
fn test_distinct_on() {
    let q = query("SELECT DISTINCT ON (a, b) a, b, c FROM t ORDER BY a, b", Dialect::Postgres);
    let s = select(&q);
    assert!(s.distinct);
    assert_eq!(s.distinct_on, vec![col("a"), col("b")]);
    assert_eq!(s.projection.len(), 3);
    assert_eq!(q.to_string(), "SELECT DISTINCT ON (a, b) a, b, c FROM t ORDER BY a, b");

    // plain DISTINCT with no ON
    let q = query("SELECT DISTINCT a FROM t", Dialect::Postgres);
    assert!(select(&q).distinct_on.is_empty());
}

#[test]
fn test_row_locks() {
    let q = query(
        "SELECT * FROM jobs WHERE state = 'ready' LIMIT 10 FOR UPDATE OF jobs SKIP LOCKED",
        Dialect::Postgres,
    );
    assert_eq!(
        q.locks,
        vec![LockClause {
            strength: LockStrength::Update,
            of: vec![ObjectName::new("jobs")],
            wait: Some(LockWait::SkipLocked),
        }]
    );
    assert_eq!(q.limit, Some(int(10)));

    let q = query("SELECT * FROM t FOR NO KEY UPDATE NOWAIT", Dialect::Postgres);
    assert_eq!(q.locks[0].strength, LockStrength::NoKeyUpdate);
    assert_eq!(q.locks[0].wait, Some(LockWait::Nowait));

    let q = query("SELECT * FROM t FOR SHARE", Dialect::MySQL);
    assert_eq!(q.locks[0].strength, LockStrength::Share);

    assert!(parse_sql("SELECT * FROM t FOR", Dialect::Postgres).is_err());
}

#[test]
fn test_is_distinct_from() {
    let q = query("SELECT * FROM t WHERE a IS NOT DISTINCT FROM $1", Dialect::Postgres);
    assert_eq!(
        select(&q).selection,
        Some(Expr::IsDistinctFrom {
            left: Box::new(col("a")),
            right: Box::new(param(0)),
            negated: true,
        })
    );

    // binds tighter than AND
    let q = query("SELECT * FROM t WHERE a IS DISTINCT FROM b AND c = 1", Dialect::Postgres);
    assert!(matches!(
        select(&q).selection,
        Some(Expr::BinaryOp { op: BinaryOperator::And, .. })
    ));
}

#[test]
fn test_extract_and_array() {
    let q = query(
        "SELECT EXTRACT(year FROM created_at), ARRAY[1, 2] FROM t",
        Dialect::Postgres,
    );
    let s = select(&q);
    assert_eq!(
        s.projection[0],
        SelectItem::Expr {
            expr: Expr::Extract {
                field: "YEAR".into(),
                expr: Box::new(col("created_at")),
            },
            alias: None
        }
    );
    assert_eq!(
        s.projection[1],
        SelectItem::Expr {
            expr: Expr::Array(vec![int(1), int(2)]),
            alias: None
        }
    );

    let q = query("SELECT ARRAY[] FROM t", Dialect::Postgres);
    assert!(matches!(&select(&q).projection[0], SelectItem::Expr { expr: Expr::Array(items), .. } if items.is_empty()));

    assert!(parse_sql("SELECT EXTRACT(year created_at)", Dialect::Postgres).is_err());
}
