use std::sync::{Arc, Barrier};

use pretty_assertions::assert_eq;
use sqlkiln::prelude::*;

const QUERIES: [&str; 4] = [
    "SELECT id FROM users WHERE id = ? LIMIT 1",
    "SELECT id FROM orders WHERE user_id = ? LIMIT 10",
    "UPDATE users SET last_seen = now() WHERE id = ?",
    "DELETE FROM sessions WHERE user_id = ?",
];

fn config() -> Arc<StatementConfig> {
    Arc::new(StatementConfig::for_dialect(Dialect::Postgres))
}

#[test]
fn test_threads_share_one_parse() {
    let pipeline = Pipeline::default();
    let config = config();
    let barrier = Barrier::new(16);

    let outputs: Vec<CompiledStatement> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16i64)
            .map(|i| {
                let pipeline = &pipeline;
                let barrier = &barrier;
                let config = Arc::clone(&config);
                s.spawn(move || {
                    barrier.wait();
                    let stmt = Statement::sql(QUERIES[0], config).bind(Params::positional([i]));
                    pipeline.compile(&stmt).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(pipeline.parse_count(), 1);
    for (i, out) in outputs.iter().enumerate() {
        assert_eq!(out.sql, "SELECT id FROM users WHERE id = $1 LIMIT 1");
        assert_eq!(out.parameters, Parameters::Positional(vec![Value::Int(i as i64)]));
    }
    let stats = pipeline.cache().stats();
    assert_eq!(stats.sql.hits + stats.sql.misses, 16);
    assert_eq!(stats.sql.entries, 1);
}

#[test]
fn test_unrelated_statements_do_not_contaminate() {
    let pipeline = Pipeline::default();
    let config = config();

    std::thread::scope(|s| {
        for round in 0..8 {
            for (q, sql) in QUERIES.iter().enumerate() {
                let pipeline = &pipeline;
                let config = Arc::clone(&config);
                s.spawn(move || {
                    let stmt = Statement::sql(*sql, config).bind(Params::positional([round * 10 + q as i64]));
                    let out = pipeline.compile(&stmt).unwrap();
                    assert!(out.sql.contains("$1"));
                    assert_eq!(out.parameters, Parameters::Positional(vec![Value::Int(round * 10 + q as i64)]));
                });
            }
        }
    });

    assert_eq!(pipeline.parse_count(), QUERIES.len());
    assert_eq!(pipeline.cache().stats().sql.entries, QUERIES.len());
}

#[test]
fn test_tiny_cache_evicts_under_load() {
    let pipeline = Pipeline::new(CacheService::shared(CacheConfig { max_entries: 2 }));
    let config = config();

    std::thread::scope(|s| {
        for t in 0..4 {
            let pipeline = &pipeline;
            let config = Arc::clone(&config);
            s.spawn(move || {
                for i in 0..50 {
                    let sql = QUERIES[(t + i) % QUERIES.len()];
                    let out = pipeline
                        .compile(&Statement::sql(sql, Arc::clone(&config)).bind(Params::positional([1])))
                        .unwrap();
                    assert!(out.sql.contains("$1"));
                }
            });
        }
    });

    // with no computation in flight, one more store trims the tier to size
    pipeline
        .compile(&Statement::sql("SELECT 1 LIMIT 1", config))
        .unwrap();
    let stats = pipeline.cache().stats();
    assert_eq!(stats.sql.entries, 2);
    assert!(stats.sql.evictions > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocking_tasks_share_the_cache() {
    let pipeline = Arc::new(Pipeline::default());
    let config = config();

    let mut tasks = Vec::new();
    for i in 0..32i64 {
        let pipeline = Arc::clone(&pipeline);
        let config = Arc::clone(&config);
        tasks.push(tokio::task::spawn_blocking(move || {
            let sql = QUERIES[i as usize % QUERIES.len()];
            pipeline.compile(&Statement::sql(sql, config).bind(Params::positional([i])))
        }));
    }

    for task in tasks {
        let out = task.await.unwrap().unwrap();
        assert_eq!(out.parameters.len(), 1);
    }
    assert_eq!(pipeline.parse_count(), QUERIES.len());
}
