// tests/query_optimizer_test.rs
//
// Cache key stability, capacity eviction and error handling of QueryOptimizer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gruenerator_worker::query::{QueryCache, QueryOptimizer};
use gruenerator_worker::{BatchError, WorkerConfig, generate_query_cache_key};
use serde_json::{Value, json};

fn optimizer() -> QueryOptimizer<Value> {
    QueryOptimizer::with_options(Duration::from_millis(200), 100, false)
}

#[test]
fn test_cache_key_independent_of_insertion_order() {
    let mut forward = serde_json::Map::new();
    forward.insert("b".to_string(), json!(2));
    forward.insert("a".to_string(), json!(1));

    let mut backward = serde_json::Map::new();
    backward.insert("a".to_string(), json!(1));
    backward.insert("b".to_string(), json!(2));

    assert_eq!(
        generate_query_cache_key("op", &Value::Object(forward)),
        generate_query_cache_key("op", &Value::Object(backward))
    );
}

#[test]
fn test_optimizer_defaults_follow_config() {
    let mut config = WorkerConfig::default();
    config.timeouts.database_rpc_ms = 1234;

    let optimizer = QueryOptimizer::<Value>::new(&config);
    assert_eq!(optimizer.timeout(), Duration::from_millis(1234));
}

#[tokio::test]
async fn test_capacity_evicts_first_inserted() {
    let optimizer = optimizer();

    for i in 0..101 {
        optimizer
            .execute_query("lookup", &json!({"id": i}), || async move {
                Ok::<_, BatchError>(json!({"id": i}))
            })
            .await
            .unwrap();
    }

    assert_eq!(optimizer.cache_len(), 100);

    // The first key is gone, so looking it up runs the query again
    let calls = AtomicUsize::new(0);
    optimizer
        .execute_query("lookup", &json!({"id": 0}), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BatchError>(json!({"id": 0})) }
        })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The most recent one is still cached
    optimizer
        .execute_query("lookup", &json!({"id": 100}), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BatchError>(json!({"id": 100})) }
        })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_raw_cache_capacity() {
    let mut cache: QueryCache<Value> = QueryCache::default();
    for i in 0..101 {
        cache.insert(format!("op:{{\"id\":{}}}", i), json!(i));
    }

    assert_eq!(cache.len(), 100);
    assert!(cache.get("op:{\"id\":0}").is_none());
}

#[tokio::test]
async fn test_error_results_are_never_cached() {
    let optimizer = optimizer();
    let calls = AtomicUsize::new(0);
    let params = json!({"table": "documents"});

    for _ in 0..2 {
        let value = optimizer
            .execute_query("rpc", &params, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BatchError>(json!({"data": null, "error": "permission denied"})) }
            })
            .await
            .unwrap();
        assert_eq!(value["error"], "permission denied");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(optimizer.cache_len(), 0);
    assert_eq!(optimizer.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_rpc_result_with_null_error_is_cached() {
    let optimizer = optimizer();
    let calls = AtomicUsize::new(0);
    let params = json!({"id": 1});

    for _ in 0..3 {
        let value = optimizer
            .execute_query("rpc", &params, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BatchError>(json!({"data": [1, 2], "error": null})) }
            })
            .await
            .unwrap();
        assert_eq!(value["data"], json!([1, 2]));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(optimizer.cache_len(), 1);
    let stats = optimizer.stats();
    assert_eq!(stats.queries_executed, 1);
    assert_eq!(stats.cache_hits, 2);
}

#[tokio::test]
async fn test_rejected_query_propagates() {
    let optimizer = optimizer();

    let result = optimizer
        .execute_query("rpc", &json!({}), || async {
            Err::<Value, _>(BatchError::Processor("connection refused".into()))
        })
        .await;

    assert_eq!(result, Err(BatchError::Processor("connection refused".into())));
}

#[tokio::test]
async fn test_average_is_true_mean() {
    let optimizer = optimizer();

    for (i, delay) in [10u64, 30].into_iter().enumerate() {
        optimizer
            .execute_query("timed", &json!({"n": i}), || async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, BatchError>(json!(i))
            })
            .await
            .unwrap();
    }

    let stats = optimizer.stats();
    assert_eq!(stats.queries_executed, 2);
    assert!((stats.avg_query_time_ms - stats.total_query_time_ms / 2.0).abs() < 1e-9);
    assert!(stats.avg_query_time_ms >= 20.0);
}
