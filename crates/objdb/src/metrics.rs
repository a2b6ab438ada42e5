//! Prometheus metrics for the key/value layer and the transaction commit
//! path, following the teacher's `register_*_vec!` + `Lazy` idiom.

use once_cell::sync::Lazy;
use prometheus::{exponential_buckets, register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

pub static KV_GET_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "objdb_kv_get_latency_seconds",
        "objdb KvStore::get latency in seconds",
        &["backend"],
        exponential_buckets(1e-6, 2.0, 22).unwrap(),
    )
    .unwrap()
});

pub static KV_SCAN_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "objdb_kv_scan_latency_seconds",
        "objdb KvStore::scan latency in seconds",
        &["backend"],
        exponential_buckets(1e-6, 2.0, 22).unwrap(),
    )
    .unwrap()
});

pub static KV_SCAN_ROWS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "objdb_kv_scan_rows",
        "Rows returned per objdb KvStore::scan call",
        &["backend"]
    )
    .unwrap()
});

pub static KV_APPLY_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "objdb_kv_apply_latency_seconds",
        "objdb KvStore::apply (batch write) latency in seconds",
        &["backend"],
        exponential_buckets(1e-3, 2.0, 20).unwrap(),
    )
    .unwrap()
});

pub static KV_APPLY_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "objdb_kv_apply_ops_total",
        "Individual put/delete operations applied via objdb KvStore::apply",
        &["backend"]
    )
    .unwrap()
});

pub static TXN_COMMIT_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "objdb_txn_commit_latency_seconds",
        "objdb Transaction::commit latency in seconds",
        &["outcome"],
        exponential_buckets(1e-4, 2.0, 20).unwrap(),
    )
    .unwrap()
});
