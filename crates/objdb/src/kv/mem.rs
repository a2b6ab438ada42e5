//! In-memory, `BTreeMap`-backed [`KvStore`] used by tests, examples, and
//! the default [`crate::db::Database::open_in_memory`].

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use super::{KeyRange, KvStore, Operation, WriteBatch};
use crate::error::Result;
use crate::metrics;

const BACKEND: &str = "mem";

#[derive(Debug, Default)]
pub struct MemKv {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKv {
    pub fn new() -> Self {
        MemKv {
            data: Mutex::new(BTreeMap::new()),
        }
    }
}

impl KvStore for MemKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _timer = metrics::KV_GET_LATENCY_SECONDS
            .with_label_values(&[BACKEND])
            .start_timer();
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn scan(&self, range: KeyRange) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let _timer = metrics::KV_SCAN_LATENCY_SECONDS
            .with_label_values(&[BACKEND])
            .start_timer();
        let (start, end) = range;
        let data = self.data.lock().unwrap();
        let range_fn = |k: &&Vec<u8>| -> bool {
            let after_start = match &start {
                Bound::Included(s) => k.as_slice() >= s.as_slice(),
                Bound::Excluded(s) => k.as_slice() > s.as_slice(),
                Bound::Unbounded => true,
            };
            let before_end = match &end {
                Bound::Included(e) => k.as_slice() <= e.as_slice(),
                Bound::Excluded(e) => k.as_slice() < e.as_slice(),
                Bound::Unbounded => true,
            };
            after_start && before_end
        };
        let rows: Vec<_> = data
            .iter()
            .filter(|(k, _)| range_fn(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        metrics::KV_SCAN_ROWS
            .with_label_values(&[BACKEND])
            .observe(rows.len() as f64);
        Ok(rows)
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let _timer = metrics::KV_APPLY_LATENCY_SECONDS
            .with_label_values(&[BACKEND])
            .start_timer();
        let mut data = self.data.lock().unwrap();
        let op_count = batch.ops.len() as u64;
        for (key, op) in batch.ops {
            match op {
                Operation::Put(value) => {
                    data.insert(key, value);
                }
                Operation::Delete => {
                    data.remove(&key);
                }
            }
        }
        metrics::KV_APPLY_OPS
            .with_label_values(&[BACKEND])
            .inc_by(op_count);
        Ok(())
    }
}

