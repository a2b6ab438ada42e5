//! RocksDB-backed [`KvStore`], gated behind the `rocksdb-backend` feature.
//! Option tuning is adapted from the teacher's `rocks_db_config.rs`.

use rocksdb::{Options, WriteBatch as RocksWriteBatch, DB};

use super::{KeyRange, KvStore, Operation, WriteBatch};
use crate::error::{ObjDbError, Result};
use crate::metrics;

const BACKEND: &str = "rocksdb";

/// Selected RocksDB tuning knobs; see
/// <https://github.com/facebook/rocksdb/blob/master/include/rocksdb/options.h>.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RocksdbConfig {
    pub max_open_files: i32,
    pub max_total_wal_size: u64,
    pub max_background_jobs: i32,
}

impl Default for RocksdbConfig {
    fn default() -> Self {
        RocksdbConfig {
            max_open_files: 5000,
            max_total_wal_size: 1u64 << 30,
            max_background_jobs: 16,
        }
    }
}

fn gen_rocksdb_options(config: &RocksdbConfig) -> Options {
    let mut opts = Options::default();
    opts.set_max_open_files(config.max_open_files);
    opts.set_max_total_wal_size(config.max_total_wal_size);
    opts.set_max_background_jobs(config.max_background_jobs);
    opts.create_if_missing(true);
    opts.set_atomic_flush(true);
    opts
}

pub struct RocksKv {
    db: DB,
}

impl RocksKv {
    pub fn open(path: impl AsRef<std::path::Path>, config: RocksdbConfig) -> Result<Self> {
        let opts = gen_rocksdb_options(&config);
        let db = DB::open(&opts, path).map_err(|e| ObjDbError::KvTransaction(e.into()))?;
        Ok(RocksKv { db })
    }
}

impl KvStore for RocksKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _timer = metrics::KV_GET_LATENCY_SECONDS
            .with_label_values(&[BACKEND])
            .start_timer();
        self.db
            .get(key)
            .map_err(|e| ObjDbError::KvTransaction(e.into()))
    }

    fn scan(&self, range: KeyRange) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        use std::ops::Bound;
        let _timer = metrics::KV_SCAN_LATENCY_SECONDS
            .with_label_values(&[BACKEND])
            .start_timer();
        let (start, end) = range;
        let mode = match &start {
            Bound::Included(s) | Bound::Excluded(s) => {
                rocksdb::IteratorMode::From(s, rocksdb::Direction::Forward)
            }
            Bound::Unbounded => rocksdb::IteratorMode::Start,
        };
        let mut out = Vec::new();
        for item in self.db.iterator(mode) {
            let (k, v) = item.map_err(|e| ObjDbError::KvTransaction(e.into()))?;
            if let Bound::Excluded(s) = &start {
                if k.as_ref() == s.as_slice() {
                    continue;
                }
            }
            let past_end = match &end {
                Bound::Included(e) => k.as_ref() > e.as_slice(),
                Bound::Excluded(e) => k.as_ref() >= e.as_slice(),
                Bound::Unbounded => false,
            };
            if past_end {
                break;
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        metrics::KV_SCAN_ROWS
            .with_label_values(&[BACKEND])
            .observe(out.len() as f64);
        Ok(out)
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let _timer = metrics::KV_APPLY_LATENCY_SECONDS
            .with_label_values(&[BACKEND])
            .start_timer();
        let mut rocks_batch = RocksWriteBatch::default();
        let op_count = batch.ops.len() as u64;
        for (key, op) in batch.ops {
            match op {
                Operation::Put(value) => rocks_batch.put(key, value),
                Operation::Delete => rocks_batch.delete(key),
            }
        }
        self.db
            .write(rocks_batch)
            .map_err(|e| ObjDbError::KvTransaction(e.into()))?;
        metrics::KV_APPLY_OPS
            .with_label_values(&[BACKEND])
            .inc_by(op_count);
        Ok(())
    }
}
