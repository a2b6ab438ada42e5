//! The ordered key/value store contract this engine is layered over
//! (design doc §6): get/put/remove, range scans, range deletes, and
//! counter adjustment. [`mem::MemKv`] is the in-process reference
//! implementation used by tests and the default [`crate::db::Database`];
//! [`rocks`] is the optional persistent backend.

pub mod mem;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;

use std::ops::Bound;

use crate::error::Result;

/// A single committed write: either `Put(value)` or `Delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Put(Vec<u8>),
    Delete,
}

/// A batch of writes applied atomically by [`KvStore::apply`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub ops: Vec<(Vec<u8>, Operation)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push((key, Operation::Put(value)));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push((key, Operation::Delete));
    }
}

/// A forward-ordered range, with `Bound<Vec<u8>>` endpoints matching the
/// model's index range restrictions (design doc §4.5).
pub type KeyRange = (Bound<Vec<u8>>, Bound<Vec<u8>>);

/// The minimal ordered key/value contract the engine needs from its
/// storage layer.
///
/// Implementations need not provide snapshot isolation themselves — the
/// object-runtime transaction layer in [`crate::txn`] is responsible for
/// buffering uncommitted writes and presenting a consistent view; a
/// `KvStore` only needs to durably apply an already-decided batch and scan
/// byte ranges in key order.
pub trait KvStore: Send + Sync {
    /// Looks up the current value of `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns key/value pairs in `range`, in ascending key order.
    fn scan(&self, range: KeyRange) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Returns key/value pairs in `range`, in descending key order.
    fn scan_rev(&self, range: KeyRange) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = self.scan(range)?;
        rows.reverse();
        Ok(rows)
    }

    /// Atomically applies every operation in `batch`.
    fn apply(&self, batch: WriteBatch) -> Result<()>;
}
