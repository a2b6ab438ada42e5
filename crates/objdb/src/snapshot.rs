//! Read-only snapshot transactions (design doc §4.4.1, §11).
//!
//! A snapshot transaction is a [`Transaction`] that can never commit and,
//! unlike a live transaction, does not reject a reference assignment that
//! points at a since-deleted object — appropriate for working with data
//! copied out of the database via [`Transaction::copy_to`], which may
//! legitimately contain now-dangling references to objects that were never
//! copied.

use std::sync::Arc;

use crate::codec::registry::CodecRegistry;
use crate::error::Result;
use crate::kv::mem::MemKv;
use crate::kv::KvStore;
use crate::schema::registry::SchemaRegistry;
use crate::schema::Schema;
use crate::txn::Transaction;
use std::sync::RwLock;

/// A standalone, in-memory transaction meant to be the destination of
/// [`Transaction::copy_to`] calls, not backed by any [`crate::db::Database`].
pub fn new_detached_snapshot(schema: Arc<Schema>) -> Transaction {
    Transaction::new(
        Arc::new(MemKv::new()),
        schema,
        Arc::new(RwLock::new(SchemaRegistry::new())),
        Arc::new(CodecRegistry::with_builtins()),
        true,
    )
}

/// Begins a read-only transaction against `kv` bound to `schema`, with
/// dangling references permitted rather than rejected.
pub fn open_snapshot(
    kv: Arc<dyn KvStore>,
    schema: Arc<Schema>,
    schema_registry: Arc<RwLock<SchemaRegistry>>,
    codec_registry: Arc<CodecRegistry>,
) -> Result<Transaction> {
    let txn = Transaction::new(kv, schema, schema_registry, codec_registry, true);
    Ok(txn)
}
