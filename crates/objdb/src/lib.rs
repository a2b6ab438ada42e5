//! A schema-versioned, indexable object store layered over an ordered
//! key/value store.
//!
//! - [`codec`] — ordered, self-delimiting byte encodings for every field
//!   type, down to the primitive level.
//! - [`layout`] — the fixed key-space layout and the [`layout::StorageId`] /
//!   [`layout::ObjId`] identifier types.
//! - [`schema`] — the versioned object-type model and its XML
//!   serialization.
//! - [`kv`] — the minimal ordered key/value store contract this engine is
//!   layered over, plus an in-memory reference implementation.
//! - [`txn`] — the transactional runtime: field reads/writes, reference
//!   integrity, cascading delete, and change listeners.
//! - [`index`] — navigable set/map views over simple, composite, and
//!   sub-field indexes.
//! - [`db`] and [`snapshot`] — the database facade and read-only snapshot
//!   transactions.

pub mod codec;
pub mod db;
pub mod error;
pub mod index;
pub mod kv;
pub mod layout;
pub mod metrics;
pub mod schema;
pub mod snapshot;
pub mod txn;

pub use db::Database;
pub use error::{ObjDbError, Result};
pub use layout::{ObjId, StorageId};
pub use txn::Transaction;
