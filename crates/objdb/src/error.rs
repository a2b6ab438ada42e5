//! Error taxonomy for the engine.
//!
//! [`CodecError`] covers (de)serialization failures inside a single codec.
//! [`ObjDbError`] is the public error type returned by transaction, schema,
//! and database-facade operations; it wraps [`CodecError`] and KV-store
//! errors alongside the semantic error kinds from the object model.

use std::fmt::Debug;

use crate::layout::{ObjId, StorageId};

/// An error that occurred while encoding or decoding a single value with a
/// [`Codec`](crate::codec::Codec).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The byte slice handed to a fixed-width codec had the wrong length.
    #[error("invalid encoding length: expected {expected}, got {got}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        got: usize,
    },
    /// A variable-length encoding ran past the end of its input without
    /// terminating.
    #[error("truncated encoding")]
    Truncated,
    /// A discriminant byte (null-wrapper tag, array framing byte, enum
    /// ordinal) held a value no variant recognizes.
    #[error("invalid discriminant byte: {0:#04x}")]
    InvalidDiscriminant(u8),
    /// String or char content was not valid UTF-8 / UTF-16.
    #[error("invalid text encoding")]
    InvalidText,
    /// A decoded value failed a codec-specific structural check (e.g. an
    /// out-of-range enum ordinal).
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// Propagated I/O failure from the underlying reader/writer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The error taxonomy exposed by transaction, schema-registry, and
/// database-facade operations (design doc §7).
#[derive(Debug, thiserror::Error)]
pub enum ObjDbError {
    /// An operation was attempted on a transaction that is no longer
    /// `OPEN` (already committed, rolled back, or gone stale).
    #[error("stale transaction")]
    StaleTransaction,
    /// `id` does not name any object, live or historical.
    #[error("unknown object {0:?}")]
    UnknownObject(ObjId),
    /// `storage_id` does not name an object type in the bound schema.
    #[error("unknown object type {0}")]
    UnknownType(StorageId),
    /// `storage_id` does not name a field in the bound schema.
    #[error("unknown field {0}")]
    UnknownField(StorageId),
    /// `name` does not name a field of the object type in question.
    #[error("unknown field {0:?}")]
    UnknownFieldName(String),
    /// `storage_id` does not name an index in the bound schema.
    #[error("unknown index {0}")]
    UnknownIndex(StorageId),
    /// The object named by `id` has been deleted (or never existed) and a
    /// field access was attempted against it.
    #[error("object {0:?} is deleted")]
    DeletedObject(ObjId),
    /// The caller-supplied schema is structurally incompatible with a
    /// schema already recorded under the same version, or no matching
    /// recorded schema exists and `allow_new_schema` was not set.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Static validation of a schema model failed.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// `delete` was blocked because a reference field with
    /// `onDelete = EXCEPTION` still refers to the target.
    #[error("object {referrer:?} field {field} still refers to {target:?}")]
    ReferencedObject {
        /// The object being deleted.
        target: ObjId,
        /// The object holding the blocking reference.
        referrer: ObjId,
        /// The storage ID of the blocking reference field.
        field: StorageId,
    },
    /// A reference field was assigned an object ID that doesn't exist (or,
    /// under a snapshot transaction whose dangling-reference toggle
    /// forbids it, doesn't exist in the snapshot).
    #[error("cannot assign reference to nonexistent object {0:?}")]
    DeletedAssignment(ObjId),
    /// Meta-data corruption was detected at open time; never silently
    /// recovered.
    #[error("inconsistent database: {0}")]
    InconsistentDatabase(String),
    /// A value or key failed to (de)serialize.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Propagated from the underlying KV store.
    #[error(transparent)]
    KvTransaction(#[from] anyhow::Error),
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T, E = ObjDbError> = std::result::Result<T, E>;
