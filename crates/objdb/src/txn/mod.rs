//! The transactional runtime (design doc §4.4): object lifecycle, field
//! reads/writes, reference-integrity delete cascades, and field-change
//! listeners, all layered over a [`crate::kv::KvStore`].

pub mod delete;
pub mod fields;
pub mod listeners;
pub mod version;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};

use crate::codec::registry::CodecRegistry;
use crate::error::{ObjDbError, Result};
use crate::kv::{KvStore, Operation, WriteBatch};
use crate::layout::{ObjId, StorageId};
use crate::schema::registry::SchemaRegistry;
use crate::schema::Schema;

pub use listeners::{FieldChange, Listener, PathMonitor, VersionChange};

/// A transaction's lifecycle state (design doc §4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Open,
    Committed,
    RolledBack,
    /// The transaction's parent [`crate::db::Database`] closed while this
    /// transaction was still open.
    Stale,
}

/// A live object-database transaction.
///
/// Writes are buffered in `pending` and only reach the underlying
/// [`KvStore`] on [`Transaction::commit`], mirroring the teacher's
/// `SchemaBatch`-then-commit idiom. Reads consult `pending` first so a
/// transaction always sees its own uncommitted writes.
pub struct Transaction {
    pub(crate) kv: Arc<dyn KvStore>,
    pub(crate) schema: Arc<Schema>,
    pub(crate) schema_registry: Arc<RwLock<SchemaRegistry>>,
    pub(crate) codec_registry: Arc<CodecRegistry>,
    pub(crate) pending: Mutex<BTreeMap<Vec<u8>, Operation>>,
    pub(crate) state: Mutex<TxnState>,
    pub(crate) next_suffix: AtomicU32,
    pub(crate) listeners: Mutex<Vec<Listener>>,
    pub(crate) path_monitors: Mutex<Vec<PathMonitor>>,
    /// Whether assigning a reference to a nonexistent object is an error.
    /// `false` for snapshot transactions taken against a stable past view
    /// (design doc §11, dangling-reference toggle).
    pub(crate) forbid_dangling_references: bool,
    pub(crate) read_only: bool,
}

impl Transaction {
    pub(crate) fn new(
        kv: Arc<dyn KvStore>,
        schema: Arc<Schema>,
        schema_registry: Arc<RwLock<SchemaRegistry>>,
        codec_registry: Arc<CodecRegistry>,
        read_only: bool,
    ) -> Self {
        Transaction::with_dangling_policy(
            kv,
            schema,
            schema_registry,
            codec_registry,
            read_only,
            !read_only,
        )
    }

    /// Like [`Self::new`], with an explicit dangling-reference policy
    /// instead of deriving it from `read_only` (design doc §11).
    pub(crate) fn with_dangling_policy(
        kv: Arc<dyn KvStore>,
        schema: Arc<Schema>,
        schema_registry: Arc<RwLock<SchemaRegistry>>,
        codec_registry: Arc<CodecRegistry>,
        read_only: bool,
        forbid_dangling_references: bool,
    ) -> Self {
        Transaction {
            kv,
            schema,
            schema_registry,
            codec_registry,
            pending: Mutex::new(BTreeMap::new()),
            state: Mutex::new(TxnState::Open),
            next_suffix: AtomicU32::new(1),
            listeners: Mutex::new(Vec::new()),
            path_monitors: Mutex::new(Vec::new()),
            forbid_dangling_references,
            read_only,
        }
    }

    fn check_open(&self) -> Result<()> {
        match *self.state.lock().unwrap() {
            TxnState::Open => Ok(()),
            _ => Err(ObjDbError::StaleTransaction),
        }
    }

    pub fn state(&self) -> TxnState {
        *self.state.lock().unwrap()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The codec registry this transaction resolves field codec names
    /// against, for maintenance tools that need to re-validate encodings.
    pub fn codec_registry(&self) -> &CodecRegistry {
        &self.codec_registry
    }

    /// Reads the raw bytes at `key`, checking `pending` first.
    pub(crate) fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(op) = self.pending.lock().unwrap().get(key) {
            return Ok(match op {
                Operation::Put(v) => Some(v.clone()),
                Operation::Delete => None,
            });
        }
        self.kv.get(key)
    }

    pub(crate) fn raw_put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.lock().unwrap().insert(key, Operation::Put(value));
    }

    pub(crate) fn raw_delete(&self, key: Vec<u8>) {
        self.pending.lock().unwrap().insert(key, Operation::Delete);
    }

    /// Scans `prefix`-prefixed keys merging `pending` over the underlying
    /// store, in ascending key order.
    pub(crate) fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        use std::ops::Bound;
        let mut upper = prefix.to_vec();
        let end = loop {
            match upper.last_mut() {
                Some(b) if *b < 0xff => {
                    *b += 1;
                    break Bound::Excluded(upper);
                }
                Some(_) => {
                    upper.pop();
                }
                None => break Bound::Unbounded,
            }
        };
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .kv
            .scan((Bound::Included(prefix.to_vec()), end.clone()))?
            .into_iter()
            .collect();
        for (k, op) in self.pending.lock().unwrap().iter() {
            if !k.starts_with(prefix) {
                continue;
            }
            match op {
                Operation::Put(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                Operation::Delete => {
                    merged.remove(k);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    /// Creates a new object of type `type_id`, writing its meta key (which
    /// records the schema version it was created under), its object-version
    /// index entry, and an index entry for each indexed field at its
    /// default value (design doc §4.4.1, §3 object-version index).
    pub fn create(&self, type_id: StorageId) -> Result<ObjId> {
        self.check_open()?;
        let ty = self
            .schema
            .object_type(type_id)
            .ok_or(ObjDbError::UnknownType(type_id))?
            .clone();
        let suffix = self.next_suffix.fetch_add(1, AtomicOrdering::SeqCst);
        let id = ObjId::new(type_id, suffix);
        self.raw_put(fields::meta_key(id), self.schema.version.to_be_bytes().to_vec());
        self.raw_put(
            crate::layout::object_version_key(self.schema.version, id),
            Vec::new(),
        );
        crate::index::write_all_index_entries(self, &ty, id)?;
        for listener in self.listeners.lock().unwrap().iter() {
            listener.on_create(id);
        }
        Ok(id)
    }

    /// Reports whether `id` currently names a live object.
    pub fn exists(&self, id: ObjId) -> Result<bool> {
        Ok(self.raw_get(&fields::meta_key(id))?.is_some())
    }

    fn require_exists(&self, id: ObjId) -> Result<()> {
        if self.exists(id)? {
            Ok(())
        } else {
            Err(ObjDbError::DeletedObject(id))
        }
    }

    /// Reads the named field of `id`.
    pub fn read_field(&self, id: ObjId, field_name: &str) -> Result<fields::FieldValue> {
        self.check_open()?;
        self.require_exists(id)?;
        version::update_to_current(self, id)?;
        let ty = self
            .schema
            .object_type(id.type_id())
            .ok_or(ObjDbError::UnknownType(id.type_id()))?;
        let field = ty
            .field_by_name(field_name)
            .ok_or_else(|| ObjDbError::UnknownFieldName(field_name.to_string()))?;
        fields::read(self, id, field)
    }

    /// Writes the named field of `id`, maintaining every single-field and
    /// composite index entry the field participates in (design doc §4.4.3).
    pub fn write_field(&self, id: ObjId, field_name: &str, value: fields::FieldValue) -> Result<()> {
        self.check_open()?;
        self.require_exists(id)?;
        version::update_to_current(self, id)?;
        let ty = self
            .schema
            .object_type(id.type_id())
            .ok_or(ObjDbError::UnknownType(id.type_id()))?
            .clone();
        let field = ty
            .field_by_name(field_name)
            .cloned()
            .ok_or_else(|| ObjDbError::UnknownFieldName(field_name.to_string()))?;
        let old = crate::index::apply_field_write(self, &ty, id, &field, &value)?;
        let change = FieldChange {
            id,
            field: field.storage_id,
            old: old.clone(),
            new: value.clone(),
        };
        for listener in self.listeners.lock().unwrap().iter() {
            listener.on_change(change.clone());
        }
        let monitors = self.path_monitors.lock().unwrap();
        listeners::dispatch_path_monitors(self, &monitors, &change)?;
        Ok(())
    }

    /// Deletes `id`, applying reference-integrity cascades per design doc
    /// §4.4.4.
    pub fn delete(&self, id: ObjId) -> Result<bool> {
        self.check_open()?;
        delete::delete(self, id)
    }

    /// Returns every live object of type `type_id`.
    pub fn get_all(&self, type_id: StorageId) -> Result<Vec<ObjId>> {
        self.check_open()?;
        let rows = self.scan_prefix(&fields::meta_prefix_for_type(type_id))?;
        rows.into_iter()
            .map(|(k, _)| ObjId::decode(&k))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn add_listener(&self, listener: Listener) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// Registers a path-based field-change monitor (design doc §4.4.5).
    pub fn add_path_monitor(&self, monitor: PathMonitor) {
        self.path_monitors.lock().unwrap().push(monitor);
    }

    pub fn commit(&self) -> Result<()> {
        let timer = crate::metrics::TXN_COMMIT_LATENCY_SECONDS
            .with_label_values(&["attempted"])
            .start_timer();
        let result = self.commit_inner();
        timer.stop_and_record();
        result
    }

    fn commit_inner(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != TxnState::Open {
            return Err(ObjDbError::StaleTransaction);
        }
        if self.read_only {
            return Err(ObjDbError::StaleTransaction);
        }
        let batch_ops = std::mem::take(&mut *self.pending.lock().unwrap());
        let mut batch = WriteBatch::new();
        for (k, op) in batch_ops {
            match op {
                Operation::Put(v) => batch.put(k, v),
                Operation::Delete => batch.delete(k),
            }
        }
        self.kv.apply(batch)?;
        *state = TxnState::Committed;
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != TxnState::Open {
            return Err(ObjDbError::StaleTransaction);
        }
        self.pending.lock().unwrap().clear();
        *state = TxnState::RolledBack;
        Ok(())
    }

    /// Copies `id` from `self` into `dest`, including every field and index
    /// entry, per design doc §11 (`copyTo`). Does not recurse into
    /// referenced objects.
    pub fn copy_to(&self, id: ObjId, dest: &Transaction) -> Result<()> {
        self.check_open()?;
        self.require_exists(id)?;
        let ty = self
            .schema
            .object_type(id.type_id())
            .ok_or(ObjDbError::UnknownType(id.type_id()))?
            .clone();
        if !dest.exists(id)? {
            dest.raw_put(
                fields::meta_key(id),
                dest.schema.version.to_be_bytes().to_vec(),
            );
            dest.raw_put(
                crate::layout::object_version_key(dest.schema.version, id),
                Vec::new(),
            );
        }
        for field in ty.fields.values() {
            let value = fields::read(self, id, field)?;
            crate::index::apply_field_write(dest, &ty, id, field, &value)?;
        }
        Ok(())
    }
}

