//! The database facade (design doc §4.6): opens the key/value store,
//! validates or initializes the format-version and schema-area meta keys,
//! and hands out live or read-only snapshot transactions.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::codec::registry::CodecRegistry;
use crate::error::{ObjDbError, Result};
use crate::kv::mem::MemKv;
use crate::kv::{KvStore, WriteBatch};
use crate::layout::{CURRENT_FORMAT_VERSION, FORMAT_VERSION_KEY};
use crate::schema::registry::SchemaRegistry;
use crate::schema::xml;
use crate::schema::Schema;
use crate::txn::Transaction;

/// An open object database.
pub struct Database {
    kv: Arc<dyn KvStore>,
    schema_registry: Arc<RwLock<SchemaRegistry>>,
    codec_registry: Arc<CodecRegistry>,
}

impl Database {
    /// Opens `kv` as an object database, writing the format-version key if
    /// this is a brand new store, or validating it if not (design doc §3).
    pub fn open(kv: Arc<dyn KvStore>) -> Result<Self> {
        match kv.get(FORMAT_VERSION_KEY)? {
            None => {
                let existing = kv.scan((std::ops::Bound::Unbounded, std::ops::Bound::Unbounded))?;
                if !existing.is_empty() {
                    return Err(ObjDbError::InconsistentDatabase(
                        "refusing to initialize: store already contains data with no format-version key".into(),
                    ));
                }
                info!(version = CURRENT_FORMAT_VERSION, "initializing new database");
                let mut batch = WriteBatch::new();
                batch.put(
                    FORMAT_VERSION_KEY.to_vec(),
                    CURRENT_FORMAT_VERSION.to_be_bytes().to_vec(),
                );
                kv.apply(batch)?;
            }
            Some(bytes) => {
                let version = u32::from_be_bytes(
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| ObjDbError::InconsistentDatabase("malformed format version key".into()))?,
                );
                if version > CURRENT_FORMAT_VERSION {
                    return Err(ObjDbError::InconsistentDatabase(format!(
                        "database format version {version} is newer than this engine's {CURRENT_FORMAT_VERSION}"
                    )));
                }
                if version < CURRENT_FORMAT_VERSION {
                    warn!(on_disk = version, current = CURRENT_FORMAT_VERSION, "opening database with an older format version");
                }
            }
        }

        let mut registry = SchemaRegistry::new();
        for (version, xml_bytes) in scan_recorded_schemas(kv.as_ref())? {
            let xml = xml::decompress(&xml_bytes)?;
            let schema = xml::from_xml(&xml)?;
            if schema.version != version {
                return Err(ObjDbError::InconsistentDatabase(format!(
                    "schema recorded under key version {version} encodes version {}",
                    schema.version
                )));
            }
            registry.record_or_verify(schema, true)?;
        }

        Ok(Database {
            kv,
            schema_registry: Arc::new(RwLock::new(registry)),
            codec_registry: Arc::new(CodecRegistry::with_builtins()),
        })
    }

    /// Opens a fresh in-memory database, primarily for tests and examples.
    pub fn open_in_memory() -> Result<Self> {
        Database::open(Arc::new(MemKv::new()))
    }

    /// Records `schema` (or verifies it matches what's already recorded)
    /// and begins a read/write transaction bound to it.
    pub fn begin(&self, schema: Schema, allow_new_schema: bool) -> Result<Transaction> {
        let version = schema.version;
        {
            let mut registry = self.schema_registry.write().unwrap();
            registry.record_or_verify(schema, allow_new_schema)?;
        }
        let recorded = {
            let registry = self.schema_registry.read().unwrap();
            registry.get(version).expect("just recorded")
        };
        self.persist_schema_if_new(version, &recorded)?;
        Ok(Transaction::new(
            self.kv.clone(),
            recorded,
            self.schema_registry.clone(),
            self.codec_registry.clone(),
            false,
        ))
    }

    /// Begins a transaction against the latest recorded schema without
    /// changing it.
    pub fn begin_with_latest(&self) -> Result<Transaction> {
        let recorded = {
            let registry = self.schema_registry.read().unwrap();
            registry
                .latest()
                .ok_or_else(|| ObjDbError::InvalidSchema("no schema recorded yet".into()))?
        };
        Ok(Transaction::new(
            self.kv.clone(),
            recorded,
            self.schema_registry.clone(),
            self.codec_registry.clone(),
            false,
        ))
    }

    /// Begins a read-only snapshot transaction against the latest recorded
    /// schema: dangling reference assignment is permitted and the
    /// transaction can never [`Transaction::commit`] (design doc §11).
    pub fn begin_snapshot(&self) -> Result<Transaction> {
        let recorded = {
            let registry = self.schema_registry.read().unwrap();
            registry
                .latest()
                .ok_or_else(|| ObjDbError::InvalidSchema("no schema recorded yet".into()))?
        };
        crate::snapshot::open_snapshot(
            self.kv.clone(),
            recorded,
            self.schema_registry.clone(),
            self.codec_registry.clone(),
        )
    }

    /// The underlying key/value store, for maintenance tools (`objdb-jsck`)
    /// that need to scan or repair the raw keyspace directly.
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// The live schema registry, for maintenance tools that need to inspect
    /// or garbage-collect recorded schema versions.
    pub fn schema_registry(&self) -> &Arc<RwLock<SchemaRegistry>> {
        &self.schema_registry
    }

    /// Deletes the recorded XML for every schema version in `versions` that
    /// is no longer present in the live [`SchemaRegistry`] (i.e. already
    /// garbage-collected there), reclaiming the matching `SCHEMA_PREFIX` keys.
    pub fn purge_schema_keys(&self, versions: &[u32]) -> Result<()> {
        let mut batch = WriteBatch::new();
        for &version in versions {
            batch.delete(schema_key(version));
        }
        self.kv.apply(batch)?;
        Ok(())
    }

    fn persist_schema_if_new(&self, version: u32, schema: &Schema) -> Result<()> {
        let key = schema_key(version);
        if self.kv.get(&key)?.is_some() {
            return Ok(());
        }
        let xml = xml::to_xml(schema)?;
        let compressed = xml::compress(&xml)?;
        let mut batch = WriteBatch::new();
        batch.put(key, compressed);
        self.kv.apply(batch)?;
        Ok(())
    }
}

fn schema_key(version: u32) -> Vec<u8> {
    let mut key = crate::layout::SCHEMA_PREFIX.to_vec();
    key.extend(version.to_be_bytes());
    key
}

fn scan_recorded_schemas(kv: &dyn KvStore) -> Result<Vec<(u32, Vec<u8>)>> {
    use std::ops::Bound;
    let prefix = crate::layout::SCHEMA_PREFIX.to_vec();
    let mut upper = prefix.clone();
    *upper.last_mut().unwrap() += 1;
    let rows = kv.scan((Bound::Included(prefix.clone()), Bound::Excluded(upper)))?;
    rows.into_iter()
        .map(|(k, v)| {
            let version_bytes = &k[prefix.len()..];
            let version = u32::from_be_bytes(
                version_bytes
                    .try_into()
                    .map_err(|_| ObjDbError::InconsistentDatabase("malformed schema key".into()))?,
            );
            Ok((version, v))
        })
        .collect()
}
