//! Schema-version upgrade on access (design doc §4.4.6): an object created
//! under an older recorded schema is migrated, field by field, to a target
//! schema version — either implicitly to the transaction's bound schema the
//! first time it's touched ([`update_to_current`]), or explicitly to any
//! recorded version ([`update_version`]).

use crate::error::{ObjDbError, Result};
use crate::layout::{ObjId, StorageId};
use crate::schema::Schema;

use super::fields;
use super::listeners::VersionChange;
use super::Transaction;
use std::sync::Arc;

/// Returns the schema version `id` was last updated to.
pub fn recorded_version(txn: &Transaction, id: ObjId) -> Result<u32> {
    match txn.raw_get(&fields::meta_key(id))? {
        Some(bytes) if bytes.len() == 4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes);
            Ok(u32::from_be_bytes(buf))
        }
        _ => Err(ObjDbError::DeletedObject(id)),
    }
}

fn resolve_schema(txn: &Transaction, version: u32) -> Result<Arc<Schema>> {
    if version == txn.schema.version {
        return Ok(txn.schema.clone());
    }
    txn.schema_registry
        .read()
        .unwrap()
        .get(version)
        .ok_or_else(|| ObjDbError::SchemaMismatch(format!("schema version {version} is not recorded")))
}

/// Migrates `id` to `target_version`, diffing the object's type between the
/// schema it's currently recorded under and `target_version` (design doc
/// §4.4.6). Fields present in both versions are left untouched; fields
/// dropped by the target version have their data and index entries removed;
/// fields newly added by the target version simply read as their default
/// until explicitly written. Returns `false` if `id` was already at
/// `target_version`.
pub fn update_version(txn: &Transaction, id: ObjId, target_version: u32) -> Result<bool> {
    let old_version = recorded_version(txn, id)?;
    if old_version == target_version {
        return Ok(false);
    }

    let old_schema = resolve_schema(txn, old_version)?;
    let new_schema = resolve_schema(txn, target_version)?;
    let old_ty = old_schema
        .object_type(id.type_id())
        .ok_or(ObjDbError::UnknownType(id.type_id()))?;
    let new_ty = new_schema
        .object_type(id.type_id())
        .ok_or(ObjDbError::UnknownType(id.type_id()))?;

    let removed: Vec<StorageId> = old_ty
        .fields
        .keys()
        .filter(|fid| !new_ty.fields.contains_key(fid))
        .copied()
        .collect();
    let added: Vec<StorageId> = new_ty
        .fields
        .keys()
        .filter(|fid| !old_ty.fields.contains_key(fid))
        .copied()
        .collect();

    for fid in &removed {
        let field = old_ty.field(*fid).unwrap();
        if field.indexed {
            let value = fields::read(txn, id, field)?;
            if let Some(bytes) = crate::index::field_value_bytes(&value) {
                txn.raw_delete(crate::index::simple_index_key(field.storage_id, &bytes, id));
            }
        }
        for index in old_ty.composite_indexes.values() {
            if index.field_storage_ids.contains(fid) {
                if let Some(key) = crate::index::composite_index_key_current(txn, old_ty, index, id)? {
                    txn.raw_delete(key);
                }
            }
        }
        fields::clear(txn, id, field)?;
    }

    txn.raw_delete(crate::layout::object_version_key(old_version, id));
    txn.raw_put(crate::layout::object_version_key(target_version, id), Vec::new());
    txn.raw_put(fields::meta_key(id), target_version.to_be_bytes().to_vec());

    for listener in txn.listeners.lock().unwrap().iter() {
        listener.on_version_change(VersionChange {
            id,
            old_version,
            new_version: target_version,
            removed: removed.clone(),
            added: added.clone(),
        });
    }

    Ok(true)
}

/// Migrates `id` to the transaction's bound schema version. A thin wrapper
/// over [`update_version`] for the common implicit-upgrade-on-access path.
pub fn update_to_current(txn: &Transaction, id: ObjId) -> Result<bool> {
    update_version(txn, id, txn.schema.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::registry::CodecRegistry;
    use crate::kv::mem::MemKv;
    use crate::layout::StorageId;
    use crate::schema::Schema;
    use std::collections::BTreeMap;
    use std::sync::{Arc, RwLock};

    fn empty_schema(version: u32) -> Schema {
        Schema {
            version,
            object_types: BTreeMap::new(),
        }
    }

    #[test]
    fn update_to_current_bumps_recorded_version() {
        let kv = Arc::new(MemKv::new());
        let schema_registry = Arc::new(RwLock::new(crate::schema::registry::SchemaRegistry::new()));
        let codec_registry = Arc::new(CodecRegistry::with_builtins());

        let mut schema_v1 = empty_schema(1);
        schema_v1.object_types.insert(
            StorageId::new(10).unwrap(),
            crate::schema::ObjectTypeDef {
                storage_id: StorageId::new(10).unwrap(),
                name: "T".into(),
                fields: BTreeMap::new(),
                composite_indexes: BTreeMap::new(),
            },
        );
        let txn_v1 = Transaction::new(
            kv.clone(),
            Arc::new(schema_v1.clone()),
            schema_registry.clone(),
            codec_registry.clone(),
            false,
        );
        let id = txn_v1.create(StorageId::new(10).unwrap()).unwrap();
        txn_v1.commit().unwrap();
        schema_registry
            .write()
            .unwrap()
            .record_or_verify(schema_v1.clone(), true)
            .unwrap();

        let mut schema_v2 = schema_v1;
        schema_v2.version = 2;
        let txn_v2 = Transaction::new(kv, Arc::new(schema_v2), schema_registry, codec_registry, false);
        assert_eq!(recorded_version(&txn_v2, id).unwrap(), 1);
        assert!(update_to_current(&txn_v2, id).unwrap());
        assert_eq!(recorded_version(&txn_v2, id).unwrap(), 2);
    }

    #[test]
    fn update_version_drops_removed_field_and_its_index_entry_and_notifies_listener() {
        use crate::codec::primitives::I32Codec;
        use crate::schema::{FieldDef, FieldKind, ObjectTypeDef};
        use std::sync::atomic::{AtomicUsize, Ordering};

        let tid = StorageId::new(10).unwrap();
        let fid = StorageId::new(1).unwrap();

        let mut fields_v1 = BTreeMap::new();
        fields_v1.insert(
            fid,
            FieldDef {
                storage_id: fid,
                name: "age".into(),
                kind: FieldKind::Simple {
                    codec_name: "int".into(),
                },
                indexed: true,
            },
        );
        let mut types_v1 = BTreeMap::new();
        types_v1.insert(
            tid,
            ObjectTypeDef {
                storage_id: tid,
                name: "T".into(),
                fields: fields_v1,
                composite_indexes: BTreeMap::new(),
            },
        );
        let schema_v1 = Schema {
            version: 1,
            object_types: types_v1,
        };

        let schema_v2 = Schema {
            version: 2,
            object_types: {
                let mut types = BTreeMap::new();
                types.insert(
                    tid,
                    ObjectTypeDef {
                        storage_id: tid,
                        name: "T".into(),
                        fields: BTreeMap::new(),
                        composite_indexes: BTreeMap::new(),
                    },
                );
                types
            },
        };

        let kv = Arc::new(MemKv::new());
        let schema_registry = Arc::new(RwLock::new(crate::schema::registry::SchemaRegistry::new()));
        let codec_registry = Arc::new(CodecRegistry::with_builtins());

        let txn_v1 = Transaction::new(
            kv.clone(),
            Arc::new(schema_v1.clone()),
            schema_registry.clone(),
            codec_registry.clone(),
            false,
        );
        let id = txn_v1.create(tid).unwrap();
        txn_v1.commit().unwrap();
        schema_registry
            .write()
            .unwrap()
            .record_or_verify(schema_v1, true)
            .unwrap();

        let txn_v2 = Transaction::new(kv, Arc::new(schema_v2), schema_registry, codec_registry, false);

        let notified = Arc::new(AtomicUsize::new(0));
        let notified2 = notified.clone();
        txn_v2.add_listener(crate::txn::Listener::new().on_schema_version_change(move |change| {
            assert_eq!(change.old_version, 1);
            assert_eq!(change.new_version, 2);
            assert_eq!(change.removed, vec![fid]);
            assert!(change.added.is_empty());
            notified2.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(update_to_current(&txn_v2, id).unwrap());
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        let zero = crate::codec::encode(&I32Codec, &0);
        let stale_index_key = crate::index::simple_index_key(fid, &zero, id);
        assert!(txn_v2.raw_get(&stale_index_key).unwrap().is_none());
    }
}
