//! Reference-integrity delete cascade (design doc §4.4.4).
//!
//! Finding every referrer of a to-be-deleted object would need a reverse
//! reference index; this engine doesn't maintain one, so `delete` instead
//! scans every reference field of every live object. That is
//! `O(objects * reference fields)` per delete, a scope cut from the
//! constant/logarithmic-time cascades a reverse index would give — separate
//! from (and not to be confused with) the forward single-field/composite
//! indexes in [`crate::index`], which *are* materialized.

use tracing::debug;

use crate::error::{ObjDbError, Result};
use crate::layout::ObjId;
use crate::schema::{FieldKind, OnDelete};

use super::fields::{self, FieldValue};
use super::listeners::FieldChange;
use super::Transaction;

/// Deletes `id`. Returns `false` if `id` was already gone.
pub(crate) fn delete(txn: &Transaction, id: ObjId) -> Result<bool> {
    if !txn.exists(id)? {
        return Ok(false);
    }
    delete_inner(txn, id)?;
    Ok(true)
}

fn delete_inner(txn: &Transaction, id: ObjId) -> Result<()> {
    apply_cascades_into(txn, id)?;

    let ty = txn
        .schema
        .object_type(id.type_id())
        .ok_or(ObjDbError::UnknownType(id.type_id()))?
        .clone();

    crate::index::remove_all_index_entries(txn, &ty, id)?;
    let recorded_version = super::version::recorded_version(txn, id)?;
    txn.raw_delete(crate::layout::object_version_key(recorded_version, id));

    for field in ty.fields.values() {
        fields::clear(txn, id, field)?;
    }
    txn.raw_delete(fields::meta_key(id));

    for listener in txn.listeners.lock().unwrap().iter() {
        listener.on_delete(id);
    }
    Ok(())
}

/// Finds every live object with a reference field pointing at `id` and
/// applies that field's `onDelete` behavior.
fn apply_cascades_into(txn: &Transaction, id: ObjId) -> Result<()> {
    let mut to_cascade_delete = Vec::new();

    for type_id in txn.schema.object_types.keys().copied().collect::<Vec<_>>() {
        let ty = txn.schema.object_type(type_id).unwrap().clone();
        let reference_fields: Vec<_> = ty
            .fields
            .values()
            .filter(|f| matches!(f.kind, FieldKind::Reference { .. }))
            .cloned()
            .collect();
        if reference_fields.is_empty() {
            continue;
        }
        for referrer in txn.get_all(type_id)? {
            if referrer == id {
                continue;
            }
            for field in &reference_fields {
                let FieldKind::Reference {
                    on_delete,
                    cascade_delete,
                    ..
                } = &field.kind
                else {
                    unreachable!()
                };
                let (on_delete, cascade_delete) = (*on_delete, *cascade_delete);
                let current = fields::read(txn, referrer, field)?;
                let points_at_target = matches!(&current, FieldValue::Reference(Some(t)) if *t == id);
                if !points_at_target {
                    continue;
                }
                match on_delete {
                    OnDelete::Nothing => {}
                    OnDelete::Exception => {
                        return Err(ObjDbError::ReferencedObject {
                            target: id,
                            referrer,
                            field: field.storage_id,
                        });
                    }
                    OnDelete::Unreference => {
                        crate::index::apply_field_write(
                            txn,
                            &ty,
                            referrer,
                            field,
                            &FieldValue::Reference(None),
                        )?;
                        let change = FieldChange {
                            id: referrer,
                            field: field.storage_id,
                            old: current.clone(),
                            new: FieldValue::Reference(None),
                        };
                        for listener in txn.listeners.lock().unwrap().iter() {
                            listener.on_change(change.clone());
                        }
                        let monitors = txn.path_monitors.lock().unwrap();
                        super::listeners::dispatch_path_monitors(txn, &monitors, &change)?;
                    }
                    OnDelete::Delete => {
                        if cascade_delete && !to_cascade_delete.contains(&referrer) {
                            debug!(?id, ?referrer, field = %field.name, "cascading delete to referrer");
                            to_cascade_delete.push(referrer);
                        }
                    }
                }
            }
        }
    }

    for referrer in to_cascade_delete {
        if txn.exists(referrer)? {
            delete_inner(txn, referrer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::registry::CodecRegistry;
    use crate::kv::mem::MemKv;
    use crate::layout::StorageId;
    use crate::schema::{FieldDef, ObjectTypeDef, Schema};
    use std::collections::BTreeMap;
    use std::sync::{Arc, RwLock};

    fn two_type_schema(on_delete: OnDelete) -> Schema {
        let parent_id = StorageId::new(10).unwrap();
        let child_id = StorageId::new(20).unwrap();
        let field_id = StorageId::new(1).unwrap();

        let mut child_fields = BTreeMap::new();
        child_fields.insert(
            field_id,
            FieldDef {
                storage_id: field_id,
                name: "parent".into(),
                kind: FieldKind::Reference {
                    allowed_types: vec![parent_id],
                    on_delete,
                    cascade_delete: true,
                },
                indexed: false,
            },
        );

        let mut object_types = BTreeMap::new();
        object_types.insert(
            parent_id,
            ObjectTypeDef {
                storage_id: parent_id,
                name: "Parent".into(),
                fields: BTreeMap::new(),
                composite_indexes: BTreeMap::new(),
            },
        );
        object_types.insert(
            child_id,
            ObjectTypeDef {
                storage_id: child_id,
                name: "Child".into(),
                fields: child_fields,
                composite_indexes: BTreeMap::new(),
            },
        );
        Schema {
            version: 1,
            object_types,
        }
    }

    fn new_txn(schema: Schema) -> Transaction {
        Transaction::new(
            Arc::new(MemKv::new()),
            Arc::new(schema),
            Arc::new(RwLock::new(crate::schema::registry::SchemaRegistry::new())),
            Arc::new(CodecRegistry::with_builtins()),
            false,
        )
    }

    #[test]
    fn exception_blocks_delete_while_referenced() {
        let txn = new_txn(two_type_schema(OnDelete::Exception));
        let parent_ty = StorageId::new(10).unwrap();
        let child_ty = StorageId::new(20).unwrap();
        let parent = txn.create(parent_ty).unwrap();
        let child = txn.create(child_ty).unwrap();
        txn.write_field(child, "parent", FieldValue::Reference(Some(parent)))
            .unwrap();

        assert!(txn.delete(parent).is_err());
    }

    #[test]
    fn unreference_nulls_out_the_field() {
        let txn = new_txn(two_type_schema(OnDelete::Unreference));
        let parent_ty = StorageId::new(10).unwrap();
        let child_ty = StorageId::new(20).unwrap();
        let parent = txn.create(parent_ty).unwrap();
        let child = txn.create(child_ty).unwrap();
        txn.write_field(child, "parent", FieldValue::Reference(Some(parent)))
            .unwrap();

        assert!(txn.delete(parent).unwrap());
        assert_eq!(
            txn.read_field(child, "parent").unwrap(),
            FieldValue::Reference(None)
        );
    }

    #[test]
    fn cascade_delete_removes_the_referrer_too() {
        let txn = new_txn(two_type_schema(OnDelete::Delete));
        let parent_ty = StorageId::new(10).unwrap();
        let child_ty = StorageId::new(20).unwrap();
        let parent = txn.create(parent_ty).unwrap();
        let child = txn.create(child_ty).unwrap();
        txn.write_field(child, "parent", FieldValue::Reference(Some(parent)))
            .unwrap();

        assert!(txn.delete(parent).unwrap());
        assert!(!txn.exists(child).unwrap());
    }
}
