//! The field write algorithm (design doc §4.4.3): key layout for each
//! [`crate::schema::FieldKind`], default-value normalization, and
//! reference-integrity validation on write.
//!
//! Every collection kind (`Set`/`List`/`Map`) is stored as one KV entry per
//! element/pair under the field's key prefix, matching the data model's
//! keying table: `Set` by the element's own encoding, `List` by
//! `varUInt(index)`, `Map` by the key's encoding. `write`'s collection arms
//! always clear the field's whole key range first and re-lay it out from
//! the new value, which is `O(collection size)` per write rather than
//! `O(changed elements)`; see `DESIGN.md`.

use std::collections::{BTreeMap as Map, BTreeSet};

use crate::error::{ObjDbError, Result};
use crate::layout::{ObjId, StorageId};
use crate::schema::{FieldDef, FieldKind};

use super::Transaction;

/// A field's value, keyed loosely to [`FieldKind`]. Simple/Reference
/// payloads are carried as already-encoded bytes so this type doesn't need
/// to know about every possible Rust value type a schema might name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Simple(Vec<u8>),
    Counter(i64),
    Reference(Option<ObjId>),
    Set(BTreeSet<Vec<u8>>),
    List(Vec<Vec<u8>>),
    Map(Map<Vec<u8>, Vec<u8>>),
}

pub(crate) fn meta_key(id: ObjId) -> Vec<u8> {
    id.encode().to_vec()
}

pub(crate) fn meta_prefix_for_type(type_id: StorageId) -> Vec<u8> {
    // An ObjId's high bits are its type's storage ID, so every object of
    // `type_id` shares this 8-byte-aligned-from-the-top prefix once we
    // truncate to the bytes the type ID occupies.
    let probe = ObjId::new(type_id, 0).encode();
    let suffix_bytes = 4; // SUFFIX_BITS / 8 in layout.rs
    probe[..probe.len() - suffix_bytes].to_vec()
}

fn field_key(id: ObjId, field: &FieldDef) -> Vec<u8> {
    let mut key = meta_key(id);
    key.extend(field.storage_id.encode());
    key
}

fn element_key(id: ObjId, field: &FieldDef, element: &[u8]) -> Vec<u8> {
    let mut key = field_key(id, field);
    key.extend_from_slice(element);
    key
}

pub(crate) fn read(txn: &Transaction, id: ObjId, field: &FieldDef) -> Result<FieldValue> {
    match &field.kind {
        FieldKind::Simple { codec_name } => {
            let codec = txn
                .codec_registry
                .resolve(codec_name)
                .ok_or_else(|| ObjDbError::InvalidSchema(format!("unknown codec {codec_name}")))?;
            match txn.raw_get(&field_key(id, field))? {
                Some(bytes) => Ok(FieldValue::Simple(bytes)),
                None => Ok(FieldValue::Simple(codec.default_encoding())),
            }
        }
        FieldKind::Counter => match txn.raw_get(&field_key(id, field))? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(FieldValue::Counter(i64::from_be_bytes(buf)))
            }
            _ => Ok(FieldValue::Counter(0)),
        },
        FieldKind::Reference { .. } => match txn.raw_get(&field_key(id, field))? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                let raw = u64::from_be_bytes(buf);
                Ok(FieldValue::Reference(if raw == 0 {
                    None
                } else {
                    Some(ObjId::from_raw(raw))
                }))
            }
            _ => Ok(FieldValue::Reference(None)),
        },
        FieldKind::Set { .. } => {
            let prefix = field_key(id, field);
            let elements = txn
                .scan_prefix(&prefix)?
                .into_iter()
                .map(|(k, _)| k[prefix.len()..].to_vec())
                .collect();
            Ok(FieldValue::Set(elements))
        }
        FieldKind::List { .. } => {
            // Keys are `prefix ++ varUInt(index)`; the ordered varint
            // encoding preserves numeric order, so a prefix scan already
            // yields elements in index order.
            let prefix = field_key(id, field);
            let elements = txn
                .scan_prefix(&prefix)?
                .into_iter()
                .map(|(_, v)| v)
                .collect();
            Ok(FieldValue::List(elements))
        }
        FieldKind::Map { .. } => {
            let prefix = field_key(id, field);
            let entries = txn
                .scan_prefix(&prefix)?
                .into_iter()
                .map(|(k, v)| (k[prefix.len()..].to_vec(), v))
                .collect();
            Ok(FieldValue::Map(entries))
        }
    }
}

pub(crate) fn write(
    txn: &Transaction,
    id: ObjId,
    field: &FieldDef,
    value: &FieldValue,
) -> Result<()> {
    match (&field.kind, value) {
        (FieldKind::Simple { codec_name }, FieldValue::Simple(bytes)) => {
            let codec = txn
                .codec_registry
                .resolve(codec_name)
                .ok_or_else(|| ObjDbError::InvalidSchema(format!("unknown codec {codec_name}")))?;
            codec.validate_bytes(bytes)?;
            let key = field_key(id, field);
            if *bytes == codec.default_encoding() {
                txn.raw_delete(key);
            } else {
                txn.raw_put(key, bytes.clone());
            }
            Ok(())
        }
        (FieldKind::Counter, FieldValue::Counter(v)) => {
            let key = field_key(id, field);
            if *v == 0 {
                txn.raw_delete(key);
            } else {
                txn.raw_put(key, v.to_be_bytes().to_vec());
            }
            Ok(())
        }
        (FieldKind::Reference { allowed_types, .. }, FieldValue::Reference(target)) => {
            if let Some(target_id) = target {
                if !allowed_types.is_empty() && !allowed_types.contains(&target_id.type_id()) {
                    return Err(ObjDbError::InvalidSchema(format!(
                        "reference to type {} not allowed by field {}",
                        target_id.type_id(),
                        field.name
                    )));
                }
                if txn.forbid_dangling_references && !txn.exists(*target_id)? {
                    return Err(ObjDbError::DeletedAssignment(*target_id));
                }
            }
            let key = field_key(id, field);
            match target {
                None => txn.raw_delete(key),
                Some(t) => txn.raw_put(key, t.raw().to_be_bytes().to_vec()),
            }
            Ok(())
        }
        (FieldKind::Set { .. }, FieldValue::Set(elements)) => {
            let prefix = field_key(id, field);
            for (k, _) in txn.scan_prefix(&prefix)? {
                txn.raw_delete(k);
            }
            for element in elements {
                txn.raw_put(element_key(id, field, element), Vec::new());
            }
            Ok(())
        }
        (FieldKind::List { .. }, FieldValue::List(elements)) => {
            let prefix = field_key(id, field);
            for (k, _) in txn.scan_prefix(&prefix)? {
                txn.raw_delete(k);
            }
            for (index, elem) in elements.iter().enumerate() {
                let mut key = prefix.clone();
                key.extend(crate::codec::varint::write_varuint(index as u64));
                txn.raw_put(key, elem.clone());
            }
            Ok(())
        }
        (FieldKind::Map { .. }, FieldValue::Map(entries)) => {
            let prefix = field_key(id, field);
            for (k, _) in txn.scan_prefix(&prefix)? {
                txn.raw_delete(k);
            }
            for (k, v) in entries {
                let mut key = prefix.clone();
                key.extend_from_slice(k);
                txn.raw_put(key, v.clone());
            }
            Ok(())
        }
        _ => Err(ObjDbError::InvalidSchema(format!(
            "value shape does not match field {} kind",
            field.name
        ))),
    }
}

/// Removes every key belonging to `field` of `id` (used by cascading
/// unreference/delete in [`super::delete`]).
pub(crate) fn clear(txn: &Transaction, id: ObjId, field: &FieldDef) -> Result<()> {
    match field.kind {
        FieldKind::Set { .. } | FieldKind::List { .. } | FieldKind::Map { .. } => {
            let prefix = field_key(id, field);
            for (k, _) in txn.scan_prefix(&prefix)? {
                txn.raw_delete(k);
            }
        }
        _ => txn.raw_delete(field_key(id, field)),
    }
    Ok(())
}

