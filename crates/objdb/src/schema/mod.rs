//! The versioned object-type model (design doc §4.3, §4.4.6) and its XML
//! serialization (design doc §3 format versions, §9.1 storage ID recording).

pub mod registry;
pub mod xml;

use std::collections::BTreeMap;

use crate::codec::registry::ByteCodec;
use crate::layout::StorageId;
use std::sync::Arc;

/// How an `onDelete` cascade for a reference field behaves when its
/// referent is deleted (design doc §4.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Leave the referring field untouched.
    Nothing,
    /// Block the delete with [`crate::error::ObjDbError::ReferencedObject`].
    Exception,
    /// Null out (or remove from collection) the referring field.
    Unreference,
    /// Recursively delete the referrer too.
    Delete,
}

/// The kind of a field within an object type.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A plain value field backed by a named [`ByteCodec`].
    Simple { codec_name: String },
    /// A monotonic counter field, stored outside normal field versioning.
    Counter,
    /// A reference to another object, with delete-cascade behavior.
    Reference {
        allowed_types: Vec<StorageId>,
        on_delete: OnDelete,
        cascade_delete: bool,
    },
    /// An unordered collection of unique elements.
    Set { element_codec_name: String },
    /// An ordered, index-addressable collection.
    List { element_codec_name: String },
    /// A key-to-value association.
    Map {
        key_codec_name: String,
        value_codec_name: String,
    },
}

/// One field of an object type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub storage_id: StorageId,
    pub name: String,
    pub kind: FieldKind,
    /// Whether the field (or, for collection sub-fields, its elements) is
    /// indexed for single-field index queries.
    pub indexed: bool,
}

/// A composite index spanning 2-4 fields of the same object type, by
/// storage ID, in index order.
#[derive(Debug, Clone)]
pub struct CompositeIndexDef {
    pub storage_id: StorageId,
    pub name: String,
    pub field_storage_ids: Vec<StorageId>,
}

/// One versioned object type.
#[derive(Debug, Clone)]
pub struct ObjectTypeDef {
    pub storage_id: StorageId,
    pub name: String,
    pub fields: BTreeMap<StorageId, FieldDef>,
    pub composite_indexes: BTreeMap<StorageId, CompositeIndexDef>,
}

impl ObjectTypeDef {
    pub fn field(&self, storage_id: StorageId) -> Option<&FieldDef> {
        self.fields.get(&storage_id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.values().find(|f| f.name == name)
    }
}

/// One recorded schema version: every object type known as of that version.
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: u32,
    pub object_types: BTreeMap<StorageId, ObjectTypeDef>,
}

impl Schema {
    pub fn object_type(&self, storage_id: StorageId) -> Option<&ObjectTypeDef> {
        self.object_types.get(&storage_id)
    }

    /// Checks that `self` is structurally compatible with `other`: every
    /// storage ID present in both schemas names an item of the same kind,
    /// with the same encoding-relevant shape. Names and indexed-ness may
    /// differ freely (design doc §4.3 schema compatibility rule).
    pub fn is_structurally_compatible_with(&self, other: &Schema) -> bool {
        for (id, ty) in &self.object_types {
            if let Some(other_ty) = other.object_types.get(id) {
                if !fields_compatible(ty, other_ty) {
                    return false;
                }
            }
        }
        true
    }
}

fn fields_compatible(a: &ObjectTypeDef, b: &ObjectTypeDef) -> bool {
    for (id, field) in &a.fields {
        if let Some(other_field) = b.fields.get(id) {
            if !same_kind_shape(&field.kind, &other_field.kind) {
                return false;
            }
        }
    }
    true
}

fn same_kind_shape(a: &FieldKind, b: &FieldKind) -> bool {
    match (a, b) {
        (FieldKind::Simple { codec_name: ca }, FieldKind::Simple { codec_name: cb }) => ca == cb,
        (FieldKind::Counter, FieldKind::Counter) => true,
        (
            FieldKind::Reference {
                allowed_types: ta, ..
            },
            FieldKind::Reference {
                allowed_types: tb, ..
            },
        ) => ta == tb,
        (
            FieldKind::Set {
                element_codec_name: ea,
            },
            FieldKind::Set {
                element_codec_name: eb,
            },
        ) => ea == eb,
        (
            FieldKind::List {
                element_codec_name: ea,
            },
            FieldKind::List {
                element_codec_name: eb,
            },
        ) => ea == eb,
        (
            FieldKind::Map {
                key_codec_name: ka,
                value_codec_name: va,
            },
            FieldKind::Map {
                key_codec_name: kb,
                value_codec_name: vb,
            },
        ) => ka == kb && va == vb,
        _ => false,
    }
}

/// Resolves a [`FieldDef`]'s simple-value codec name to a concrete
/// [`ByteCodec`], looking it up in `registry`.
pub fn resolve_codec(
    registry: &crate::codec::registry::CodecRegistry,
    codec_name: &str,
) -> Option<Arc<dyn ByteCodec>> {
    registry.resolve(codec_name)
}
