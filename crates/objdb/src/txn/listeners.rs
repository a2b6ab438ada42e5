//! Field-change, create, delete, version-change, and path-based field
//! monitors (design doc §4.4.5).
//!
//! Listeners are invoked synchronously, in registration order, as each
//! mutation is applied within the transaction — not deferred to commit —
//! so a listener observing object creation inside the same transaction
//! that reads the new object back sees it as already existing.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::layout::{ObjId, StorageId};
use crate::schema::FieldKind;

use super::fields::{self, FieldValue};
use super::Transaction;

/// One observed field mutation.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub id: ObjId,
    pub field: StorageId,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// One observed schema-version migration ([`super::version::update_version`]).
#[derive(Debug, Clone)]
pub struct VersionChange {
    pub id: ObjId,
    pub old_version: u32,
    pub new_version: u32,
    pub removed: Vec<StorageId>,
    pub added: Vec<StorageId>,
}

/// A registered set of callbacks. Each is optional so a caller can listen
/// to just creates, just deletes, just field changes, or just version
/// migrations.
pub struct Listener {
    pub on_change: Option<Box<dyn Fn(FieldChange) + Send + Sync>>,
    pub on_create: Option<Box<dyn Fn(ObjId) + Send + Sync>>,
    pub on_delete: Option<Box<dyn Fn(ObjId) + Send + Sync>>,
    pub on_version_change: Option<Box<dyn Fn(VersionChange) + Send + Sync>>,
}

impl Listener {
    pub fn new() -> Self {
        Listener {
            on_change: None,
            on_create: None,
            on_delete: None,
            on_version_change: None,
        }
    }

    pub fn on_field_change(mut self, f: impl Fn(FieldChange) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(f));
        self
    }

    pub fn on_object_create(mut self, f: impl Fn(ObjId) + Send + Sync + 'static) -> Self {
        self.on_create = Some(Box::new(f));
        self
    }

    pub fn on_object_delete(mut self, f: impl Fn(ObjId) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Box::new(f));
        self
    }

    pub fn on_schema_version_change(mut self, f: impl Fn(VersionChange) + Send + Sync + 'static) -> Self {
        self.on_version_change = Some(Box::new(f));
        self
    }

    pub(crate) fn on_change(&self, change: FieldChange) {
        if let Some(f) = &self.on_change {
            f(change);
        }
    }

    pub(crate) fn on_create(&self, id: ObjId) {
        if let Some(f) = &self.on_create {
            f(id);
        }
    }

    pub(crate) fn on_delete(&self, id: ObjId) {
        if let Some(f) = &self.on_delete {
            f(id);
        }
    }

    pub(crate) fn on_version_change(&self, change: VersionChange) {
        if let Some(f) = &self.on_version_change {
            f(change);
        }
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

/// A path-based field-change monitor (design doc §4.4.5): `(fieldSID,
/// referencePath[], optional object-type filter, listener)`. `target_field`
/// names the field whose changes are observed (on any object of any type
/// that has it); `reference_path` is a sequence of reference-field storage
/// IDs walked *backwards* from the changed object, one hop per entry, to
/// find the set of "root" objects that transitively refer to it along that
/// exact path. An empty path makes the changed object itself the root.
pub struct PathMonitor {
    pub target_field: StorageId,
    pub reference_path: Vec<StorageId>,
    pub root_type: Option<StorageId>,
    callback: Box<dyn Fn(ObjId, &FieldChange) + Send + Sync>,
}

impl PathMonitor {
    pub fn new(
        target_field: StorageId,
        reference_path: Vec<StorageId>,
        root_type: Option<StorageId>,
        callback: impl Fn(ObjId, &FieldChange) + Send + Sync + 'static,
    ) -> Self {
        PathMonitor {
            target_field,
            reference_path,
            root_type,
            callback: Box::new(callback),
        }
    }
}

/// Every live object holding a reference field with storage ID `field_sid`
/// that currently points at `target`, across every object type that
/// defines such a field (reference-field storage IDs are unique schema-wide,
/// so at most one field per type can match).
fn referrers_via(txn: &Transaction, field_sid: StorageId, target: ObjId) -> Result<Vec<ObjId>> {
    let mut found = Vec::new();
    for type_id in txn.schema.object_types.keys().copied().collect::<Vec<_>>() {
        let ty = txn.schema.object_type(type_id).unwrap();
        let Some(field) = ty.field(field_sid) else {
            continue;
        };
        if !matches!(field.kind, FieldKind::Reference { .. }) {
            continue;
        }
        for obj in txn.get_all(type_id)? {
            if let FieldValue::Reference(Some(t)) = fields::read(txn, obj, field)? {
                if t == target {
                    found.push(obj);
                }
            }
        }
    }
    Ok(found)
}

/// Walks `monitor.reference_path` backwards from `changed`, hop by hop,
/// returning the deduplicated set of root objects reached, filtered by
/// `monitor.root_type` if set.
fn roots_for_monitor(txn: &Transaction, monitor: &PathMonitor, changed: ObjId) -> Result<Vec<ObjId>> {
    let mut frontier: BTreeSet<ObjId> = [changed].into_iter().collect();
    for &hop in &monitor.reference_path {
        let mut next = BTreeSet::new();
        for obj in &frontier {
            for referrer in referrers_via(txn, hop, *obj)? {
                next.insert(referrer);
            }
        }
        frontier = next;
    }
    let mut roots: Vec<ObjId> = frontier.into_iter().collect();
    if let Some(root_type) = monitor.root_type {
        roots.retain(|id| id.type_id() == root_type);
    }
    Ok(roots)
}

/// Dispatches `change` to every registered `monitors` entry whose
/// `target_field` matches, shortest `reference_path` first, firing each
/// matching monitor's callback exactly once per unique root object it finds.
pub(crate) fn dispatch_path_monitors(
    txn: &Transaction,
    monitors: &[PathMonitor],
    change: &FieldChange,
) -> Result<()> {
    let mut matching: Vec<&PathMonitor> = monitors
        .iter()
        .filter(|m| m.target_field == change.field)
        .collect();
    matching.sort_by_key(|m| m.reference_path.len());
    for monitor in matching {
        for root in roots_for_monitor(txn, monitor, change.id)? {
            (monitor.callback)(root, change);
        }
    }
    Ok(())
}
