//! In-memory view of every schema version recorded in a database (design
//! doc §4.3): enforces the cross-version structural compatibility rule
//! before a new or updated schema is accepted.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Schema;
use crate::error::{ObjDbError, Result};

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    versions: BTreeMap<u32, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            versions: BTreeMap::new(),
        }
    }

    pub fn get(&self, version: u32) -> Option<Arc<Schema>> {
        self.versions.get(&version).cloned()
    }

    pub fn latest(&self) -> Option<Arc<Schema>> {
        self.versions.values().next_back().cloned()
    }

    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.versions.keys().copied()
    }

    /// Records `schema` under its `version`, or verifies it matches the
    /// schema already recorded there. Always checks structural
    /// compatibility against every other recorded version.
    ///
    /// Returns an error if a different schema is already recorded under
    /// this version, or if `schema` conflicts on storage ID shape with any
    /// other recorded version.
    pub fn record_or_verify(&mut self, schema: Schema, allow_new_schema: bool) -> Result<()> {
        for (version, existing) in &self.versions {
            if *version == schema.version {
                continue;
            }
            if !schema.is_structurally_compatible_with(existing) {
                return Err(ObjDbError::SchemaMismatch(format!(
                    "schema version {} is structurally incompatible with recorded version {}",
                    schema.version, version
                )));
            }
        }

        match self.versions.get(&schema.version) {
            Some(existing) => {
                if !same_schema(existing, &schema) {
                    return Err(ObjDbError::SchemaMismatch(format!(
                        "a different schema is already recorded under version {}",
                        schema.version
                    )));
                }
            }
            None => {
                if !allow_new_schema {
                    return Err(ObjDbError::SchemaMismatch(format!(
                        "schema version {} is not recorded and allow_new_schema is not set",
                        schema.version
                    )));
                }
                self.versions.insert(schema.version, Arc::new(schema));
            }
        }
        Ok(())
    }

    /// Drops every recorded version with no object ever created under it,
    /// except `keep_at_least`, which is never removed (design doc §11,
    /// schema-version garbage collection). `in_use` names the versions that
    /// still have at least one live or historical object.
    pub fn garbage_collect(&mut self, in_use: &std::collections::HashSet<u32>, keep_at_least: u32) {
        self.versions
            .retain(|version, _| *version == keep_at_least || in_use.contains(version));
    }
}

fn same_schema(a: &Schema, b: &Schema) -> bool {
    a.version == b.version && a.is_structurally_compatible_with(b) && b.is_structurally_compatible_with(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::StorageId;
    use crate::schema::{FieldDef, FieldKind, ObjectTypeDef};
    use std::collections::BTreeMap as Map;

    fn schema(version: u32, codec: &str) -> Schema {
        let fid = StorageId::new(1).unwrap();
        let mut fields = Map::new();
        fields.insert(
            fid,
            FieldDef {
                storage_id: fid,
                name: "x".into(),
                kind: FieldKind::Simple {
                    codec_name: codec.into(),
                },
                indexed: false,
            },
        );
        let tid = StorageId::new(10).unwrap();
        let mut object_types = Map::new();
        object_types.insert(
            tid,
            ObjectTypeDef {
                storage_id: tid,
                name: "Type".into(),
                fields,
                composite_indexes: Map::new(),
            },
        );
        Schema {
            version,
            object_types,
        }
    }

    #[test]
    fn records_new_schema_and_rejects_incompatible_follow_up() {
        let mut registry = SchemaRegistry::new();
        registry.record_or_verify(schema(1, "int"), true).unwrap();
        assert!(registry.get(1).is_some());

        let err = registry.record_or_verify(schema(2, "long"), true);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_new_schema_without_allow_flag() {
        let mut registry = SchemaRegistry::new();
        let err = registry.record_or_verify(schema(1, "int"), false);
        assert!(err.is_err());
    }

    #[test]
    fn re_recording_identical_schema_is_a_no_op() {
        let mut registry = SchemaRegistry::new();
        registry.record_or_verify(schema(1, "int"), true).unwrap();
        registry.record_or_verify(schema(1, "int"), true).unwrap();
    }
}
