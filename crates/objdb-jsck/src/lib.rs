//! A consistency checker and repair tool for the `objdb` on-disk layout
//! (design doc §4.7): scans the entire key/value space, validates
//! well-formedness against the recorded schemas, and optionally repairs
//! what it finds.
//!
//! Besides the per-object field/reference validation in [`check_object`],
//! this checker walks `objdb`'s materialized object-version index (see
//! [`version_index`]) for staleness, since that keyspace — unlike the
//! single-field and composite indexes, which `objdb` also materializes but
//! this checker currently leaves unvalidated — names exactly one entry per
//! live object and is cheap to cross-check against the object's own
//! recorded version.

pub mod config;
pub mod issue;
mod meta;
mod version_index;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use objdb::{Database, ObjId, Result};

pub use config::JsckConfig;
pub use issue::{Issue, IssueKind};

/// The outcome of a single [`check`] run.
#[derive(Debug, Default)]
pub struct JsckReport {
    pub issues: Vec<Issue>,
    /// `true` if the issue limit was hit before the scan finished.
    pub truncated: bool,
    /// Schema versions purged by `--gc-schemas`, if requested.
    pub gc_schema_versions: Vec<u32>,
}

impl JsckReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Runs the checker against `db` per `config`, returning every issue found
/// (and, if `config.repair` is set, having already applied fixes for them).
pub fn check(db: &Database, config: &JsckConfig) -> Result<JsckReport> {
    let mut report = JsckReport::default();

    if !meta::check_format_version(db, config, &mut report)? {
        return Ok(report);
    }

    let schemas = match meta::check_schemas(db, config, &mut report)? {
        Some(schemas) => schemas,
        None => return Ok(report),
    };

    if !version_index::check_object_version_index(db, &schemas, config, &mut report)? {
        report.truncated = true;
        return Ok(report);
    }

    let mut in_use_versions: HashSet<u32> = HashSet::new();

    'outer: for (version, schema) in &schemas {
        let txn = db.begin(schema.as_ref().clone(), false)?;
        let mut hit_limit = false;
        for type_id in schema.object_types.keys().copied() {
            let ids = txn.get_all(type_id)?;
            if !ids.is_empty() {
                in_use_versions.insert(*version);
            }
            for id in ids {
                if !check_object(&txn, id, &mut report, config)? {
                    hit_limit = true;
                    break;
                }
            }
            if hit_limit {
                break;
            }
        }
        if config.repair {
            txn.commit()?;
        } else {
            txn.rollback().ok();
        }
        if hit_limit {
            report.truncated = true;
            break 'outer;
        }
    }

    if config.gc_schemas && !report.truncated {
        let keep = schemas.keys().copied().max().unwrap_or(0);
        let purge: Vec<u32> = schemas
            .keys()
            .copied()
            .filter(|v| *v != keep && !in_use_versions.contains(v))
            .collect();
        if !purge.is_empty() {
            {
                let mut registry = db.schema_registry().write().unwrap();
                registry.garbage_collect(&in_use_versions, keep);
            }
            db.purge_schema_keys(&purge)?;
            report.gc_schema_versions = purge;
        }
    }

    Ok(report)
}

/// Validates every defined field of `id`, recording (and, if `config.repair`
/// is set, fixing) anything malformed. Returns `false` once `config.limit`
/// issues have been recorded, signaling the caller to stop scanning.
fn check_object(
    txn: &objdb::Transaction,
    id: ObjId,
    report: &mut JsckReport,
    config: &JsckConfig,
) -> Result<bool> {
    let ty = match txn.schema().object_type(id.type_id()) {
        Some(ty) => ty,
        None => {
            report.issues.push(Issue {
                kind: IssueKind::InvalidKey,
                key: id.encode().to_vec(),
                old_value: None,
                new_value: None,
            });
            return Ok(report.issues.len() < config.limit);
        }
    };

    for field in ty.fields.values() {
        if let objdb::schema::FieldKind::Simple { codec_name } = &field.kind {
            let value = txn.read_field(id, &field.name)?;
            if let objdb::txn::fields::FieldValue::Simple(bytes) = value {
                let codec = match txn.codec_registry().resolve(codec_name) {
                    Some(c) => c,
                    None => continue,
                };
                if codec.validate_bytes(&bytes).is_err() {
                    let repaired = config.repair.then(|| codec.default_encoding());
                    report.issues.push(Issue {
                        kind: IssueKind::InvalidValue,
                        key: id.encode().to_vec(),
                        old_value: Some(bytes),
                        new_value: repaired.clone(),
                    });
                    if let Some(default_bytes) = repaired {
                        txn.write_field(
                            id,
                            &field.name,
                            objdb::txn::fields::FieldValue::Simple(default_bytes),
                        )?;
                    }
                    if report.issues.len() >= config.limit {
                        return Ok(false);
                    }
                }
            }
        }
        if let objdb::schema::FieldKind::Reference { .. } = &field.kind {
            if let objdb::txn::fields::FieldValue::Reference(Some(target)) =
                txn.read_field(id, &field.name)?
            {
                if !txn.exists(target)? {
                    report.issues.push(Issue {
                        kind: IssueKind::InvalidValue,
                        key: id.encode().to_vec(),
                        old_value: Some(target.encode().to_vec()),
                        new_value: None,
                    });
                    if config.repair {
                        txn.write_field(
                            id,
                            &field.name,
                            objdb::txn::fields::FieldValue::Reference(None),
                        )?;
                    }
                    if report.issues.len() >= config.limit {
                        return Ok(false);
                    }
                }
            }
        }
    }
    Ok(true)
}

/// Schemas recorded in `db`, keyed by version, after resolving `config`'s
/// forced overrides. Exposed for callers that want to inspect what the
/// checker would validate against without running a full scan.
pub fn resolve_schemas(db: &Database, config: &JsckConfig) -> BTreeMap<u32, Arc<objdb::schema::Schema>> {
    let mut schemas: BTreeMap<u32, Arc<objdb::schema::Schema>> = {
        let registry = db.schema_registry().read().unwrap();
        registry
            .versions()
            .filter_map(|v| registry.get(v).map(|s| (v, s)))
            .collect()
    };
    for (version, forced) in &config.force_schemas {
        schemas.insert(*version, Arc::new(forced.clone()));
    }
    schemas
}
