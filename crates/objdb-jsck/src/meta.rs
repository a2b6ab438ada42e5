//! The checker's first two scan steps (design doc §4.7 steps 1-3): the
//! format-version key and the recorded-schema keyspace.

use std::collections::BTreeMap;
use std::sync::Arc;

use objdb::layout::{CURRENT_FORMAT_VERSION, FORMAT_VERSION_KEY, SCHEMA_PREFIX};
use objdb::schema::{xml, Schema};
use objdb::{Database, Result};

use crate::issue::{Issue, IssueKind};
use crate::{JsckConfig, JsckReport};

/// Step 1: reads the format-version key. Returns `false` (having recorded
/// an issue) if it's missing or corrupt and no override was forced.
pub(crate) fn check_format_version(
    db: &Database,
    config: &JsckConfig,
    report: &mut JsckReport,
) -> Result<bool> {
    if config.force_format_version.is_some() {
        return Ok(true);
    }
    match db.kv().get(FORMAT_VERSION_KEY)? {
        Some(bytes) if bytes.len() == 4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes);
            let version = u32::from_be_bytes(buf);
            if version > CURRENT_FORMAT_VERSION {
                report.issues.push(Issue {
                    kind: IssueKind::InvalidValue,
                    key: FORMAT_VERSION_KEY.to_vec(),
                    old_value: Some(bytes),
                    new_value: None,
                });
                return Ok(false);
            }
            Ok(true)
        }
        Some(bytes) => {
            report.issues.push(Issue {
                kind: IssueKind::InvalidValue,
                key: FORMAT_VERSION_KEY.to_vec(),
                old_value: Some(bytes),
                new_value: None,
            });
            Ok(false)
        }
        None => {
            report.issues.push(Issue {
                kind: IssueKind::MissingKey,
                key: FORMAT_VERSION_KEY.to_vec(),
                old_value: None,
                new_value: None,
            });
            Ok(false)
        }
    }
}

/// Step 3: decodes every recorded schema, applies `config.force_schemas`
/// overrides, and validates the full set for mutual structural
/// compatibility. Returns `None` (having recorded an issue) if the set is
/// inconsistent and no overrides resolve it.
pub(crate) fn check_schemas(
    db: &Database,
    config: &JsckConfig,
    report: &mut JsckReport,
) -> Result<Option<BTreeMap<u32, Arc<Schema>>>> {
    let mut schemas: BTreeMap<u32, Arc<Schema>> = BTreeMap::new();
    for (version, key, xml_bytes) in scan_schema_keys(db)? {
        if let Some(forced) = config.force_schemas.get(&version) {
            schemas.insert(version, Arc::new(forced.clone()));
            continue;
        }
        let decoded = xml::decompress(&xml_bytes).and_then(|x| xml::from_xml(&x));
        match decoded {
            Ok(schema) if schema.version == version => {
                schemas.insert(version, Arc::new(schema));
            }
            _ => {
                report.issues.push(Issue {
                    kind: IssueKind::InvalidValue,
                    key,
                    old_value: Some(xml_bytes),
                    new_value: None,
                });
                if report.issues.len() >= config.limit {
                    return Ok(None);
                }
            }
        }
    }

    for (version, schema) in &schemas {
        for (other_version, other) in &schemas {
            if other_version == version {
                continue;
            }
            if !schema.is_structurally_compatible_with(other) {
                report.issues.push(Issue {
                    kind: IssueKind::InvalidValue,
                    key: schema_key(*version),
                    old_value: None,
                    new_value: None,
                });
                return Ok(None);
            }
        }
    }

    Ok(Some(schemas))
}

fn schema_key(version: u32) -> Vec<u8> {
    let mut key = SCHEMA_PREFIX.to_vec();
    key.extend(version.to_be_bytes());
    key
}

fn scan_schema_keys(db: &Database) -> Result<Vec<(u32, Vec<u8>, Vec<u8>)>> {
    use std::ops::Bound;
    let prefix = SCHEMA_PREFIX.to_vec();
    let mut upper = prefix.clone();
    *upper.last_mut().unwrap() += 1;
    let rows = db
        .kv()
        .scan((Bound::Included(prefix.clone()), Bound::Excluded(upper)))?;
    let mut out = Vec::new();
    for (k, v) in rows {
        let version_bytes = &k[prefix.len()..];
        let mut buf = [0u8; 4];
        if version_bytes.len() != 4 {
            continue;
        }
        buf.copy_from_slice(version_bytes);
        out.push((u32::from_be_bytes(buf), k, v));
    }
    Ok(out)
}
