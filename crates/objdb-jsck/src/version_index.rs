//! Object-version index consistency (design doc §4.7 bullet 6): every
//! `0x00 0x80 ‖ varUInt(version) ‖ ObjId` entry must name an object that's
//! actually live and currently recorded at that exact version.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use objdb::layout::{decode_object_version_key, OBJECT_VERSION_PREFIX};
use objdb::kv::WriteBatch;
use objdb::schema::Schema;
use objdb::{Database, Result};

use crate::issue::{Issue, IssueKind};
use crate::{JsckConfig, JsckReport};

/// Step 6: scans the whole object-version index, flagging (and, if
/// `config.repair` is set, deleting) every entry whose key doesn't decode,
/// whose version names a schema that was never recorded, or whose object
/// is gone or recorded under a different version. Returns `false` once
/// `config.limit` issues have accumulated.
pub(crate) fn check_object_version_index(
    db: &Database,
    schemas: &BTreeMap<u32, Arc<Schema>>,
    config: &JsckConfig,
    report: &mut JsckReport,
) -> Result<bool> {
    for (key, _) in scan_object_version_index(db)? {
        let decoded = decode_object_version_key(&key);
        let stale = match decoded {
            Err(_) => true,
            Ok((version, id)) => match schemas.get(&version) {
                None => true,
                Some(schema) => {
                    let txn = db.begin(schema.as_ref().clone(), false)?;
                    let exists = txn.exists(id)?;
                    let recorded = if exists {
                        objdb::txn::version::recorded_version(&txn, id).ok()
                    } else {
                        None
                    };
                    txn.rollback().ok();
                    !exists || recorded != Some(version)
                }
            },
        };
        if !stale {
            continue;
        }
        report.issues.push(Issue {
            kind: IssueKind::InvalidKey,
            key: key.clone(),
            old_value: None,
            new_value: None,
        });
        if config.repair {
            let mut batch = WriteBatch::new();
            batch.delete(key);
            db.kv().apply(batch)?;
        }
        if report.issues.len() >= config.limit {
            return Ok(false);
        }
    }
    Ok(true)
}

fn scan_object_version_index(db: &Database) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let prefix = OBJECT_VERSION_PREFIX.to_vec();
    let mut upper = prefix.clone();
    *upper.last_mut().unwrap() += 1;
    db.kv()
        .scan((Bound::Included(prefix), Bound::Excluded(upper)))
}
