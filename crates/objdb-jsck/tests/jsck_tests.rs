//! End-to-end checker behavior (design doc §4.7, §8's "checker fixed-point"
//! property), driven entirely through `objdb`'s public API plus
//! `objdb_jsck::check`.

use std::collections::BTreeMap;

use objdb::kv::WriteBatch;
use objdb::schema::{FieldDef, FieldKind, ObjectTypeDef, OnDelete, Schema};
use objdb::txn::fields::FieldValue;
use objdb::{Database, ObjId, StorageId};
use objdb_jsck::{check, JsckConfig};

/// `write_field` validates before storing, so there is no public way to get
/// malformed bytes into a field through the normal API — a real checker
/// needs to cope with corruption that arrived some other way (a bug in an
/// older engine version, a hand-edited backup). This reconstructs the same
/// raw key `txn::fields::field_key` would, using only public layout types,
/// and writes straight through the KV store to simulate that.
fn corrupt_simple_field(db: &Database, id: ObjId, field: StorageId, bytes: Vec<u8>) {
    let mut key = id.encode().to_vec();
    key.extend(field.encode());
    let mut batch = WriteBatch::new();
    batch.put(key, bytes);
    db.kv().apply(batch).unwrap();
}

fn schema_with_reference() -> (Schema, StorageId, StorageId, StorageId) {
    let person = StorageId::new(10).unwrap();
    let age_field = StorageId::new(1).unwrap();
    let friend_field = StorageId::new(2).unwrap();

    let mut fields = BTreeMap::new();
    fields.insert(
        age_field,
        FieldDef {
            storage_id: age_field,
            name: "age".into(),
            kind: FieldKind::Simple {
                codec_name: "int".into(),
            },
            indexed: false,
        },
    );
    fields.insert(
        friend_field,
        FieldDef {
            storage_id: friend_field,
            name: "friend".into(),
            kind: FieldKind::Reference {
                allowed_types: vec![person],
                on_delete: OnDelete::Nothing,
                cascade_delete: false,
            },
            indexed: false,
        },
    );

    let mut object_types = BTreeMap::new();
    object_types.insert(
        person,
        ObjectTypeDef {
            storage_id: person,
            name: "Person".into(),
            fields,
            composite_indexes: BTreeMap::new(),
        },
    );
    (
        Schema {
            version: 1,
            object_types,
        },
        person,
        age_field,
        friend_field,
    )
}

#[test]
fn clean_database_reports_no_issues() {
    let (schema, person, ..) = schema_with_reference();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    let alice = txn.create(person).unwrap();
    txn.write_field(
        alice,
        "age",
        FieldValue::Simple(objdb::codec::encode(&objdb::codec::primitives::I32Codec, &30)),
    )
    .unwrap();
    txn.commit().unwrap();

    let report = check(&db, &JsckConfig::new()).unwrap();
    assert!(report.is_clean());
    assert!(!report.truncated);
}

#[test]
fn dangling_reference_left_by_on_delete_nothing_is_reported_but_not_repaired_without_the_flag() {
    let (schema, person, ..) = schema_with_reference();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    let alice = txn.create(person).unwrap();
    let bob = txn.create(person).unwrap();
    txn.write_field(bob, "friend", FieldValue::Reference(Some(alice)))
        .unwrap();
    txn.commit().unwrap();

    // `friend`'s onDelete is NOTHING, so deleting alice leaves bob's
    // reference dangling on purpose — exactly what the checker should flag.
    let txn2 = db.begin_with_latest().unwrap();
    assert!(txn2.delete(alice).unwrap());
    txn2.commit().unwrap();

    let config = JsckConfig::new();
    let report = check(&db, &config).unwrap();
    assert!(!report.is_clean());
    assert!(report
        .issues
        .iter()
        .any(|i| matches!(i.kind, objdb_jsck::IssueKind::InvalidValue)));

    // Unrepaired: the dangling reference is still there.
    let txn3 = db.begin_with_latest().unwrap();
    assert_eq!(
        txn3.read_field(bob, "friend").unwrap(),
        FieldValue::Reference(Some(alice))
    );
}

#[test]
fn repair_nulls_out_the_dangling_reference_and_reaches_a_fixed_point() {
    let (schema, person, ..) = schema_with_reference();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    let alice = txn.create(person).unwrap();
    let bob = txn.create(person).unwrap();
    txn.write_field(bob, "friend", FieldValue::Reference(Some(alice)))
        .unwrap();
    txn.commit().unwrap();

    let txn2 = db.begin_with_latest().unwrap();
    txn2.delete(alice).unwrap();
    txn2.commit().unwrap();

    let mut config = JsckConfig::new();
    config.repair = true;
    let first = check(&db, &config).unwrap();
    assert!(!first.is_clean());

    let txn3 = db.begin_with_latest().unwrap();
    assert_eq!(
        txn3.read_field(bob, "friend").unwrap(),
        FieldValue::Reference(None)
    );

    let second = check(&db, &config).unwrap();
    assert!(second.is_clean(), "repair should reach a fixed point on the next pass");
}

#[test]
fn invalid_simple_field_bytes_are_replaced_with_the_codec_default_on_repair() {
    let (schema, person, age_field, ..) = schema_with_reference();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    let alice = txn.create(person).unwrap();
    txn.commit().unwrap();
    // Two bytes can never be a valid fixed-width `int` encoding.
    corrupt_simple_field(&db, alice, age_field, vec![0x00, 0x01]);

    let mut config = JsckConfig::new();
    config.repair = true;
    let report = check(&db, &config).unwrap();
    assert!(!report.is_clean());

    let txn2 = db.begin_with_latest().unwrap();
    match txn2.read_field(alice, "age").unwrap() {
        FieldValue::Simple(bytes) => {
            assert_eq!(
                objdb::codec::decode_exact(&objdb::codec::primitives::I32Codec, &bytes).unwrap(),
                0
            );
        }
        other => panic!("unexpected field value: {other:?}"),
    }
}

#[test]
fn stale_object_version_index_entry_is_reported_and_repaired() {
    let (schema, person, ..) = schema_with_reference();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    let alice = txn.create(person).unwrap();
    txn.commit().unwrap();

    // An entry naming an object that was never created under that version.
    let ghost = ObjId::new(person, alice.suffix() + 1);
    let mut batch = WriteBatch::new();
    batch.put(objdb::layout::object_version_key(1, ghost), Vec::new());
    db.kv().apply(batch).unwrap();

    let report = check(&db, &JsckConfig::new()).unwrap();
    assert!(!report.is_clean());
    assert!(report
        .issues
        .iter()
        .any(|i| matches!(i.kind, objdb_jsck::IssueKind::InvalidKey)));

    let mut config = JsckConfig::new();
    config.repair = true;
    check(&db, &config).unwrap();
    let second = check(&db, &config).unwrap();
    assert!(second.is_clean(), "repair should reach a fixed point on the next pass");
}

#[test]
fn issue_limit_truncates_the_scan() {
    let (schema, person, age_field, ..) = schema_with_reference();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(txn.create(person).unwrap());
    }
    txn.commit().unwrap();
    for id in ids {
        corrupt_simple_field(&db, id, age_field, vec![0xff]);
    }

    let mut config = JsckConfig::new();
    config.limit = 2;
    let report = check(&db, &config).unwrap();
    assert!(report.truncated);
    assert!(report.issues.len() <= 2);
}
