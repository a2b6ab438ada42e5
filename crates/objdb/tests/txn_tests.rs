//! Transaction lifecycle, field read/write, and listener behavior exercised
//! through the public `Database`/`Transaction` API (design doc §4.4, §8).

use std::collections::BTreeMap;

use objdb::schema::{FieldDef, FieldKind, ObjectTypeDef, OnDelete, Schema};
use objdb::txn::fields::FieldValue;
use objdb::{Database, StorageId};

fn person_schema() -> Schema {
    let person = StorageId::new(10).unwrap();
    let name_field = StorageId::new(1).unwrap();
    let age_field = StorageId::new(2).unwrap();
    let friend_field = StorageId::new(3).unwrap();

    let mut fields = BTreeMap::new();
    fields.insert(
        name_field,
        FieldDef {
            storage_id: name_field,
            name: "name".into(),
            kind: FieldKind::Simple {
                codec_name: "java.lang.String".into(),
            },
            indexed: false,
        },
    );
    fields.insert(
        age_field,
        FieldDef {
            storage_id: age_field,
            name: "age".into(),
            kind: FieldKind::Simple {
                codec_name: "int".into(),
            },
            indexed: true,
        },
    );
    fields.insert(
        friend_field,
        FieldDef {
            storage_id: friend_field,
            name: "friend".into(),
            kind: FieldKind::Reference {
                allowed_types: vec![person],
                on_delete: OnDelete::Unreference,
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
    Schema {
        version: 1,
        object_types,
    }
}

fn encode_str(s: &str) -> Vec<u8> {
    objdb::codec::encode(&objdb::codec::string::StringCodec, &s.to_string())
}

#[test]
fn create_write_read_commit_and_reopen_round_trips() {
    let db = Database::open_in_memory().unwrap();
    let person = StorageId::new(10).unwrap();

    let id = {
        let txn = db.begin(person_schema(), true).unwrap();
        let id = txn.create(person).unwrap();
        txn.write_field(id, "name", FieldValue::Simple(encode_str("Alice")))
            .unwrap();
        txn.commit().unwrap();
        id
    };

    let txn = db.begin_with_latest().unwrap();
    assert!(txn.exists(id).unwrap());
    match txn.read_field(id, "name").unwrap() {
        FieldValue::Simple(bytes) => {
            assert_eq!(
                objdb::codec::decode_exact(&objdb::codec::string::StringCodec, &bytes).unwrap(),
                "Alice"
            );
        }
        other => panic!("unexpected field value: {other:?}"),
    }
}

#[test]
fn uncommitted_writes_are_invisible_after_rollback() {
    let db = Database::open_in_memory().unwrap();
    let person = StorageId::new(10).unwrap();
    let txn = db.begin(person_schema(), true).unwrap();
    let id = txn.create(person).unwrap();
    txn.rollback().unwrap();

    let txn2 = db.begin_with_latest();
    // No schema was ever committed, so there's nothing recorded yet.
    assert!(txn2.is_err());
    let _ = id;
}

#[test]
fn field_change_listener_fires_on_write() {
    let db = Database::open_in_memory().unwrap();
    let person = StorageId::new(10).unwrap();
    let txn = db.begin(person_schema(), true).unwrap();
    let id = txn.create(person).unwrap();

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    txn.add_listener(objdb::txn::Listener::new().on_field_change(move |change| {
        seen2.lock().unwrap().push(change.id);
    }));

    txn.write_field(id, "name", FieldValue::Simple(encode_str("Bob")))
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![id]);
}

#[test]
fn default_valued_simple_field_is_not_materialized() {
    let db = Database::open_in_memory().unwrap();
    let person = StorageId::new(10).unwrap();
    let txn = db.begin(person_schema(), true).unwrap();
    let id = txn.create(person).unwrap();

    txn.write_field(id, "age", FieldValue::Simple(objdb::codec::encode(&objdb::codec::primitives::I32Codec, &0)))
        .unwrap();
    match txn.read_field(id, "age").unwrap() {
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
fn deleting_a_referenced_object_unreferences_the_field() {
    let db = Database::open_in_memory().unwrap();
    let person = StorageId::new(10).unwrap();
    let txn = db.begin(person_schema(), true).unwrap();
    let alice = txn.create(person).unwrap();
    let bob = txn.create(person).unwrap();
    txn.write_field(bob, "friend", FieldValue::Reference(Some(alice)))
        .unwrap();

    assert!(txn.delete(alice).unwrap());
    assert_eq!(
        txn.read_field(bob, "friend").unwrap(),
        FieldValue::Reference(None)
    );
}

#[test]
fn copy_to_duplicates_every_field_into_a_detached_snapshot() {
    let db = Database::open_in_memory().unwrap();
    let person = StorageId::new(10).unwrap();
    let schema = std::sync::Arc::new(person_schema());
    let txn = db.begin((*schema).clone(), true).unwrap();
    let id = txn.create(person).unwrap();
    txn.write_field(id, "name", FieldValue::Simple(encode_str("Carol")))
        .unwrap();

    let dest = objdb::snapshot::new_detached_snapshot(schema);
    txn.copy_to(id, &dest).unwrap();

    assert!(dest.exists(id).unwrap());
    match dest.read_field(id, "name").unwrap() {
        FieldValue::Simple(bytes) => {
            assert_eq!(
                objdb::codec::decode_exact(&objdb::codec::string::StringCodec, &bytes).unwrap(),
                "Carol"
            );
        }
        other => panic!("unexpected field value: {other:?}"),
    }
    assert!(dest.commit().is_err());
}
