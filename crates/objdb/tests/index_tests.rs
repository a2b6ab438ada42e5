//! Simple and composite index view behavior (design doc §4.5), exercised
//! through the public `Database`/`Transaction` API.

use std::collections::BTreeMap;
use std::ops::Bound;

use objdb::codec::primitives::I32Codec;
use objdb::index::{intersect, CompositeIndexView, SimpleIndexView};
use objdb::schema::{CompositeIndexDef, FieldDef, FieldKind, ObjectTypeDef, Schema};
use objdb::txn::fields::FieldValue;
use objdb::{Database, StorageId};

fn schema_with_age_and_name() -> (Schema, StorageId, StorageId, StorageId, StorageId) {
    let person = StorageId::new(10).unwrap();
    let age = StorageId::new(1).unwrap();
    let name = StorageId::new(2).unwrap();
    let composite = StorageId::new(3).unwrap();

    let mut fields = BTreeMap::new();
    fields.insert(
        age,
        FieldDef {
            storage_id: age,
            name: "age".into(),
            kind: FieldKind::Simple {
                codec_name: "int".into(),
            },
            indexed: true,
        },
    );
    fields.insert(
        name,
        FieldDef {
            storage_id: name,
            name: "name".into(),
            kind: FieldKind::Simple {
                codec_name: "java.lang.String".into(),
            },
            indexed: true,
        },
    );

    let mut composite_indexes = BTreeMap::new();
    composite_indexes.insert(
        composite,
        CompositeIndexDef {
            storage_id: composite,
            name: "by_age_name".into(),
            field_storage_ids: vec![age, name],
        },
    );

    let mut object_types = BTreeMap::new();
    object_types.insert(
        person,
        ObjectTypeDef {
            storage_id: person,
            name: "Person".into(),
            fields,
            composite_indexes,
        },
    );
    (
        Schema {
            version: 1,
            object_types,
        },
        person,
        age,
        name,
        composite,
    )
}

fn encode_str(s: &str) -> Vec<u8> {
    objdb::codec::encode(&objdb::codec::string::StringCodec, &s.to_string())
}

#[test]
fn simple_index_range_query_excludes_out_of_range_groups() {
    let (schema, person, age, _name, _composite) = schema_with_age_and_name();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();

    let a = txn.create(person).unwrap();
    let b = txn.create(person).unwrap();
    let c = txn.create(person).unwrap();
    txn.write_field(a, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &10)))
        .unwrap();
    txn.write_field(b, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &20)))
        .unwrap();
    txn.write_field(c, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &30)))
        .unwrap();

    let view = SimpleIndexView::new(&txn, person, age).unwrap();
    let lower = objdb::codec::encode(&I32Codec, &15);
    let entries = view
        .entries_in_range(Bound::Included(lower), Bound::Unbounded)
        .unwrap();
    assert_eq!(entries.len(), 2);
    let ids: Vec<_> = entries.iter().flat_map(|(_, ids)| ids.iter().copied()).collect();
    assert!(ids.contains(&b) && ids.contains(&c) && !ids.contains(&a));
}

#[test]
fn composite_index_groups_by_concatenated_field_values() {
    let (schema, person, _age, _name, composite) = schema_with_age_and_name();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();

    let a = txn.create(person).unwrap();
    let b = txn.create(person).unwrap();
    txn.write_field(a, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &30)))
        .unwrap();
    txn.write_field(a, "name", FieldValue::Simple(encode_str("Alice")))
        .unwrap();
    txn.write_field(b, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &30)))
        .unwrap();
    txn.write_field(b, "name", FieldValue::Simple(encode_str("Bob")))
        .unwrap();

    let view = CompositeIndexView::new(&txn, person, composite).unwrap();
    let entries = view.entries().unwrap();
    assert_eq!(entries.len(), 2);
    for (_, ids) in &entries {
        assert_eq!(ids.len(), 1);
    }
}

#[test]
fn intersect_of_disjoint_index_results_is_empty() {
    let (schema, person, age, name, _composite) = schema_with_age_and_name();
    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();

    let a = txn.create(person).unwrap();
    let b = txn.create(person).unwrap();
    txn.write_field(a, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &30)))
        .unwrap();
    txn.write_field(a, "name", FieldValue::Simple(encode_str("Alice")))
        .unwrap();
    txn.write_field(b, "age", FieldValue::Simple(objdb::codec::encode(&I32Codec, &30)))
        .unwrap();
    txn.write_field(b, "name", FieldValue::Simple(encode_str("Bob")))
        .unwrap();

    let by_age = SimpleIndexView::new(&txn, person, age).unwrap();
    let by_name = SimpleIndexView::new(&txn, person, name).unwrap();
    let age_30 = by_age.objects_with(&objdb::codec::encode(&I32Codec, &30)).unwrap();
    let named_alice = by_name.objects_with(&encode_str("Alice")).unwrap();
    let named_carol = by_name.objects_with(&encode_str("Carol")).unwrap();

    assert_eq!(intersect(&[age_30.clone(), named_alice]), vec![a]);
    assert!(intersect(&[age_30, named_carol]).is_empty());
}

#[test]
fn querying_a_non_indexed_field_is_rejected() {
    let person = StorageId::new(10).unwrap();
    let unindexed = StorageId::new(1).unwrap();
    let mut fields = BTreeMap::new();
    fields.insert(
        unindexed,
        FieldDef {
            storage_id: unindexed,
            name: "note".into(),
            kind: FieldKind::Simple {
                codec_name: "java.lang.String".into(),
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
    let schema = Schema {
        version: 1,
        object_types,
    };

    let db = Database::open_in_memory().unwrap();
    let txn = db.begin(schema, true).unwrap();
    assert!(SimpleIndexView::new(&txn, person, unindexed).is_err());
}
