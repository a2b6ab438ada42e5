//! Schema XML serialization and the format-version-2 DEFLATE framing that
//! wraps it on disk (design doc §3, format versions; §9.1).

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::{FieldDef, FieldKind, ObjectTypeDef, OnDelete, Schema};
use crate::error::{CodecError, ObjDbError, Result};
use crate::layout::{StorageId, SCHEMA_DEFLATE_DICTIONARY};

/// Renders `schema` as the `<Schema>` XML document recorded in the schema
/// area (design doc §4.3).
pub fn to_xml(schema: &Schema) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    let mut root = BytesStart::new("Schema");
    root.push_attribute(("version", schema.version.to_string().as_str()));
    writer
        .write_event(Event::Start(root))
        .map_err(xml_err)?;

    for ty in schema.object_types.values() {
        write_object_type(&mut writer, ty)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Schema")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner()).map_err(|_| ObjDbError::InvalidSchema("non-UTF-8 XML output".into()))
}

fn write_object_type(writer: &mut Writer<Vec<u8>>, ty: &ObjectTypeDef) -> Result<()> {
    let mut start = BytesStart::new("ObjectType");
    start.push_attribute(("name", ty.name.as_str()));
    start.push_attribute(("storageId", ty.storage_id.value().to_string().as_str()));
    writer.write_event(Event::Start(start)).map_err(xml_err)?;

    for field in ty.fields.values() {
        write_field(writer, field)?;
    }
    for index in ty.composite_indexes.values() {
        let mut el = BytesStart::new("CompositeIndex");
        el.push_attribute(("name", index.name.as_str()));
        el.push_attribute(("storageId", index.storage_id.value().to_string().as_str()));
        let fields = index
            .field_storage_ids
            .iter()
            .map(|id| id.value().to_string())
            .collect::<Vec<_>>()
            .join(",");
        el.push_attribute(("fields", fields.as_str()));
        writer.write_event(Event::Empty(el)).map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("ObjectType")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_field(writer: &mut Writer<Vec<u8>>, field: &FieldDef) -> Result<()> {
    let (tag, extra): (&str, Vec<(String, String)>) = match &field.kind {
        FieldKind::Simple { codec_name } => {
            ("SimpleField", vec![("encoding".into(), codec_name.clone())])
        }
        FieldKind::Counter => ("CounterField", vec![]),
        FieldKind::Reference {
            allowed_types,
            on_delete,
            cascade_delete,
        } => (
            "ReferenceField",
            vec![
                (
                    "allow".into(),
                    allowed_types
                        .iter()
                        .map(|id| id.value().to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                ("onDelete".into(), on_delete_name(*on_delete).into()),
                ("cascadeDelete".into(), cascade_delete.to_string()),
            ],
        ),
        FieldKind::Set { element_codec_name } => {
            ("SetField", vec![("element".into(), element_codec_name.clone())])
        }
        FieldKind::List { element_codec_name } => {
            ("ListField", vec![("element".into(), element_codec_name.clone())])
        }
        FieldKind::Map {
            key_codec_name,
            value_codec_name,
        } => (
            "MapField",
            vec![
                ("key".into(), key_codec_name.clone()),
                ("value".into(), value_codec_name.clone()),
            ],
        ),
    };

    let mut el = BytesStart::new(tag);
    el.push_attribute(("name", field.name.as_str()));
    el.push_attribute(("storageId", field.storage_id.value().to_string().as_str()));
    el.push_attribute(("indexed", field.indexed.to_string().as_str()));
    for (k, v) in &extra {
        el.push_attribute((k.as_str(), v.as_str()));
    }
    writer.write_event(Event::Empty(el)).map_err(xml_err)?;
    Ok(())
}

fn on_delete_name(on_delete: OnDelete) -> &'static str {
    match on_delete {
        OnDelete::Nothing => "NOTHING",
        OnDelete::Exception => "EXCEPTION",
        OnDelete::Unreference => "UNREFERENCE",
        OnDelete::Delete => "DELETE",
    }
}

fn xml_err(e: quick_xml::Error) -> ObjDbError {
    ObjDbError::InvalidSchema(format!("XML error: {e}"))
}

/// Parses a `<Schema>` XML document produced by [`to_xml`].
///
/// This is a structural reader tailored to the subset emitted by
/// [`to_xml`]; it does not aim to accept arbitrary hand-edited XML.
pub fn from_xml(xml: &str) -> Result<Schema> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut version = None;
    let mut object_types = std::collections::BTreeMap::new();
    let mut current: Option<ObjectTypeDef> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;
        match event {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"Schema" => {
                version = Some(attr(&e, "version")?.parse::<u32>().map_err(parse_err)?);
            }
            Event::Start(e) if e.name().as_ref() == b"ObjectType" => {
                let storage_id = storage_id_attr(&e)?;
                current = Some(ObjectTypeDef {
                    storage_id,
                    name: attr(&e, "name")?,
                    fields: std::collections::BTreeMap::new(),
                    composite_indexes: std::collections::BTreeMap::new(),
                });
            }
            Event::End(e) if e.name().as_ref() == b"ObjectType" => {
                if let Some(ty) = current.take() {
                    object_types.insert(ty.storage_id, ty);
                }
            }
            Event::Empty(e) => {
                let ty = current
                    .as_mut()
                    .ok_or_else(|| ObjDbError::InvalidSchema("field outside ObjectType".into()))?;
                match e.name().as_ref() {
                    b"CompositeIndex" => {
                        let field_ids = attr(&e, "fields")?
                            .split(',')
                            .filter(|s| !s.is_empty())
                            .map(|s| {
                                s.parse::<u64>()
                                    .ok()
                                    .and_then(StorageId::new)
                                    .ok_or_else(|| ObjDbError::InvalidSchema("bad field id".into()))
                            })
                            .collect::<Result<Vec<_>>>()?;
                        let storage_id = storage_id_attr(&e)?;
                        ty.composite_indexes.insert(
                            storage_id,
                            super::CompositeIndexDef {
                                storage_id,
                                name: attr(&e, "name")?,
                                field_storage_ids: field_ids,
                            },
                        );
                    }
                    tag => {
                        let field = parse_field(tag, &e)?;
                        ty.fields.insert(field.storage_id, field);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(Schema {
        version: version.ok_or_else(|| ObjDbError::InvalidSchema("missing version".into()))?,
        object_types,
    })
}

fn parse_field(tag: &[u8], e: &BytesStart) -> Result<FieldDef> {
    let storage_id = storage_id_attr(e)?;
    let name = attr(e, "name")?;
    let indexed = attr(e, "indexed")?.parse::<bool>().unwrap_or(false);
    let kind = match tag {
        b"SimpleField" => FieldKind::Simple {
            codec_name: attr(e, "encoding")?,
        },
        b"CounterField" => FieldKind::Counter,
        b"ReferenceField" => FieldKind::Reference {
            allowed_types: attr(e, "allow")?
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse::<u64>().ok().and_then(StorageId::new))
                .collect(),
            on_delete: parse_on_delete(&attr(e, "onDelete")?)?,
            cascade_delete: attr(e, "cascadeDelete")?.parse::<bool>().unwrap_or(false),
        },
        b"SetField" => FieldKind::Set {
            element_codec_name: attr(e, "element")?,
        },
        b"ListField" => FieldKind::List {
            element_codec_name: attr(e, "element")?,
        },
        b"MapField" => FieldKind::Map {
            key_codec_name: attr(e, "key")?,
            value_codec_name: attr(e, "value")?,
        },
        other => {
            return Err(ObjDbError::InvalidSchema(format!(
                "unknown field element {}",
                String::from_utf8_lossy(other)
            )))
        }
    };
    Ok(FieldDef {
        storage_id,
        name,
        kind,
        indexed,
    })
}

fn parse_on_delete(s: &str) -> Result<OnDelete> {
    match s {
        "NOTHING" => Ok(OnDelete::Nothing),
        "EXCEPTION" => Ok(OnDelete::Exception),
        "UNREFERENCE" => Ok(OnDelete::Unreference),
        "DELETE" => Ok(OnDelete::Delete),
        other => Err(ObjDbError::InvalidSchema(format!(
            "unknown onDelete value {other}"
        ))),
    }
}

fn storage_id_attr(e: &BytesStart) -> Result<StorageId> {
    let raw = attr(e, "storageId")?.parse::<u64>().map_err(parse_err)?;
    StorageId::new(raw).ok_or_else(|| ObjDbError::InvalidSchema("storageId must be positive".into()))
}

fn attr(e: &BytesStart, name: &str) -> Result<String> {
    e.try_get_attribute(name)
        .map_err(xml_err)?
        .ok_or_else(|| ObjDbError::InvalidSchema(format!("missing attribute {name}")))
        .and_then(|a| {
            String::from_utf8(a.value.into_owned())
                .map_err(|_| ObjDbError::InvalidSchema("non-UTF-8 attribute".into()))
        })
}

fn parse_err(e: std::num::ParseIntError) -> ObjDbError {
    ObjDbError::InvalidSchema(format!("integer parse error: {e}"))
}

/// Compresses `xml` for format version 2.
///
/// The frozen [`SCHEMA_DEFLATE_DICTIONARY`] is prepended to the plaintext
/// before compression and stripped back off after decompression, so every
/// schema's compressor gets the benefit of the dictionary's common XML
/// tags without needing a preset-dictionary mode from the underlying
/// DEFLATE implementation.
pub fn compress(xml: &str) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(SCHEMA_DEFLATE_DICTIONARY.as_bytes())
        .map_err(CodecError::from)?;
    encoder
        .write_all(xml.as_bytes())
        .map_err(CodecError::from)?;
    encoder.finish().map_err(CodecError::from).map_err(Into::into)
}

/// Decompresses bytes produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<String> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = String::new();
    decoder.read_to_string(&mut out).map_err(CodecError::from)?;
    out.strip_prefix(SCHEMA_DEFLATE_DICTIONARY)
        .map(str::to_string)
        .ok_or_else(|| ObjDbError::InconsistentDatabase("schema bytes missing frozen dictionary prefix".into()))
}
