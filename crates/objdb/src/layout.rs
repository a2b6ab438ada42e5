//! The binary key layout: [`StorageId`], [`ObjId`], and the fixed byte
//! prefixes that partition the KV namespace (design doc §3, §4.2).

use std::fmt;

use crate::codec::varint::{read_storage_id, read_varuint, write_storage_id, write_varuint};
use crate::error::CodecError;

/// Meta-data prefix. Disjoint from every storage-ID data range.
pub const META_PREFIX: u8 = 0x00;
/// The format-version key: `0x00 0x00 'J' 'S' 'i' 'm' 'p' 'l' 'e' 'D' 'B'`.
pub const FORMAT_VERSION_KEY: &[u8] = b"\x00\x00JSimpleDB";
/// Prefix under which recorded schema versions live: `0x00 0x01`.
pub const SCHEMA_PREFIX: [u8; 2] = [0x00, 0x01];
/// Prefix of the object-version index: `0x00 0x80`.
pub const OBJECT_VERSION_PREFIX: [u8; 2] = [0x00, 0x80];
/// Prefix reserved for caller-defined user meta-data: `0x00 0xff`.
pub const USER_PREFIX: [u8; 2] = [0x00, 0xff];

/// Builds an object-version index key: `0x00 0x80 ‖ varUInt(version) ‖ ObjId`
/// (design doc §3, §4.2). `version` is encoded with the general-purpose
/// [`write_varuint`], not [`write_storage_id`]'s variant, since a schema
/// version is an ordinary `u32` that may legally be `0` (a `StorageId` may
/// not).
pub fn object_version_key(version: u32, id: ObjId) -> Vec<u8> {
    let mut key = OBJECT_VERSION_PREFIX.to_vec();
    key.extend(write_varuint(version as u64));
    key.extend(id.encode());
    key
}

/// Decodes an object-version index key back into its `(version, ObjId)`.
pub fn decode_object_version_key(key: &[u8]) -> Result<(u32, ObjId), CodecError> {
    let rest = &key[OBJECT_VERSION_PREFIX.len()..];
    let (version, len) = read_varuint(rest)?;
    let id = ObjId::decode(&rest[len..])?;
    Ok((version as u32, id))
}

/// Format version 1: schema XML stored as plaintext.
pub const FORMAT_VERSION_PLAINTEXT: u32 = 1;
/// Format version 2 (current): schema XML stored DEFLATE-compressed with a
/// frozen fixed dictionary.
pub const FORMAT_VERSION_DEFLATE: u32 = 2;
/// The current format version written by new databases.
pub const CURRENT_FORMAT_VERSION: u32 = FORMAT_VERSION_DEFLATE;

/// The frozen DEFLATE dictionary used by format version 2. This string MUST
/// never change: every database ever written with format version 2 depends
/// on it to decompress its recorded schemas.
pub const SCHEMA_DEFLATE_DICTIONARY: &str = include_str!("schema_deflate_dictionary.txt");

/// A positive integer naming a schema item: an object type, a field, a
/// sub-field role, a composite index, or the object-version index.
///
/// Encoded on the wire with [`write_storage_id`], a variable-length
/// unsigned-integer encoder that never emits `0x00` as its first byte. The
/// invariant is enforced at construction: [`StorageId::new`] rejects zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageId(u64);

impl StorageId {
    /// Constructs a [`StorageId`], rejecting the non-positive value `0`.
    pub fn new(value: u64) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(StorageId(value))
        }
    }

    /// Returns the underlying integer value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Encodes this storage ID with the varUInt encoder.
    pub fn encode(self) -> Vec<u8> {
        write_storage_id(self.0)
    }

    /// Decodes a storage ID, returning it and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), CodecError> {
        let (value, len) = read_storage_id(data)?;
        Ok((StorageId(value), len))
    }
}

impl fmt::Debug for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageId({})", self.0)
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 64-bit object identifier. The high bits encode a positive
/// [`StorageId`] (the object's type); the low bits are a per-type unique
/// suffix. `ObjId` is stored and compared as an 8-byte big-endian blob, so
/// it sorts by storage ID then suffix. There is no null `ObjId`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjId(u64);

/// Number of low bits reserved for the per-type suffix. The remaining high
/// bits hold the storage ID of the object's type.
const SUFFIX_BITS: u32 = 32;
const SUFFIX_MASK: u64 = (1u64 << SUFFIX_BITS) - 1;

impl ObjId {
    /// Builds an `ObjId` from a type's storage ID and a per-type suffix.
    pub fn new(type_id: StorageId, suffix: u32) -> Self {
        ObjId((type_id.value() << SUFFIX_BITS) | suffix as u64)
    }

    /// Reconstructs an `ObjId` from its raw 64-bit value.
    pub fn from_raw(raw: u64) -> Self {
        ObjId(raw)
    }

    /// The raw 64-bit value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The storage ID of this object's type, i.e. the high bits.
    pub fn type_id(self) -> StorageId {
        StorageId(self.0 >> SUFFIX_BITS)
    }

    /// The per-type unique suffix, i.e. the low bits.
    pub fn suffix(self) -> u32 {
        (self.0 & SUFFIX_MASK) as u32
    }

    /// Encodes this object ID as an 8-byte big-endian blob.
    pub fn encode(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decodes an 8-byte big-endian blob into an `ObjId`.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() != 8 {
            return Err(CodecError::InvalidLength {
                expected: 8,
                got: data.len(),
            });
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(data);
        Ok(ObjId(u64::from_be_bytes(buf)))
    }
}

impl fmt::Debug for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjId({}:{})", self.type_id(), self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_id_roundtrips_and_splits() {
        let ty = StorageId::new(10).unwrap();
        let id = ObjId::new(ty, 42);
        assert_eq!(id.type_id(), ty);
        assert_eq!(id.suffix(), 42);

        let bytes = id.encode();
        let decoded = ObjId::decode(&bytes).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn obj_id_orders_by_type_then_suffix() {
        let t10 = StorageId::new(10).unwrap();
        let t11 = StorageId::new(11).unwrap();
        let a = ObjId::new(t10, 5);
        let b = ObjId::new(t10, 6);
        let c = ObjId::new(t11, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(a.encode()[..] < b.encode()[..]);
        assert!(b.encode()[..] < c.encode()[..]);
    }

    #[test]
    fn storage_id_rejects_zero() {
        assert!(StorageId::new(0).is_none());
        assert!(StorageId::new(1).is_some());
    }

    #[test]
    fn object_version_key_roundtrips_and_sorts_by_version_then_id() {
        let ty = StorageId::new(10).unwrap();
        let a = ObjId::new(ty, 1);
        let b = ObjId::new(ty, 2);

        let key_v1_a = object_version_key(1, a);
        let key_v1_b = object_version_key(1, b);
        let key_v2_a = object_version_key(2, a);

        assert_eq!(decode_object_version_key(&key_v1_a).unwrap(), (1, a));
        assert!(key_v1_a < key_v1_b);
        assert!(key_v1_b < key_v2_a);
    }

    #[test]
    fn meta_prefix_disjoint_from_schema_and_version_prefixes() {
        assert_ne!(SCHEMA_PREFIX[0], 0xff);
        assert_eq!(SCHEMA_PREFIX[0], META_PREFIX);
        assert_eq!(OBJECT_VERSION_PREFIX[0], META_PREFIX);
        assert_ne!(SCHEMA_PREFIX[1], OBJECT_VERSION_PREFIX[1]);
        assert_ne!(SCHEMA_PREFIX[1], USER_PREFIX[1]);
        assert_ne!(OBJECT_VERSION_PREFIX[1], USER_PREFIX[1]);
    }
}
