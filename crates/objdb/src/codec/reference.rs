//! Codec for reference fields: an [`ObjId`], encoded as its raw 8-byte
//! big-endian blob, with an optional allow-list restricting which object
//! types the referent may have (design doc §4.3, reference fields).

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use super::Codec;
use crate::error::CodecError;
use crate::layout::{ObjId, StorageId};

#[derive(Debug, Clone, Default)]
pub struct ReferenceCodec {
    /// When non-empty, [`Codec::validate`] rejects any referent whose type
    /// is not in this list. Empty means "any object type is allowed".
    pub allowed_types: Vec<StorageId>,
}

impl Codec for ReferenceCodec {
    type Value = Option<ObjId>;

    fn read(&self, r: &mut dyn Read) -> Result<Option<ObjId>, CodecError> {
        let mut buf = [0u8; 8];
        for b in buf.iter_mut() {
            *b = r.read_u8()?;
        }
        let raw = u64::from_be_bytes(buf);
        if raw == 0 {
            Ok(None)
        } else {
            Ok(Some(ObjId::from_raw(raw)))
        }
    }

    fn write(&self, w: &mut dyn Write, value: &Option<ObjId>) -> Result<(), CodecError> {
        let raw = value.map(ObjId::raw).unwrap_or(0);
        for b in raw.to_be_bytes() {
            w.write_u8(b)?;
        }
        Ok(())
    }

    fn compare(&self, a: &Option<ObjId>, b: &Option<ObjId>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y),
        }
    }

    fn validate(&self, value: Option<ObjId>) -> Result<Option<ObjId>, CodecError> {
        if let Some(id) = value {
            if !self.allowed_types.is_empty() && !self.allowed_types.contains(&id.type_id()) {
                return Err(CodecError::InvalidValue(format!(
                    "reference to object of type {} is not allowed here",
                    id.type_id()
                )));
            }
        }
        Ok(value)
    }

    fn default_value(&self) -> Option<ObjId> {
        None
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        false
    }
}
