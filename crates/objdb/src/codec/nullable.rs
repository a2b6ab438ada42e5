//! Wraps any [`Codec`] to allow a `null`/`None` value, per design doc §4.1:
//! a leading `0x01` byte marks "present" (followed by the inner encoding);
//! a lone `0xff` byte marks "absent", sorting after every present value so
//! nulls-last is the default index order.

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use super::Codec;
use crate::error::CodecError;

const PRESENT: u8 = 0x01;
const ABSENT: u8 = 0xff;

#[derive(Debug, Clone)]
pub struct NullableCodec<C> {
    pub inner: C,
}

impl<C: Codec> Codec for NullableCodec<C> {
    type Value = Option<C::Value>;

    fn read(&self, r: &mut dyn Read) -> Result<Option<C::Value>, CodecError> {
        match r.read_u8()? {
            ABSENT => Ok(None),
            PRESENT => Ok(Some(self.inner.read(r)?)),
            other => Err(CodecError::InvalidDiscriminant(other)),
        }
    }

    fn write(&self, w: &mut dyn Write, value: &Option<C::Value>) -> Result<(), CodecError> {
        match value {
            None => w.write_u8(ABSENT)?,
            Some(v) => {
                w.write_u8(PRESENT)?;
                self.inner.write(w, v)?;
            }
        }
        Ok(())
    }

    fn compare(&self, a: &Option<C::Value>, b: &Option<C::Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => self.inner.compare(x, y),
        }
    }

    fn default_value(&self) -> Option<C::Value> {
        None
    }

    fn may_start_with_00(&self) -> bool {
        false
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitives::I32Codec;
    use crate::codec::{decode_exact, encode};

    #[test]
    fn roundtrips_present_and_absent() {
        let codec = NullableCodec { inner: I32Codec };
        for v in [None, Some(0), Some(-5), Some(i32::MAX)] {
            let enc = encode(&codec, &v);
            assert_eq!(decode_exact(&codec, &enc).unwrap(), v);
        }
    }

    #[test]
    fn null_sorts_after_every_present_value() {
        let codec = NullableCodec { inner: I32Codec };
        assert!(encode(&codec, &Some(i32::MAX)) < encode(&codec, &None));
        assert!(encode(&codec, &Some(i32::MIN)) < encode(&codec, &None));
    }
}
