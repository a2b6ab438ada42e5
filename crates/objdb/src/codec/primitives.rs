//! Fixed-width codecs for booleans, signed integers, IEEE-754 floats,
//! UTF-16 code units, and millisecond-precision timestamps.

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::Codec;
use crate::error::CodecError;

/// Encodes `bool` as a single byte, `0x00` for `false` and `0x01` for `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    type Value = bool;

    fn read(&self, r: &mut dyn Read) -> Result<bool, CodecError> {
        let b = r.read_u8()?;
        match b {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidDiscriminant(other)),
        }
    }

    fn write(&self, w: &mut dyn Write, value: &bool) -> Result<(), CodecError> {
        w.write_u8(if *value { 1 } else { 0 })?;
        Ok(())
    }

    fn compare(&self, a: &bool, b: &bool) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> bool {
        false
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        false
    }
}

macro_rules! signed_int_codec {
    ($name:ident, $ty:ty, $unsigned:ty, $write_be:ident, $read_be:ident, $bits:expr) => {
        #[doc = concat!("Orders `", stringify!($ty), "` by flipping the sign bit and writing big-endian, fixed width.")]
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Codec for $name {
            type Value = $ty;

            fn read(&self, r: &mut dyn Read) -> Result<$ty, CodecError> {
                let biased = r.$read_be::<BigEndian>()?;
                Ok((biased ^ (1 << ($bits - 1))) as $ty)
            }

            fn write(&self, w: &mut dyn Write, value: &$ty) -> Result<(), CodecError> {
                let biased = (*value as $unsigned) ^ (1 << ($bits - 1));
                w.$write_be::<BigEndian>(biased)?;
                Ok(())
            }

            fn compare(&self, a: &$ty, b: &$ty) -> Ordering {
                a.cmp(b)
            }

            fn default_value(&self) -> $ty {
                0
            }

            fn may_start_with_00(&self) -> bool {
                // Only values whose top (sign) bit, after flipping, is 0
                // start with 0x00: that's every negative input.
                true
            }

            fn may_start_with_ff(&self) -> bool {
                true
            }
        }
    };
}

signed_int_codec!(I16Codec, i16, u16, write_u16, read_u16, 16);
signed_int_codec!(I32Codec, i32, u32, write_u32, read_u32, 32);
signed_int_codec!(I64Codec, i64, u64, write_u64, read_u64, 64);

/// Orders `i8` the same way the wider integer codecs do (flip the sign bit).
#[derive(Debug, Default, Clone, Copy)]
pub struct I8Codec;

impl Codec for I8Codec {
    type Value = i8;

    fn read(&self, r: &mut dyn Read) -> Result<i8, CodecError> {
        let biased = r.read_u8()?;
        Ok((biased ^ 0x80) as i8)
    }

    fn write(&self, w: &mut dyn Write, value: &i8) -> Result<(), CodecError> {
        let biased = (*value as u8) ^ 0x80;
        w.write_u8(biased)?;
        Ok(())
    }

    fn compare(&self, a: &i8, b: &i8) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> i8 {
        0
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}

/// Orders `f32` with the standard "flip all bits if negative, else flip
/// only the sign bit" transform, giving total numeric order (including
/// negative numbers and placing NaN at the extremes).
#[derive(Debug, Default, Clone, Copy)]
pub struct F32Codec;

fn order_f32(bits: u32) -> u32 {
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

fn unorder_f32(ordered: u32) -> u32 {
    if ordered & 0x8000_0000 != 0 {
        ordered & !0x8000_0000
    } else {
        !ordered
    }
}

impl Codec for F32Codec {
    type Value = f32;

    fn read(&self, r: &mut dyn Read) -> Result<f32, CodecError> {
        let ordered = r.read_u32::<BigEndian>()?;
        Ok(f32::from_bits(unorder_f32(ordered)))
    }

    fn write(&self, w: &mut dyn Write, value: &f32) -> Result<(), CodecError> {
        w.write_u32::<BigEndian>(order_f32(value.to_bits()))?;
        Ok(())
    }

    fn compare(&self, a: &f32, b: &f32) -> Ordering {
        order_f32(a.to_bits()).cmp(&order_f32(b.to_bits()))
    }

    fn default_value(&self) -> f32 {
        0.0
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}

/// `f64` analogue of [`F32Codec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct F64Codec;

fn order_f64(bits: u64) -> u64 {
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    }
}

fn unorder_f64(ordered: u64) -> u64 {
    if ordered & 0x8000_0000_0000_0000 != 0 {
        ordered & !0x8000_0000_0000_0000
    } else {
        !ordered
    }
}

impl Codec for F64Codec {
    type Value = f64;

    fn read(&self, r: &mut dyn Read) -> Result<f64, CodecError> {
        let ordered = r.read_u64::<BigEndian>()?;
        Ok(f64::from_bits(unorder_f64(ordered)))
    }

    fn write(&self, w: &mut dyn Write, value: &f64) -> Result<(), CodecError> {
        w.write_u64::<BigEndian>(order_f64(value.to_bits()))?;
        Ok(())
    }

    fn compare(&self, a: &f64, b: &f64) -> Ordering {
        order_f64(a.to_bits()).cmp(&order_f64(b.to_bits()))
    }

    fn default_value(&self) -> f64 {
        0.0
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}

/// Orders `char` by its UTF-16 code unit, big-endian, fixed width. Callers
/// outside the Basic Multilingual Plane are rejected by [`Codec::validate`];
/// the wire format has no room for a second code unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharCodec;

impl Codec for CharCodec {
    type Value = char;

    fn read(&self, r: &mut dyn Read) -> Result<char, CodecError> {
        let unit = r.read_u16::<BigEndian>()?;
        char::from_u32(unit as u32).ok_or(CodecError::InvalidDiscriminant((unit >> 8) as u8))
    }

    fn write(&self, w: &mut dyn Write, value: &char) -> Result<(), CodecError> {
        let code = *value as u32;
        if code > 0xffff {
            return Err(CodecError::InvalidValue(format!(
                "char {value:?} is outside the UTF-16 basic multilingual plane"
            )));
        }
        w.write_u16::<BigEndian>(code as u16)?;
        Ok(())
    }

    fn compare(&self, a: &char, b: &char) -> Ordering {
        (*a as u32).cmp(&(*b as u32))
    }

    fn default_value(&self) -> char {
        '\0'
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}

/// Milliseconds since the Unix epoch, encoded as a signed 64-bit integer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateMillisCodec;

impl Codec for DateMillisCodec {
    type Value = i64;

    fn read(&self, r: &mut dyn Read) -> Result<i64, CodecError> {
        I64Codec.read(r)
    }

    fn write(&self, w: &mut dyn Write, value: &i64) -> Result<(), CodecError> {
        I64Codec.write(w, value)
    }

    fn compare(&self, a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }

    fn default_value(&self) -> i64 {
        0
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}
