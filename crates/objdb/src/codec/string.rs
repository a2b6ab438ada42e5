//! Order-preserving, self-delimiting `String` encoding.
//!
//! A leading `0x01` discriminant byte keeps the encoding from ever starting
//! with `0x00`, which is reserved for composite/index framing. After that
//! byte, every `0x00` in the UTF-8 content is escaped as `0x00 0xff`, and the
//! whole string is terminated by `0x00 0x00`. Because `0x00 < 0xff`, a
//! terminator always compares less than a continuation of a longer string
//! sharing the same prefix, so encoded order matches `str`'s natural
//! (byte-wise UTF-8) order; the shared leading `0x01` doesn't affect that,
//! since every encoded string carries it.

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use super::Codec;
use crate::error::CodecError;

const DISCRIMINANT: u8 = 0x01;

#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn read(&self, r: &mut dyn Read) -> Result<String, CodecError> {
        let tag = r.read_u8()?;
        if tag != DISCRIMINANT {
            return Err(CodecError::InvalidDiscriminant(tag));
        }
        let mut bytes = Vec::new();
        loop {
            let b = r.read_u8()?;
            if b != 0x00 {
                bytes.push(b);
                continue;
            }
            let next = r.read_u8()?;
            match next {
                0x00 => break,
                0xff => bytes.push(0x00),
                other => return Err(CodecError::InvalidDiscriminant(other)),
            }
        }
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidText)
    }

    fn write(&self, w: &mut dyn Write, value: &String) -> Result<(), CodecError> {
        w.write_u8(DISCRIMINANT)?;
        for &b in value.as_bytes() {
            if b == 0x00 {
                w.write_u8(0x00)?;
                w.write_u8(0xff)?;
            } else {
                w.write_u8(b)?;
            }
        }
        w.write_u8(0x00)?;
        w.write_u8(0x00)?;
        Ok(())
    }

    fn compare(&self, a: &String, b: &String) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }

    fn default_value(&self) -> String {
        String::new()
    }

    fn may_start_with_00(&self) -> bool {
        false
    }

    fn may_start_with_ff(&self) -> bool {
        false
    }
}
