//! Orders a [`uuid::Uuid`] as two 64-bit halves, each XOR'd with the sign
//! bit and written big-endian — equivalent to running [`super::primitives::I64Codec`]'s
//! bias over each half of the 128-bit value.

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

use super::Codec;
use crate::error::CodecError;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidCodec;

impl Codec for UuidCodec {
    type Value = Uuid;

    fn read(&self, r: &mut dyn Read) -> Result<Uuid, CodecError> {
        let hi = r.read_u64::<BigEndian>()? ^ SIGN_BIT;
        let lo = r.read_u64::<BigEndian>()? ^ SIGN_BIT;
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&hi.to_be_bytes());
        bytes[8..].copy_from_slice(&lo.to_be_bytes());
        Ok(Uuid::from_bytes(bytes))
    }

    fn write(&self, w: &mut dyn Write, value: &Uuid) -> Result<(), CodecError> {
        let bytes = value.as_bytes();
        let hi = u64::from_be_bytes(bytes[..8].try_into().unwrap());
        let lo = u64::from_be_bytes(bytes[8..].try_into().unwrap());
        w.write_u64::<BigEndian>(hi ^ SIGN_BIT)?;
        w.write_u64::<BigEndian>(lo ^ SIGN_BIT)?;
        Ok(())
    }

    fn compare(&self, a: &Uuid, b: &Uuid) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }

    fn default_value(&self) -> Uuid {
        Uuid::nil()
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        true
    }
}
