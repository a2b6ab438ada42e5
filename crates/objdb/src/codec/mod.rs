//! Ordered, self-delimiting byte codecs (design doc §4.1).
//!
//! Every [`Codec`] implementation MUST produce a serialization whose
//! lexicographic byte order equals the semantic order of its value type,
//! and MUST be self-delimiting so composite encodings (tuples, composite
//! indexes) can concatenate codec outputs and still parse them back apart.

pub mod array;
pub mod nullable;
pub mod primitives;
pub mod reference;
pub mod registry;
pub mod string;
pub mod tuple;
pub mod uuid;
pub mod varint;

use std::cmp::Ordering;
use std::fmt::Debug;
use std::io::{Cursor, Read, Write};

use crate::error::CodecError;

/// An ordered, self-delimiting codec for a value type `Value`.
pub trait Codec: Debug + Send + Sync {
    /// The Rust type this codec encodes and decodes.
    type Value: Clone + Debug + PartialEq;

    /// Decodes one value, advancing `r` past the bytes it consumed.
    fn read(&self, r: &mut dyn Read) -> Result<Self::Value, CodecError>;

    /// Encodes `value` into `w`.
    fn write(&self, w: &mut dyn Write, value: &Self::Value) -> Result<(), CodecError>;

    /// Advances `r` past one encoded value without decoding it. The default
    /// implementation just decodes and drops the result; codecs whose
    /// encoding is fixed-width or otherwise cheap to skip may override this.
    fn skip(&self, r: &mut dyn Read) -> Result<(), CodecError> {
        self.read(r).map(|_| ())
    }

    /// Compares two values in the same order their encodings sort in.
    fn compare(&self, a: &Self::Value, b: &Self::Value) -> Ordering;

    /// Performs codec-specific structural validation (e.g. enum ordinal
    /// range, reference type allow-list). The default accepts everything.
    fn validate(&self, value: Self::Value) -> Result<Self::Value, CodecError> {
        Ok(value)
    }

    /// The type's default value (used to detect "absent" simple fields).
    fn default_value(&self) -> Self::Value;

    /// The encoding of [`Codec::default_value`]. A field whose current
    /// encoded bytes equal this is considered absent and is not
    /// materialized as a data key.
    fn default_encoding(&self) -> Vec<u8> {
        encode(self, &self.default_value())
    }

    /// Whether this codec's encoding may begin with the byte `0x00`.
    fn may_start_with_00(&self) -> bool;

    /// Whether this codec's encoding may begin with the byte `0xff`.
    fn may_start_with_ff(&self) -> bool;
}

/// Encodes `value` into a freshly allocated buffer.
pub fn encode<C: Codec + ?Sized>(codec: &C, value: &C::Value) -> Vec<u8> {
    let mut buf = Vec::new();
    codec
        .write(&mut buf, value)
        .expect("encoding a validated in-memory value is infallible");
    buf
}

/// Decodes a value from the start of `data`. Unlike [`Codec::read`], this
/// requires the whole slice to be consumed (used for values stored whole,
/// e.g. the contents of a data key, as opposed to fields packed into a
/// composite key).
pub fn decode_exact<C: Codec + ?Sized>(codec: &C, data: &[u8]) -> Result<C::Value, CodecError> {
    let mut cursor = Cursor::new(data);
    let value = codec.read(&mut cursor)?;
    if (cursor.position() as usize) != data.len() {
        return Err(CodecError::InvalidLength {
            expected: cursor.position() as usize,
            got: data.len(),
        });
    }
    Ok(value)
}

/// Decodes one value from the front of `data`, returning it along with the
/// number of bytes consumed. Used when composing several codec outputs
/// back-to-back, e.g. inside composite index keys.
pub fn decode_prefix<C: Codec + ?Sized>(
    codec: &C,
    data: &[u8],
) -> Result<(C::Value, usize), CodecError> {
    let mut cursor = Cursor::new(data);
    let value = codec.read(&mut cursor)?;
    Ok((value, cursor.position() as usize))
}
