//! Array codecs (design doc §4.1): primitive integer/float arrays and
//! generic object arrays.
//!
//! Every element encoding here is either fixed-width or demonstrably unable
//! to start with `0x00`, so a single `0x00` byte unambiguously terminates
//! the array. For the primitive numeric arrays we prefix each element with
//! a constant `0x01` discriminant byte ahead of its fixed-width encoding:
//! this keeps every element strictly greater than the `0x00` terminator
//! without relying on a bijection that excludes the encoding's extreme
//! values (the natural bias-and-flip transform used elsewhere has no spare
//! codomain to reserve `0x00` for every possible `i64`/`f64` bit pattern).

use std::cmp::Ordering;
use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use super::primitives::{F32Codec, F64Codec, I32Codec, I64Codec};
use super::Codec;
use crate::error::CodecError;

const ELEMENT: u8 = 0x01;
const TERMINATOR: u8 = 0x00;

macro_rules! fixed_width_array_codec {
    ($name:ident, $elem:ty, $inner:ty, $width:expr) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Codec for $name {
            type Value = Vec<$elem>;

            fn read(&self, r: &mut dyn Read) -> Result<Vec<$elem>, CodecError> {
                let inner = <$inner>::default();
                let mut out = Vec::new();
                loop {
                    let tag = r.read_u8()?;
                    match tag {
                        TERMINATOR => break,
                        ELEMENT => out.push(inner.read(r)?),
                        other => return Err(CodecError::InvalidDiscriminant(other)),
                    }
                }
                Ok(out)
            }

            fn write(&self, w: &mut dyn Write, value: &Vec<$elem>) -> Result<(), CodecError> {
                let inner = <$inner>::default();
                for elem in value {
                    w.write_u8(ELEMENT)?;
                    inner.write(w, elem)?;
                }
                w.write_u8(TERMINATOR)?;
                Ok(())
            }

            fn compare(&self, a: &Vec<$elem>, b: &Vec<$elem>) -> Ordering {
                let inner = <$inner>::default();
                for (x, y) in a.iter().zip(b.iter()) {
                    match inner.compare(x, y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }

            fn default_value(&self) -> Vec<$elem> {
                Vec::new()
            }

            fn may_start_with_00(&self) -> bool {
                true
            }

            fn may_start_with_ff(&self) -> bool {
                false
            }
        }

        impl $name {
            #[allow(dead_code)]
            const ELEMENT_WIDTH: usize = $width;
        }
    };
}

fixed_width_array_codec!(IntArrayCodec, i32, I32Codec, 4);
fixed_width_array_codec!(LongArrayCodec, i64, I64Codec, 8);
fixed_width_array_codec!(FloatArrayCodec, f32, F32Codec, 4);
fixed_width_array_codec!(DoubleArrayCodec, f64, F64Codec, 8);

/// Generic array of a non-primitive element type `C`.
///
/// When `C::may_start_with_00()` is false, elements are concatenated inline
/// and the whole array is terminated by a single `0x00` byte. Otherwise
/// each element is framed with a leading `0x01` byte to keep it
/// distinguishable from the terminator.
#[derive(Debug, Clone)]
pub struct ObjectArrayCodec<C> {
    pub element: C,
}

impl<C: Codec> Codec for ObjectArrayCodec<C> {
    type Value = Vec<C::Value>;

    fn read(&self, r: &mut dyn Read) -> Result<Vec<C::Value>, CodecError> {
        let framed = self.element.may_start_with_00();
        let mut out = Vec::new();
        loop {
            if framed {
                let tag = r.read_u8()?;
                match tag {
                    TERMINATOR => break,
                    ELEMENT => out.push(self.element.read(r)?),
                    other => return Err(CodecError::InvalidDiscriminant(other)),
                }
            } else {
                // Peek one byte: 0x00 means "end of array", anything else
                // is the first byte of the next element and must be put
                // back for the element codec to read.
                let mut one = [0u8; 1];
                let n = r.read(&mut one)?;
                if n == 0 {
                    return Err(CodecError::Truncated);
                }
                if one[0] == TERMINATOR {
                    break;
                }
                let chained = &mut one.chain(&mut *r);
                out.push(self.element.read(chained)?);
            }
        }
        Ok(out)
    }

    fn write(&self, w: &mut dyn Write, value: &Vec<C::Value>) -> Result<(), CodecError> {
        let framed = self.element.may_start_with_00();
        for elem in value {
            if framed {
                w.write_u8(ELEMENT)?;
            }
            self.element.write(w, elem)?;
        }
        w.write_u8(TERMINATOR)?;
        Ok(())
    }

    fn compare(&self, a: &Vec<C::Value>, b: &Vec<C::Value>) -> Ordering {
        for (x, y) in a.iter().zip(b.iter()) {
            match self.element.compare(x, y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }

    fn default_value(&self) -> Vec<C::Value> {
        Vec::new()
    }

    fn may_start_with_00(&self) -> bool {
        true
    }

    fn may_start_with_ff(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::string::StringCodec;
    use crate::codec::{decode_exact, encode};

    #[test]
    fn long_array_roundtrips_and_orders() {
        let codec = LongArrayCodec;
        let a = vec![1i64, 2, 3];
        let b = vec![1i64, 2, 4];
        let c = vec![1i64, 2];

        for v in [&a, &b, &c] {
            let enc = encode(&codec, v);
            assert_eq!(&decode_exact(&codec, &enc).unwrap(), v);
        }
        assert!(encode(&codec, &c) < encode(&codec, &a));
        assert!(encode(&codec, &a) < encode(&codec, &b));
    }

    #[test]
    fn double_array_handles_any_bit_pattern_without_colliding_with_terminator() {
        let codec = DoubleArrayCodec;
        let v = vec![0.0, -0.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY];
        let enc = encode(&codec, &v);
        let decoded = decode_exact(&codec, &enc).unwrap();
        assert_eq!(decoded.len(), v.len());
    }

    #[test]
    fn object_array_of_framed_elements_roundtrips() {
        let codec = ObjectArrayCodec {
            element: StringCodec,
        };
        let v = vec!["a".to_string(), "".to_string(), "bb".to_string()];
        let enc = encode(&codec, &v);
        assert_eq!(decode_exact(&codec, &enc).unwrap(), v);
    }
}
