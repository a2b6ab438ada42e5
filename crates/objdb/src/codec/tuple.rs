//! Concatenation codecs for composite keys (design doc §4.5, composite
//! indexes of 2-4 fields): each component codec MUST be self-delimiting on
//! its own, since components are concatenated with no extra framing between
//! them and the whole tuple sorts lexicographically by component, in order.

use std::cmp::Ordering;
use std::io::{Read, Write};

use super::Codec;
use crate::error::CodecError;

macro_rules! tuple_codec {
    ($name:ident, $first_field:ident : $first_ty:ident : $first_idx:tt, $( $field:ident : $ty:ident : $idx:tt ),+) => {
        #[doc = concat!("A composite codec concatenating its component encodings in order.")]
        #[derive(Debug, Clone)]
        pub struct $name<$first_ty, $($ty),+> {
            pub $first_field: $first_ty,
            $(pub $field: $ty),+
        }

        impl<$first_ty: Codec, $($ty: Codec),+> Codec for $name<$first_ty, $($ty),+> {
            type Value = ($first_ty::Value, $($ty::Value),+);

            fn read(&self, r: &mut dyn Read) -> Result<Self::Value, CodecError> {
                Ok((self.$first_field.read(r)?, $(self.$field.read(r)?),+))
            }

            fn write(&self, w: &mut dyn Write, value: &Self::Value) -> Result<(), CodecError> {
                self.$first_field.write(w, &value.$first_idx)?;
                $(self.$field.write(w, &value.$idx)?;)+
                Ok(())
            }

            fn compare(&self, a: &Self::Value, b: &Self::Value) -> Ordering {
                match self.$first_field.compare(&a.$first_idx, &b.$first_idx) {
                    Ordering::Equal => {}
                    other => return other,
                }
                $(
                    match self.$field.compare(&a.$idx, &b.$idx) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                )+
                Ordering::Equal
            }

            fn default_value(&self) -> Self::Value {
                (self.$first_field.default_value(), $(self.$field.default_value()),+)
            }

            fn may_start_with_00(&self) -> bool {
                self.$first_field.may_start_with_00()
            }

            fn may_start_with_ff(&self) -> bool {
                self.$first_field.may_start_with_ff()
            }
        }
    };
}

tuple_codec!(Tuple2Codec, a: A: 0, b: B: 1);
tuple_codec!(Tuple3Codec, a: A: 0, b: B: 1, c: C: 2);
tuple_codec!(Tuple4Codec, a: A: 0, b: B: 1, c: C: 2, d: D: 3);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitives::{BoolCodec, I32Codec};
    use crate::codec::string::StringCodec;
    use crate::codec::{decode_exact, encode};

    #[test]
    fn tuple2_roundtrips_and_orders_lexicographically() {
        let codec = Tuple2Codec {
            a: I32Codec,
            b: StringCodec,
        };
        let x = (1i32, "b".to_string());
        let y = (1i32, "c".to_string());
        let z = (2i32, "a".to_string());

        for v in [&x, &y, &z] {
            let enc = encode(&codec, v);
            assert_eq!(&decode_exact(&codec, &enc).unwrap(), v);
        }
        assert!(encode(&codec, &x) < encode(&codec, &y));
        assert!(encode(&codec, &y) < encode(&codec, &z));
    }

    #[test]
    fn tuple3_roundtrips() {
        let codec = Tuple3Codec {
            a: I32Codec,
            b: BoolCodec,
            c: StringCodec,
        };
        let v = (42i32, true, "hi".to_string());
        let enc = encode(&codec, &v);
        assert_eq!(decode_exact(&codec, &enc).unwrap(), v);
    }
}
