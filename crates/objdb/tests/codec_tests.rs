//! Round-trip and order properties across the codec set (design doc §8's
//! universal codec properties), exercised from outside the crate through
//! its public API.

use objdb::codec::primitives::{BoolCodec, CharCodec, F64Codec, I32Codec, I64Codec};
use objdb::codec::string::StringCodec;
use objdb::codec::uuid::UuidCodec;
use objdb::codec::{decode_exact, encode, Codec};

fn assert_orders<C: Codec>(codec: &C, values: &[C::Value]) {
    for pair in values.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert_eq!(codec.compare(a, b), std::cmp::Ordering::Less);
        let (ea, eb) = (encode(codec, a), encode(codec, b));
        assert!(ea < eb, "encoding of {a:?} should sort before {b:?}");
        assert_eq!(&decode_exact(codec, &ea).unwrap(), a);
    }
}

#[test]
fn signed_integers_order_through_their_sign_bit_flip() {
    assert_orders(&I32Codec, &[i32::MIN, -100, -1, 0, 1, 100, i32::MAX]);
    assert_orders(&I64Codec, &[i64::MIN, -1, 0, 1, i64::MAX]);
}

#[test]
fn doubles_order_under_ieee_total_order() {
    assert_orders(&F64Codec, &[f64::NEG_INFINITY, -1.5, -f64::MIN_POSITIVE, 0.0, 1.5, f64::INFINITY]);
}

#[test]
fn booleans_order_false_before_true() {
    assert_orders(&BoolCodec, &[false, true]);
}

#[test]
fn bmp_chars_order_by_code_unit() {
    assert_orders(&CharCodec, &['a', 'b', 'z', '\u{ffff}']);
}

#[test]
fn non_bmp_chars_are_rejected() {
    let mut buf = Vec::new();
    let err = CharCodec.write(&mut buf, &'\u{1f600}');
    assert!(err.is_err());
}

#[test]
fn strings_order_lexicographically_and_self_delimit() {
    let codec = StringCodec;
    assert_orders(&codec, &["".to_string(), "a".to_string(), "ab".to_string(), "b".to_string()]);

    // A string containing an embedded NUL byte must still round-trip.
    let with_nul = "a\u{0}b".to_string();
    let encoded = encode(&codec, &with_nul);
    assert_eq!(decode_exact(&codec, &encoded).unwrap(), with_nul);
}

#[test]
fn uuids_roundtrip() {
    let codec = UuidCodec;
    let id = uuid::Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
    let encoded = encode(&codec, &id);
    assert_eq!(decode_exact(&codec, &encoded).unwrap(), id);
}
