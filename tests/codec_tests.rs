//! Tests for the timestamp and value codecs
//!
//! These tests verify:
//! - Round-trip encoding of timestamps and values
//! - Byte order of keys matches chronological order
//! - Malformed and out-of-range input is rejected

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use tsm::codec::{decode_time, decode_value, encode_time, encode_value, TIME_KEY_SIZE, VALUE_SIZE};
use tsm::TsmError;

// =============================================================================
// Timestamp Codec Tests
// =============================================================================

#[test]
fn test_time_round_trip_known_instants() {
    let instants = [
        Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap(),
        Utc.with_ymd_and_hms(1800, 6, 15, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2200, 2, 28, 8, 30, 0).unwrap() + Duration::nanoseconds(123_456_789),
    ];

    for t in instants {
        let key = encode_time(t).unwrap();
        assert_eq!(key.len(), TIME_KEY_SIZE);
        assert_eq!(decode_time(&key).unwrap(), t);
    }
}

#[test]
fn test_time_key_is_big_endian_with_flipped_sign() {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    assert_eq!(encode_time(epoch).unwrap(), [0x80, 0, 0, 0, 0, 0, 0, 0]);

    let one_ns = epoch + Duration::nanoseconds(1);
    assert_eq!(encode_time(one_ns).unwrap(), [0x80, 0, 0, 0, 0, 0, 0, 1]);

    let minus_one_ns = epoch - Duration::nanoseconds(1);
    assert_eq!(encode_time(minus_one_ns).unwrap(), [0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_time_order_across_epoch() {
    let before = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();

    assert!(encode_time(before).unwrap() < encode_time(after).unwrap());
}

#[test]
fn test_time_hourly_keys_sort_ascending() {
    let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    let keys: Vec<_> = (0..48)
        .map(|h| encode_time(start + Duration::hours(h)).unwrap())
        .collect();

    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_time_out_of_range_rejected() {
    let far_future = DateTime::<Utc>::MAX_UTC;
    let far_past = DateTime::<Utc>::MIN_UTC;

    assert!(matches!(encode_time(far_future), Err(TsmError::Encoding(_))));
    assert!(matches!(encode_time(far_past), Err(TsmError::Encoding(_))));
}

#[test]
fn test_time_wrong_length_rejected() {
    assert!(matches!(decode_time(&[]), Err(TsmError::Encoding(_))));
    assert!(matches!(decode_time(&[0u8; 7]), Err(TsmError::Encoding(_))));
    assert!(matches!(decode_time(&[0u8; 9]), Err(TsmError::Encoding(_))));
}

// =============================================================================
// Value Codec Tests
// =============================================================================

#[test]
fn test_value_round_trip_edge_values() {
    let values = [
        0.0,
        -0.0,
        1.0,
        -1.5,
        f64::MIN,
        f64::MAX,
        f64::MIN_POSITIVE,
        f64::EPSILON,
        5e-324, // smallest subnormal
    ];

    for v in values {
        let bytes = encode_value(v);
        assert_eq!(bytes.len(), VALUE_SIZE);
        let back = decode_value(&bytes).unwrap();
        assert_eq!(back.to_bits(), v.to_bits(), "value {} changed bits", v);
    }
}

#[test]
fn test_value_is_little_endian() {
    assert_eq!(encode_value(1.0), [0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);
}

#[test]
fn test_value_wrong_length_rejected() {
    assert!(matches!(decode_value(&[0u8; 4]), Err(TsmError::Encoding(_))));
    assert!(matches!(decode_value(&[0u8; 16]), Err(TsmError::Encoding(_))));
}

// =============================================================================
// Codec Laws
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_time_round_trip(nanos in any::<i64>()) {
        let t = DateTime::from_timestamp_nanos(nanos);
        let key = encode_time(t).unwrap();
        prop_assert_eq!(decode_time(&key).unwrap(), t);
    }

    #[test]
    fn prop_time_order_preserved(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let lo_key = encode_time(DateTime::from_timestamp_nanos(lo)).unwrap();
        let hi_key = encode_time(DateTime::from_timestamp_nanos(hi)).unwrap();
        prop_assert!(lo_key < hi_key);
    }

    #[test]
    fn prop_value_round_trip(bits in any::<u64>()) {
        let v = f64::from_bits(bits);
        prop_assume!(v.is_finite());
        prop_assert_eq!(decode_value(&encode_value(v)).unwrap().to_bits(), bits);
    }
}
