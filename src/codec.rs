//! Key and value codecs
//!
//! Translates samples into the bytes stored inside a series bucket.
//!
//! ## Key Format (timestamp)
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ (unix_nanos as u64 ^ 1 << 63), big-endian │
//! │                 8 bytes                   │
//! └───────────────────────────────────────────┘
//! ```
//! Flipping the sign bit maps the signed nanosecond range onto the unsigned
//! one in order, so byte-wise comparison of two keys matches chronological
//! comparison of their timestamps, including instants before 1970.
//!
//! ## Value Format
//! ```text
//! ┌───────────────────────────────────────────┐
//! │      IEEE-754 f64 bits, little-endian     │
//! │                 8 bytes                   │
//! └───────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{Result, TsmError};

/// Width of an encoded timestamp key
pub const TIME_KEY_SIZE: usize = 8;

/// Width of an encoded sample value
pub const VALUE_SIZE: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

// =============================================================================
// Timestamp Codec
// =============================================================================

/// Encode a timestamp into an order-preserving key
///
/// Fails for instants outside the i64 nanosecond range
/// (roughly 1677-09-21 through 2262-04-11).
pub fn encode_time(time: DateTime<Utc>) -> Result<[u8; TIME_KEY_SIZE]> {
    let nanos = time.timestamp_nanos_opt().ok_or_else(|| {
        TsmError::Encoding(format!(
            "timestamp {} is outside the nanosecond range",
            time.to_rfc3339()
        ))
    })?;
    Ok(((nanos as u64) ^ SIGN_BIT).to_be_bytes())
}

/// Decode a key produced by [`encode_time`]
pub fn decode_time(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let raw: [u8; TIME_KEY_SIZE] = bytes.try_into().map_err(|_| {
        TsmError::Encoding(format!(
            "timestamp key must be {} bytes, got {}",
            TIME_KEY_SIZE,
            bytes.len()
        ))
    })?;
    let nanos = (u64::from_be_bytes(raw) ^ SIGN_BIT) as i64;
    Ok(DateTime::from_timestamp_nanos(nanos))
}

// =============================================================================
// Value Codec
// =============================================================================

/// Encode a sample value
pub fn encode_value(value: f64) -> [u8; VALUE_SIZE] {
    value.to_le_bytes()
}

/// Decode a value produced by [`encode_value`]
pub fn decode_value(bytes: &[u8]) -> Result<f64> {
    let raw: [u8; VALUE_SIZE] = bytes.try_into().map_err(|_| {
        TsmError::Encoding(format!(
            "value must be {} bytes, got {}",
            VALUE_SIZE,
            bytes.len()
        ))
    })?;
    Ok(f64::from_le_bytes(raw))
}
