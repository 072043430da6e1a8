//! Fixed-width encoding for 128-bit values crossing the settlement boundary.
//!
//! A value is split into two 64-bit words, each written little-endian,
//! low word first. The ledger's attestation verifier hashes exactly these
//! bytes, so the layout must not change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded width of a 128-bit value.
pub const WIDE_LEN: usize = 16;

/// Errors decoding fixed-width values.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WireError {
    #[error("expected {expected} bytes, got {got}")]
    BadLength { expected: usize, got: usize },

    #[error("invalid hex: {0}")]
    BadHex(String),
}

/// Encode a `u128` as `low_le(8) || high_le(8)`.
pub fn encode_u128(value: u128) -> [u8; WIDE_LEN] {
    let low = value as u64;
    let high = (value >> 64) as u64;

    let mut out = [0u8; WIDE_LEN];
    out[..8].copy_from_slice(&low.to_le_bytes());
    out[8..].copy_from_slice(&high.to_le_bytes());
    out
}

/// Decode bytes produced by [`encode_u128`].
pub fn decode_u128(bytes: &[u8]) -> Result<u128, WireError> {
    if bytes.len() != WIDE_LEN {
        return Err(WireError::BadLength {
            expected: WIDE_LEN,
            got: bytes.len(),
        });
    }

    let mut low = [0u8; 8];
    let mut high = [0u8; 8];
    low.copy_from_slice(&bytes[..8]);
    high.copy_from_slice(&bytes[8..]);

    Ok(((u64::from_le_bytes(high) as u128) << 64) | u64::from_le_bytes(low) as u128)
}

/// Hex form of the fixed-width encoding, used on JSON-RPC surfaces.
pub fn u128_to_hex(value: u128) -> String {
    hex::encode(encode_u128(value))
}

/// Parse the hex form produced by [`u128_to_hex`].
pub fn u128_from_hex(s: &str) -> Result<u128, WireError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| WireError::BadHex(e.to_string()))?;
    decode_u128(&bytes)
}

/// Parse a 32-byte address from hex.
pub fn address_from_hex(s: &str) -> Result<[u8; 32], WireError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| WireError::BadHex(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| WireError::BadLength { expected: 32, got })
}
