//! Error types for KLV framing and field decoding.

use thiserror::Error;

/// Errors raised while framing or decoding KLV data.
///
/// None of these are fatal to a processing session: callers drop the
/// offending element (or packet) and continue with the next one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KlvError {
    /// Value length does not match the length the encoding declares.
    #[error("Invalid value length for '{field}': expected {expected} bytes, got {actual}")]
    InvalidLength {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Encoding declares a byte length it cannot represent.
    #[error("Unsupported length: {0} bytes")]
    UnsupportedLength(usize),

    /// Not enough bytes to finish the current key, length or value.
    #[error("Incomplete item: expected {expected} bytes, got {actual}")]
    IncompleteItem { expected: usize, actual: usize },

    /// Raw code lies outside the encoded range or equals the error indicator.
    #[error("Value out of range for '{field}': raw code {raw}")]
    OutOfRange { field: String, raw: i128 },

    /// Packet value is larger than the accepted maximum.
    #[error("Packet too large: {0} bytes (max: {1})")]
    PacketTooLarge(usize, usize),

    /// Packet does not start with the expected universal key.
    #[error("Invalid universal key: {0:02X?}")]
    InvalidKey([u8; 16]),

    /// Bytes could not be interpreted (bad BER form, bad UTF-8, ...).
    #[error("Malformed element: {0}")]
    Malformed(String),
}

impl KlvError {
    /// Returns true if the error means more input is needed rather than bad input.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, KlvError::IncompleteItem { .. })
    }
}
