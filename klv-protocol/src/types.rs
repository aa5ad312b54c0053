//! Value, encoding and element definitions for KLV metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size of a SMPTE universal label key.
pub const UNIVERSAL_KEY_SIZE: usize = 16;

/// Universal key of the UAS Datalink Local Set (MISB ST 0601).
pub const UAS_LOCAL_SET_KEY: [u8; UNIVERSAL_KEY_SIZE] = [
    0x06, 0x0E, 0x2B, 0x34, 0x02, 0x0B, 0x01, 0x01, 0x0E, 0x01, 0x03, 0x01, 0x01, 0x00, 0x00, 0x00,
];

/// Largest local-set payload accepted from a single packet (1 MB).
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// How the bytes of a field value are to be interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Encoding {
    /// Fixed-point real number carried as an integer code.
    ///
    /// The code range `[encoded_min, encoded_max]` maps linearly onto
    /// `[min, max]`.
    IntegerEncodedFloat {
        /// Byte length of the integer code (1, 2, 4 or 8).
        length: usize,
        /// Whether the code is two's complement.
        #[serde(default)]
        signed: bool,
        /// Smallest valid code.
        encoded_min: i64,
        /// Largest valid code.
        encoded_max: i64,
        /// Real value of `encoded_min`.
        min: f64,
        /// Real value of `encoded_max`.
        max: f64,
        /// Code reserved to flag "value unavailable".
        #[serde(default)]
        error_indicator: Option<i64>,
    },
    /// IEEE-754 big-endian float (4 or 8 bytes).
    Float { length: usize },
    /// Big-endian unsigned integer.
    Unsigned { length: usize },
    /// Big-endian two's complement integer.
    Signed { length: usize },
    /// UTF-8 text.
    Utf8,
    /// 8-byte microseconds since the Unix epoch.
    Timestamp,
}

impl Encoding {
    /// Short name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Encoding::IntegerEncodedFloat { .. } => "integer_encoded_float",
            Encoding::Float { .. } => "float",
            Encoding::Unsigned { .. } => "unsigned",
            Encoding::Signed { .. } => "signed",
            Encoding::Utf8 => "utf8",
            Encoding::Timestamp => "timestamp",
        }
    }

    /// Signed 32-bit code mapped symmetrically onto `[-range, range]`.
    ///
    /// This is the layout used for latitudes (`range = 90`) and
    /// longitudes (`range = 180`); `i32::MIN` flags an unavailable value.
    pub fn symmetric_i32(range: f64) -> Self {
        Encoding::IntegerEncodedFloat {
            length: 4,
            signed: true,
            encoded_min: -(i32::MAX as i64),
            encoded_max: i32::MAX as i64,
            min: -range,
            max: range,
            error_indicator: Some(i32::MIN as i64),
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum KlvValue {
    /// Value decoded from an integer-encoded fixed-point code.
    IntegerEncodedFloat(f64),
    /// Value decoded from an IEEE float.
    Float(f64),
    Unsigned(u64),
    Signed(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl KlvValue {
    /// Returns the value as a real number if it was decoded as one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KlvValue::IntegerEncodedFloat(v) | KlvValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            KlvValue::IntegerEncodedFloat(_) => "integer_encoded_float",
            KlvValue::Float(_) => "float",
            KlvValue::Unsigned(_) => "unsigned",
            KlvValue::Signed(_) => "signed",
            KlvValue::Text(_) => "text",
            KlvValue::Timestamp(_) => "timestamp",
        }
    }
}

/// Dictionary entry: which tag carries which field, and how it is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Local-set tag.
    pub tag: u64,
    /// Field name handlers are keyed on.
    pub name: String,
    /// Value encoding.
    pub encoding: Encoding,
}

impl FieldDefinition {
    /// Create a new definition.
    pub fn new(tag: u64, name: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            tag,
            name: name.into(),
            encoding,
        }
    }
}

/// One decoded KLV item, routed to handlers by name.
#[derive(Debug, Clone, PartialEq)]
pub struct KlvElement {
    /// Field name from the dictionary.
    pub name: String,
    /// Decoded value.
    pub value: KlvValue,
}

impl KlvElement {
    /// Create a new element.
    pub fn new(name: impl Into<String>, value: KlvValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One undecoded item of a local set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSetItem<'a> {
    /// BER-OID tag.
    pub tag: u64,
    /// Raw value bytes.
    pub value: &'a [u8],
}

/// Universal key and value length of a KLV packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// 16-byte universal key.
    pub key: [u8; UNIVERSAL_KEY_SIZE],
    /// Length of the value that follows the header.
    pub value_len: usize,
    /// Bytes taken by key plus BER length.
    pub header_len: usize,
}

impl PacketHeader {
    /// Total packet size including the header.
    pub fn packet_len(&self) -> usize {
        self.header_len + self.value_len
    }
}
