//! KLV (Key-Length-Value) framing and field decoding.
//!
//! This crate splits motion imagery metadata packets into local-set items
//! and decodes each item into a typed [`KlvValue`] using a configurable
//! [`FieldDictionary`].
//!
//! # Packet Format
//!
//! ```text
//! +------------------+------------+------------------------------+
//! | Universal key    | BER length |  Local set                   |
//! | 16 bytes         | 1-9 bytes  |  (tag, length, value) * N    |
//! +------------------+------------+------------------------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use klv_protocol::{
//!     encode_integer_encoded_float, encode_local_set_item, encode_packet, split_packet,
//!     Encoding, FieldDefinition, FieldDictionary, UAS_LOCAL_SET_KEY,
//! };
//!
//! let latitude = Encoding::symmetric_i32(90.0);
//! let mut dictionary = FieldDictionary::new();
//! dictionary.insert(FieldDefinition::new(82, "lat1", latitude.clone()));
//!
//! // Build a packet carrying one latitude.
//! let mut set = BytesMut::new();
//! let code = encode_integer_encoded_float(&latitude, 45.0).unwrap();
//! encode_local_set_item(&mut set, 82, &code);
//! let packet = encode_packet(&UAS_LOCAL_SET_KEY, &set);
//!
//! // Split and decode it.
//! let (_, local_set) = split_packet(&packet, &UAS_LOCAL_SET_KEY).unwrap().unwrap();
//! let elements = dictionary.decode_local_set(local_set).unwrap();
//! let element = elements[0].as_ref().unwrap();
//! assert_eq!(element.name, "lat1");
//! assert!((element.value.as_f64().unwrap() - 45.0).abs() < 1e-6);
//! ```

pub mod codec;
pub mod dictionary;
pub mod error;
pub mod types;

pub use codec::{
    decode_ber_length, decode_ber_oid, decode_element, decode_packet_header, decode_value,
    encode_ber_length, encode_ber_oid, encode_integer_encoded_float, encode_local_set_item,
    encode_packet, encode_timestamp, parse_local_set, split_packet,
};
pub use dictionary::FieldDictionary;
pub use error::KlvError;
pub use types::{
    Encoding, FieldDefinition, KlvElement, KlvValue, LocalSetItem, PacketHeader,
    MAX_PACKET_SIZE, UAS_LOCAL_SET_KEY, UNIVERSAL_KEY_SIZE,
};
