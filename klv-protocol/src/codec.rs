//! Codec for KLV packets, local sets and typed field values.
//!
//! Packet layout:
//! ```text
//! +------------------+------------+------------------------------+
//! | Universal key    | BER length |  Local set                   |
//! | 16 bytes         | 1-9 bytes  |  (tag, length, value) * N    |
//! +------------------+------------+------------------------------+
//! ```
//!
//! Local-set tags are BER-OID encoded (7 bits per byte, high bit set on
//! every byte but the last); lengths use BER short or long form.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::error::KlvError;
use crate::types::*;

/// Maximum number of bytes a BER-OID tag may take (9 * 7 = 63 bits).
const MAX_OID_BYTES: usize = 9;

/// Decode a BER short- or long-form length, advancing `buf`.
pub fn decode_ber_length(buf: &mut &[u8]) -> Result<usize, KlvError> {
    if !buf.has_remaining() {
        return Err(KlvError::IncompleteItem {
            expected: 1,
            actual: 0,
        });
    }

    let first = buf.get_u8();
    if first & 0x80 == 0 {
        return Ok(first as usize);
    }

    let count = (first & 0x7F) as usize;
    if count == 0 || count > 8 {
        return Err(KlvError::Malformed(format!(
            "BER length with {} length bytes",
            count
        )));
    }
    if buf.remaining() < count {
        return Err(KlvError::IncompleteItem {
            expected: count,
            actual: buf.remaining(),
        });
    }

    let len = buf.get_uint(count);
    usize::try_from(len).map_err(|_| KlvError::UnsupportedLength(usize::MAX))
}

/// Encode a length using the shortest BER form.
pub fn encode_ber_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }

    let len = len as u64;
    let count = 8 - (len.leading_zeros() as usize / 8);
    buf.put_u8(0x80 | count as u8);
    buf.put_uint(len, count);
}

/// Decode a BER-OID tag, advancing `buf`.
pub fn decode_ber_oid(buf: &mut &[u8]) -> Result<u64, KlvError> {
    let mut value: u64 = 0;

    for consumed in 0..MAX_OID_BYTES {
        if !buf.has_remaining() {
            return Err(KlvError::IncompleteItem {
                expected: consumed + 1,
                actual: consumed,
            });
        }
        let byte = buf.get_u8();
        value = (value << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(KlvError::Malformed(format!(
        "BER-OID tag longer than {} bytes",
        MAX_OID_BYTES
    )))
}

/// Encode a tag as BER-OID.
pub fn encode_ber_oid(buf: &mut BytesMut, tag: u64) {
    let mut groups = [0u8; MAX_OID_BYTES + 1];
    let mut count = 0;
    let mut rest = tag;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        buf.put_u8(groups[i] | continuation);
    }
}

/// Decode the universal key and BER length at the start of `data`.
///
/// Returns `Ok(None)` if `data` does not hold a complete header yet.
pub fn decode_packet_header(data: &[u8]) -> Result<Option<PacketHeader>, KlvError> {
    if data.len() <= UNIVERSAL_KEY_SIZE {
        return Ok(None);
    }

    let mut key = [0u8; UNIVERSAL_KEY_SIZE];
    key.copy_from_slice(&data[..UNIVERSAL_KEY_SIZE]);

    let mut rest = &data[UNIVERSAL_KEY_SIZE..];
    let before = rest.len();
    let value_len = match decode_ber_length(&mut rest) {
        Ok(len) => len,
        Err(e) if e.is_incomplete() => return Ok(None),
        Err(e) => return Err(e),
    };

    if value_len > MAX_PACKET_SIZE {
        return Err(KlvError::PacketTooLarge(value_len, MAX_PACKET_SIZE));
    }

    Ok(Some(PacketHeader {
        key,
        value_len,
        header_len: UNIVERSAL_KEY_SIZE + (before - rest.len()),
    }))
}

/// Split one complete packet carrying `expected_key` off the front of `data`.
///
/// Returns the header and the local-set value, or `Ok(None)` if more
/// bytes are needed.
pub fn split_packet<'a>(
    data: &'a [u8],
    expected_key: &[u8; UNIVERSAL_KEY_SIZE],
) -> Result<Option<(PacketHeader, &'a [u8])>, KlvError> {
    let Some(header) = decode_packet_header(data)? else {
        return Ok(None);
    };

    if &header.key != expected_key {
        return Err(KlvError::InvalidKey(header.key));
    }

    if data.len() < header.packet_len() {
        return Ok(None);
    }

    Ok(Some((header, &data[header.header_len..header.packet_len()])))
}

/// Split a local-set value into its items, in stream order.
pub fn parse_local_set(payload: &[u8]) -> Result<Vec<LocalSetItem<'_>>, KlvError> {
    let mut buf = payload;
    let mut items = Vec::new();

    while buf.has_remaining() {
        let tag = decode_ber_oid(&mut buf)?;
        let len = decode_ber_length(&mut buf)?;
        if buf.remaining() < len {
            return Err(KlvError::IncompleteItem {
                expected: len,
                actual: buf.remaining(),
            });
        }
        items.push(LocalSetItem {
            tag,
            value: &buf[..len],
        });
        buf.advance(len);
    }

    Ok(items)
}

/// Append one local-set item.
pub fn encode_local_set_item(buf: &mut BytesMut, tag: u64, value: &[u8]) {
    encode_ber_oid(buf, tag);
    encode_ber_length(buf, value.len());
    buf.put_slice(value);
}

/// Wrap a local-set value in a packet with the given universal key.
pub fn encode_packet(key: &[u8; UNIVERSAL_KEY_SIZE], local_set: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(UNIVERSAL_KEY_SIZE + 9 + local_set.len());
    buf.put_slice(key);
    encode_ber_length(&mut buf, local_set.len());
    buf.put_slice(local_set);
    buf.freeze()
}

/// Decode one value according to its field definition.
pub fn decode_element(definition: &FieldDefinition, bytes: &[u8]) -> Result<KlvElement, KlvError> {
    let value = decode_value(&definition.name, &definition.encoding, bytes)?;
    Ok(KlvElement::new(definition.name.clone(), value))
}

/// Decode raw value bytes of `field` with `encoding`.
pub fn decode_value(field: &str, encoding: &Encoding, bytes: &[u8]) -> Result<KlvValue, KlvError> {
    let mut buf = bytes;

    match encoding {
        Encoding::IntegerEncodedFloat {
            length,
            signed,
            encoded_min,
            encoded_max,
            min,
            max,
            error_indicator,
        } => {
            check_integer_length(*length)?;
            expect_len(field, *length, bytes)?;

            let raw: i128 = if *signed {
                buf.get_int(*length) as i128
            } else {
                buf.get_uint(*length) as i128
            };

            if error_indicator.map(|e| e as i128) == Some(raw)
                || raw < *encoded_min as i128
                || raw > *encoded_max as i128
            {
                return Err(KlvError::OutOfRange {
                    field: field.to_string(),
                    raw,
                });
            }
            if encoded_max <= encoded_min {
                return Err(KlvError::Malformed(format!(
                    "empty encoded range for '{}'",
                    field
                )));
            }

            let span = (*encoded_max as i128 - *encoded_min as i128) as f64;
            let offset = (raw - *encoded_min as i128) as f64;
            Ok(KlvValue::IntegerEncodedFloat(offset / span * (max - min) + min))
        }
        Encoding::Float { length } => {
            expect_len(field, *length, bytes)?;
            match length {
                4 => Ok(KlvValue::Float(buf.get_f32() as f64)),
                8 => Ok(KlvValue::Float(buf.get_f64())),
                other => Err(KlvError::UnsupportedLength(*other)),
            }
        }
        Encoding::Unsigned { length } => {
            check_integer_length(*length)?;
            expect_len(field, *length, bytes)?;
            Ok(KlvValue::Unsigned(buf.get_uint(*length)))
        }
        Encoding::Signed { length } => {
            check_integer_length(*length)?;
            expect_len(field, *length, bytes)?;
            Ok(KlvValue::Signed(buf.get_int(*length)))
        }
        Encoding::Utf8 => String::from_utf8(bytes.to_vec())
            .map(KlvValue::Text)
            .map_err(|e| KlvError::Malformed(e.to_string())),
        Encoding::Timestamp => {
            expect_len(field, 8, bytes)?;
            let micros = buf.get_u64();
            timestamp_from_micros(micros)
                .map(KlvValue::Timestamp)
                .ok_or_else(|| KlvError::OutOfRange {
                    field: field.to_string(),
                    raw: micros as i128,
                })
        }
    }
}

/// Encode a real value as an integer code, rounding to the nearest code.
pub fn encode_integer_encoded_float(encoding: &Encoding, value: f64) -> Result<Bytes, KlvError> {
    let Encoding::IntegerEncodedFloat {
        length,
        signed,
        encoded_min,
        encoded_max,
        min,
        max,
        ..
    } = encoding
    else {
        return Err(KlvError::Malformed(format!(
            "cannot encode a real value as {}",
            encoding.kind()
        )));
    };
    check_integer_length(*length)?;

    if !(value >= *min && value <= *max) {
        return Err(KlvError::Malformed(format!(
            "{} outside [{}, {}]",
            value, min, max
        )));
    }

    let span = (*encoded_max as i128 - *encoded_min as i128) as f64;
    let code = ((value - min) / (max - min) * span).round() as i128 + *encoded_min as i128;

    let mut buf = BytesMut::with_capacity(*length);
    if *signed {
        buf.put_int(code as i64, *length);
    } else {
        buf.put_uint(code as u64, *length);
    }
    Ok(buf.freeze())
}

/// Encode a timestamp as microseconds since the Unix epoch.
pub fn encode_timestamp(time: &DateTime<Utc>) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64(time.timestamp_micros() as u64);
    buf.freeze()
}

fn timestamp_from_micros(micros: u64) -> Option<DateTime<Utc>> {
    let micros = i64::try_from(micros).ok()?;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn check_integer_length(length: usize) -> Result<(), KlvError> {
    if (1..=8).contains(&length) {
        Ok(())
    } else {
        Err(KlvError::UnsupportedLength(length))
    }
}

fn expect_len(field: &str, expected: usize, bytes: &[u8]) -> Result<(), KlvError> {
    if bytes.len() != expected {
        return Err(KlvError::InvalidLength {
            field: field.to_string(),
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latitude() -> FieldDefinition {
        FieldDefinition::new(82, "lat1", Encoding::symmetric_i32(90.0))
    }

    #[test]
    fn test_ber_length_short_form() {
        let mut buf: &[u8] = &[0x7F, 0xAA];
        assert_eq!(decode_ber_length(&mut buf).unwrap(), 127);
        assert_eq!(buf, &[0xAA]);
    }

    #[test]
    fn test_ber_length_long_form() {
        let mut buf: &[u8] = &[0x82, 0x01, 0x00];
        assert_eq!(decode_ber_length(&mut buf).unwrap(), 256);
        assert!(buf.is_empty());

        let mut encoded = BytesMut::new();
        encode_ber_length(&mut encoded, 256);
        assert_eq!(&encoded[..], &[0x82, 0x01, 0x00]);

        let mut encoded = BytesMut::new();
        encode_ber_length(&mut encoded, 200);
        assert_eq!(&encoded[..], &[0x81, 0xC8]);
    }

    #[test]
    fn test_ber_length_errors() {
        let mut indefinite: &[u8] = &[0x80];
        assert!(matches!(
            decode_ber_length(&mut indefinite),
            Err(KlvError::Malformed(_))
        ));

        let mut truncated: &[u8] = &[0x82, 0x01];
        assert!(decode_ber_length(&mut truncated).unwrap_err().is_incomplete());
    }

    #[test]
    fn test_ber_oid() {
        let mut buf: &[u8] = &[0x81, 0x01];
        assert_eq!(decode_ber_oid(&mut buf).unwrap(), 129);

        let mut encoded = BytesMut::new();
        encode_ber_oid(&mut encoded, 129);
        assert_eq!(&encoded[..], &[0x81, 0x01]);

        let mut encoded = BytesMut::new();
        encode_ber_oid(&mut encoded, 13);
        assert_eq!(&encoded[..], &[0x0D]);

        let mut endless: &[u8] = &[0xFF; 10];
        assert!(matches!(
            decode_ber_oid(&mut endless),
            Err(KlvError::Malformed(_))
        ));
    }

    #[test]
    fn test_integer_encoded_float_bounds() {
        let def = latitude();

        let max = (i32::MAX).to_be_bytes();
        let value = decode_element(&def, &max).unwrap();
        assert_eq!(value.name, "lat1");
        assert_eq!(value.value, KlvValue::IntegerEncodedFloat(90.0));

        let min = (-i32::MAX).to_be_bytes();
        let value = decode_value("lat1", &def.encoding, &min).unwrap();
        assert_eq!(value, KlvValue::IntegerEncodedFloat(-90.0));

        let zero = 0i32.to_be_bytes();
        let value = decode_value("lat1", &def.encoding, &zero).unwrap();
        assert_eq!(value.as_f64(), Some(0.0));
    }

    #[test]
    fn test_integer_encoded_float_error_indicator() {
        let def = latitude();
        let result = decode_element(&def, &i32::MIN.to_be_bytes());
        assert!(matches!(result, Err(KlvError::OutOfRange { .. })));
    }

    #[test]
    fn test_integer_encoded_float_unsigned_range() {
        // Heading-style field: u16 over [0, 360].
        let encoding = Encoding::IntegerEncodedFloat {
            length: 2,
            signed: false,
            encoded_min: 0,
            encoded_max: 0xFFFF,
            min: 0.0,
            max: 360.0,
            error_indicator: None,
        };
        let value = decode_value("heading", &encoding, &[0xFF, 0xFF]).unwrap();
        assert_eq!(value.as_f64(), Some(360.0));
    }

    #[test]
    fn test_integer_encoded_float_invalid_length() {
        let def = latitude();
        let result = decode_element(&def, &[0x00, 0x01]);
        assert_eq!(
            result,
            Err(KlvError::InvalidLength {
                field: "lat1".to_string(),
                expected: 4,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_encode_integer_encoded_float() {
        let encoding = Encoding::symmetric_i32(180.0);
        let bytes = encode_integer_encoded_float(&encoding, 45.5).unwrap();
        let decoded = decode_value("lon1", &encoding, &bytes).unwrap().as_f64().unwrap();
        assert!((decoded - 45.5).abs() < 1e-6);

        assert!(encode_integer_encoded_float(&encoding, 181.0).is_err());
        assert!(encode_integer_encoded_float(&Encoding::Utf8, 1.0).is_err());
    }

    #[test]
    fn test_decode_other_encodings() {
        assert_eq!(
            decode_value("alt", &Encoding::Float { length: 4 }, &1.5f32.to_be_bytes()).unwrap(),
            KlvValue::Float(1.5)
        );
        assert_eq!(
            decode_value("n", &Encoding::Unsigned { length: 2 }, &[0x01, 0x02]).unwrap(),
            KlvValue::Unsigned(0x0102)
        );
        assert_eq!(
            decode_value("n", &Encoding::Signed { length: 1 }, &[0xFF]).unwrap(),
            KlvValue::Signed(-1)
        );
        assert_eq!(
            decode_value("cc", &Encoding::Utf8, b"ID1").unwrap(),
            KlvValue::Text("ID1".to_string())
        );
        assert!(matches!(
            decode_value("cc", &Encoding::Utf8, &[0xFF, 0xFE]),
            Err(KlvError::Malformed(_))
        ));
        assert_eq!(
            decode_value("n", &Encoding::Unsigned { length: 9 }, &[0; 9]),
            Err(KlvError::UnsupportedLength(9))
        );
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let time = DateTime::from_timestamp(1_700_000_000, 123_456_000).unwrap();
        let bytes = encode_timestamp(&time);
        assert_eq!(
            decode_value("time", &Encoding::Timestamp, &bytes).unwrap(),
            KlvValue::Timestamp(time)
        );
    }

    #[test]
    fn test_parse_local_set() {
        let mut set = BytesMut::new();
        encode_local_set_item(&mut set, 2, &[0u8; 8]);
        encode_local_set_item(&mut set, 200, b"abc");

        let items = parse_local_set(&set).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tag, 2);
        assert_eq!(items[0].value.len(), 8);
        assert_eq!(items[1].tag, 200);
        assert_eq!(items[1].value, b"abc");
    }

    #[test]
    fn test_parse_local_set_truncated() {
        let data = [0x0D, 0x04, 0x00, 0x00];
        let result = parse_local_set(&data);
        assert!(matches!(result, Err(KlvError::IncompleteItem { .. })));
    }

    #[test]
    fn test_split_packet() {
        let mut set = BytesMut::new();
        encode_local_set_item(&mut set, 13, &0i32.to_be_bytes());
        let packet = encode_packet(&UAS_LOCAL_SET_KEY, &set);

        let (header, value) = split_packet(&packet, &UAS_LOCAL_SET_KEY).unwrap().unwrap();
        assert_eq!(header.header_len, 17);
        assert_eq!(header.packet_len(), packet.len());
        assert_eq!(value, &set[..]);

        // Partial packet needs more data.
        assert!(split_packet(&packet[..10], &UAS_LOCAL_SET_KEY).unwrap().is_none());
        assert!(split_packet(&packet[..packet.len() - 1], &UAS_LOCAL_SET_KEY)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_split_packet_wrong_key() {
        let packet = encode_packet(&[0u8; 16], &[0x02, 0x00]);
        let result = split_packet(&packet, &UAS_LOCAL_SET_KEY);
        assert!(matches!(result, Err(KlvError::InvalidKey(_))));
    }

    #[test]
    fn test_packet_too_large() {
        let mut data = UAS_LOCAL_SET_KEY.to_vec();
        data.extend_from_slice(&[0x84, 0x10, 0x00, 0x00, 0x00]);
        assert!(matches!(
            decode_packet_header(&data),
            Err(KlvError::PacketTooLarge(_, MAX_PACKET_SIZE))
        ));
    }
}
