//! Routing of decoded elements to handlers for one metadata stream.
//!
//! A session holds the handler set of one video stream. Elements are routed
//! by field name; a field may feed several handlers. Calling
//! [`HandlerSession::reset`] starts a new accumulation epoch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use klv_protocol::{
    decode_packet_header, split_packet, FieldDictionary, KlvElement, KlvError, KlvValue,
    UNIVERSAL_KEY_SIZE,
};
use log::{debug, warn};

use crate::attribute::Attribute;
use crate::error::Result;
use crate::handler::{HandlerConfig, KlvHandler};
use crate::metacard::Metacard;

/// Counters for one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Local sets accepted.
    pub packets: u64,
    /// Elements delivered to at least one handler.
    pub elements_routed: u64,
    /// Elements no handler asked for.
    pub elements_unrouted: u64,
    /// Items that failed to decode.
    pub decode_errors: u64,
}

/// Handler set fed from one element source.
#[derive(Default)]
pub struct HandlerSession {
    handlers: Vec<Box<dyn KlvHandler>>,
    /// Field name -> indices into `handlers`.
    routes: HashMap<String, Vec<usize>>,
    first_time: Option<DateTime<Utc>>,
    last_time: Option<DateTime<Utc>>,
    stats: SessionStats,
}

impl HandlerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from handler configurations.
    pub fn from_configs(configs: &[HandlerConfig]) -> Result<Self> {
        let mut session = Self::new();
        for config in configs {
            session.add_handler(config.build()?);
        }
        Ok(session)
    }

    /// Register a handler for every field it consumes.
    pub fn add_handler(&mut self, handler: Box<dyn KlvHandler>) {
        let index = self.handlers.len();
        for field in handler.field_names() {
            self.routes.entry(field.to_string()).or_default().push(index);
        }
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Box<dyn KlvHandler>] {
        &self.handlers
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Earliest and latest timestamps seen this epoch.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.first_time?, self.last_time?))
    }

    /// Route one element to every handler registered for its name.
    ///
    /// Returns true if at least one handler received it.
    pub fn accept(&mut self, element: &KlvElement) -> bool {
        if let KlvValue::Timestamp(time) = element.value {
            self.observe_time(time);
        }

        let Some(indices) = self.routes.get(&element.name) else {
            self.stats.elements_unrouted += 1;
            return false;
        };

        for &index in indices {
            self.handlers[index].accept(element);
        }
        self.stats.elements_routed += 1;
        true
    }

    /// Decode a local set and route every element in it.
    ///
    /// Items that fail to decode are logged and dropped. Returns the number
    /// of elements routed, or an error if the local set itself is malformed.
    pub fn accept_local_set(&mut self, payload: &[u8], dictionary: &FieldDictionary) -> Result<usize> {
        let decoded = dictionary.decode_local_set(payload)?;
        self.stats.packets += 1;

        let mut routed = 0;
        for result in decoded {
            match result {
                Ok(element) => {
                    if self.accept(&element) {
                        routed += 1;
                    }
                }
                Err(e) => {
                    self.stats.decode_errors += 1;
                    debug!("Dropping undecodable element: {}", e);
                }
            }
        }

        Ok(routed)
    }

    /// Decode one complete packet carrying `key` and route its local set.
    ///
    /// Bytes after the packet are ignored. A short packet is reported as
    /// [`KlvError::IncompleteItem`].
    pub fn accept_packet(
        &mut self,
        data: &[u8],
        key: &[u8; UNIVERSAL_KEY_SIZE],
        dictionary: &FieldDictionary,
    ) -> Result<usize> {
        let Some((_, local_set)) = split_packet(data, key)? else {
            let expected = decode_packet_header(data)?
                .map_or(UNIVERSAL_KEY_SIZE + 1, |h| h.packet_len());
            return Err(KlvError::IncompleteItem {
                expected,
                actual: data.len(),
            }
            .into());
        };
        self.accept_local_set(local_set, dictionary)
    }

    /// Trim every handler and collect the attributes they derive.
    ///
    /// With `subsample_count`, composite handlers are reduced to at most
    /// that many samples first. Handlers with nothing to report are skipped.
    pub fn collect_attributes(&mut self, subsample_count: Option<usize>) -> Vec<Attribute> {
        self.handlers
            .iter_mut()
            .filter_map(|handler| {
                handler.trim();
                match subsample_count {
                    Some(count) => handler.subsampled_attribute(count),
                    None => handler.as_attribute(),
                }
            })
            .collect()
    }

    /// Child metacard holding everything accumulated this epoch.
    pub fn to_metacard(&mut self, id: impl Into<String>, subsample_count: Option<usize>) -> Metacard {
        let mut metacard = Metacard::new(id);
        for attribute in self.collect_attributes(subsample_count) {
            metacard.set_attribute(attribute);
        }
        if let Some((start, end)) = self.time_range() {
            metacard.set_temporal_start(start);
            metacard.set_temporal_end(end);
        } else {
            warn!("No timestamps seen for metacard {}", metacard.id());
        }
        metacard
    }

    /// Reset every handler and the epoch counters.
    pub fn reset(&mut self) {
        for handler in self.handlers.iter_mut() {
            handler.reset();
        }
        self.first_time = None;
        self.last_time = None;
        self.stats = SessionStats::default();
    }

    fn observe_time(&mut self, time: DateTime<Utc>) {
        self.first_time = Some(self.first_time.map_or(time, |t| t.min(time)));
        self.last_time = Some(self.last_time.map_or(time, |t| t.max(time)));
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use klv_protocol::{
        encode_integer_encoded_float, encode_local_set_item, encode_packet, encode_timestamp,
        Encoding, FieldDefinition, UAS_LOCAL_SET_KEY,
    };

    use super::*;
    use crate::attribute::AttributeValue;
    use crate::error::HandlerError;
    use crate::handler::{FloatingPointHandler, GeoBoxHandler, TextHandler};

    const CORNERS: [(&str, &str); 4] = [
        ("lat1", "lon1"),
        ("lat2", "lon2"),
        ("lat3", "lon3"),
        ("lat4", "lon4"),
    ];

    fn session() -> HandlerSession {
        let mut session = HandlerSession::new();
        session.add_handler(Box::new(FloatingPointHandler::new("altitude", "ALT")));
        session.add_handler(Box::new(GeoBoxHandler::new("footprint", CORNERS).unwrap()));
        session.add_handler(Box::new(TextHandler::new("country_codes", "CC")));
        session
    }

    fn dictionary() -> FieldDictionary {
        let mut dictionary = FieldDictionary::new();
        dictionary.insert(FieldDefinition::new(2, "TIME", Encoding::Timestamp));
        dictionary.insert(FieldDefinition::new(15, "ALT", Encoding::Float { length: 4 }));
        for (i, (lat, lon)) in CORNERS.iter().enumerate() {
            let tag = 82 + 2 * i as u64;
            dictionary.insert(FieldDefinition::new(tag, *lat, Encoding::symmetric_i32(90.0)));
            dictionary.insert(FieldDefinition::new(tag + 1, *lon, Encoding::symmetric_i32(180.0)));
        }
        dictionary
    }

    fn corner_set(dictionary: &FieldDictionary, time: i64, lat: f64, lon: f64) -> BytesMut {
        let mut set = BytesMut::new();
        let stamp = DateTime::from_timestamp(time, 0).unwrap();
        encode_local_set_item(&mut set, 2, &encode_timestamp(&stamp));
        for tag in 82..90 {
            let definition = dictionary.get(tag).unwrap();
            let value = if tag % 2 == 0 { lat } else { lon };
            let code = encode_integer_encoded_float(&definition.encoding, value).unwrap();
            encode_local_set_item(&mut set, tag, &code);
        }
        set
    }

    #[test]
    fn test_routes_by_field_name() {
        let mut session = session();
        assert!(session.accept(&KlvElement::new("ALT", KlvValue::Float(100.0))));
        assert!(session.accept(&KlvElement::new("CC", KlvValue::Text("ID1".to_string()))));
        assert!(!session.accept(&KlvElement::new("HDG", KlvValue::Float(1.0))));

        let attributes = session.collect_attributes(None);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].name, "altitude");
        assert_eq!(attributes[1].name, "country_codes");

        let stats = session.stats();
        assert_eq!(stats.elements_routed, 2);
        assert_eq!(stats.elements_unrouted, 1);
    }

    #[test]
    fn test_field_feeding_two_handlers() {
        let mut session = session();
        session.add_handler(Box::new(FloatingPointHandler::new("altitude_copy", "ALT")));
        session.accept(&KlvElement::new("ALT", KlvValue::Float(5.0)));

        let attributes = session.collect_attributes(None);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[1].name, "altitude_copy");
    }

    #[test]
    fn test_accept_local_set() {
        let dictionary = dictionary();
        let mut session = session();

        for i in 0..3 {
            let set = corner_set(&dictionary, 1_000 + i, 10.0, 20.0);
            // Timestamp is not routed, eight corners are.
            assert_eq!(session.accept_local_set(&set, &dictionary).unwrap(), 8);
        }

        let attributes = session.collect_attributes(None);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].name, "footprint");
        assert_eq!(attributes[0].values.len(), 3);
        assert_eq!(session.stats().packets, 3);
    }

    #[test]
    fn test_decode_errors_are_dropped() {
        let dictionary = dictionary();
        let mut session = session();

        let mut set = BytesMut::new();
        encode_local_set_item(&mut set, 15, &[0x00, 0x01]);
        encode_local_set_item(&mut set, 15, &2.5f32.to_be_bytes());

        assert_eq!(session.accept_local_set(&set, &dictionary).unwrap(), 1);
        assert_eq!(session.stats().decode_errors, 1);

        let attributes = session.collect_attributes(None);
        assert_eq!(attributes[0].values, vec![AttributeValue::Double(2.5)]);
    }

    #[test]
    fn test_accept_packet() {
        let dictionary = dictionary();
        let mut session = session();
        let packet = encode_packet(
            &UAS_LOCAL_SET_KEY,
            &corner_set(&dictionary, 1_000, 10.0, 20.0),
        );

        assert_eq!(
            session
                .accept_packet(&packet, &UAS_LOCAL_SET_KEY, &dictionary)
                .unwrap(),
            8
        );

        let short = &packet[..packet.len() - 1];
        assert!(matches!(
            session.accept_packet(short, &UAS_LOCAL_SET_KEY, &dictionary),
            Err(HandlerError::Klv(KlvError::IncompleteItem { .. }))
        ));

        let mut other_key = UAS_LOCAL_SET_KEY;
        other_key[15] = 0x01;
        assert!(matches!(
            session.accept_packet(&packet, &other_key, &dictionary),
            Err(HandlerError::Klv(KlvError::InvalidKey(_)))
        ));
        assert_eq!(session.stats().packets, 1);
    }

    #[test]
    fn test_malformed_local_set_is_error() {
        let mut session = session();
        assert!(session.accept_local_set(&[0x0F, 0x04, 0x00], &dictionary()).is_err());
    }

    #[test]
    fn test_collect_trims_and_subsamples() {
        let mut session = session();
        for i in 0..20 {
            for (lat, lon) in CORNERS {
                session.accept(&KlvElement::new(lat, KlvValue::IntegerEncodedFloat(i as f64)));
                session.accept(&KlvElement::new(lon, KlvValue::IntegerEncodedFloat(i as f64)));
            }
        }
        session.accept(&KlvElement::new("lat1", KlvValue::IntegerEncodedFloat(50.0)));

        let attributes = session.collect_attributes(Some(4));
        assert_eq!(attributes[0].values.len(), 4);

        // Trimmed in place: the stray lat1 value is gone.
        let attributes = session.collect_attributes(None);
        assert_eq!(attributes[0].values.len(), 20);
    }

    #[test]
    fn test_to_metacard_and_reset() {
        let dictionary = dictionary();
        let mut session = session();
        session
            .accept_local_set(&corner_set(&dictionary, 2_000, 1.0, 2.0), &dictionary)
            .unwrap();
        session
            .accept_local_set(&corner_set(&dictionary, 1_000, 1.0, 2.0), &dictionary)
            .unwrap();

        let card = session.to_metacard("mc-1", Some(10));
        assert_eq!(card.temporal_start(), DateTime::from_timestamp(1_000, 0));
        assert_eq!(card.temporal_end(), DateTime::from_timestamp(2_000, 0));
        assert_eq!(card.attribute("footprint").unwrap().len(), 2);

        session.reset();
        assert!(session.time_range().is_none());
        assert!(session.collect_attributes(None).is_empty());
        assert_eq!(session.stats(), SessionStats::default());
    }

    #[test]
    fn test_from_configs() {
        let configs = vec![
            HandlerConfig::Text {
                attribute: "country_codes".to_string(),
                field: "CC".to_string(),
            },
            HandlerConfig::GeoBox {
                attribute: "footprint".to_string(),
                fields: CORNERS
                    .iter()
                    .flat_map(|(lat, lon)| [lat.to_string(), lon.to_string()])
                    .collect(),
            },
        ];
        let session = HandlerSession::from_configs(&configs).unwrap();
        assert_eq!(session.handlers().len(), 2);
        assert_eq!(session.handlers()[1].field_names().len(), 8);
    }
}
