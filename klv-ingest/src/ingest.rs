//! Epoch loop: packets in, merged parent metacard out.

use klv_handlers::{HandlerSession, Metacard, MetacardUpdater};
use klv_protocol::{FieldDictionary, UNIVERSAL_KEY_SIZE};
use log::{debug, info, warn};

use crate::reader::PacketReader;

/// Ingest settings after merging CLI and config file.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Parent metacard id; epoch children are `<id>-<n>`.
    pub metacard_id: String,
    /// Maximum footprint samples per epoch (`None` keeps all).
    pub subsample_count: Option<usize>,
    /// Packets per epoch (0 = one epoch for the whole stream).
    pub interval_packets: usize,
    /// Universal key of the packets to read.
    pub universal_key: [u8; UNIVERSAL_KEY_SIZE],
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub packets: u64,
    pub malformed_packets: u64,
    pub elements_routed: u64,
    pub decode_errors: u64,
    pub epochs: u64,
    pub skipped_bytes: usize,
    pub resyncs: usize,
}

/// Feeds packets into a handler session and merges each epoch into a parent.
pub struct Ingester {
    session: HandlerSession,
    dictionary: FieldDictionary,
    updaters: Vec<MetacardUpdater>,
    settings: IngestSettings,
}

impl Ingester {
    pub fn new(
        session: HandlerSession,
        dictionary: FieldDictionary,
        updaters: Vec<MetacardUpdater>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            session,
            dictionary,
            updaters,
            settings,
        }
    }

    /// Process a whole stream and return the parent metacard.
    pub fn run(&mut self, data: &[u8]) -> (Metacard, IngestSummary) {
        let mut parent = Metacard::new(&self.settings.metacard_id);
        let mut summary = IngestSummary::default();
        let mut in_epoch = 0;

        let mut reader = PacketReader::new(data, self.settings.universal_key);
        for local_set in reader.by_ref() {
            match self.session.accept_local_set(local_set, &self.dictionary) {
                Ok(routed) => debug!("Packet {}: {} elements routed", summary.packets, routed),
                Err(e) => {
                    warn!("Dropping malformed packet {}: {}", summary.packets, e);
                    summary.malformed_packets += 1;
                }
            }
            summary.packets += 1;
            in_epoch += 1;

            if self.settings.interval_packets > 0 && in_epoch == self.settings.interval_packets {
                self.close_epoch(&mut parent, &mut summary);
                in_epoch = 0;
            }
        }

        if in_epoch > 0 {
            self.close_epoch(&mut parent, &mut summary);
        }
        summary.skipped_bytes = reader.skipped_bytes();
        summary.resyncs = reader.resyncs();

        (parent, summary)
    }

    /// Merge the current epoch into `parent` and start a new one.
    fn close_epoch(&mut self, parent: &mut Metacard, summary: &mut IngestSummary) {
        let stats = self.session.stats();
        summary.elements_routed += stats.elements_routed;
        summary.decode_errors += stats.decode_errors;

        let child_id = format!("{}-{}", self.settings.metacard_id, summary.epochs);
        let child = self
            .session
            .to_metacard(child_id, self.settings.subsample_count);

        for updater in &self.updaters {
            updater.update(parent, &child);
        }
        info!(
            "Closed epoch {} ({} packets, {} attributes)",
            summary.epochs,
            stats.packets,
            child.attribute_names().count()
        );

        summary.epochs += 1;
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use chrono::DateTime;
    use klv_handlers::{
        AttributeMergeUpdater, GeoBoxHandler, TemporalEndUpdater, TemporalStartUpdater, TextHandler,
    };
    use klv_protocol::{
        encode_integer_encoded_float, encode_local_set_item, encode_packet, encode_timestamp,
        Encoding, FieldDefinition, UAS_LOCAL_SET_KEY,
    };

    use super::*;

    const CORNERS: [(&str, &str); 4] = [
        ("lat1", "lon1"),
        ("lat2", "lon2"),
        ("lat3", "lon3"),
        ("lat4", "lon4"),
    ];

    fn dictionary() -> FieldDictionary {
        let mut dictionary = FieldDictionary::new();
        dictionary.insert(FieldDefinition::new(2, "TIME", Encoding::Timestamp));
        dictionary.insert(FieldDefinition::new(59, "CALL_SIGN", Encoding::Utf8));
        for (i, (lat, lon)) in CORNERS.iter().enumerate() {
            let tag = 82 + 2 * i as u64;
            dictionary.insert(FieldDefinition::new(tag, *lat, Encoding::symmetric_i32(90.0)));
            dictionary.insert(FieldDefinition::new(tag + 1, *lon, Encoding::symmetric_i32(180.0)));
        }
        dictionary
    }

    fn stream(dictionary: &FieldDictionary, packets: i64) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..packets {
            let mut set = BytesMut::new();
            let time = DateTime::from_timestamp(1_000 + i, 0).unwrap();
            encode_local_set_item(&mut set, 2, &encode_timestamp(&time));
            encode_local_set_item(&mut set, 59, if i % 2 == 0 { b"HAWK1" } else { b"HAWK2" });
            for tag in 82..90 {
                let encoding = &dictionary.get(tag).unwrap().encoding;
                let code = encode_integer_encoded_float(encoding, i as f64 * 0.1).unwrap();
                encode_local_set_item(&mut set, tag, &code);
            }
            data.extend_from_slice(&encode_packet(&UAS_LOCAL_SET_KEY, &set));
        }
        data
    }

    fn ingester(interval_packets: usize, subsample_count: Option<usize>) -> Ingester {
        let mut session = HandlerSession::new();
        session.add_handler(Box::new(GeoBoxHandler::new("footprint", CORNERS).unwrap()));
        session.add_handler(Box::new(TextHandler::new("call_sign", "CALL_SIGN")));

        let updaters = vec![
            MetacardUpdater::TemporalStart(TemporalStartUpdater),
            MetacardUpdater::TemporalEnd(TemporalEndUpdater),
            AttributeMergeUpdater::new("footprint").into(),
            AttributeMergeUpdater::new("call_sign").into(),
        ];

        Ingester::new(
            session,
            dictionary(),
            updaters,
            IngestSettings {
                metacard_id: "mission".to_string(),
                subsample_count,
                interval_packets,
                universal_key: UAS_LOCAL_SET_KEY,
            },
        )
    }

    #[test]
    fn test_single_epoch() {
        let data = stream(&dictionary(), 10);
        let (parent, summary) = ingester(0, Some(4)).run(&data);

        assert_eq!(summary.packets, 10);
        assert_eq!(summary.epochs, 1);
        assert_eq!(summary.elements_routed, 90);
        assert_eq!(parent.id(), "mission");
        assert_eq!(parent.attribute("footprint").unwrap().len(), 4);
        assert_eq!(parent.attribute("call_sign").unwrap().len(), 2);
        assert_eq!(parent.temporal_start(), DateTime::from_timestamp(1_000, 0));
        assert_eq!(parent.temporal_end(), DateTime::from_timestamp(1_009, 0));
    }

    #[test]
    fn test_epochs_merge_into_parent() {
        let data = stream(&dictionary(), 10);
        let (parent, summary) = ingester(4, Some(2)).run(&data);

        // 4 + 4 + 2 packets, two footprints kept from each epoch.
        assert_eq!(summary.epochs, 3);
        assert_eq!(parent.attribute("footprint").unwrap().len(), 6);
        assert_eq!(parent.temporal_start(), DateTime::from_timestamp(1_000, 0));
        assert_eq!(parent.temporal_end(), DateTime::from_timestamp(1_009, 0));
    }

    #[test]
    fn test_malformed_packet_counted() {
        let mut set = BytesMut::new();
        set.extend_from_slice(&[0x52, 0x04, 0x00]);
        let mut data = encode_packet(&UAS_LOCAL_SET_KEY, &set).to_vec();
        data.extend(stream(&dictionary(), 1));

        let (parent, summary) = ingester(0, None).run(&data);
        assert_eq!(summary.packets, 2);
        assert_eq!(summary.malformed_packets, 1);
        assert_eq!(parent.attribute("footprint").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_stream() {
        let (parent, summary) = ingester(0, None).run(&[]);
        assert_eq!(summary, IngestSummary::default());
        assert_eq!(parent.attribute_names().count(), 0);
    }
}
