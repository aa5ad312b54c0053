//! Iteration over KLV packets in a byte stream.
//!
//! Packets are expected back to back. When a packet cannot be framed the
//! reader skips ahead to the next occurrence of the universal key.

use klv_protocol::{decode_packet_header, split_packet, KlvError, UNIVERSAL_KEY_SIZE};
use log::{debug, warn};

/// Iterator yielding the local-set value of each packet.
pub struct PacketReader<'a> {
    data: &'a [u8],
    offset: usize,
    key: [u8; UNIVERSAL_KEY_SIZE],
    skipped_bytes: usize,
    resyncs: usize,
}

impl<'a> PacketReader<'a> {
    /// Create a reader over `data` for packets carrying `key`.
    pub fn new(data: &'a [u8], key: [u8; UNIVERSAL_KEY_SIZE]) -> Self {
        let mut reader = Self {
            data,
            offset: 0,
            key,
            skipped_bytes: 0,
            resyncs: 0,
        };
        reader.seek_key(0);
        reader
    }

    /// Bytes skipped while looking for a key.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped_bytes
    }

    /// Number of times framing was lost.
    pub fn resyncs(&self) -> usize {
        self.resyncs
    }

    /// Offset of the next key at or after `offset + from`.
    fn find_key(&self, from: usize) -> Option<usize> {
        let start = (self.offset + from).min(self.data.len());
        self.data[start..]
            .windows(UNIVERSAL_KEY_SIZE)
            .position(|w| w == self.key)
            .map(|p| start + p)
    }

    /// Move to the next key at or after `offset + from`.
    fn seek_key(&mut self, from: usize) {
        let next = self.find_key(from).unwrap_or(self.data.len());
        self.skipped_bytes += next - self.offset;
        self.offset = next;
    }

    fn resync(&mut self, error: &KlvError) {
        warn!("Lost KLV framing at offset {}: {}", self.offset, error);
        self.resyncs += 1;
        self.seek_key(1);
    }
}

impl<'a> Iterator for PacketReader<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.data.len() {
            let data: &'a [u8] = &self.data[self.offset..];
            match split_packet(data, &self.key) {
                Ok(Some((header, value))) => {
                    self.offset += header.packet_len();
                    return Some(value);
                }
                // A length running past the end is only a truncated tail
                // when no later packet starts inside it.
                Ok(None) if self.find_key(1).is_some() => {
                    let expected = decode_packet_header(data)
                        .ok()
                        .flatten()
                        .map_or(UNIVERSAL_KEY_SIZE + 1, |h| h.packet_len());
                    self.resync(&KlvError::IncompleteItem {
                        expected,
                        actual: data.len(),
                    });
                }
                Ok(None) => {
                    debug!(
                        "Truncated packet at offset {} ({} bytes left)",
                        self.offset,
                        data.len()
                    );
                    self.skipped_bytes += data.len();
                    self.offset = self.data.len();
                }
                Err(e) => self.resync(&e),
            }
        }
        None
    }
}
