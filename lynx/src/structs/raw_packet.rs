//! Raw digitizer packets
//!
//! One packet carries a timestamp, the TTL port state and one sample for
//! every A/D channel of the system:
//!
//! ```text
//! stx | pkt_id | pkt_data_size | ts_high | ts_low | status | ttl | extra[10] | data[C] | crc
//! ```
//!
//! All fields are 32-bit little-endian words.

use std::io;

use anyhow::{Result, ensure};
use lynx_macros::ToBytes;

use crate::structs::layout::{PacketLayout, RAW_EXTRA_WORDS, RAW_PACKET_ID, RAW_STX};
use crate::utils::byteorder::WriteBytesLe;
use crate::utils::crc::WordXor;
use crate::utils::errors::LayoutError;
use crate::utils::word_reader::WordReader;

#[derive(Debug, Clone, PartialEq, Eq, ToBytes)]
pub struct RawPacket {
    pub stx: i32,
    pub pkt_id: i32,
    pub pkt_data_size: i32,
    pub timestamp_high: u32,
    pub timestamp_low: u32,
    pub status: i32,
    pub ttl: u32,
    pub extra: [i32; RAW_EXTRA_WORDS],
    pub data: Vec<i32>,
    pub crc: i32,
}

impl RawPacket {
    /// Builds a structurally valid packet with a sealed CRC word.
    pub fn new(layout: &PacketLayout, timestamp: u64, ttl: u32, data: Vec<i32>) -> Result<Self> {
        ensure!(
            data.len() == layout.channels(),
            LayoutError::PayloadMismatch {
                found: data.len(),
                expected: layout.channels()
            }
        );

        let mut packet = Self {
            stx: RAW_STX,
            pkt_id: RAW_PACKET_ID,
            pkt_data_size: layout.expected_data_size(),
            timestamp_high: (timestamp >> 32) as u32,
            timestamp_low: timestamp as u32,
            status: 0,
            ttl,
            extra: [0; RAW_EXTRA_WORDS],
            data,
            crc: 0,
        };
        packet.seal();

        Ok(packet)
    }

    pub fn read<R: io::Read>(reader: &mut WordReader<R>, layout: &PacketLayout) -> io::Result<Self> {
        let stx = reader.get_s(32)?;
        let pkt_id = reader.get_s(32)?;
        let pkt_data_size = reader.get_s(32)?;
        let timestamp_high = reader.get_u(32)?;
        let timestamp_low = reader.get_u(32)?;
        let status = reader.get_s(32)?;
        let ttl = reader.get_u(32)?;

        let mut extra = [0i32; RAW_EXTRA_WORDS];
        for word in extra.iter_mut() {
            *word = reader.get_s(32)?;
        }

        let data = (0..layout.channels())
            .map(|_| reader.get_s::<i32>(32))
            .collect::<io::Result<Vec<_>>>()?;

        let crc = reader.get_s(32)?;

        Ok(Self {
            stx,
            pkt_id,
            pkt_data_size,
            timestamp_high,
            timestamp_low,
            status,
            ttl,
            extra,
            data,
            crc,
        })
    }

    /// 64-bit timestamp in microseconds.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        (u64::from(self.timestamp_high) << 32) | u64::from(self.timestamp_low)
    }

    /// Every 32-bit word of the packet in wire order, CRC word last.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        [
            self.stx as u32,
            self.pkt_id as u32,
            self.pkt_data_size as u32,
            self.timestamp_high,
            self.timestamp_low,
            self.status as u32,
            self.ttl,
        ]
        .into_iter()
        .chain(self.extra.iter().map(|&w| w as u32))
        .chain(self.data.iter().map(|&w| w as u32))
        .chain(std::iter::once(self.crc as u32))
    }

    /// XOR of all words; zero for an intact packet.
    pub fn crc_residue(&self) -> u32 {
        WordXor::new().update_all(self.words()).value()
    }

    pub fn crc_intact(&self) -> bool {
        WordXor::new().update_all(self.words()).is_clean()
    }

    /// Sets the CRC word so that the packet's residue is zero.
    pub fn seal(&mut self) {
        self.crc = 0;
        self.crc = self.crc_residue() as i32;
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((18 + self.data.len()) * 4);
        self.write_le(&mut bytes);
        bytes
    }
}

/// Packets decoded from one read of the input, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketBatch {
    packets: Vec<RawPacket>,
}

impl PacketBatch {
    pub fn new(packets: Vec<RawPacket>) -> Self {
        Self { packets }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Keeps the first `len` packets.
    pub fn truncate(&mut self, len: usize) {
        self.packets.truncate(len);
    }

    pub fn packets(&self) -> &[RawPacket] {
        &self.packets
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.packets.first().map(RawPacket::timestamp)
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.packets.last().map(RawPacket::timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::word_reader::WordSliceReader;

    #[test]
    fn timestamp_halves_recombine() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let packet = RawPacket::new(&layout, 0x0000_0003_8000_0001, 7, vec![1, -1])?;
        assert_eq!(packet.timestamp_high, 3);
        assert_eq!(packet.timestamp_low, 0x8000_0001);
        assert_eq!(packet.timestamp(), 0x0000_0003_8000_0001);
        Ok(())
    }

    #[test]
    fn sealed_packet_has_zero_residue() -> Result<()> {
        let layout = PacketLayout::raw(3)?;
        let mut packet = RawPacket::new(&layout, 123_456, 0xFFFF_0000, vec![10, -20, 30])?;
        assert_eq!(packet.crc_residue(), 0);
        assert!(packet.crc_intact());

        packet.data[1] ^= 0x10;
        assert_ne!(packet.crc_residue(), 0);
        assert!(!packet.crc_intact());
        Ok(())
    }

    #[test]
    fn encode_matches_layout() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let packet = RawPacket::new(&layout, 99, 1, vec![5, 6, 7, 8])?;
        let bytes = packet.to_le_bytes();
        assert_eq!(bytes.len(), layout.packet_size());
        assert_eq!(&bytes[..4], &[0x00, 0x08, 0x00, 0x00]);

        let back = RawPacket::read(&mut WordSliceReader::from_slice(&bytes), &layout)?;
        assert_eq!(back, packet);
        Ok(())
    }

    #[test]
    fn payload_width_is_checked() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        assert!(RawPacket::new(&layout, 0, 0, vec![1, 2]).is_err());
        Ok(())
    }
}
