use anyhow::Result;
use log::trace;

use crate::structs::layout::PacketLayout;
use crate::structs::raw_packet::{PacketBatch, RawPacket};
use crate::utils::word_reader::WordSliceReader;

/// Decodes raw digitizer packets from a byte buffer.
///
/// The buffer must start on a packet boundary. Decoding is a pure
/// reinterpretation of bytes; nothing is validated here.
#[derive(Debug, Clone, Copy)]
pub struct PacketDecoder<'a> {
    layout: &'a PacketLayout,
}

impl<'a> PacketDecoder<'a> {
    pub fn new(layout: &'a PacketLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &'a PacketLayout {
        self.layout
    }

    /// Decodes every complete packet in `bytes`.
    ///
    /// Trailing bytes that do not form a full packet are left undecoded; a
    /// buffer shorter than one packet gives an empty batch.
    pub fn decode(&self, bytes: &[u8]) -> Result<PacketBatch> {
        let size = self.layout.packet_size();
        let count = bytes.len() / size;
        if count == 0 {
            return Ok(PacketBatch::default());
        }

        let reader = &mut WordSliceReader::from_slice(&bytes[..count * size]);
        let mut packets = Vec::with_capacity(count);
        for _ in 0..count {
            packets.push(RawPacket::read(reader, self.layout)?);
        }
        trace!(
            "Decoded {count} packets, {} bytes left over",
            bytes.len() - count * size
        );

        Ok(PacketBatch::new(packets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(layout: &PacketLayout, stamps: &[u64]) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for (i, &ts) in stamps.iter().enumerate() {
            let data = (0..layout.channels() as i32).map(|c| c * 100 + i as i32).collect();
            bytes.extend(RawPacket::new(layout, ts, i as u32, data)?.to_le_bytes());
        }
        Ok(bytes)
    }

    #[test]
    fn decodes_whole_packets_only() -> Result<()> {
        let layout = PacketLayout::raw(8)?;
        let mut bytes = encode(&layout, &[1, 2, 3])?;
        bytes.extend_from_slice(&[0xAA; 17]);

        let batch = PacketDecoder::new(&layout).decode(&bytes)?;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.first_timestamp(), Some(1));
        assert_eq!(batch.last_timestamp(), Some(3));
        assert_eq!(batch.packets()[2].data[5], 502);
        assert_eq!(batch.packets()[2].ttl, 2);
        Ok(())
    }

    #[test]
    fn short_buffer_is_empty_not_error() -> Result<()> {
        let layout = PacketLayout::raw(8)?;
        let decoder = PacketDecoder::new(&layout);
        assert!(decoder.decode(&[])?.is_empty());
        assert!(decoder.decode(&[0u8; 100])?.is_empty());
        Ok(())
    }

    #[test]
    fn high_timestamp_half() -> Result<()> {
        let layout = PacketLayout::raw(1)?;
        let bytes = encode(&layout, &[(7u64 << 32) | 9])?;
        let batch = PacketDecoder::new(&layout).decode(&bytes)?;
        assert_eq!(batch.packets()[0].timestamp(), 30_064_771_081);
        Ok(())
    }
}
