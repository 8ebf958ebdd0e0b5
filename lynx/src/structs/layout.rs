//! Fixed packet layouts
//!
//! A [`PacketLayout`] is the byte-level description of one record type. The
//! raw digitizer layout depends on the channel count read from the file
//! header, so it is built once per file and passed by reference to the
//! decoder, validator and writers.

use anyhow::{Result, ensure};

use crate::utils::errors::LayoutError;

/// Start-of-packet marker carried by every raw digitizer packet.
pub const RAW_STX: i32 = 2048;

/// Packet type identifier of raw digitizer packets.
pub const RAW_PACKET_ID: i32 = 1;

/// Words counted by `pkt_data_size` in addition to one word per channel.
pub const RAW_OVERHEAD_WORDS: usize = 10;

/// Number of `extra` words in a raw digitizer packet.
pub const RAW_EXTRA_WORDS: usize = 10;

/// Samples carried by each continuous record, valid or not.
pub const CONTINUOUS_SAMPLES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    I16,
    U16,
    I32,
    U32,
    U64,
    Byte,
}

impl Primitive {
    pub const fn width(self) -> usize {
        match self {
            Primitive::Byte => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 => 4,
            Primitive::U64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub primitive: Primitive,
    pub count: usize,
}

impl Field {
    const fn new(name: &'static str, primitive: Primitive, count: usize) -> Self {
        Self {
            name,
            primitive,
            count,
        }
    }

    pub const fn size(&self) -> usize {
        self.primitive.width() * self.count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketLayout {
    channels: usize,
    fields: Vec<Field>,
}

impl PacketLayout {
    /// Raw digitizer packet for `channels` A/D channels.
    pub fn raw(channels: usize) -> Result<Self> {
        ensure!(channels > 0, LayoutError::NoChannels);
        ensure!(
            channels <= (i32::MAX as usize) / 4 - RAW_OVERHEAD_WORDS - 8,
            LayoutError::TooManyChannels(channels)
        );

        Ok(Self {
            channels,
            fields: vec![
                Field::new("stx", Primitive::I32, 1),
                Field::new("pkt_id", Primitive::I32, 1),
                Field::new("pkt_data_size", Primitive::I32, 1),
                Field::new("timestamp_high", Primitive::U32, 1),
                Field::new("timestamp_low", Primitive::U32, 1),
                Field::new("status", Primitive::I32, 1),
                Field::new("ttl", Primitive::U32, 1),
                Field::new("extra", Primitive::I32, RAW_EXTRA_WORDS),
                Field::new("data", Primitive::I32, channels),
                Field::new("crc", Primitive::I32, 1),
            ],
        })
    }

    /// Continuous-voltage record (one channel, 512 samples).
    pub fn continuous() -> Self {
        Self {
            channels: 1,
            fields: vec![
                Field::new("timestamp", Primitive::U64, 1),
                Field::new("channel", Primitive::U32, 1),
                Field::new("nominal_rate", Primitive::U32, 1),
                Field::new("valid_samples", Primitive::U32, 1),
                Field::new("samples", Primitive::I16, CONTINUOUS_SAMPLES),
            ],
        }
    }

    /// Event record.
    pub fn event() -> Self {
        Self {
            channels: 0,
            fields: vec![
                Field::new("stx", Primitive::I16, 1),
                Field::new("pkt_id", Primitive::I16, 1),
                Field::new("pkt_data_size", Primitive::I16, 1),
                Field::new("timestamp", Primitive::U64, 1),
                Field::new("event_id", Primitive::I16, 1),
                Field::new("ttl", Primitive::U16, 1),
                Field::new("crc", Primitive::I16, 1),
                Field::new("dummy1", Primitive::I16, 1),
                Field::new("dummy2", Primitive::I16, 1),
                Field::new("extra", Primitive::I32, 8),
                Field::new("event_string", Primitive::Byte, 128),
            ],
        }
    }

    /// Single-electrode spike record.
    pub fn spike() -> Self {
        Self {
            channels: 1,
            fields: vec![
                Field::new("timestamp", Primitive::U64, 1),
                Field::new("sc_number", Primitive::U32, 1),
                Field::new("cell_number", Primitive::U32, 1),
                Field::new("features", Primitive::U32, 8),
                Field::new("waveform", Primitive::I16, 32),
            ],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn packet_size(&self) -> usize {
        self.fields.iter().map(Field::size).sum()
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Some(offset);
            }
            offset += field.size();
        }
        None
    }

    /// Value the `pkt_data_size` field must carry for this layout.
    pub fn expected_data_size(&self) -> i32 {
        (RAW_OVERHEAD_WORDS + self.channels) as i32
    }

    /// Fails if `channel` does not address a payload slot.
    pub fn check_channel(&self, channel: usize) -> Result<()> {
        ensure!(
            channel < self.channels,
            LayoutError::ChannelOutOfRange {
                channel,
                channels: self.channels
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_layout_sizes() -> Result<()> {
        let layout = PacketLayout::raw(64)?;
        assert_eq!(layout.packet_size(), (18 + 64) * 4);
        assert_eq!(layout.expected_data_size(), 74);
        assert_eq!(layout.offset_of("timestamp_high"), Some(12));
        assert_eq!(layout.offset_of("data"), Some(68));
        assert_eq!(layout.offset_of("crc"), Some(68 + 64 * 4));
        assert_eq!(layout.offset_of("nope"), None);
        Ok(())
    }

    #[test]
    fn record_layout_sizes() {
        assert_eq!(PacketLayout::continuous().packet_size(), 1044);
        assert_eq!(PacketLayout::event().packet_size(), 184);
        assert_eq!(PacketLayout::spike().packet_size(), 112);
    }

    #[test]
    fn rejects_empty_and_out_of_range() -> Result<()> {
        assert!(PacketLayout::raw(0).is_err());

        let layout = PacketLayout::raw(4)?;
        assert!(layout.check_channel(3).is_ok());
        assert!(layout.check_channel(4).is_err());
        Ok(())
    }
}
