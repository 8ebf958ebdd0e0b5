//! Single-electrode spike records

use std::io::Write;

use anyhow::Result;
use lynx_macros::{FromBytes, ToBytes};

use crate::structs::Record;
use crate::structs::header::FileHeader;
use crate::structs::layout::PacketLayout;
use crate::utils::byteorder::WriteBytesLe;

#[derive(Debug, Clone, PartialEq, Eq, ToBytes, FromBytes)]
pub struct SpikeRecord {
    pub timestamp: u64,
    pub sc_number: u32,
    pub cell_number: u32,
    pub features: [u32; 8],
    pub waveform: [i16; 32],
}

impl SpikeRecord {
    /// A timestamp-only spike on acquisition entity 1, cell 1.
    pub fn from_timestamp(timestamp: u64) -> Self {
        Self {
            timestamp,
            sc_number: 1,
            cell_number: 1,
            features: [0; 8],
            waveform: [0; 32],
        }
    }
}

impl Record for SpikeRecord {
    fn layout() -> PacketLayout {
        PacketLayout::spike()
    }
}

/// Writes a spike file holding only spike times.
///
/// The header block is `remarks` padded with NULs; every record is
/// attributed to entity 1, cell 1 with zeroed features and waveform.
pub fn write_spike_file<W: Write>(writer: &mut W, timestamps: &[u64], remarks: &str) -> Result<()> {
    writer.write_all(&FileHeader::encode(remarks)?)?;

    let layout = PacketLayout::spike();
    let mut buf = Vec::with_capacity(timestamps.len() * layout.packet_size());
    for &ts in timestamps {
        SpikeRecord::from_timestamp(ts).write_le(&mut buf);
    }
    writer.write_all(&buf)?;
    writer.flush()?;

    Ok(())
}
