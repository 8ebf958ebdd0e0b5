//! Record types of the capture file family.

use std::io::Read;

use anyhow::Result;

use crate::structs::header::FileHeader;
use crate::structs::layout::PacketLayout;
use crate::utils::byteorder::ReadBytesLe;
use crate::utils::word_reader::WordSliceReader;

pub mod continuous;
pub mod event;
pub mod header;
pub mod layout;
pub mod mda;
pub mod raw_packet;
pub mod spike;

/// A fixed-size record with a channel-independent layout.
pub trait Record: ReadBytesLe {
    fn layout() -> PacketLayout;

    fn record_size() -> usize {
        Self::layout().packet_size()
    }
}

/// Decodes every complete record in `bytes`; a trailing partial record is ignored.
pub fn decode_records<T: Record>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = T::record_size();
    let count = bytes.len() / size;
    let mut reader = WordSliceReader::from_slice(&bytes[..count * size]);

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(T::read_le(&mut reader)?);
    }

    let trailing = bytes.len() - count * size;
    if trailing > 0 {
        log::warn!("Ignoring {trailing} trailing bytes after {count} records");
    }
    Ok(records)
}

/// A whole single-record-type file: header plus every record.
#[derive(Debug, Clone)]
pub struct RecordFile<T> {
    pub header: FileHeader,
    pub records: Vec<T>,
}

impl<T: Record> RecordFile<T> {
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = FileHeader::read(reader)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let records = decode_records(&bytes)?;
        log::debug!("Read {} records of {} bytes", records.len(), T::record_size());

        Ok(Self { header, records })
    }
}
