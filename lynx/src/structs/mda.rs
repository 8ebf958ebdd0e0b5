//! MDA multi-channel container
//!
//! ```text
//! Offset  Size  Field
//! 0x00    4     data type code (-5 = int32)
//! 0x04    4     bytes per entry (4)
//! 0x08    4     number of dimensions (2)
//! 0x0C    4     dimension 0: channel count
//! 0x10    4     dimension 1: packet count (rewritten on finish)
//! 0x14    ...   i32 samples, channel index varying fastest
//! ```

use std::io::{self, Seek, SeekFrom, Write};

use anyhow::{Result, bail};
use lynx_macros::{FromBytes, ToBytes};

use crate::utils::byteorder::{ReadBytesLe, WriteBytesLe};
use crate::utils::errors::RecordError;
use crate::utils::word_reader::WordSliceReader;

pub const MDA_INT32: i32 = -5;
pub const MDA_HEADER_SIZE: usize = 20;

/// Byte offset of the packet count in the header.
pub const MDA_COUNT_OFFSET: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToBytes, FromBytes)]
pub struct MdaHeader {
    pub data_type: i32,
    pub bytes_per_entry: i32,
    pub dimensions: i32,
    pub channels: i32,
    pub packets: i32,
}

impl MdaHeader {
    pub fn new(channels: usize) -> Self {
        Self {
            data_type: MDA_INT32,
            bytes_per_entry: 4,
            dimensions: 2,
            channels: channels as i32,
            packets: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        Self::read_le(&mut WordSliceReader::from_slice(bytes))
    }
}

/// Streams packet-major int32 samples into an MDA container.
pub struct MdaWriter<W: Write + Seek> {
    writer: W,
    start: u64,
    channels: usize,
    packets: u64,
    scratch: Vec<u8>,
}

impl<W: Write + Seek> MdaWriter<W> {
    /// Writes the header with a zero packet count.
    pub fn new(mut writer: W, channels: usize) -> io::Result<Self> {
        let start = writer.stream_position()?;
        let mut header = Vec::with_capacity(MDA_HEADER_SIZE);
        MdaHeader::new(channels).write_le(&mut header);
        writer.write_all(&header)?;

        Ok(Self {
            writer,
            start,
            channels,
            packets: 0,
            scratch: Vec::new(),
        })
    }

    /// Appends one packet's worth of samples; `samples` must yield one
    /// value per container channel.
    pub fn write_packet<I: IntoIterator<Item = i32>>(&mut self, samples: I) -> io::Result<()> {
        self.scratch.clear();
        let mut written = 0;
        for sample in samples {
            sample.write_le(&mut self.scratch);
            written += 1;
        }
        if written != self.channels {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "packet has {written} samples, container has {} channels",
                    self.channels
                ),
            ));
        }

        self.writer.write_all(&self.scratch)?;
        self.packets += 1;
        Ok(())
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Rewrites the packet count and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let Ok(count) = i32::try_from(self.packets) else {
            bail!(RecordError::CountOverflow(self.packets));
        };

        self.writer.flush()?;
        let end = self.writer.stream_position()?;

        self.writer
            .seek(SeekFrom::Start(self.start + MDA_COUNT_OFFSET))?;
        self.writer.write_all(&count.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn count_is_rewritten_on_finish() -> Result<()> {
        let mut writer = MdaWriter::new(Cursor::new(Vec::new()), 3)?;
        writer.write_packet([1, 2, 3])?;
        writer.write_packet([4, 5, 6])?;
        assert_eq!(writer.packets(), 2);

        let buffer = writer.finish()?.into_inner();
        assert_eq!(buffer.len(), MDA_HEADER_SIZE + 6 * 4);

        let header = MdaHeader::from_bytes(&buffer)?;
        assert_eq!(
            header,
            MdaHeader {
                data_type: -5,
                bytes_per_entry: 4,
                dimensions: 2,
                channels: 3,
                packets: 2,
            }
        );
        assert_eq!(&buffer[20..24], &1i32.to_le_bytes());
        assert_eq!(&buffer[40..44], &6i32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn wrong_sample_count_is_refused() -> io::Result<()> {
        let mut writer = MdaWriter::new(Cursor::new(Vec::new()), 2)?;
        let err = writer.write_packet([1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(writer.packets(), 0);
        Ok(())
    }

    #[test]
    fn header_survives_file_round_trip() -> Result<()> {
        let file = tempfile::tempfile()?;
        let mut writer = MdaWriter::new(io::BufWriter::new(file), 1)?;
        for v in 0..10 {
            writer.write_packet([v])?;
        }
        let mut file = writer.finish()?.into_inner().map_err(|e| e.into_error())?;

        use std::io::Read;
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        assert_eq!(MdaHeader::from_bytes(&bytes)?.packets, 10);
        assert_eq!(bytes.len(), MDA_HEADER_SIZE + 40);
        Ok(())
    }
}
