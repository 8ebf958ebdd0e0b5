//! Little-endian field reader for fixed-layout capture records.
//!
//! Wraps a `bitstream_io` reader so record decoders can pull whole
//! 16/32/64-bit words without tracking offsets by hand.

use std::io;

use bitstream_io::{BitRead, BitReader, LittleEndian, SignedInteger, UnsignedInteger};

#[derive(Debug)]
pub struct WordReader<R: io::Read> {
    bs: BitReader<R, LittleEndian>,
    len: u64,
    consumed: u64,
}

pub type WordSliceReader<'a> = WordReader<io::Cursor<&'a [u8]>>;

impl<R> WordReader<R>
where
    R: io::Read,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes,
            consumed: 0,
        }
    }

    #[inline(always)]
    pub fn get_u<U: UnsignedInteger>(&mut self, bits: u32) -> io::Result<U> {
        match self.bs.read_unsigned_var(bits) {
            Ok(val) => {
                self.consumed += u64::from(bits >> 3);
                Ok(val)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.out_of_bounds(bits)),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, bits: u32) -> io::Result<S> {
        match self.bs.read_signed_var(bits) {
            Ok(val) => {
                self.consumed += u64::from(bits >> 3);
                Ok(val)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.out_of_bounds(bits)),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let bits = (buf.len() as u32) << 3;
        match self.bs.read_bytes(buf) {
            Ok(()) => {
                self.consumed += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.out_of_bounds(bits)),
            Err(e) => Err(e),
        }
    }

    /// Bytes left before the declared end of the underlying buffer.
    #[inline(always)]
    pub fn available(&self) -> u64 {
        self.len.saturating_sub(self.consumed)
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.consumed
    }

    fn out_of_bounds(&self, bits: u32) -> io::Error {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "read of {} bytes out of bounds at byte {}",
                bits >> 3,
                self.consumed
            ),
        )
    }
}

impl<'a> WordSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for WordSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[test]
fn reads_little_endian_words() -> io::Result<()> {
    let bytes = [
        0x00, 0x08, 0x00, 0x00, // 2048
        0xFF, 0xFF, 0xFF, 0xFF, // -1
        0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, // 0x0000_0002_0000_0001
        0x34, 0x12,
    ];
    let mut reader = WordSliceReader::from_slice(&bytes);

    assert_eq!(reader.get_s::<i32>(32)?, 2048);
    assert_eq!(reader.get_s::<i32>(32)?, -1);
    assert_eq!(reader.get_u::<u64>(64)?, 0x0000_0002_0000_0001);
    assert_eq!(reader.available(), 2);
    assert_eq!(reader.get_u::<u16>(16)?, 0x1234);
    assert_eq!(reader.available(), 0);

    let err = reader.get_u::<u32>(32).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    Ok(())
}
