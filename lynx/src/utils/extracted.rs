//! Read-only views of extracted scalar streams.
//!
//! Extraction writes headerless little-endian arrays; these are mapped
//! straight into memory instead of being read into a buffer.

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use anyhow::{Result, bail};
use log::debug;
use memmap2::Mmap;

use crate::utils::errors::RecordError;

/// Element type of an extracted stream.
pub trait Scalar: Copy {
    const WIDTH: usize;
    /// Which stream this type is stored in.
    const KIND: &'static str;

    fn from_le_chunk(chunk: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty => $kind:literal),* $(,)?) => {
        $(
            impl Scalar for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                const KIND: &'static str = $kind;

                #[inline]
                fn from_le_chunk(chunk: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(chunk);
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_scalar! {
    u64 => "timestamps",
    u32 => "ttl",
    i32 => "channel samples",
}

/// A memory-mapped extracted stream of `T`.
#[derive(Debug)]
pub struct ExtractedStream<T: Scalar> {
    // Empty files are not mapped.
    map: Option<Mmap>,
    _marker: PhantomData<T>,
}

impl<T: Scalar> ExtractedStream<T> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len() as usize;
        if len % T::WIDTH != 0 {
            bail!(RecordError::TrailingBytes {
                len,
                width: T::WIDTH
            });
        }

        let map = if len == 0 {
            None
        } else {
            // The file is only read; callers must not truncate it while mapped.
            Some(unsafe { Mmap::map(&file)? })
        };
        debug!(
            "Mapped {} {} from {}",
            len / T::WIDTH,
            T::KIND,
            path.as_ref().display()
        );

        Ok(Self {
            map,
            _marker: PhantomData,
        })
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bytes().len() / T::WIDTH
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        let start = index.checked_mul(T::WIDTH)?;
        self.bytes()
            .get(start..start + T::WIDTH)
            .map(T::from_le_chunk)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.bytes().chunks_exact(T::WIDTH).map(T::from_le_chunk)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_with(bytes: &[u8]) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn maps_each_scalar_width() -> Result<()> {
        let stamps = [1u64, 1 << 40, u64::MAX];
        let bytes: Vec<u8> = stamps.iter().flat_map(|v| v.to_le_bytes()).collect();
        let file = temp_with(&bytes)?;

        let ts = ExtractedStream::<u64>::open(file.path())?;
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.get(1), Some(1 << 40));
        assert_eq!(ts.get(3), None);
        assert_eq!(ts.to_vec(), stamps);

        let samples = ExtractedStream::<i32>::open(file.path())?;
        assert_eq!(samples.len(), 6);
        assert_eq!(samples.get(4), Some(-1));
        Ok(())
    }

    #[test]
    fn empty_and_ragged_files() -> Result<()> {
        let empty = temp_with(&[])?;
        let stream = ExtractedStream::<u32>::open(empty.path())?;
        assert!(stream.is_empty());
        assert_eq!(stream.iter().count(), 0);

        let ragged = temp_with(&[1, 2, 3, 4, 5])?;
        let err = ExtractedStream::<u32>::open(ragged.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RecordError>(),
            Some(RecordError::TrailingBytes { len: 5, width: 4 })
        ));
        Ok(())
    }
}
