//! Little-endian encode/decode traits for capture records.
//!
//! Records derive [`ToBytes`](lynx_macros::ToBytes) and
//! [`FromBytes`](lynx_macros::FromBytes) to get field-by-field
//! implementations of these traits.

use std::io;

use crate::utils::word_reader::WordReader;

pub trait WriteBytesLe {
    fn write_le(&self, dst: &mut Vec<u8>);
}

pub trait ReadBytesLe: Sized {
    fn read_le<R: io::Read>(reader: &mut WordReader<R>) -> io::Result<Self>;
}

macro_rules! impl_num_le {
    ($($t:ty),+) => { $(
        impl WriteBytesLe for $t { #[inline] fn write_le(&self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self.to_le_bytes()); }}
    )+ }
}

impl_num_le!(u8, i8, u16, i16, u32, i32, u64, i64);

macro_rules! impl_read_le {
    ($get:ident: $($t:ty),+) => { $(
        impl ReadBytesLe for $t {
            #[inline]
            fn read_le<R: io::Read>(reader: &mut WordReader<R>) -> io::Result<Self> {
                reader.$get::<$t>(<$t>::BITS)
            }
        }
    )+ }
}

impl_read_le!(get_u: u8, u16, u32, u64);
impl_read_le!(get_s: i8, i16, i32, i64);

impl<T: WriteBytesLe> WriteBytesLe for Vec<T> {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}

impl<T: WriteBytesLe, const N: usize> WriteBytesLe for [T; N] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}

impl<T: ReadBytesLe + Copy + Default, const N: usize> ReadBytesLe for [T; N] {
    #[inline]
    fn read_le<R: io::Read>(reader: &mut WordReader<R>) -> io::Result<Self> {
        let mut out = [T::default(); N];
        for item in out.iter_mut() {
            *item = T::read_le(reader)?;
        }
        Ok(out)
    }
}

#[macro_export]
macro_rules! join_bytes_le {
    ( $($value:expr),+ $(,)? ) => {{
        let mut vec = Vec::<u8>::new();
        $( $crate::utils::byteorder::WriteBytesLe::write_le(&$value, &mut vec); )+
        vec
    }};
}

#[allow(unused_imports)]
pub use join_bytes_le;

#[cfg(test)]
mod tests {
    use crate::utils::byteorder::{ReadBytesLe, WriteBytesLe};
    use crate::utils::word_reader::WordSliceReader;
    use lynx_macros::{FromBytes, ToBytes};

    #[derive(Debug, PartialEq, ToBytes, FromBytes)]
    struct Mini {
        a: u16,
        b: i32,
        tag: [u8; 4],
    }

    #[test]
    fn to_bytes_roundtrip() -> std::io::Result<()> {
        let s = Mini {
            a: 0x1234,
            b: -2,
            tag: *b"NRD!",
        };

        let mut vec_le = Vec::new();
        s.write_le(&mut vec_le);

        let expected_le = [0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF, b'N', b'R', b'D', b'!'];
        assert_eq!(&vec_le[..], &expected_le);

        let back = Mini::read_le(&mut WordSliceReader::from_slice(&vec_le))?;
        assert_eq!(back, s);
        Ok(())
    }

    #[test]
    fn join_bytes_concatenates_fields() {
        let bytes = join_bytes_le!(-5i32, 4i32, [1u16, 2u16]);
        assert_eq!(bytes, [0xFB, 0xFF, 0xFF, 0xFF, 4, 0, 0, 0, 1, 0, 2, 0]);
    }
}
