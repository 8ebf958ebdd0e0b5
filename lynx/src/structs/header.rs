//! Capture file header
//!
//! Every capture file starts with a 16 KiB NUL-padded text block of
//! `-Key value` lines. Only a handful of keys matter for decoding; the
//! channel count of raw digitizer files is the important one.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{Result, bail, ensure};
use log::{debug, trace};

use crate::utils::errors::HeaderError;

pub const HEADER_SIZE: usize = 16 * 1024;

/// Header key holding the number of A/D channels of a raw digitizer file.
pub const CHANNEL_COUNT_KEY: &str = "NumADChannels";

#[derive(Debug, Clone, Default)]
pub struct FileHeader {
    text: String,
    entries: HashMap<String, String>,
}

impl FileHeader {
    /// Reads exactly one header block from the start of a capture file.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut block = vec![0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match reader.read(&mut block[filled..]) {
                Ok(0) => bail!(HeaderError::Truncated(filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self::from_bytes(&block))
    }

    pub fn from_bytes(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block)
            .trim_matches('\0')
            .to_string();

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut entries = HashMap::new();
        for (i, token) in tokens.iter().enumerate() {
            let Some(key) = Self::key_name(token) else {
                continue;
            };
            let value = tokens
                .get(i + 1)
                .filter(|next| Self::key_name(next).is_none())
                .copied()
                .unwrap_or_default();
            trace!("header -{key} = {value:?}");
            entries.entry(key.to_string()).or_insert(value.to_string());
        }
        debug!("Parsed {} header entries", entries.len());

        Self { text, entries }
    }

    /// Encodes `remarks` as a NUL-padded header block.
    pub fn encode(remarks: &str) -> Result<Vec<u8>> {
        ensure!(
            remarks.len() <= HEADER_SIZE,
            HeaderError::TooLong(remarks.len())
        );
        let mut block = remarks.as_bytes().to_vec();
        block.resize(HEADER_SIZE, 0);
        Ok(block)
    }

    fn key_name(token: &str) -> Option<&str> {
        let name = token.strip_prefix('-')?;
        name.starts_with(|c: char| c.is_ascii_alphabetic())
            .then_some(name)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value token following `-key`; the leading dash is optional.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.strip_prefix('-').unwrap_or(key);
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let key = key.strip_prefix('-').unwrap_or(key);
        let Some(value) = self.get(key) else {
            bail!(HeaderError::MissingKey(key.to_string()));
        };
        match value.parse() {
            Ok(v) => Ok(v),
            Err(_) => bail!(HeaderError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Number of A/D channels in a raw digitizer file.
    pub fn channel_count(&self) -> Result<usize> {
        self.get_parsed(CHANNEL_COUNT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "######## Neuralynx Data File Header\r\n\
        -FileType Raw\r\n\
        -NumADChannels 64\r\n\
        -SamplingFrequency 32000\r\n\
        -ADMaxValue 32767\r\n\
        -InputInverted\r\n\
        -Offset -5\r\n";

    #[test]
    fn parses_key_values() -> Result<()> {
        let block = FileHeader::encode(SAMPLE)?;
        assert_eq!(block.len(), HEADER_SIZE);

        let header = FileHeader::read(&mut Cursor::new(block))?;
        assert_eq!(header.channel_count()?, 64);
        assert_eq!(header.get("-FileType"), Some("Raw"));
        assert_eq!(header.get("SamplingFrequency"), Some("32000"));
        assert_eq!(header.get("InputInverted"), Some(""));
        assert_eq!(header.get_parsed::<i32>("Offset")?, -5);
        assert!(header.text().starts_with("########"));
        Ok(())
    }

    #[test]
    fn missing_channel_count() -> Result<()> {
        let header = FileHeader::from_bytes(&FileHeader::encode("-FileType Raw")?);
        assert!(header.channel_count().is_err());

        let header = FileHeader::from_bytes(&FileHeader::encode("-NumADChannels lots")?);
        assert!(header.channel_count().is_err());
        Ok(())
    }

    #[test]
    fn short_header_is_rejected() {
        let err = FileHeader::read(&mut Cursor::new(vec![b' '; 100])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::Truncated(100))
        ));
    }
}
