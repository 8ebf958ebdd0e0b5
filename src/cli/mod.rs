use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::Level;
use lynx::process::extract::ExtractionConfig;
use lynx::structs::header::{FileHeader, HEADER_SIZE};
use lynx::structs::layout::PacketLayout;

use command::{Cli, PipelineArgs};

pub mod command;
pub mod epochs;
pub mod events;
pub mod extract;
pub mod info;
pub mod mda;
pub mod progress;
pub mod trace;

const READ_BUFFER_SIZE: usize = 1 << 20;

pub fn fail_level(cli: &Cli) -> Level {
    if cli.strict { Level::Warn } else { Level::Error }
}

impl PipelineArgs {
    pub fn config(&self, cli: &Cli) -> ExtractionConfig {
        ExtractionConfig {
            batch_size: self.batch_size,
            max_packets: self.max_packets,
            error_budget: self.error_budget,
            validate: !self.no_validate,
            fail_level: fail_level(cli),
        }
    }
}

/// A raw capture opened past its header.
pub struct Capture {
    pub path: PathBuf,
    pub header: FileHeader,
    pub layout: PacketLayout,
    pub reader: BufReader<File>,
    pub file_len: u64,
}

impl Capture {
    /// Reads the header and builds the packet layout from its channel
    /// count, or from `channels` when given.
    pub fn open(path: &Path, channels: Option<usize>) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let header = FileHeader::read(&mut reader)?;
        log::debug!("File header:\n{}", header.text());

        let channels = match (header.channel_count(), channels) {
            (Ok(found), Some(given)) if found != given => {
                log::warn!("Header declares {found} channels, using {given} as requested");
                given
            }
            (Ok(found), _) => found,
            (Err(_), Some(given)) => given,
            (Err(e), None) => {
                return Err(e.context(format!(
                    "{}: no channel count, pass --channels to set one",
                    path.display()
                )));
            }
        };

        let layout = PacketLayout::raw(channels)?;
        log::info!(
            "{}: {channels} channels, {} byte packets",
            path.display(),
            layout.packet_size()
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            layout,
            reader,
            file_len,
        })
    }

    /// Packets the file would hold if it had no garbage.
    pub fn estimated_packets(&self) -> u64 {
        self.file_len.saturating_sub(HEADER_SIZE as u64) / self.layout.packet_size() as u64
    }
}
