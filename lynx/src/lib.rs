//! Decoding and extraction of multi-channel neural acquisition captures.
//!
//! ## Technical Overview
//!
//! A capture file starts with a 16 KiB text header followed by fixed-size
//! little-endian records. Four record families are handled:
//!
//! - **Raw digitizer packets**: one sample per A/D channel plus timestamp,
//!   TTL state and an XOR checksum. Streams may contain garbage bytes,
//!   corrupt packets and out-of-order timestamps.
//! - **Continuous records**: 512 samples of one channel per record.
//! - **Event records**: TTL transitions with an event string.
//! - **Spike records**: timestamped spike waveforms.
//!
//! ### Raw Stream Recovery
//!
//! Raw streams are read in batches. Each batch is decoded, checked packet
//! by packet (start marker, packet id, size field, checksum, timestamp
//! order), cut at the first failing packet and realigned on the next start
//! marker. Runs end at end of stream, at a packet cap or once an error
//! budget is spent; both limits are checked per batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use lynx::process::extract::{ExtractionConfig, ExtractionPipeline, ScalarStreams};
//! use lynx::structs::header::FileHeader;
//! use lynx::structs::layout::PacketLayout;
//!
//! let mut input = BufReader::new(File::open("DigitalLynxRawDataFile.nrd")?);
//! let header = FileHeader::read(&mut input)?;
//! let layout = PacketLayout::raw(header.channel_count()?)?;
//!
//! let mut sink = ScalarStreams::new(
//!     &layout,
//!     File::create("timestamps.raw")?,
//!     File::create("ttl.raw")?,
//!     vec![(0, File::create("chan_000.raw")?)],
//! )?;
//!
//! let config = ExtractionConfig::default();
//! let report = ExtractionPipeline::new(&layout, &config).run(&mut input, &mut sink)?;
//! println!("{} packets, {} rejections", report.accepted_packets, report.total_rejections());
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing of raw digitizer and continuous streams.
///
/// 1. **Decoding** ([`process::decode`]): Packets from aligned bytes.
///
/// 2. **Resynchronization** ([`process::resync`]): Start marker search.
///
/// 3. **Validation** ([`process::validate`]): Per-packet checks.
///
/// 4. **Extraction** ([`process::extract`]): The batch loop and its sinks.
///
/// 5. **Epochs** ([`process::epoch`]) and **Traces** ([`process::trace`]).
pub mod process;

/// Record layouts and file formats.
///
/// - **Layouts** ([`structs::layout`]): Field tables and packet sizes
/// - **Header** ([`structs::header`]): 16 KiB text header
/// - **Raw packets** ([`structs::raw_packet`]): Digitizer packets and batches
/// - **Continuous** ([`structs::continuous`]), **Events** ([`structs::event`]),
///   **Spikes** ([`structs::spike`]): Single-record-type files
/// - **MDA** ([`structs::mda`]): Multi-channel output container
pub mod structs;

/// Utility functions and supporting infrastructure.
pub mod utils;
