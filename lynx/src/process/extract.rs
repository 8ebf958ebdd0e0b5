use std::fmt::{Display, Formatter};
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use anyhow::Result;
use log::{debug, info, trace, warn};

use crate::log_or_err;
use crate::process::decode::PacketDecoder;
use crate::process::resync::Resynchronizer;
use crate::process::validate::{PacketValidator, RejectionKind, ValidationOutcome};
use crate::structs::layout::PacketLayout;
use crate::structs::raw_packet::RawPacket;
use crate::utils::byteorder::WriteBytesLe;
use crate::utils::errors::ValidationError;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Settings of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Packets decoded per read.
    pub batch_size: usize,
    /// Stop once at least this many packets were accepted. Checked after
    /// each batch, so a run may overshoot by up to one batch.
    pub max_packets: Option<u64>,
    /// Stop once marker + CRC + timestamp rejections exceed this count.
    pub error_budget: Option<u64>,
    /// Run the packet checks and resynchronize after rejections.
    pub validate: bool,
    /// Rejections logged at or above this level abort the run.
    pub fail_level: log::Level,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_packets: None,
            error_budget: None,
            validate: true,
            fail_level: log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    PacketCap,
    ErrorBudget,
    SinkFinished,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::PacketCap => write!(f, "packet cap reached"),
            StopReason::ErrorBudget => write!(f, "error budget exhausted"),
            StopReason::SinkFinished => write!(f, "output complete"),
        }
    }
}

/// Accumulators of a single run. Created fresh for every run.
#[derive(Debug, Clone, Default)]
pub struct ExtractionState {
    pub watermark: u64,
    pub last_timestamp: Option<u64>,
    pub accepted: u64,
    pub decoded: u64,
    pub batches: u64,
    pub garbage_bytes: u64,
    rejections: [u64; RejectionKind::COUNT],
}

impl ExtractionState {
    pub fn record(&mut self, kind: RejectionKind) {
        self.rejections[kind.index()] += 1;
    }

    pub fn rejections(&self, kind: RejectionKind) -> u64 {
        self.rejections[kind.index()]
    }

    /// Sum of the counters that gate termination.
    pub fn budget_errors(&self) -> u64 {
        RejectionKind::ALL
            .into_iter()
            .filter(|k| k.counts_against_budget())
            .map(|k| self.rejections(k))
            .sum()
    }

    fn into_report(self, stop: StopReason) -> ExtractionReport {
        ExtractionReport {
            accepted_packets: self.accepted,
            decoded_packets: self.decoded,
            batches: self.batches,
            garbage_bytes: self.garbage_bytes,
            last_timestamp: self.last_timestamp,
            rejections: self.rejections,
            stop,
        }
    }
}

/// Final figures of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub accepted_packets: u64,
    pub decoded_packets: u64,
    pub batches: u64,
    pub garbage_bytes: u64,
    pub last_timestamp: Option<u64>,
    pub stop: StopReason,
    rejections: [u64; RejectionKind::COUNT],
}

impl ExtractionReport {
    pub fn rejections(&self, kind: RejectionKind) -> u64 {
        self.rejections[kind.index()]
    }

    pub fn total_rejections(&self) -> u64 {
        self.rejections.iter().sum()
    }

    pub fn log_summary(&self) {
        info!(
            "Extracted {} packets ({} decoded, {} batches), stopped on {}",
            self.accepted_packets, self.decoded_packets, self.batches, self.stop
        );
        info!("{} garbage bytes", self.garbage_bytes);
        for kind in RejectionKind::ALL {
            info!("{} batches had a packet with {kind}", self.rejections(kind));
        }
    }
}

/// Destination of accepted packets.
pub trait PacketSink {
    /// Consumes packets in stream order. Returns `Ok(false)` once no more
    /// input is needed.
    fn write_packets(&mut self, packets: &[RawPacket]) -> Result<bool>;
}

impl<S: PacketSink + ?Sized> PacketSink for &mut S {
    fn write_packets(&mut self, packets: &[RawPacket]) -> Result<bool> {
        (**self).write_packets(packets)
    }
}

/// Demultiplexes packets into headerless little-endian streams: `u64`
/// timestamps, `u32` TTL words and one `i32` stream per selected channel.
pub struct ScalarStreams<W: Write> {
    timestamps: W,
    ttl: W,
    channels: Vec<(usize, W)>,
    scratch: Vec<u8>,
}

impl<W: Write> ScalarStreams<W> {
    pub fn new(
        layout: &PacketLayout,
        timestamps: W,
        ttl: W,
        channels: Vec<(usize, W)>,
    ) -> Result<Self> {
        for (channel, _) in &channels {
            layout.check_channel(*channel)?;
        }

        Ok(Self {
            timestamps,
            ttl,
            channels,
            scratch: Vec::new(),
        })
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.timestamps.flush()?;
        self.ttl.flush()?;
        for (_, writer) in &mut self.channels {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn into_parts(self) -> (W, W, Vec<(usize, W)>) {
        (self.timestamps, self.ttl, self.channels)
    }

    fn write_column<T: WriteBytesLe>(
        scratch: &mut Vec<u8>,
        writer: &mut W,
        values: impl Iterator<Item = T>,
    ) -> io::Result<()> {
        scratch.clear();
        values.for_each(|v| v.write_le(scratch));
        writer.write_all(scratch)
    }
}

impl<W: Write> PacketSink for ScalarStreams<W> {
    fn write_packets(&mut self, packets: &[RawPacket]) -> Result<bool> {
        let scratch = &mut self.scratch;
        Self::write_column(
            scratch,
            &mut self.timestamps,
            packets.iter().map(RawPacket::timestamp),
        )?;
        Self::write_column(scratch, &mut self.ttl, packets.iter().map(|p| p.ttl))?;
        for (channel, writer) in &mut self.channels {
            let channel = *channel;
            Self::write_column(scratch, writer, packets.iter().map(|p| p.data[channel]))?;
        }

        Ok(true)
    }
}

/// Buffered resync → decode → validate → write loop over one input.
///
/// # Example
///
/// ```rust,no_run
/// use std::io::Cursor;
/// use lynx::process::extract::{ExtractionConfig, ExtractionPipeline, ScalarStreams};
/// use lynx::structs::layout::PacketLayout;
///
/// let layout = PacketLayout::raw(64)?;
/// let config = ExtractionConfig::default();
/// let mut sink = ScalarStreams::new(&layout, Vec::new(), Vec::new(), vec![(0, Vec::new())])?;
///
/// let mut input = Cursor::new(std::fs::read("packets.bin")?);
/// let report = ExtractionPipeline::new(&layout, &config).run(&mut input, &mut sink)?;
/// println!("{} packets", report.accepted_packets);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct ExtractionPipeline<'a> {
    layout: &'a PacketLayout,
    config: &'a ExtractionConfig,
    resync: Resynchronizer,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(layout: &'a PacketLayout, config: &'a ExtractionConfig) -> Self {
        Self {
            layout,
            config,
            resync: Resynchronizer,
        }
    }

    /// Packets requested per read; never more than the cap when the cap is smaller.
    pub fn batch_size(&self) -> usize {
        let batch = match self.config.max_packets {
            Some(max) if max < self.config.batch_size as u64 => max as usize,
            _ => self.config.batch_size,
        };
        batch.max(1)
    }

    /// Runs until end of stream, the packet cap, the error budget or the
    /// sink stops it. `reader` must be positioned after the file header.
    pub fn run<R, S>(&self, reader: &mut R, sink: &mut S) -> Result<ExtractionReport>
    where
        R: BufRead + Seek,
        S: PacketSink + ?Sized,
    {
        let packet_size = self.layout.packet_size();
        let decoder = PacketDecoder::new(self.layout);
        let validator = PacketValidator::new(self.layout);
        let mut state = ExtractionState::default();
        let mut buffer = vec![0u8; self.batch_size() * packet_size];

        if self.config.validate {
            info!("Extracting with packet checks enabled");
        } else {
            info!("Extracting without packet checks");
        }

        state.garbage_bytes += self.resync.resync(reader)?;

        let stop = loop {
            let batch_start = reader.stream_position()?;
            let filled = fill_buffer(reader, &mut buffer)?;
            let mut batch = decoder.decode(&buffer[..filled])?;
            if batch.is_empty() {
                break StopReason::EndOfStream;
            }

            state.batches += 1;
            state.decoded += batch.len() as u64;
            trace!("Batch {} at byte {batch_start}: {} packets", state.batches, batch.len());

            let outcome = if self.config.validate {
                validator.validate(batch.packets(), state.watermark)
            } else {
                ValidationOutcome::valid(batch.len())
            };

            if let Some(kind) = outcome.rejection {
                let timestamp = batch.packets()[outcome.accepted].timestamp();
                state.record(kind);
                log_or_err!(
                    self.config,
                    log::Level::Warn,
                    ValidationError::Rejected {
                        kind,
                        batch: state.batches,
                        index: outcome.accepted,
                        timestamp,
                    }
                );
                batch.truncate(outcome.accepted);
            }

            let keep_reading = match batch.last_timestamp() {
                Some(last) => {
                    if self.config.validate {
                        state.watermark = last;
                    }
                    state.last_timestamp = Some(last);
                    state.accepted += batch.len() as u64;
                    sink.write_packets(batch.packets())?
                }
                None => true,
            };

            if !keep_reading {
                break StopReason::SinkFinished;
            }

            if let Some(max) = self.config.max_packets {
                if state.accepted >= max {
                    break StopReason::PacketCap;
                }
            }

            if outcome.rejection.is_some() {
                // Skip the rejected packet's own marker word.
                let restart = batch_start + (outcome.accepted * packet_size) as u64 + 4;
                reader.seek(SeekFrom::Start(restart))?;
                let skipped = self.resync.resync(reader)?;
                debug!("Resync after rejection skipped {skipped} bytes");
                state.garbage_bytes += skipped;
            }

            if let Some(budget) = self.config.error_budget {
                let errors = state.budget_errors();
                if errors > budget {
                    warn!("{}", ValidationError::BudgetExhausted { errors, budget });
                    break StopReason::ErrorBudget;
                }
            }
        };

        let report = state.into_report(stop);
        report.log_summary();
        Ok(report)
    }
}

fn fill_buffer<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn packet(layout: &PacketLayout, ts: u64) -> Result<RawPacket> {
        let data = (0..layout.channels() as i32).map(|c| c * 1000 + ts as i32).collect();
        RawPacket::new(layout, ts, (ts % 7) as u32, data)
    }

    fn stream(layout: &PacketLayout, stamps: impl IntoIterator<Item = u64>) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for ts in stamps {
            bytes.extend(packet(layout, ts)?.to_le_bytes());
        }
        Ok(bytes)
    }

    fn sink(layout: &PacketLayout, channels: &[usize]) -> Result<ScalarStreams<Vec<u8>>> {
        ScalarStreams::new(
            layout,
            Vec::new(),
            Vec::new(),
            channels.iter().map(|&c| (c, Vec::new())).collect(),
        )
    }

    fn u64s(bytes: &[u8]) -> Vec<u64> {
        bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect()
    }

    fn i32s(bytes: &[u8]) -> Vec<i32> {
        bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn clean_run_round_trip() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let stamps: Vec<u64> = (0..25).map(|i| 1_000 + i * 512).collect();
        let mut input = Cursor::new(stream(&layout, stamps.iter().copied())?);
        let config = ExtractionConfig {
            batch_size: 6,
            ..Default::default()
        };
        let mut out = sink(&layout, &[3, 1])?;

        let report = ExtractionPipeline::new(&layout, &config).run(&mut input, &mut out)?;
        assert_eq!(report.accepted_packets, 25);
        assert_eq!(report.batches, 5);
        assert_eq!(report.stop, StopReason::EndOfStream);
        assert_eq!(report.total_rejections(), 0);
        assert_eq!(report.last_timestamp, stamps.last().copied());

        let (ts, ttl, chans) = out.into_parts();
        assert_eq!(u64s(&ts), stamps);
        let ttl: Vec<u32> = ttl
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(ttl, stamps.iter().map(|t| (t % 7) as u32).collect::<Vec<_>>());
        assert_eq!(chans[0].0, 3);
        assert_eq!(
            i32s(&chans[0].1),
            stamps.iter().map(|&t| 3000 + t as i32).collect::<Vec<_>>()
        );
        assert_eq!(
            i32s(&chans[1].1),
            stamps.iter().map(|&t| 1000 + t as i32).collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn cap_overshoots_by_whole_batches() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        for validate in [true, false] {
            let mut input = Cursor::new(stream(&layout, 0..20)?);
            let config = ExtractionConfig {
                batch_size: 7,
                max_packets: Some(10),
                validate,
                ..Default::default()
            };
            let mut out = sink(&layout, &[0])?;

            let report = ExtractionPipeline::new(&layout, &config).run(&mut input, &mut out)?;
            assert_eq!(report.accepted_packets, 14);
            assert_eq!(report.stop, StopReason::PacketCap);
            assert_eq!(u64s(&out.into_parts().0), (0..14).collect::<Vec<_>>());
        }
        Ok(())
    }

    #[test]
    fn batch_clamped_to_small_cap() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let config = ExtractionConfig {
            batch_size: 10_000,
            max_packets: Some(3),
            ..Default::default()
        };
        let pipeline = ExtractionPipeline::new(&layout, &config);
        assert_eq!(pipeline.batch_size(), 3);

        let mut input = Cursor::new(stream(&layout, 0..20)?);
        let report = pipeline.run(&mut input, &mut sink(&layout, &[])?)?;
        assert_eq!(report.accepted_packets, 3);
        Ok(())
    }

    #[test]
    fn recovers_from_garbage_and_corruption() -> Result<()> {
        let layout = PacketLayout::raw(3)?;
        let mut bytes = vec![0xEE; 5];
        bytes.extend(stream(&layout, 0..4)?);
        bytes.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        bytes.extend(stream(&layout, 4..6)?);

        let mut corrupt = packet(&layout, 6)?;
        corrupt.data[2] ^= 0x40;
        bytes.extend(corrupt.to_le_bytes());

        bytes.extend(stream(&layout, [7, 8, 3, 9, 10])?);

        let config = ExtractionConfig {
            batch_size: 4,
            ..Default::default()
        };
        let mut input = Cursor::new(bytes);
        let mut out = sink(&layout, &[2])?;
        let report = ExtractionPipeline::new(&layout, &config).run(&mut input, &mut out)?;

        assert_eq!(
            u64s(&out.into_parts().0),
            [0, 1, 2, 3, 4, 5, 7, 8, 9, 10]
        );
        assert_eq!(report.rejections(RejectionKind::CrcMismatch), 1);
        assert_eq!(report.rejections(RejectionKind::TimestampOutOfOrder), 1);
        assert!(report.rejections(RejectionKind::StartMarkerMismatch) >= 1);
        assert!(report.garbage_bytes >= 5 + 2);
        assert_eq!(report.stop, StopReason::EndOfStream);
        Ok(())
    }

    #[test]
    fn error_budget_stops_run() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let mut bytes = Vec::new();
        for ts in 0..10u64 {
            let mut p = packet(&layout, ts)?;
            if ts % 2 == 1 {
                p.crc ^= 1;
            }
            bytes.extend(p.to_le_bytes());
        }

        let config = ExtractionConfig {
            batch_size: 100,
            error_budget: Some(2),
            ..Default::default()
        };
        let mut input = Cursor::new(bytes);
        let report =
            ExtractionPipeline::new(&layout, &config).run(&mut input, &mut sink(&layout, &[])?)?;

        assert_eq!(report.stop, StopReason::ErrorBudget);
        assert_eq!(report.rejections(RejectionKind::CrcMismatch), 3);
        assert_eq!(report.accepted_packets, 3);
        Ok(())
    }

    #[test]
    fn id_and_size_errors_do_not_spend_budget() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let mut bytes = Vec::new();
        for ts in 0..6u64 {
            let mut p = packet(&layout, ts)?;
            if ts % 2 == 1 {
                p.pkt_id = 9;
                p.seal();
            }
            bytes.extend(p.to_le_bytes());
        }

        let config = ExtractionConfig {
            error_budget: Some(0),
            ..Default::default()
        };
        let mut input = Cursor::new(bytes);
        let report =
            ExtractionPipeline::new(&layout, &config).run(&mut input, &mut sink(&layout, &[])?)?;

        assert_eq!(report.stop, StopReason::EndOfStream);
        assert_eq!(report.rejections(RejectionKind::PacketIdMismatch), 3);
        assert_eq!(report.accepted_packets, 3);
        Ok(())
    }

    #[test]
    fn strict_mode_fails_on_first_rejection() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let mut bytes = stream(&layout, [5, 4])?;
        bytes.extend(stream(&layout, [6])?);

        let config = ExtractionConfig {
            fail_level: log::Level::Warn,
            ..Default::default()
        };
        let mut input = Cursor::new(bytes);
        let err = ExtractionPipeline::new(&layout, &config)
            .run(&mut input, &mut sink(&layout, &[])?)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::Rejected {
                kind: RejectionKind::TimestampOutOfOrder,
                index: 1,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn unchecked_run_keeps_everything() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let mut bytes = stream(&layout, [3, 2, 1])?;
        bytes[40] ^= 0xFF;

        let config = ExtractionConfig {
            validate: false,
            ..Default::default()
        };
        let mut input = Cursor::new(bytes);
        let mut out = sink(&layout, &[1])?;
        let report = ExtractionPipeline::new(&layout, &config).run(&mut input, &mut out)?;

        assert_eq!(report.accepted_packets, 3);
        assert_eq!(report.total_rejections(), 0);
        assert_eq!(u64s(&out.into_parts().0), [3, 2, 1]);
        Ok(())
    }

    #[test]
    fn out_of_range_channel_is_refused() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        assert!(sink(&layout, &[2]).is_err());
        Ok(())
    }
}
