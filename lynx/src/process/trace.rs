//! Continuous trace reconstruction
//!
//! A continuous-record file is a sequence of 512-sample packets that may be
//! interrupted when acquisition is paused. The reconstructor estimates the
//! true sampling rate from the packet timestamps (the rate stored in the
//! records is rounded to whole hertz) and zero-pads every pause so sample
//! `n` of the trace sits at `t0 + n / rate`.

use anyhow::{Result, bail, ensure};
use log::{debug, info, warn};

use crate::structs::continuous::ContinuousRecordPacket;
use crate::structs::layout::CONTINUOUS_SAMPLES;
use crate::utils::errors::TraceError;

const MICROS_PER_SECOND: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceOptions {
    /// Fraction of the nominal packet duration an inter-packet delta may
    /// exceed before it counts as a gap.
    pub gap_tolerance: f64,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            gap_tolerance: 0.01,
        }
    }
}

/// Zero run inserted before the packet at `packet_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapFill {
    pub packet_index: usize,
    pub sample_index: usize,
    pub zeros: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousTrace {
    pub samples: Vec<i16>,
    /// Estimated from timestamps, in Hz.
    pub sample_rate: f64,
    /// Timestamp of the first packet in microseconds.
    pub t0: u64,
    pub gaps: Vec<GapFill>,
}

impl ContinuousTrace {
    pub fn padded_samples(&self) -> usize {
        self.gaps.iter().map(|g| g.zeros).sum()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraceReconstructor {
    options: TraceOptions,
}

impl TraceReconstructor {
    pub fn new(options: TraceOptions) -> Result<Self> {
        let tol = options.gap_tolerance;
        ensure!(
            tol.is_finite() && tol >= 0.0,
            TraceError::InvalidTolerance(tol)
        );
        Ok(Self { options })
    }

    /// Refuses records whose nominal rate changes mid-file; such a file
    /// cannot be packed into one trace.
    pub fn check_uniform_rate(packets: &[ContinuousRecordPacket]) -> Result<u32> {
        let Some(first) = packets.first() else {
            bail!(TraceError::Empty);
        };
        if let Some(other) = packets.iter().find(|p| p.nominal_rate != first.nominal_rate) {
            bail!(TraceError::VaryingSampleRate {
                first: first.nominal_rate,
                other: other.nominal_rate,
            });
        }
        ensure!(first.nominal_rate > 0, TraceError::ZeroSampleRate);
        Ok(first.nominal_rate)
    }

    pub fn reconstruct(&self, packets: &[ContinuousRecordPacket]) -> Result<ContinuousTrace> {
        let nominal = Self::check_uniform_rate(packets)?;
        let t0 = packets[0].timestamp;

        let runs = self.split_runs(packets, nominal);
        debug!("{} packets in {} contiguous runs", packets.len(), runs.len());

        let sample_rate = match Self::estimate_rate(packets, &runs) {
            Some(rate) => rate,
            None => {
                warn!("Too few packets to estimate the sampling rate, using nominal {nominal} Hz");
                f64::from(nominal)
            }
        };

        let mut samples = Vec::with_capacity(packets.iter().map(|p| p.valid_count()).sum());
        let mut gaps = Vec::with_capacity(runs.len().saturating_sub(1));
        for (n, run) in runs.iter().enumerate() {
            if n > 0 {
                let elapsed =
                    packets[run.start].timestamp.saturating_sub(t0) as f64 / MICROS_PER_SECOND;
                let target = (elapsed * sample_rate).round() as i64;
                let mut zeros = target - samples.len() as i64;
                if zeros < 0 {
                    warn!(
                        "Run at packet {} overlaps the previous run by {} samples, not padding",
                        run.start, -zeros
                    );
                    zeros = 0;
                }

                let zeros = zeros as usize;
                gaps.push(GapFill {
                    packet_index: run.start,
                    sample_index: samples.len(),
                    zeros,
                });
                samples.resize(samples.len() + zeros, 0);
            }

            for packet in &packets[run.clone()] {
                samples.extend_from_slice(packet.valid());
            }
        }

        info!(
            "Reconstructed {} samples at {sample_rate:.3} Hz (nominal {nominal} Hz), {} gaps",
            samples.len(),
            gaps.len()
        );

        Ok(ContinuousTrace {
            samples,
            sample_rate,
            t0,
            gaps,
        })
    }

    /// Splits packet indices into maximal runs with no delta longer than
    /// the tolerated packet duration.
    fn split_runs(
        &self,
        packets: &[ContinuousRecordPacket],
        nominal: u32,
    ) -> Vec<std::ops::Range<usize>> {
        // Short packets still occupy a full record slot on the wire.
        let packet_us = CONTINUOUS_SAMPLES as f64 / f64::from(nominal) * MICROS_PER_SECOND;
        let limit_us = packet_us * (1.0 + self.options.gap_tolerance);
        let mut runs = Vec::new();
        let mut start = 0;

        for (i, pair) in packets.windows(2).enumerate() {
            let delta_us = pair[1].timestamp.saturating_sub(pair[0].timestamp) as f64;
            if delta_us > limit_us {
                debug!("Gap of {delta_us} us after packet {i}");
                runs.push(start..i + 1);
                start = i + 1;
            }
        }
        runs.push(start..packets.len());

        runs
    }

    /// Pooled pairwise rate over intra-run packet boundaries. With a single
    /// run this is the mean of the pairwise rates.
    fn estimate_rate(
        packets: &[ContinuousRecordPacket],
        runs: &[std::ops::Range<usize>],
    ) -> Option<f64> {
        let mut rate_sum = 0.0;
        let mut samples = 0.0;
        let mut seconds = 0.0;
        let mut pairs = 0usize;

        for run in runs {
            let mut local_sum = 0.0;
            let mut local_pairs = 0usize;
            for pair in packets[run.clone()].windows(2) {
                let dt = pair[1].timestamp.saturating_sub(pair[0].timestamp) as f64
                    / MICROS_PER_SECOND;
                if dt <= 0.0 {
                    continue;
                }
                let n = pair[0].valid_count() as f64;
                local_sum += n / dt;
                local_pairs += 1;
                samples += n;
                seconds += dt;
            }
            if local_pairs > 0 {
                debug!(
                    "Run {}..{}: {:.3} Hz",
                    run.start,
                    run.end,
                    local_sum / local_pairs as f64
                );
            }
            rate_sum += local_sum;
            pairs += local_pairs;
        }

        match (runs.len(), pairs) {
            (_, 0) => None,
            (1, _) => Some(rate_sum / pairs as f64),
            _ => Some(samples / seconds),
        }
    }
}
