use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use lynx::process::extract::{ExtractionConfig, ExtractionReport};
use lynx::process::trace::ContinuousTrace;
use lynx::process::validate::RejectionKind;
use serde::Serialize;

use crate::cli::Capture;

#[derive(Debug, Serialize)]
pub struct OutputSummary {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets: Option<u64>,
}

impl OutputSummary {
    pub fn new(path: &Path, packets: Option<u64>) -> Self {
        Self {
            path: path.display().to_string(),
            packets,
        }
    }
}

/// YAML summary of one pass over a raw capture.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub tool: String,
    pub command: &'static str,
    pub input: String,
    pub channels: usize,
    pub packet_size: usize,
    pub validated: bool,
    pub batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_packets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_budget: Option<u64>,
    pub accepted_packets: u64,
    pub decoded_packets: u64,
    pub batches: u64,
    pub garbage_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<u64>,
    pub stop: String,
    pub rejections: BTreeMap<String, u64>,
    pub outputs: Vec<OutputSummary>,
}

impl RunSummary {
    pub fn new(
        command: &'static str,
        capture: &Capture,
        config: &ExtractionConfig,
        report: &ExtractionReport,
        outputs: Vec<OutputSummary>,
    ) -> Self {
        let rejections = RejectionKind::ALL
            .into_iter()
            .map(|kind| (kind.label().replace(' ', "_"), report.rejections(kind)))
            .collect();

        Self {
            tool: tool_version(),
            command,
            input: capture.path.display().to_string(),
            channels: capture.layout.channels(),
            packet_size: capture.layout.packet_size(),
            validated: config.validate,
            batch_size: config.batch_size,
            max_packets: config.max_packets,
            error_budget: config.error_budget,
            accepted_packets: report.accepted_packets,
            decoded_packets: report.decoded_packets,
            batches: report.batches,
            garbage_bytes: report.garbage_bytes,
            last_timestamp: report.last_timestamp,
            stop: report.stop.to_string(),
            rejections,
            outputs,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_yaml(path, self)
    }
}

/// YAML summary of a reconstructed trace.
#[derive(Debug, Serialize)]
pub struct TraceSummary {
    pub tool: String,
    pub input: String,
    pub output: String,
    pub records: usize,
    pub samples: usize,
    pub sample_rate: f64,
    pub nominal_rate: u32,
    pub t0: u64,
    pub padded_samples: usize,
    pub gaps: Vec<GapSummary>,
}

#[derive(Debug, Serialize)]
pub struct GapSummary {
    pub packet: usize,
    pub sample: usize,
    pub zeros: usize,
}

impl TraceSummary {
    pub fn new(
        input: &Path,
        output: &Path,
        records: usize,
        nominal_rate: u32,
        trace: &ContinuousTrace,
    ) -> Self {
        Self {
            tool: tool_version(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            records,
            samples: trace.samples.len(),
            sample_rate: trace.sample_rate,
            nominal_rate,
            t0: trace.t0,
            padded_samples: trace.padded_samples(),
            gaps: trace
                .gaps
                .iter()
                .map(|g| GapSummary {
                    packet: g.packet_index,
                    sample: g.sample_index,
                    zeros: g.zeros,
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_yaml(path, self)
    }
}

fn tool_version() -> String {
    format!(
        "{} {} (lynx {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("LYNX_VERSION")
    )
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Cannot create report {}", path.display()))?;
    serde_yaml_ng::to_writer(BufWriter::new(file), value)?;
    log::info!("Wrote report {}", path.display());
    Ok(())
}
