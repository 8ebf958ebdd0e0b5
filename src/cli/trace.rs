use std::fs::File;
use std::io::{BufReader, Write};

use anyhow::{Context, Result};
use lynx::process::trace::{TraceOptions, TraceReconstructor};
use lynx::structs::RecordFile;
use lynx::structs::continuous::ContinuousRecordPacket;
use lynx::utils::byteorder::WriteBytesLe;

use super::command::TraceArgs;
use super::extract::create;
use crate::report::TraceSummary;
use crate::timestamp::{duration_str, timestamp_str};

pub fn cmd_trace(args: &TraceArgs) -> Result<()> {
    let reconstructor = TraceReconstructor::new(TraceOptions {
        gap_tolerance: args.gap_tolerance,
    })?;

    let file = File::open(&args.input)
        .with_context(|| format!("Cannot open {}", args.input.display()))?;
    let parsed = RecordFile::<ContinuousRecordPacket>::read(&mut BufReader::new(file))?;
    log::info!(
        "{}: {} continuous records",
        args.input.display(),
        parsed.records.len()
    );

    let nominal = TraceReconstructor::check_uniform_rate(&parsed.records)?;
    let trace = reconstructor.reconstruct(&parsed.records)?;

    for gap in &trace.gaps {
        log::info!(
            "Gap before record {}: {} zero samples at {}",
            gap.packet_index,
            gap.zeros,
            duration_str(gap.sample_index as f64 / trace.sample_rate)
        );
    }

    let mut bytes = Vec::with_capacity(trace.samples.len() * 2);
    trace.samples.write_le(&mut bytes);
    let mut out = create(&args.output)?;
    out.write_all(&bytes)?;
    out.flush()?;

    log::info!(
        "Wrote {} samples ({}) starting at {} to {}",
        trace.samples.len(),
        duration_str(trace.duration_seconds()),
        timestamp_str(trace.t0),
        args.output.display()
    );

    if let Some(report_path) = &args.report {
        TraceSummary::new(
            &args.input,
            &args.output,
            parsed.records.len(),
            nominal,
            &trace,
        )
        .write(report_path)?;
    }

    Ok(())
}
