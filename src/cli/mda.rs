use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use indicatif::MultiProgress;
use lynx::process::epoch::{Epoch, EpochBounds, EpochSplitter};
use lynx::process::extract::ExtractionPipeline;

use super::Capture;
use super::command::{Cli, MdaArgs};
use super::extract::create;
use super::progress::{ProgressSink, create_progress_bar};
use crate::report::{OutputSummary, RunSummary};

/// Single-window conversion: one container, one channel group, bounds from
/// the command line.
pub fn cmd_mda(args: &MdaArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let bounds = EpochBounds {
        start: args.start.unwrap_or(EpochBounds::ALL.start),
        stop: args.stop.unwrap_or(EpochBounds::ALL.stop),
    };
    ensure!(
        bounds.start <= bounds.stop,
        "--start {} is after --stop {}",
        bounds.start,
        bounds.stop
    );

    let mut capture = Capture::open(&args.input, args.pipeline.channels)?;
    let config = args.pipeline.config(cli);
    if !config.validate {
        log::info!("Notice: packet checks are off, corrupt packets will be written as-is");
    }

    let window = Epoch {
        name: "window".to_string(),
        bounds,
        groups: BTreeMap::from([(0, args.channels.clone())]),
    };
    let splitter = EpochSplitter::new(&capture.layout, vec![window], |_, _| {
        create(&args.output).map_err(std::io::Error::other)
    })?;

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, Some(capture.estimated_packets()))?),
        None => None,
    };
    let mut sink = ProgressSink::new(splitter, pb);

    let report =
        ExtractionPipeline::new(&capture.layout, &config).run(&mut capture.reader, &mut sink)?;
    let outputs = sink.into_inner().finish()?;
    let written = outputs.first().map(|o| o.packets).unwrap_or_default();
    log::info!("Wrote {written} packets to {}", args.output.display());

    if let Some(report_path) = &args.pipeline.report {
        let outputs = vec![OutputSummary::new(&args.output, Some(written))];
        RunSummary::new("mda", &capture, &config, &report, outputs).write(report_path)?;
    }

    Ok(())
}
