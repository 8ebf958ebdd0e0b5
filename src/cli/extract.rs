use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use lynx::process::extract::{ExtractionPipeline, ScalarStreams};

use super::Capture;
use super::command::{Cli, ExtractArgs};
use super::progress::{ProgressSink, create_progress_bar};
use crate::report::{OutputSummary, RunSummary};

pub fn timestamps_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}timestamps.raw"))
}

pub fn ttl_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}ttl.raw"))
}

pub fn channel_path(prefix: &str, channel: usize) -> PathBuf {
    PathBuf::from(format!("{prefix}chan_{channel:03}.raw"))
}

pub(super) fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn cmd_extract(args: &ExtractArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Extracting {} channels from {} (strict mode: {})",
        args.channels.len(),
        args.input.display(),
        cli.strict
    );

    let mut capture = Capture::open(&args.input, args.pipeline.channels)?;
    let config = args.pipeline.config(cli);

    let mut outputs = vec![timestamps_path(&args.prefix), ttl_path(&args.prefix)];
    let mut channel_writers = Vec::with_capacity(args.channels.len());
    for &channel in &args.channels {
        capture.layout.check_channel(channel)?;
        let path = channel_path(&args.prefix, channel);
        channel_writers.push((channel, create(&path)?));
        outputs.push(path);
    }

    let streams = ScalarStreams::new(
        &capture.layout,
        create(&outputs[0])?,
        create(&outputs[1])?,
        channel_writers,
    )?;

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, Some(capture.estimated_packets()))?),
        None => None,
    };
    let mut sink = ProgressSink::new(streams, pb);

    let report =
        ExtractionPipeline::new(&capture.layout, &config).run(&mut capture.reader, &mut sink)?;
    sink.into_inner().flush()?;

    for path in &outputs {
        log::info!("Wrote {}", path.display());
    }

    if let Some(report_path) = &args.pipeline.report {
        let outputs = outputs
            .iter()
            .map(|path| OutputSummary::new(path, Some(report.accepted_packets)))
            .collect();
        RunSummary::new("extract", &capture, &config, &report, outputs).write(report_path)?;
    }

    Ok(())
}
