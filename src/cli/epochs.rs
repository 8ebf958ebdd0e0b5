use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use lynx::process::epoch::{EpochSplitter, parse_defaults, select_epochs};
use lynx::process::extract::ExtractionPipeline;

use super::Capture;
use super::command::{Cli, EpochsArgs};
use super::extract::create;
use super::progress::{ProgressSink, create_progress_bar};
use crate::groups::load_groups;
use crate::report::{OutputSummary, RunSummary};

pub fn container_path(prefix: &str, epoch: &str, group: u32) -> PathBuf {
    PathBuf::from(format!("{prefix}{epoch}.nt{group}.mda"))
}

pub fn cmd_epochs(args: &EpochsArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let defaults = fs::read_to_string(&args.defaults)
        .with_context(|| format!("Cannot read defaults file {}", args.defaults.display()))?;
    let defined = parse_defaults(&defaults)?;
    let groups = load_groups(&args.groups)?;
    let epochs = select_epochs(&defined, &args.epochs, &groups)?;

    log::info!(
        "Splitting {} into {} epochs of {} groups",
        args.input.display(),
        epochs.len(),
        groups.len()
    );

    // Channel count comes from the header before any layout is built.
    let mut capture = Capture::open(&args.input, args.pipeline.channels)?;
    let config = args.pipeline.config(cli);

    let splitter = EpochSplitter::new(&capture.layout, epochs, |epoch, group| {
        let path = container_path(&args.prefix, &epoch.name, group);
        log::debug!("Opening {}", path.display());
        create(&path).map_err(std::io::Error::other)
    })?;
    log::info!("Reading until timestamp {}", splitter.last_stop());

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, Some(capture.estimated_packets()))?),
        None => None,
    };
    let mut sink = ProgressSink::new(splitter, pb);

    let report =
        ExtractionPipeline::new(&capture.layout, &config).run(&mut capture.reader, &mut sink)?;
    let outputs = sink.into_inner().finish()?;

    let summaries: Vec<OutputSummary> = outputs
        .iter()
        .map(|o| {
            let path = container_path(&args.prefix, &o.epoch, o.group);
            OutputSummary::new(&path, Some(o.packets))
        })
        .collect();

    if let Some(report_path) = &args.pipeline.report {
        RunSummary::new("epochs", &capture, &config, &report, summaries).write(report_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_path() {
        assert_eq!(
            container_path("data/r12_", "sleep1", 3),
            PathBuf::from("data/r12_sleep1.nt3.mda")
        );
    }
}
