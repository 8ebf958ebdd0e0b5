use anyhow::Result;
use indicatif::MultiProgress;
use lynx::process::extract::{ExtractionPipeline, ExtractionReport, PacketSink};
use lynx::process::validate::RejectionKind;
use lynx::structs::header::CHANNEL_COUNT_KEY;
use lynx::structs::raw_packet::RawPacket;

use super::Capture;
use super::command::{Cli, InfoArgs};
use super::progress::{ProgressSink, create_progress_bar};
use crate::report::RunSummary;
use crate::timestamp::{duration_str, timestamp_str};

/// Keeps the timestamp range and TTL activity of every accepted packet.
#[derive(Default)]
struct StreamStats {
    first_timestamp: Option<u64>,
    last_timestamp: Option<u64>,
    ttl_changes: u64,
    last_ttl: Option<u32>,
}

impl PacketSink for StreamStats {
    fn write_packets(&mut self, packets: &[RawPacket]) -> Result<bool> {
        for packet in packets {
            self.first_timestamp.get_or_insert(packet.timestamp());
            self.last_timestamp = Some(packet.timestamp());
            if self.last_ttl.is_some_and(|ttl| ttl != packet.ttl) {
                self.ttl_changes += 1;
            }
            self.last_ttl = Some(packet.ttl);
        }
        Ok(true)
    }
}

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing capture: {}", args.input.display());

    let mut capture = Capture::open(&args.input, args.pipeline.channels)?;
    display_header(&capture);

    if !args.check {
        return Ok(());
    }

    let config = args.pipeline.config(cli);
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, Some(capture.estimated_packets()))?),
        None => None,
    };
    let mut sink = ProgressSink::new(StreamStats::default(), pb);

    let report =
        ExtractionPipeline::new(&capture.layout, &config).run(&mut capture.reader, &mut sink)?;
    let stats = sink.into_inner();
    display_check(&report, &stats);

    if let Some(report_path) = &args.pipeline.report {
        RunSummary::new("info", &capture, &config, &report, Vec::new()).write(report_path)?;
    }

    Ok(())
}

fn display_header(capture: &Capture) {
    println!();
    println!("Capture File Information");
    println!("========================");
    println!();

    println!("Header");
    let mut entries: Vec<_> = capture.header.entries().collect();
    entries.sort();
    for (key, value) in entries {
        println!("  {:<26}{value}", format!("-{key}"));
    }
    println!();

    let size_mb = capture.file_len as f64 / 1_000_000.0;
    println!("Raw Packets");
    println!("  Channels                  {}", capture.layout.channels());
    if capture.header.get(CHANNEL_COUNT_KEY).is_none() {
        println!("  Channel count source      command line");
    }
    println!("  Packet size               {} bytes", capture.layout.packet_size());
    println!("  Size                      {size_mb:.2} MB ({} bytes)", capture.file_len);
    println!("  Estimated packets         {}", capture.estimated_packets());
    println!();

    println!("Packet Layout");
    for field in capture.layout.fields() {
        let offset = capture.layout.offset_of(field.name).unwrap_or_default();
        println!(
            "  {:<16}{:>6}  {:?} x {}",
            field.name, offset, field.primitive, field.count
        );
    }
    println!();
}

fn display_check(report: &ExtractionReport, stats: &StreamStats) {
    println!("Check Summary");
    println!("  Packets accepted          {}", report.accepted_packets);
    println!("  Packets decoded           {}", report.decoded_packets);
    println!("  Garbage bytes             {}", report.garbage_bytes);
    println!("  Stopped on                {}", report.stop);

    if let (Some(first), Some(last)) = (stats.first_timestamp, stats.last_timestamp) {
        println!("  First timestamp           {first} ({})", timestamp_str(first));
        println!("  Last timestamp            {last} ({})", timestamp_str(last));
        let span = last.saturating_sub(first) as f64 / 1e6;
        println!("  Duration                  {}", duration_str(span));
        if span > 0.0 {
            let rate = report.accepted_packets.saturating_sub(1) as f64 / span;
            println!("  Packet rate               {rate:.1} Hz");
        }
    }
    println!("  TTL changes               {}", stats.ttl_changes);
    println!();

    println!("Rejections");
    for kind in RejectionKind::ALL {
        let budget = if kind.counts_against_budget() { "*" } else { " " };
        println!("  {:<24}{budget} {}", kind.label(), report.rejections(kind));
    }
    println!("  (* counts against the error budget)");
    println!();
}
