use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use lynx::structs::RecordFile;
use lynx::structs::event::EventRecord;
use lynx::structs::spike::write_spike_file;

use super::command::EventsArgs;
use super::extract::create;
use crate::timestamp::timestamp_str;

pub fn cmd_events(args: &EventsArgs) -> Result<()> {
    let file = File::open(&args.input)
        .with_context(|| format!("Cannot open {}", args.input.display()))?;
    let parsed = RecordFile::<EventRecord>::read(&mut BufReader::new(file))?;

    let events: Vec<(&EventRecord, String)> = parsed
        .records
        .iter()
        .map(|e| (e, e.event_string()))
        .filter(|(_, text)| match &args.matching {
            Some(needle) => text.contains(needle.as_str()),
            None => true,
        })
        .collect();

    log::info!(
        "{}: {} events, {} selected",
        args.input.display(),
        parsed.records.len(),
        events.len()
    );

    println!("{:>16}  {:>15}  {:>5}  {:>6}  Event", "Timestamp", "Time", "Id", "TTL");
    for (event, text) in &events {
        println!(
            "{:>16}  {:>15}  {:>5}  0x{:04X}  {text}",
            event.timestamp,
            timestamp_str(event.timestamp),
            event.event_id,
            event.ttl
        );
    }

    if let Some(path) = &args.spike_file {
        let stamps: Vec<u64> = events.iter().map(|(e, _)| e.timestamp).collect();
        let remarks = format!(
            "######## Spike times from events\r\n-FileType Spike\r\n-SourceFile {}\r\n",
            args.input.display()
        );
        let mut out = create(path)?;
        write_spike_file(&mut out, &stamps, &remarks)?;
        log::info!("Wrote {} spikes to {}", stamps.len(), path.display());
    }

    Ok(())
}
