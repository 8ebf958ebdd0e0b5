use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use lynx::process::extract::PacketSink;
use lynx::structs::raw_packet::RawPacket;

use crate::timestamp::timestamp_str;

pub fn create_progress_bar(multi: &MultiProgress, total_packets: Option<u64>) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_packets {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} packets ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);

        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} packets\n{msg} | elapsed: {elapsed_precise}",
        )?);

        pb
    };
    pb.set_message("searching for first packet");
    Ok(pb)
}

/// Advances a progress bar by every packet passed on to `inner`.
pub struct ProgressSink<S> {
    inner: S,
    pb: Option<ProgressBar>,
}

impl<S: PacketSink> ProgressSink<S> {
    pub fn new(inner: S, pb: Option<ProgressBar>) -> Self {
        Self { inner, pb }
    }

    pub fn into_inner(self) -> S {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
        self.inner
    }
}

impl<S: PacketSink> PacketSink for ProgressSink<S> {
    fn write_packets(&mut self, packets: &[RawPacket]) -> Result<bool> {
        if let Some(pb) = &self.pb {
            pb.inc(packets.len() as u64);
            if let Some(last) = packets.last() {
                pb.set_message(format!("at {}", timestamp_str(last.timestamp())));
            }
        }
        self.inner.write_packets(packets)
    }
}
