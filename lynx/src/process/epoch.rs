//! Epoch splitting
//!
//! An epoch is a named, inclusive timestamp window read from the
//! acquisition software's defaults file, where it appears as
//!
//! ```text
//! "Epoch","sleep1:1200345 98765432"
//! ```
//!
//! The splitter writes, for every epoch and every channel group, the samples
//! of the packets inside the window to one MDA container.

use std::collections::BTreeMap;
use std::io::{self, Seek, Write};

use anyhow::{Result, bail, ensure};
use log::{debug, info, warn};

use crate::process::extract::PacketSink;
use crate::structs::layout::PacketLayout;
use crate::structs::mda::MdaWriter;
use crate::structs::raw_packet::RawPacket;
use crate::utils::errors::EpochError;

const EPOCH_TAG: &str = "\"Epoch\"";

/// Group identifier to raw channel indices, e.g. one tetrode per group.
pub type ChannelGroups = BTreeMap<u32, Vec<usize>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochBounds {
    pub start: u64,
    pub stop: u64,
}

impl EpochBounds {
    /// Bounds covering every timestamp.
    pub const ALL: EpochBounds = EpochBounds {
        start: 0,
        stop: u64::MAX,
    };

    /// Both bounds are inclusive.
    #[inline]
    pub fn contains(&self, timestamp: u64) -> bool {
        self.start <= timestamp && timestamp <= self.stop
    }

    pub fn intersects(&self, first: u64, last: u64) -> bool {
        first <= self.stop && last >= self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    pub name: String,
    pub bounds: EpochBounds,
    pub groups: ChannelGroups,
}

/// Reads every `"Epoch"` line of a defaults file.
pub fn parse_defaults(text: &str) -> Result<BTreeMap<String, EpochBounds>> {
    let mut epochs = BTreeMap::new();

    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if !line.starts_with(EPOCH_TAG) {
            continue;
        }

        let malformed = || EpochError::MalformedLine {
            line: n + 1,
            text: line.to_string(),
        };

        let Some(field) = line.split(',').nth(1) else {
            bail!(malformed());
        };
        let Some((name, range)) = field.trim().trim_matches('"').split_once(':') else {
            bail!(malformed());
        };
        let bounds: Vec<u64> = match range.split_whitespace().map(str::parse).collect() {
            Ok(b) => b,
            Err(_) => bail!(malformed()),
        };
        let &[start, stop] = bounds.as_slice() else {
            bail!(malformed());
        };
        ensure!(
            start <= stop,
            EpochError::InvertedBounds {
                name: name.to_string(),
                start,
                stop
            }
        );

        debug!("Epoch {name}: {start}..={stop}");
        if epochs
            .insert(name.to_string(), EpochBounds { start, stop })
            .is_some()
        {
            warn!("Epoch {name} defined more than once, keeping the last definition");
        }
    }

    Ok(epochs)
}

/// Picks the requested epochs, in request order, giving each the same
/// channel groups. Names missing from `defined` are skipped with a warning.
pub fn select_epochs(
    defined: &BTreeMap<String, EpochBounds>,
    names: &[String],
    groups: &ChannelGroups,
) -> Result<Vec<Epoch>> {
    let mut epochs = Vec::with_capacity(names.len());
    for name in names {
        match defined.get(name) {
            Some(&bounds) => epochs.push(Epoch {
                name: name.clone(),
                bounds,
                groups: groups.clone(),
            }),
            None => warn!("Epoch {name} not found in defaults file"),
        }
    }

    ensure!(!epochs.is_empty(), EpochError::NoEpochs);
    Ok(epochs)
}

/// One finished container.
#[derive(Debug)]
pub struct SplitOutput<W> {
    pub epoch: String,
    pub group: u32,
    pub packets: u64,
    pub writer: W,
}

struct GroupWriter<W: Write + Seek> {
    group: u32,
    channels: Vec<usize>,
    mda: MdaWriter<W>,
}

struct EpochWriters<W: Write + Seek> {
    name: String,
    bounds: EpochBounds,
    groups: Vec<GroupWriter<W>>,
}

/// Routes packets into per-epoch, per-group MDA containers.
pub struct EpochSplitter<W: Write + Seek> {
    epochs: Vec<EpochWriters<W>>,
    last_stop: u64,
}

impl<W: Write + Seek> EpochSplitter<W> {
    /// Opens one container per epoch and group through `open`.
    pub fn new<F>(layout: &PacketLayout, epochs: Vec<Epoch>, mut open: F) -> Result<Self>
    where
        F: FnMut(&Epoch, u32) -> io::Result<W>,
    {
        ensure!(!epochs.is_empty(), EpochError::NoEpochs);

        let mut writers = Vec::with_capacity(epochs.len());
        for epoch in epochs {
            let mut groups = Vec::with_capacity(epoch.groups.len());
            for (&group, channels) in &epoch.groups {
                ensure!(!channels.is_empty(), EpochError::EmptyGroup(group));
                for &channel in channels {
                    layout.check_channel(channel)?;
                }

                let mda = MdaWriter::new(open(&epoch, group)?, channels.len())?;
                groups.push(GroupWriter {
                    group,
                    channels: channels.clone(),
                    mda,
                });
            }

            writers.push(EpochWriters {
                name: epoch.name,
                bounds: epoch.bounds,
                groups,
            });
        }

        let last_stop = writers.iter().map(|e| e.bounds.stop).max().unwrap_or(0);
        Ok(Self {
            epochs: writers,
            last_stop,
        })
    }

    /// Latest stop bound over all epochs.
    pub fn last_stop(&self) -> u64 {
        self.last_stop
    }

    /// Rewrites every container's packet count.
    pub fn finish(self) -> Result<Vec<SplitOutput<W>>> {
        let mut outputs = Vec::new();
        for epoch in self.epochs {
            for group in epoch.groups {
                let packets = group.mda.packets();
                info!(
                    "Epoch {} group {}: {packets} packets",
                    epoch.name, group.group
                );
                outputs.push(SplitOutput {
                    epoch: epoch.name.clone(),
                    group: group.group,
                    packets,
                    writer: group.mda.finish()?,
                });
            }
        }
        Ok(outputs)
    }
}

impl<W: Write + Seek> PacketSink for EpochSplitter<W> {
    fn write_packets(&mut self, packets: &[RawPacket]) -> Result<bool> {
        let (Some(first), Some(last)) = (packets.first(), packets.last()) else {
            return Ok(true);
        };
        let (first, last) = (first.timestamp(), last.timestamp());

        for epoch in &mut self.epochs {
            let bounds = epoch.bounds;
            if !bounds.intersects(first, last) {
                continue;
            }

            for packet in packets.iter().filter(|p| bounds.contains(p.timestamp())) {
                for group in &mut epoch.groups {
                    group
                        .mda
                        .write_packet(group.channels.iter().map(|&c| packet.data[c]))?;
                }
            }
        }

        Ok(last <= self.last_stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::mda::{MDA_HEADER_SIZE, MdaHeader};
    use std::io::Cursor;

    const DEFAULTS: &str = "\
-SetupFile \"acq.cfg\"\r\n\
\"Epoch\",\"rest:100 200\"\r\n\
\"Comment\",\"not an epoch\"\r\n\
\"Epoch\",\"run:150 400\"\r\n";

    fn groups() -> ChannelGroups {
        BTreeMap::from([(1, vec![0, 2]), (2, vec![3])])
    }

    fn packets(layout: &PacketLayout, stamps: &[u64]) -> Result<Vec<RawPacket>> {
        stamps
            .iter()
            .map(|&ts| {
                let data = (0..layout.channels() as i32).map(|c| c * 1000 + ts as i32).collect();
                RawPacket::new(layout, ts, 0, data)
            })
            .collect()
    }

    fn samples(buffer: &[u8]) -> Vec<i32> {
        buffer[MDA_HEADER_SIZE..]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn parses_epoch_lines() -> Result<()> {
        let epochs = parse_defaults(DEFAULTS)?;
        assert_eq!(epochs.len(), 2);
        assert_eq!(epochs["rest"], EpochBounds { start: 100, stop: 200 });
        assert_eq!(epochs["run"], EpochBounds { start: 150, stop: 400 });
        Ok(())
    }

    #[test]
    fn rejects_bad_epoch_lines() {
        for text in [
            "\"Epoch\",\"rest 100 200\"",
            "\"Epoch\",\"rest:100\"",
            "\"Epoch\",\"rest:100 abc\"",
            "\"Epoch\"",
        ] {
            let err = parse_defaults(text).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<EpochError>(),
                    Some(EpochError::MalformedLine { line: 1, .. })
                ),
                "{text}"
            );
        }

        let err = parse_defaults("\"Epoch\",\"back:20 10\"").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EpochError>(),
            Some(EpochError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn selection_needs_a_known_epoch() -> Result<()> {
        let defined = parse_defaults(DEFAULTS)?;
        let names = vec!["run".to_string(), "missing".to_string()];
        let selected = select_epochs(&defined, &names, &groups())?;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "run");

        let err = select_epochs(&defined, &["missing".to_string()], &groups()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EpochError>(),
            Some(EpochError::NoEpochs)
        ));
        Ok(())
    }

    #[test]
    fn stop_bound_is_inclusive() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let epoch = Epoch {
            name: "rest".into(),
            bounds: EpochBounds { start: 100, stop: 200 },
            groups: BTreeMap::from([(0, vec![1])]),
        };
        let mut splitter = EpochSplitter::new(&layout, vec![epoch], |_, _| {
            Ok(Cursor::new(Vec::new()))
        })?;

        let more = splitter.write_packets(&packets(&layout, &[99, 100, 200, 201])?)?;
        assert!(!more);

        let outputs = splitter.finish()?;
        assert_eq!(outputs[0].packets, 2);
        let buffer = outputs[0].writer.get_ref();
        assert_eq!(MdaHeader::from_bytes(buffer)?.packets, 2);
        assert_eq!(samples(buffer), [1100, 1200]);
        Ok(())
    }

    #[test]
    fn overlapping_epochs_and_groups() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let defined = parse_defaults(DEFAULTS)?;
        let names = vec!["rest".to_string(), "run".to_string()];
        let epochs = select_epochs(&defined, &names, &groups())?;

        let mut opened = Vec::new();
        let mut splitter = EpochSplitter::new(&layout, epochs, |epoch, group| {
            opened.push(format!("{}.nt{group}", epoch.name));
            Ok(Cursor::new(Vec::new()))
        })?;
        assert_eq!(opened, ["rest.nt1", "rest.nt2", "run.nt1", "run.nt2"]);
        assert_eq!(splitter.last_stop(), 400);

        assert!(splitter.write_packets(&packets(&layout, &[50, 120, 160])?)?);
        assert!(splitter.write_packets(&packets(&layout, &[210, 390, 400])?)?);
        assert!(!splitter.write_packets(&packets(&layout, &[401])?)?);

        let outputs = splitter.finish()?;
        let counts: Vec<_> = outputs
            .iter()
            .map(|o| (o.epoch.as_str(), o.group, o.packets))
            .collect();
        assert_eq!(
            counts,
            [
                ("rest", 1, 2),
                ("rest", 2, 2),
                ("run", 1, 4),
                ("run", 2, 4)
            ]
        );

        assert_eq!(samples(outputs[0].writer.get_ref()), [120, 2120, 160, 2160]);
        assert_eq!(samples(outputs[3].writer.get_ref()), [3160, 3210, 3390, 3400]);
        Ok(())
    }

    #[test]
    fn refuses_bad_groups() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let epoch = |groups| Epoch {
            name: "e".into(),
            bounds: EpochBounds::ALL,
            groups,
        };
        let open = |_: &Epoch, _: u32| Ok(Cursor::new(Vec::new()));

        let empty = vec![epoch(BTreeMap::from([(5, vec![])]))];
        let err = EpochSplitter::new(&layout, empty, open).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<EpochError>(),
            Some(EpochError::EmptyGroup(5))
        ));

        let out_of_range = vec![epoch(BTreeMap::from([(0, vec![4])]))];
        assert!(EpochSplitter::new(&layout, out_of_range, open).is_err());
        assert!(EpochSplitter::new(&layout, Vec::new(), open).is_err());
        Ok(())
    }
}
