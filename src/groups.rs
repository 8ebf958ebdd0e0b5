use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use lynx::process::epoch::ChannelGroups;
use serde::Deserialize;

/// Channel group file, e.g.
///
/// ```yaml
/// groups:
///   1: [0, 1, 2, 3]
///   2: [4, 5, 6, 7]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupsFile {
    groups: ChannelGroups,
}

pub fn parse_groups(text: &str) -> Result<ChannelGroups> {
    let file: GroupsFile = serde_yaml_ng::from_str(text)?;
    ensure!(!file.groups.is_empty(), "Group file defines no groups");
    Ok(file.groups)
}

pub fn load_groups(path: &Path) -> Result<ChannelGroups> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read group file {}", path.display()))?;
    let groups =
        parse_groups(&text).with_context(|| format!("Invalid group file {}", path.display()))?;
    log::debug!("{} channel groups from {}", groups.len(), path.display());
    Ok(groups)
}
