//! Service-descriptor merging.
//!
//! `META-INF/services/<interface>` files list one implementation class per
//! line, `#` starts a comment. When several origins ship the same
//! descriptor the lines are combined instead of letting one origin win.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::Entry;
use crate::filter::Filtered;

/// Policy for service descriptors present in more than one origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePolicy {
    /// Union of all sources' provider lines.
    #[default]
    Merge,
    /// Same rule as ordinary entries: first origin wins.
    FirstWins,
}

/// Output of the merge stage: one entry per logical path.
#[derive(Debug, Default)]
pub struct Merged {
    pub entries: BTreeMap<String, Entry>,
    pub merged_descriptors: usize,
}

pub fn merge(filtered: Filtered, policy: ServicePolicy) -> Merged {
    let mut entries = filtered.entries;
    let mut merged_descriptors = 0;

    for (path, sources) in filtered.services {
        let entry = match policy {
            ServicePolicy::Merge if sources.len() > 1 => {
                merged_descriptors += 1;
                debug!(path = %path, sources = sources.len(), "merging service descriptor");
                merge_sources(sources)
            }
            _ => sources.into_iter().next(),
        };
        if let Some(entry) = entry {
            entries.insert(path, entry);
        }
    }

    Merged {
        entries,
        merged_descriptors,
    }
}

/// Combine sources in order. The merged entry keeps the first origin.
fn merge_sources(sources: Vec<Entry>) -> Option<Entry> {
    let contents: Vec<&[u8]> = sources.iter().map(Entry::content).collect();
    let merged = merge_lines(&contents);
    sources
        .into_iter()
        .next()
        .map(|first| first.with_content(merged))
}

/// Provider lines of all inputs, comments and blanks removed, first-seen order.
pub fn merge_lines(contents: &[&[u8]]) -> Vec<u8> {
    let mut seen = HashSet::new();
    let mut out = String::new();

    for content in contents {
        let text = String::from_utf8_lossy(content);
        for line in text.lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() || !seen.insert(line.to_string()) {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
    }
    out.into_bytes()
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}
