//! Remap stage: rewrite class files through a [`MappingTable`].
//!
//! Classes are independent of each other, so they are rewritten in
//! parallel. Results are reassembled in logical-path order, which keeps the
//! stage deterministic regardless of scheduling.

mod class_file;
mod descriptor;
mod mapping;
mod mutf8;
mod rewrite;
#[cfg(test)]
#[path = "../../tests/common/class_builder.rs"]
mod testing;

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::entry::{Entry, EntryKind};
use crate::error::{PackError, PackResult};
use crate::merge::Merged;

pub use class_file::ClassFormatError;
pub use mapping::{MappingError, MappingTable};
pub use rewrite::rewrite;

/// Output of the remap stage.
#[derive(Debug, Default)]
pub struct Remapped {
    pub entries: BTreeMap<String, Entry>,
    /// Classes whose bytes changed.
    pub rewritten: usize,
    /// Classes moved to a new logical path.
    pub renamed: usize,
}

pub fn remap(merged: Merged, table: &MappingTable) -> PackResult<Remapped> {
    let results: Vec<(Entry, bool)> = merged
        .entries
        .into_par_iter()
        .map(|(_, entry)| remap_entry(entry, table))
        .collect::<PackResult<_>>()?;

    let mut out = Remapped::default();
    for (entry, rewritten) in results {
        if rewritten {
            out.rewritten += 1;
        }
        let path = entry.path().to_string();
        let entry = match renamed_path(&path, table) {
            Some(new_path) => {
                debug!(from = %path, to = %new_path, "class moved");
                out.renamed += 1;
                entry.with_path(new_path)
            }
            None => entry,
        };
        if let Some(existing) = out.entries.get(entry.path()) {
            return Err(PackError::Remap {
                path: entry.path().to_string(),
                origin: entry.origin().clone(),
                reason: format!(
                    "renamed class collides with entry from origin '{}'",
                    existing.origin()
                ),
            });
        }
        out.entries.insert(entry.path().to_string(), entry);
    }
    Ok(out)
}

fn remap_entry(entry: Entry, table: &MappingTable) -> PackResult<(Entry, bool)> {
    if entry.kind() != EntryKind::Class {
        return Ok((entry, false));
    }
    let bytes = rewrite(entry.content(), table).map_err(|e| PackError::Remap {
        path: entry.path().to_string(),
        origin: entry.origin().clone(),
        reason: e.to_string(),
    })?;
    if bytes == entry.content() {
        Ok((entry, false))
    } else {
        Ok((entry.with_content(bytes), true))
    }
}

/// `a/B.class` -> `x/Y.class` when `a/B` is renamed.
fn renamed_path(path: &str, table: &MappingTable) -> Option<String> {
    let name = path.strip_suffix(".class")?;
    let mapped = table.map_class(name);
    (mapped != name).then(|| format!("{}.class", mapped))
}
