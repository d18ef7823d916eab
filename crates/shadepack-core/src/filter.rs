//! Exclusion filter: glob deny-list applied before merge and remap.
//!
//! Matching rules:
//! - Anchored to the full logical path.
//! - Case-sensitive.
//! - `*` matches within one path segment, `**` crosses segments
//!   (`**/NOTICE` also matches a root-level `NOTICE`).
//! - Directory entries are matched without their trailing `/`.

use std::collections::BTreeMap;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::collect::Collected;
use crate::entry::{Entry, EntryKind};
use crate::error::{PackError, PackResult};

/// Patterns excluded when the configuration does not list its own.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/LICENSE.md",
    "**/LICENSE.txt",
    "**/LICENSE",
    "**/NOTICE",
    "**/NOTICE.txt",
    "pack.mcmeta",
    "dummyThing",
    "**/module-info.class",
    "META-INF/proguard/**",
    "META-INF/maven/**",
    "META-INF/versions/**",
    "META-INF/com.android.tools/**",
    "fabric.mod.json",
];

/// Jar signature files of shaded dependencies; never valid in a re-packed jar.
const SIGNATURE_EXCLUDES: &[&str] = &[
    "META-INF/*.SF",
    "META-INF/*.DSA",
    "META-INF/*.RSA",
    "META-INF/*.EC",
];

/// Compiled, ordered deny-list.
#[derive(Debug, Clone)]
pub struct ExclusionRuleSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExclusionRuleSet {
    /// Compile user patterns; jar signature patterns are always appended.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> PackResult<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut compiled = Vec::with_capacity(patterns.len() + SIGNATURE_EXCLUDES.len());

        let all = patterns
            .iter()
            .map(AsRef::as_ref)
            .chain(SIGNATURE_EXCLUDES.iter().copied());
        for pattern in all {
            let glob = path_glob(pattern).map_err(|e| PackError::Config {
                message: format!("invalid exclude pattern '{}': {}", pattern, e),
            })?;
            builder.add(glob);
            compiled.push(pattern.to_string());
        }

        let set = builder.build().map_err(|e| PackError::Config {
            message: format!("failed to build exclude set: {}", e),
        })?;
        Ok(Self {
            patterns: compiled,
            set,
        })
    }

    /// The default deny-list.
    pub fn defaults() -> Self {
        Self::compile(DEFAULT_EXCLUDES).expect("built-in exclude patterns compile")
    }

    /// `true` when the entry survives the deny-list.
    pub fn keeps(&self, entry: &Entry) -> bool {
        !self.excludes_path(entry.path())
    }

    pub fn excludes_path(&self, path: &str) -> bool {
        let candidate = path.strip_suffix('/').unwrap_or(path);
        self.set.is_match(candidate)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn path_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(false)
        .backslash_escape(true)
        .build()
}

impl Default for ExclusionRuleSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Output of the filter stage.
#[derive(Debug, Default)]
pub struct Filtered {
    pub entries: BTreeMap<String, Entry>,
    pub services: BTreeMap<String, Vec<Entry>>,
    pub excluded: usize,
}

/// Drop every entry (and every service-descriptor source) the rules exclude.
pub fn filter(collected: Collected, rules: &ExclusionRuleSet) -> Filtered {
    let mut excluded = 0usize;
    let mut count_drop = |entry: &Entry| {
        let keep = rules.keeps(entry);
        if !keep {
            if entry.kind() != EntryKind::Directory {
                debug!(path = entry.path(), origin = %entry.origin(), "entry excluded");
            }
            excluded += 1;
        }
        keep
    };

    let entries = collected
        .entries
        .into_iter()
        .filter(|(_, entry)| count_drop(entry))
        .collect();

    let mut services = BTreeMap::new();
    for (path, sources) in collected.services {
        let kept: Vec<Entry> = sources.into_iter().filter(|e| count_drop(e)).collect();
        if !kept.is_empty() {
            services.insert(path, kept);
        }
    }

    Filtered {
        entries,
        services,
        excluded,
    }
}
