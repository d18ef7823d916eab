//! Entry collection: enumerate every origin and dedupe by logical path.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::entry::{Entry, EntryKind};
use crate::error::PackResult;
use crate::origin::DependencySet;

/// How ordinary (non-service) duplicates are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// The first origin in dependency order wins.
    #[default]
    FirstWins,
}

/// Output of the collect stage.
#[derive(Debug, Default)]
pub struct Collected {
    /// Deduplicated entries (including directories), keyed by logical path.
    pub entries: BTreeMap<String, Entry>,
    /// Every service-descriptor source, in origin order.
    pub services: BTreeMap<String, Vec<Entry>>,
    /// Number of later duplicates dropped by the first-wins rule.
    pub duplicates: usize,
}

/// Enumerate origins in parallel, then reduce in dependency order.
pub fn collect(dependencies: &DependencySet) -> PackResult<Collected> {
    let per_origin = dependencies
        .origins()
        .par_iter()
        .map(|origin| origin.read_entries())
        .collect::<PackResult<Vec<_>>>()?;

    let mut collected = Collected::default();
    for entries in per_origin {
        for entry in entries {
            collected.insert(entry, DuplicatePolicy::FirstWins);
        }
    }
    Ok(collected)
}

impl Collected {
    fn insert(&mut self, entry: Entry, policy: DuplicatePolicy) {
        if entry.kind() == EntryKind::ServiceDescriptor {
            self.services
                .entry(entry.path().to_string())
                .or_default()
                .push(entry);
            return;
        }

        match policy {
            DuplicatePolicy::FirstWins => {
                if let Some(existing) = self.entries.get(entry.path()) {
                    if entry.kind() != EntryKind::Directory {
                        debug!(
                            path = entry.path(),
                            kept = %existing.origin(),
                            dropped = %entry.origin(),
                            "duplicate entry dropped"
                        );
                        self.duplicates += 1;
                    }
                    return;
                }
                self.entries.insert(entry.path().to_string(), entry);
            }
        }
    }

    /// Total number of logical paths seen (entries plus distinct descriptors).
    pub fn len(&self) -> usize {
        self.entries.len() + self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;

    fn deps() -> DependencySet {
        DependencySet::new()
            .with(Origin::memory(
                "module",
                [
                    ("com/example/Main.class", b"module-main".to_vec()),
                    ("META-INF/services/com.example.Api", b"a\n".to_vec()),
                ],
            ))
            .with(Origin::memory(
                "dep1",
                [
                    ("com/example/Main.class", b"dep-main".to_vec()),
                    ("com/dep/Util.class", b"util".to_vec()),
                    ("META-INF/services/com.example.Api", b"b\n".to_vec()),
                ],
            ))
    }

    #[test]
    fn test_first_origin_wins() {
        let collected = collect(&deps()).unwrap();
        let main = &collected.entries["com/example/Main.class"];
        assert_eq!(main.content(), b"module-main");
        assert_eq!(main.origin().as_str(), "module");
        assert_eq!(collected.duplicates, 1);
        assert!(collected.entries.contains_key("com/dep/Util.class"));
    }

    #[test]
    fn test_service_descriptors_forwarded_in_origin_order() {
        let collected = collect(&deps()).unwrap();
        let sources = &collected.services["META-INF/services/com.example.Api"];
        let origins: Vec<_> = sources.iter().map(|e| e.origin().as_str()).collect();
        assert_eq!(origins, vec!["module", "dep1"]);
        assert!(!collected
            .entries
            .contains_key("META-INF/services/com.example.Api"));
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn test_unreadable_origin_aborts() {
        let deps = deps().with(Origin::archive("/no/such/dep.jar"));
        let err = collect(&deps).unwrap_err();
        assert_eq!(err.origin().map(|o| o.as_str()), Some("dep.jar"));
    }
}
