//! Linear packaging pipeline.
//!
//! ```text
//! Collected -> Filtered -> Merged -> Remapped -> Written -> Digested -> Signed | Unsigned
//! ```
//!
//! Every stage consumes the previous stage's value. The first error ends
//! the run and no partial artifact is left behind.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::ArchiveWriter;
use crate::collect::collect;
use crate::config::PackConfig;
use crate::digest::{digest_file, ArtifactDigest};
use crate::entry::{Entry, EntryKind, OriginId};
use crate::error::{PackError, PackResult, Stage};
use crate::filter::{filter, ExclusionRuleSet};
use crate::merge::{merge, ServicePolicy};
use crate::origin::{DependencySet, Origin};
use crate::remap::{remap, MappingTable, Remapped};
use crate::signing::{ArtifactSigner, SignOutcome};

/// One entry of the produced archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub path: String,
    pub kind: EntryKind,
    pub origin: OriginId,
    pub size: usize,
}

impl From<&Entry> for EntrySummary {
    fn from(entry: &Entry) -> Self {
        Self {
            path: entry.path().to_string(),
            kind: entry.kind(),
            origin: entry.origin().clone(),
            size: entry.content().len(),
        }
    }
}

/// The single output of a run.
#[derive(Debug, Clone)]
pub struct PackagedArtifact {
    pub path: PathBuf,
    pub entries: Vec<EntrySummary>,
    pub digest: ArtifactDigest,
    pub signature: SignOutcome,
}

/// Fully resolved inputs for one run.
#[derive(Debug)]
pub struct Pipeline {
    dependencies: DependencySet,
    exclusions: ExclusionRuleSet,
    service_policy: ServicePolicy,
    mapping: MappingTable,
    writer: ArchiveWriter,
    output: PathBuf,
    signer: Option<ArtifactSigner>,
}

impl Pipeline {
    /// Pipeline with default exclusions, merged service files, no mapping
    /// and no signing.
    pub fn new(dependencies: DependencySet, output: impl Into<PathBuf>) -> Self {
        Self {
            dependencies,
            exclusions: ExclusionRuleSet::defaults(),
            service_policy: ServicePolicy::Merge,
            mapping: MappingTable::new(),
            writer: ArchiveWriter::default(),
            output: output.into(),
            signer: None,
        }
    }

    /// Build from configuration. Mapping and signing key are loaded here so
    /// an unusable credential fails before any output is produced.
    pub fn from_config(config: &PackConfig) -> PackResult<Self> {
        config.validate()?;
        let dependencies: DependencySet = config.origins.iter().map(Origin::from_path).collect();
        let exclusions = ExclusionRuleSet::compile(&config.exclude_patterns)?;
        let mapping = match &config.mapping {
            Some(path) => MappingTable::from_file(path)?,
            None => MappingTable::new(),
        };
        let signer = config
            .signing_key
            .as_deref()
            .map(ArtifactSigner::from_pem_file)
            .transpose()?;
        let writer = ArchiveWriter::new(config.compression)
            .preserve_empty_directories(config.preserve_empty_directories);

        Ok(Self {
            dependencies,
            exclusions,
            service_policy: config.service_policy(),
            mapping,
            writer,
            output: config.archive_path(),
            signer,
        })
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionRuleSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_service_policy(mut self, policy: ServicePolicy) -> Self {
        self.service_policy = policy;
        self
    }

    pub fn with_mapping(mut self, mapping: MappingTable) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_writer(mut self, writer: ArchiveWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_signer(mut self, signer: ArtifactSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run collect, filter, merge and remap; nothing is written.
    pub fn assemble(&self) -> PackResult<Remapped> {
        if self.dependencies.is_empty() {
            return Err(PackError::Config {
                message: "at least one origin is required".to_string(),
            });
        }

        let collected = collect(&self.dependencies)?;
        info!(
            stage = %Stage::Collect,
            origins = self.dependencies.len(),
            entries = collected.len(),
            duplicates = collected.duplicates,
            "collected"
        );

        let filtered = filter(collected, &self.exclusions);
        info!(
            stage = %Stage::Filter,
            kept = filtered.entries.len() + filtered.services.len(),
            excluded = filtered.excluded,
            "filtered"
        );

        let merged = merge(filtered, self.service_policy);
        info!(
            stage = %Stage::Merge,
            entries = merged.entries.len(),
            merged_descriptors = merged.merged_descriptors,
            "merged"
        );

        let remapped = remap(merged, &self.mapping)?;
        info!(
            stage = %Stage::Remap,
            mappings = self.mapping.len(),
            rewritten = remapped.rewritten,
            renamed = remapped.renamed,
            "remapped"
        );
        Ok(remapped)
    }

    /// Produce, digest and (optionally) sign the artifact.
    pub fn run(&self) -> PackResult<PackagedArtifact> {
        let remapped = self.assemble()?;
        let entries = remapped.entries.values().map(EntrySummary::from).collect();

        let written = self.writer.write_file(&remapped.entries, &self.output)?;
        info!(
            stage = %Stage::Write,
            path = %written.path.display(),
            files = written.files,
            directories = written.directories,
            "written"
        );

        let digest = self.finish_or_discard(digest_file(&written.path))?;
        info!(stage = %Stage::Digest, %digest, "digested");

        let signature = match &self.signer {
            Some(signer) => {
                let outcome = self.finish_or_discard(signer.sign_file(&written.path, &digest))?;
                info!(stage = %Stage::Sign, key_id = signer.key_id(), "signed");
                outcome
            }
            None => {
                warn!(stage = %Stage::Sign, "no signing key configured; signature skipped");
                SignOutcome::Skipped
            }
        };

        Ok(PackagedArtifact {
            path: written.path,
            entries,
            digest,
            signature,
        })
    }

    /// A failure after the archive is published removes it again.
    fn finish_or_discard<T>(&self, result: PackResult<T>) -> PackResult<T> {
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(&self.output) {
                warn!(path = %self.output.display(), error = %e, "failed to remove artifact");
            }
        }
        result
    }
}
