//! Reproducible shaded-jar packaging.
//!
//! Collects a module's compiled output and its dependencies, drops excluded
//! entries, merges service descriptors, remaps class symbols and writes a
//! deterministic jar with a SHA-256 digest and an optional detached
//! ed25519 signature.

pub mod archive;
pub mod collect;
pub mod config;
pub mod digest;
pub mod entry;
pub mod error;
pub mod filter;
pub mod merge;
pub mod origin;
pub mod pipeline;
pub mod remap;
pub mod signing;

pub use archive::{ArchiveWriter, Compression};
pub use config::PackConfig;
pub use digest::ArtifactDigest;
pub use entry::{Entry, EntryKind, OriginId};
pub use error::{PackError, PackResult, Stage};
pub use filter::ExclusionRuleSet;
pub use merge::ServicePolicy;
pub use origin::{DependencySet, Origin};
pub use pipeline::{PackagedArtifact, Pipeline};
pub use remap::MappingTable;
pub use signing::{verify_signature, ArtifactSigner, SignOutcome, VerifyError};
