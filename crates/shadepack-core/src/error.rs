//! Error types for the packaging pipeline.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::entry::OriginId;

/// Result type for pipeline operations.
pub type PackResult<T> = Result<T, PackError>;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Configure,
    Collect,
    Filter,
    Merge,
    Remap,
    Write,
    Digest,
    Sign,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configure => "configure",
            Self::Collect => "collect",
            Self::Filter => "filter",
            Self::Merge => "merge",
            Self::Remap => "remap",
            Self::Write => "write",
            Self::Digest => "digest",
            Self::Sign => "sign",
        };
        f.write_str(name)
    }
}

/// Terminal pipeline failure. The first failure aborts the run.
#[derive(Debug, Error)]
pub enum PackError {
    /// Origin unreadable, or an entry's declared size disagrees with its content.
    #[error("collection failed in origin '{origin}'{}: {reason}", path_suffix(.path))]
    Collection {
        origin: OriginId,
        path: Option<String>,
        reason: String,
    },

    /// A class entry is not a well-formed class file.
    #[error("remap failed for '{path}' (origin '{origin}'): {reason}")]
    Remap {
        path: String,
        origin: OriginId,
        reason: String,
    },

    /// I/O failure while assembling or publishing the archive.
    #[error("write failed for '{path}': {reason}")]
    Write { path: String, reason: String },

    /// The produced archive could not be read back for hashing.
    #[error("digest failed for {}: {source}", .path.display())]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configured signing credential is unusable, or the signature could not be written.
    #[error("signing failed: {reason}")]
    Signing { reason: String },

    /// Mapping table could not be loaded.
    #[error("mapping table {}: {reason}", .path.display())]
    Mapping { path: PathBuf, reason: String },

    /// Invalid configuration detected before the pipeline starts.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

fn path_suffix(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" at '{}'", p),
        None => String::new(),
    }
}

impl PackError {
    pub(crate) fn collection(
        origin: &OriginId,
        path: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Collection {
            origin: origin.clone(),
            path: path.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn signing(reason: impl Into<String>) -> Self {
        Self::Signing {
            reason: reason.into(),
        }
    }

    /// Stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Collection { .. } => Stage::Collect,
            Self::Remap { .. } => Stage::Remap,
            Self::Write { .. } => Stage::Write,
            Self::Digest { .. } => Stage::Digest,
            Self::Signing { .. } => Stage::Sign,
            Self::Mapping { .. } | Self::Config { .. } => Stage::Configure,
        }
    }

    /// Logical path of the offending entry, when the failure is tied to one.
    pub fn logical_path(&self) -> Option<&str> {
        match self {
            Self::Collection { path, .. } => path.as_deref(),
            Self::Remap { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Origin the offending entry came from, when known.
    pub fn origin(&self) -> Option<&OriginId> {
        match self {
            Self::Collection { origin, .. } | Self::Remap { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Mapping { .. } | Self::Config { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_error_names_origin_and_path() {
        let err = PackError::collection(
            &OriginId::new("dep-a.jar"),
            Some("com/example/Main.class"),
            "declared size 10 but read 4 bytes",
        );
        let msg = err.to_string();
        assert!(msg.contains("dep-a.jar"));
        assert!(msg.contains("com/example/Main.class"));
        assert_eq!(err.stage(), Stage::Collect);
        assert_eq!(err.logical_path(), Some("com/example/Main.class"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_collection_error_without_path() {
        let err = PackError::collection(&OriginId::new("classes"), None, "not found");
        assert_eq!(
            err.to_string(),
            "collection failed in origin 'classes': not found"
        );
        assert!(err.logical_path().is_none());
    }

    #[test]
    fn test_config_errors_map_to_usage_exit_code() {
        let err = PackError::Config {
            message: "no origins".into(),
        };
        assert_eq!(err.stage(), Stage::Configure);
        assert_eq!(err.exit_code(), 2);
    }
}
