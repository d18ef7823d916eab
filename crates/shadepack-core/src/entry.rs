//! Logical archive entries.

use std::fmt;
use std::sync::Arc;

/// Reserved directory for service-registration descriptors.
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Jar manifest path; always written first.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Identifier of the origin an entry came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OriginId(Arc<str>);

impl OriginId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an entry is, derived from its logical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Class,
    Resource,
    ServiceDescriptor,
    Directory,
}

impl EntryKind {
    /// Classify a normalized logical path.
    pub fn classify(path: &str) -> Self {
        if path.ends_with('/') {
            Self::Directory
        } else if is_service_descriptor(path) {
            Self::ServiceDescriptor
        } else if path.ends_with(".class") {
            Self::Class
        } else {
            Self::Resource
        }
    }
}

/// `META-INF/services/<provider-interface>`, with no nested directories.
pub fn is_service_descriptor(path: &str) -> bool {
    path.strip_prefix(SERVICES_PREFIX)
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

/// One archive entry. Stages never mutate an entry; they build a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: String,
    kind: EntryKind,
    content: Vec<u8>,
    origin: OriginId,
}

impl Entry {
    /// Build an entry; the kind is derived from the path.
    pub fn new(path: impl Into<String>, content: Vec<u8>, origin: OriginId) -> Self {
        let path = path.into();
        let kind = EntryKind::classify(&path);
        let content = if kind == EntryKind::Directory {
            Vec::new()
        } else {
            content
        };
        Self {
            path,
            kind,
            content,
            origin,
        }
    }

    pub fn directory(path: &str, origin: OriginId) -> Self {
        let path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        Self::new(path, Vec::new(), origin)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    /// Same path and origin, new content.
    pub fn with_content(self, content: Vec<u8>) -> Self {
        Self { content, ..self }
    }

    /// Same content and origin, new path (kind re-derived).
    pub fn with_path(self, path: impl Into<String>) -> Self {
        Self::new(path, self.content, self.origin)
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// Normalize an archive-relative path to `/` separators without a leading `/`.
///
/// Returns `None` for empty paths, drive-letter paths, and paths with
/// `.`/`..` segments.
pub fn normalize_logical_path(raw: &str) -> Option<String> {
    let unified = raw.replace('\\', "/");
    let is_dir = unified.ends_with('/');
    let trimmed = unified.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.as_bytes().get(1) == Some(&b':') {
        return None;
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" => continue,
            "." | ".." => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return None;
    }

    let mut path = segments.join("/");
    if is_dir {
        path.push('/');
    }
    Some(path)
}
