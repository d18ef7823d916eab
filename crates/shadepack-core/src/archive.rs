//! Deterministic jar writer.
//!
//! # Layout
//!
//! ```text
//! META-INF/
//! META-INF/MANIFEST.MF      (when present)
//! <every other entry, byte-wise path order>
//! ```
//!
//! Parent directories are synthesized right before their first child.
//! Timestamps, permissions and compression are fixed, so equal inputs
//! produce equal bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::entry::{Entry, EntryKind, MANIFEST_PATH};
use crate::error::{PackError, PackResult};

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

/// Default archive name pattern.
pub const DEFAULT_NAME_TEMPLATE: &str = "{name}-{version}-{classifier}.jar";

/// Uniform compression applied to every file entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Self::Deflated => CompressionMethod::Deflated,
            Self::Stored => CompressionMethod::Stored,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deflated => "deflated",
            Self::Stored => "stored",
        })
    }
}

/// One item of the final archive, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutItem<'a> {
    Directory(String),
    File(&'a Entry),
}

impl LayoutItem<'_> {
    pub fn path(&self) -> &str {
        match self {
            Self::Directory(path) => path,
            Self::File(entry) => entry.path(),
        }
    }
}

/// Compute the write order for `entries`.
pub fn layout(
    entries: &BTreeMap<String, Entry>,
    preserve_empty_directories: bool,
) -> Vec<LayoutItem<'_>> {
    let mut items = Vec::with_capacity(entries.len());
    let mut emitted = BTreeSet::new();

    if let Some(manifest) = entries.get(MANIFEST_PATH) {
        push_parents(MANIFEST_PATH, &mut emitted, &mut items);
        items.push(LayoutItem::File(manifest));
    }

    for (path, entry) in entries {
        match entry.kind() {
            EntryKind::Directory => {
                // Non-empty directories are synthesized from their children.
                if preserve_empty_directories {
                    push_parents(path, &mut emitted, &mut items);
                    if emitted.insert(path.clone()) {
                        items.push(LayoutItem::Directory(path.clone()));
                    }
                }
            }
            _ if path == MANIFEST_PATH => {}
            _ => {
                push_parents(path, &mut emitted, &mut items);
                items.push(LayoutItem::File(entry));
            }
        }
    }
    items
}

fn push_parents(path: &str, emitted: &mut BTreeSet<String>, items: &mut Vec<LayoutItem<'_>>) {
    for (idx, _) in path.match_indices('/') {
        let dir = &path[..=idx];
        if dir.len() == path.len() {
            break;
        }
        if emitted.insert(dir.to_string()) {
            items.push(LayoutItem::Directory(dir.to_string()));
        }
    }
}

/// Summary of a finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub path: PathBuf,
    pub files: usize,
    pub directories: usize,
}

/// Writes entries as a reproducible zip/jar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveWriter {
    compression: Compression,
    preserve_empty_directories: bool,
}

impl ArchiveWriter {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            preserve_empty_directories: false,
        }
    }

    pub fn preserve_empty_directories(mut self, preserve: bool) -> Self {
        self.preserve_empty_directories = preserve;
        self
    }

    /// Write to `dest` through a temporary file in the same directory.
    ///
    /// `dest` only ever holds a complete archive; on failure the temporary
    /// file is dropped and nothing is published.
    pub fn write_file(
        &self,
        entries: &BTreeMap<String, Entry>,
        dest: &Path,
    ) -> PackResult<Written> {
        let dest_display = dest.display().to_string();
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| PackError::write(&dest_display, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| PackError::write(&dest_display, e))?;
        let (files, directories) = self.write_to(entries, tmp.as_file_mut())?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| PackError::write(&dest_display, e))?;
        tmp.persist(dest)
            .map_err(|e| PackError::write(&dest_display, e.error))?;

        debug!(path = %dest_display, files, directories, "archive persisted");
        Ok(Written {
            path: dest.to_path_buf(),
            files,
            directories,
        })
    }

    /// Write the archive to any seekable sink. Returns (files, directories).
    pub fn write_to<W: Write + Seek>(
        &self,
        entries: &BTreeMap<String, Entry>,
        sink: W,
    ) -> PackResult<(usize, usize)> {
        let mut zip = ZipWriter::new(sink);
        let file_options = SimpleFileOptions::default()
            .compression_method(self.compression.method())
            .last_modified_time(DateTime::default())
            .unix_permissions(FILE_MODE);
        let dir_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default())
            .unix_permissions(DIR_MODE);

        let mut files = 0;
        let mut directories = 0;
        for item in layout(entries, self.preserve_empty_directories) {
            match item {
                LayoutItem::Directory(path) => {
                    zip.add_directory(path.as_str(), dir_options)
                        .map_err(|e| PackError::write(&path, e))?;
                    directories += 1;
                }
                LayoutItem::File(entry) => {
                    zip.start_file(entry.path(), file_options)
                        .map_err(|e| PackError::write(entry.path(), e))?;
                    zip.write_all(entry.content())
                        .map_err(|e| PackError::write(entry.path(), e))?;
                    files += 1;
                }
            }
        }
        zip.finish()
            .map_err(|e| PackError::write("<central directory>", e))?;
        Ok((files, directories))
    }
}

/// Expand `{name}`, `{version}` and `{classifier}` in `template`.
///
/// An empty classifier also removes the `-` in front of it.
pub fn archive_file_name(template: &str, name: &str, version: &str, classifier: &str) -> String {
    let template = if classifier.is_empty() {
        template.replace("-{classifier}", "")
    } else {
        template.to_string()
    };
    template
        .replace("{name}", name)
        .replace("{version}", version)
        .replace("{classifier}", classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::OriginId;
    use std::io::{Cursor, Read};

    fn entries(paths: &[&str]) -> BTreeMap<String, Entry> {
        paths
            .iter()
            .map(|p| {
                let entry = Entry::new(*p, p.as_bytes().to_vec(), OriginId::new("test"));
                (p.to_string(), entry)
            })
            .collect()
    }

    fn paths(items: &[LayoutItem<'_>]) -> Vec<String> {
        items.iter().map(|i| i.path().to_string()).collect()
    }

    #[test]
    fn test_manifest_first_then_sorted_with_parents() {
        let entries = entries(&["com/b/B.class", "META-INF/MANIFEST.MF", "com/a/A.class", "Z.txt"]);
        assert_eq!(
            paths(&layout(&entries, false)),
            vec![
                "META-INF/",
                "META-INF/MANIFEST.MF",
                "Z.txt",
                "com/",
                "com/a/",
                "com/a/A.class",
                "com/b/",
                "com/b/B.class",
            ]
        );
    }

    #[test]
    fn test_empty_directories_only_when_preserved() {
        let entries = entries(&["assets/empty/", "assets/x.txt"]);
        assert_eq!(paths(&layout(&entries, false)), vec!["assets/", "assets/x.txt"]);
        assert_eq!(
            paths(&layout(&entries, true)),
            vec!["assets/", "assets/empty/", "assets/x.txt"]
        );
    }

    #[test]
    fn test_archive_name_template() {
        assert_eq!(
            archive_file_name(DEFAULT_NAME_TEMPLATE, "ExampleMod", "1.5.0-pre2", ""),
            "ExampleMod-1.5.0-pre2.jar"
        );
        assert_eq!(
            archive_file_name(DEFAULT_NAME_TEMPLATE, "ExampleMod", "1.5.0", "all"),
            "ExampleMod-1.5.0-all.jar"
        );
    }

    #[test]
    fn test_written_archive_is_reproducible_and_readable() {
        let entries = entries(&["META-INF/MANIFEST.MF", "com/a/A.class", "data/x.bin"]);
        let writer = ArchiveWriter::new(Compression::Deflated);

        let mut first = Cursor::new(Vec::new());
        let mut second = Cursor::new(Vec::new());
        writer.write_to(&entries, &mut first).unwrap();
        writer.write_to(&entries, &mut second).unwrap();
        assert_eq!(first.get_ref(), second.get_ref());

        let mut zip = zip::ZipArchive::new(Cursor::new(first.into_inner())).unwrap();
        assert_eq!(zip.by_index(0).unwrap().name(), "META-INF/");
        assert_eq!(zip.by_index(1).unwrap().name(), "META-INF/MANIFEST.MF");
        let mut content = String::new();
        zip.by_name("com/a/A.class")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "com/a/A.class");
    }

    #[test]
    fn test_write_file_publishes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("libs").join("out.jar");
        let written = ArchiveWriter::new(Compression::Stored)
            .write_file(&entries(&["a.txt"]), &dest)
            .unwrap();
        assert_eq!(written.files, 1);
        assert!(dest.exists());
        // Only the final archive is left behind.
        let names: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.jar")]);
    }

    #[test]
    fn test_failed_publish_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let libs = dir.path().join("libs");
        // A directory already sits where the archive should go.
        let dest = libs.join("out.jar");
        std::fs::create_dir_all(&dest).unwrap();

        let err = ArchiveWriter::default()
            .write_file(&entries(&["a.txt"]), &dest)
            .unwrap_err();
        assert!(matches!(err, PackError::Write { .. }), "{err}");
        assert!(dest.is_dir());
        let names: Vec<_> = std::fs::read_dir(&libs)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.jar")]);
    }

    #[test]
    fn test_unusable_destination_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("libs");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let dest = blocker.join("out.jar");

        let err = ArchiveWriter::default()
            .write_file(&entries(&["a.txt"]), &dest)
            .unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Write);
        assert!(!dest.exists());
        assert_eq!(std::fs::read(&blocker).unwrap(), b"not a directory");
    }
}
