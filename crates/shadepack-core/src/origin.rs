//! Origins: the read-only trees that contribute entries.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entry::{normalize_logical_path, Entry, OriginId};
use crate::error::{PackError, PackResult};

/// Where an origin's entries live.
#[derive(Debug, Clone)]
pub enum OriginSource {
    /// Compiled output directory (classes + resources).
    Directory(PathBuf),
    /// Zip/jar archive of a shaded dependency.
    Archive(PathBuf),
    /// In-memory tree of `(path, bytes)` pairs.
    Memory(Vec<(String, Vec<u8>)>),
}

/// One source tree in a [`DependencySet`].
#[derive(Debug, Clone)]
pub struct Origin {
    pub id: OriginId,
    pub source: OriginSource,
}

impl Origin {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: OriginId::new(label_for(&path)),
            source: OriginSource::Directory(path),
        }
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: OriginId::new(label_for(&path)),
            source: OriginSource::Archive(path),
        }
    }

    pub fn memory<P, C>(id: &str, files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        Self {
            id: OriginId::new(id),
            source: OriginSource::Memory(
                files
                    .into_iter()
                    .map(|(p, c)| (p.into(), c.into()))
                    .collect(),
            ),
        }
    }

    /// Directory or archive, decided by what exists on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::directory(path)
        } else {
            Self::archive(path)
        }
    }

    /// Override the identifier shown in errors and logs.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = OriginId::new(id);
        self
    }

    /// Read every entry, sorted by logical path (stable for duplicates).
    pub fn read_entries(&self) -> PackResult<Vec<Entry>> {
        let mut entries = match &self.source {
            OriginSource::Directory(root) => read_directory(&self.id, root)?,
            OriginSource::Archive(path) => read_archive(&self.id, path)?,
            OriginSource::Memory(files) => read_memory(&self.id, files)?,
        };
        entries.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(entries)
    }
}

fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ordered origins: module output first, then shaded dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    origins: Vec<Origin>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, origin: Origin) {
        self.origins.push(origin);
    }

    pub fn with(mut self, origin: Origin) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }
}

impl FromIterator<Origin> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Origin>>(iter: I) -> Self {
        Self {
            origins: iter.into_iter().collect(),
        }
    }
}

fn logical_path(origin: &OriginId, raw: &str) -> PackResult<String> {
    normalize_logical_path(raw)
        .ok_or_else(|| PackError::collection(origin, Some(raw), "invalid logical path"))
}

fn read_directory(origin: &OriginId, root: &Path) -> PackResult<Vec<Entry>> {
    if !root.is_dir() {
        return Err(PackError::collection(
            origin,
            None,
            format!("directory not found: {}", root.display()),
        ));
    }

    let mut entries = Vec::new();
    for item in WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let item = item.map_err(|e| PackError::collection(origin, None, e.to_string()))?;
        let relative = item
            .path()
            .strip_prefix(root)
            .map_err(|e| PackError::collection(origin, None, e.to_string()))?;
        let raw = relative.to_string_lossy();

        if item.file_type().is_dir() {
            let path = logical_path(origin, &raw)?;
            entries.push(Entry::directory(&path, origin.clone()));
            continue;
        }

        let path = logical_path(origin, &raw)?;
        let io_err = |e: std::io::Error| PackError::collection(origin, Some(&path), e.to_string());
        // Size and content both come from the opened handle, so symlinks resolve once.
        let mut file = File::open(item.path()).map_err(io_err)?;
        let declared = file.metadata().map_err(io_err)?.len();
        let mut content = Vec::with_capacity(declared.min(64 * 1024 * 1024) as usize);
        file.read_to_end(&mut content).map_err(io_err)?;
        check_size(origin, &path, declared, content.len())?;
        entries.push(Entry::new(path, content, origin.clone()));
    }
    Ok(entries)
}

fn read_archive(origin: &OriginId, path: &Path) -> PackResult<Vec<Entry>> {
    let file = File::open(path).map_err(|e| {
        PackError::collection(origin, None, format!("{}: {}", path.display(), e))
    })?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| PackError::collection(origin, None, format!("corrupt archive: {}", e)))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| PackError::collection(origin, None, format!("entry #{}: {}", index, e)))?;
        let path = logical_path(origin, file.name())?;

        if file.is_dir() {
            entries.push(Entry::directory(&path, origin.clone()));
            continue;
        }

        let declared = file.size();
        let mut content = Vec::with_capacity(declared.min(64 * 1024 * 1024) as usize);
        file.read_to_end(&mut content)
            .map_err(|e| PackError::collection(origin, Some(&path), e.to_string()))?;
        check_size(origin, &path, declared, content.len())?;
        entries.push(Entry::new(path, content, origin.clone()));
    }
    Ok(entries)
}

fn read_memory(origin: &OriginId, files: &[(String, Vec<u8>)]) -> PackResult<Vec<Entry>> {
    files
        .iter()
        .map(|(raw, content)| {
            let path = logical_path(origin, raw)?;
            Ok(Entry::new(path, content.clone(), origin.clone()))
        })
        .collect()
}

fn check_size(origin: &OriginId, path: &str, declared: u64, actual: usize) -> PackResult<()> {
    if declared != actual as u64 {
        return Err(PackError::collection(
            origin,
            Some(path),
            format!(
                "declared size {} does not match content length {}",
                declared, actual
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_read_directory_sorted_with_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("com/example")).unwrap();
        std::fs::write(tmp.path().join("com/example/B.class"), b"b").unwrap();
        std::fs::write(tmp.path().join("com/example/A.class"), b"a").unwrap();
        std::fs::write(tmp.path().join("readme.txt"), b"hi").unwrap();

        let entries = Origin::directory(tmp.path()).read_entries().unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path()).collect();
        assert_eq!(
            paths,
            vec![
                "com/",
                "com/example/",
                "com/example/A.class",
                "com/example/B.class",
                "readme.txt"
            ]
        );
        assert_eq!(entries[0].kind(), EntryKind::Directory);
    }

    #[test]
    fn test_missing_directory_is_collection_error() {
        let err = Origin::directory("/definitely/not/here")
            .read_entries()
            .unwrap_err();
        assert!(matches!(err, PackError::Collection { .. }));
    }

    #[test]
    fn test_read_archive_entries() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("dep.jar");
        {
            let file = File::create(&jar).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            zip.add_directory("META-INF/", options).unwrap();
            zip.start_file("META-INF/services/com.example.Provider", options)
                .unwrap();
            zip.write_all(b"com.example.Impl\n").unwrap();
            zip.finish().unwrap();
        }

        let origin = Origin::from_path(&jar);
        assert_eq!(origin.id.as_str(), "dep.jar");
        let entries = origin.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind(), EntryKind::ServiceDescriptor);
        assert_eq!(entries[1].content(), b"com.example.Impl\n");
    }

    #[test]
    fn test_corrupt_archive_is_collection_error() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("broken.jar");
        std::fs::write(&jar, b"definitely not a zip").unwrap();
        let err = Origin::archive(&jar).read_entries().unwrap_err();
        assert!(err.to_string().contains("broken.jar"));
    }

    #[test]
    fn test_memory_origin_rejects_traversal() {
        let origin = Origin::memory("mem", [("../escape.txt", b"x".to_vec())]);
        let err = origin.read_entries().unwrap_err();
        assert_eq!(err.logical_path(), Some("../escape.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_and_directories_are_followed() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("shared");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("Util.class"), b"util").unwrap();
        let classes = tmp.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        std::fs::write(classes.join("real.txt"), b"the real resource content").unwrap();
        std::os::unix::fs::symlink(classes.join("real.txt"), classes.join("linked.txt")).unwrap();
        std::os::unix::fs::symlink(&shared, classes.join("lib")).unwrap();

        let entries = Origin::directory(&classes).read_entries().unwrap();
        let by_path = |p: &str| entries.iter().find(|e| e.path() == p).unwrap();
        assert_eq!(by_path("linked.txt").content(), b"the real resource content");
        assert_eq!(by_path("lib/").kind(), EntryKind::Directory);
        assert_eq!(by_path("lib/Util.class").content(), b"util");
    }

    #[test]
    fn test_archive_size_mismatch_is_collection_error() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("lying.jar");
        let mut bytes = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut bytes));
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zip.start_file("a.txt", options).unwrap();
            zip.write_all(b"abcd").unwrap();
            zip.finish().unwrap();
        }
        // Shrink the uncompressed size in the central directory record.
        let central = bytes
            .windows(4)
            .rposition(|w| w == [0x50, 0x4B, 0x01, 0x02])
            .unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&2u32.to_le_bytes());
        std::fs::write(&jar, &bytes).unwrap();

        let err = Origin::archive(&jar).read_entries().unwrap_err();
        assert!(matches!(err, PackError::Collection { .. }), "{err}");
        assert_eq!(err.origin().map(|o| o.as_str()), Some("lying.jar"));
    }

    #[test]
    fn test_size_mismatch_detected() {
        let err = check_size(&OriginId::new("o"), "a.txt", 10, 4).unwrap_err();
        assert!(err.to_string().contains("declared size 10"));
    }
}
