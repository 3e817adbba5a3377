//! Byte lookup for compiled classes.
//!
//! A [`ClassSource`] answers "give me the bytes stored at this path", where
//! paths use `/` separators the way archives do (`com/acme/Service.class`).
//! Descriptor caches never touch the filesystem directly; they go through
//! whichever sources they were built with.

use super::error::{DescriptorError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::result::ZipError;

pub trait ClassSource: Send + Sync {
    /// Human-readable location, used in logs and errors.
    fn location(&self) -> String;

    /// Bytes stored at `path`, or `None` if this source has no such entry.
    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Every entry path this source can enumerate.
    fn entries(&self) -> Result<Vec<String>>;
}

/// In-memory entries, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    location: String,
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.entries.insert(path.into(), bytes);
        self
    }

    /// Stores class bytes under the path derived from a dotted name.
    pub fn insert_class(&mut self, name: &str, bytes: Vec<u8>) -> &mut Self {
        self.insert(format!("{}.class", name.replace('.', "/")), bytes)
    }

    pub fn with_class(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.insert_class(name, bytes);
        self
    }

    pub fn with_entry(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl ClassSource for MemorySource {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(path).cloned())
    }

    fn entries(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// A zip or jar archive on disk.
pub struct ArchiveSource {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

impl ArchiveSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file)
            .map_err(|e| DescriptorError::archive(path.display().to_string(), e.to_string()))?;
        Ok(Self {
            path,
            archive: Mutex::new(archive),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ClassSource for ArchiveSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = self.archive.lock();
        let mut entry = match archive.by_name(path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(DescriptorError::archive(self.location(), e.to_string())),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    fn entries(&self) -> Result<Vec<String>> {
        Ok(self
            .archive
            .lock()
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect())
    }
}

/// An exploded class directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassSource for DirectorySource {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.root.join(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| DescriptorError::archive(self.location(), e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let path: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                entries.push(path.join("/"));
            }
        }
        Ok(entries)
    }
}

/// Ordered chain of sources; the first source holding an entry wins.
#[derive(Clone, Default)]
pub struct CompositeSource {
    sources: Vec<Arc<dyn ClassSource>>,
}

impl CompositeSource {
    pub fn new(sources: Vec<Arc<dyn ClassSource>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Arc<dyn ClassSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ClassSource for CompositeSource {
    fn location(&self) -> String {
        let locations: Vec<_> = self.sources.iter().map(|s| s.location()).collect();
        format!("[{}]", locations.join(", "))
    }

    fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        for source in &self.sources {
            if let Some(bytes) = source.fetch(path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn entries(&self) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        for source in &self.sources {
            for entry in source.entries()? {
                if !entries.contains(&entry) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }
}
