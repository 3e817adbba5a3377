//! Per-scan-root descriptor memoization.

use super::error::{DescriptorError, Result};
use super::parser;
use super::source::ClassSource;
use super::types::TypeDescriptor;
use dashmap::{DashMap, DashSet};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};

type Slot = Arc<OnceCell<Arc<TypeDescriptor>>>;

struct CacheInner {
    entries: DashMap<String, Slot>,
    /// Names no source could provide.
    missing: DashSet<String>,
    archive: Option<Arc<dyn ClassSource>>,
    host: Option<Arc<dyn ClassSource>>,
}

/// Maps qualified names to parsed descriptors for one scan root.
///
/// Lookups try the archive first and then the host class path. Each name
/// gets its own once-cell, so a name is parsed at most once and lookups of
/// different names never wait on each other. Names that no source holds
/// are remembered and not fetched again.
///
/// # Example
///
/// ```rust,ignore
/// let archive = ArchiveSource::open("plugins/acme.jar")?;
/// let cache = DescriptorCache::new(Some(Arc::new(archive)), Some(host_class_path));
///
/// let service = cache.resolve("com.acme.Service")?;
/// assert!(Arc::ptr_eq(&service, &cache.resolve("com.acme.Service")?));
/// ```
#[derive(Clone)]
pub struct DescriptorCache {
    inner: Arc<CacheInner>,
}

impl DescriptorCache {
    pub fn new(
        archive: Option<Arc<dyn ClassSource>>,
        host: Option<Arc<dyn ClassSource>>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                missing: DashSet::new(),
                archive,
                host,
            }),
        }
    }

    /// The archive this cache scans, if any.
    pub fn archive(&self) -> Option<&Arc<dyn ClassSource>> {
        self.inner.archive.as_ref()
    }

    /// Resolves a descriptor by dotted or slash-separated name.
    ///
    /// Repeated lookups of one name return the same `Arc`.
    pub fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        resolve_in(&self.inner, name)
    }

    /// Whether `name` has already been parsed.
    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .entries
            .get(&normalize(name))
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Number of parsed descriptors.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn handle(&self) -> CacheHandle {
        CacheHandle(Arc::downgrade(&self.inner))
    }
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field(
                "archive",
                &self.inner.archive.as_ref().map(|source| source.location()),
            )
            .field("entries", &self.inner.entries.len())
            .finish()
    }
}

/// Non-owning link from a descriptor back to the cache that produced it.
#[derive(Clone)]
pub(crate) struct CacheHandle(Weak<CacheInner>);

impl CacheHandle {
    pub(crate) fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        match self.0.upgrade() {
            Some(inner) => resolve_in(&inner, name),
            None => Err(DescriptorError::not_found(format!(
                "{name} (descriptor cache released)"
            ))),
        }
    }
}

fn resolve_in(inner: &Arc<CacheInner>, name: &str) -> Result<Arc<TypeDescriptor>> {
    let name = normalize(name);
    if inner.missing.contains(&name) {
        return Err(DescriptorError::not_found(name));
    }
    let slot: Slot = Arc::clone(
        &inner
            .entries
            .entry(name.clone())
            .or_insert_with(|| Arc::new(OnceCell::new())),
    );
    let resolved = slot.get_or_try_init(|| load(inner, &name)).cloned();
    if matches!(&resolved, Err(err) if err.is_not_found()) {
        inner.entries.remove(&name);
        inner.missing.insert(name);
    }
    resolved
}

fn load(inner: &Arc<CacheInner>, name: &str) -> Result<Arc<TypeDescriptor>> {
    let path = format!("{}.class", name.replace('.', "/"));
    let mut bytes = None;
    for source in inner.archive.iter().chain(inner.host.iter()) {
        if let Some(found) = source.fetch(&path)? {
            tracing::trace!("Loading {} from {}", name, source.location());
            bytes = Some(found);
            break;
        }
    }
    let bytes = bytes.ok_or_else(|| DescriptorError::not_found(name))?;
    let handle = CacheHandle(Arc::downgrade(inner));
    let descriptor = parser::parse(&bytes, handle)?;
    if descriptor.name() != name {
        return Err(DescriptorError::NameMismatch {
            expected: name.to_string(),
            actual: descriptor.name().to_string(),
        });
    }
    Ok(Arc::new(descriptor))
}

fn normalize(name: &str) -> String {
    name.trim_end_matches(".class").replace('/', ".")
}
