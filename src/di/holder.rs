use crate::descriptor::ClassSource;
use crate::factory::BeanFactory;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The application a context is created for.
///
/// The holder names the entry type whose markers configure the scan, owns
/// the data folder configuration files live in, and provides the archive
/// the entry type was loaded from.
pub trait ContextHolder: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn data_folder(&self) -> &Path;

    /// Qualified name of the type carrying the boot markers.
    fn entry_type(&self) -> &str;

    /// Archive containing the entry type.
    fn root(&self) -> Arc<dyn ClassSource>;

    /// Additional archives that may contribute scan roots.
    fn libraries(&self) -> Vec<Arc<dyn ClassSource>> {
        Vec::new()
    }

    /// Host class path consulted when a type is not in its own archive.
    fn class_path(&self) -> Option<Arc<dyn ClassSource>> {
        None
    }

    /// Factory instance for a factory type named by a boot marker.
    fn factory(&self, factory_type: &str) -> Option<Arc<dyn BeanFactory>> {
        let _ = factory_type;
        None
    }
}

/// Supplies extra archives when a context initializes, e.g. downloaded
/// dependencies.
pub trait LibraryResolver: Send + Sync {
    fn resolve(&self, holder: &dyn ContextHolder) -> anyhow::Result<Vec<Arc<dyn ClassSource>>>;
}

/// A [`ContextHolder`] assembled from plain values.
///
/// # Example
///
/// ```rust,ignore
/// let holder = StandardHolder::new("acme", "com.acme.App", "plugins/acme", root)
///     .version("1.2.0")
///     .library(Arc::new(ArchiveSource::open("libs/extras.jar")?));
/// ```
#[derive(Clone)]
pub struct StandardHolder {
    name: String,
    version: String,
    entry_type: String,
    data_folder: PathBuf,
    root: Arc<dyn ClassSource>,
    libraries: Vec<Arc<dyn ClassSource>>,
    class_path: Option<Arc<dyn ClassSource>>,
    factories: HashMap<String, Arc<dyn BeanFactory>>,
}

impl StandardHolder {
    pub fn new(
        name: impl Into<String>,
        entry_type: impl Into<String>,
        data_folder: impl Into<PathBuf>,
        root: Arc<dyn ClassSource>,
    ) -> Self {
        Self {
            name: name.into(),
            version: "0.0.0".to_string(),
            entry_type: entry_type.into(),
            data_folder: data_folder.into(),
            root,
            libraries: Vec::new(),
            class_path: None,
            factories: HashMap::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn library(mut self, library: Arc<dyn ClassSource>) -> Self {
        self.libraries.push(library);
        self
    }

    pub fn class_path(mut self, class_path: Arc<dyn ClassSource>) -> Self {
        self.class_path = Some(class_path);
        self
    }

    /// Makes `factory` available to `RegisterFactory` markers naming
    /// `factory_type`.
    pub fn factory(mut self, factory_type: impl Into<String>, factory: Arc<dyn BeanFactory>) -> Self {
        self.factories.insert(factory_type.into(), factory);
        self
    }
}

impl ContextHolder for StandardHolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    fn entry_type(&self) -> &str {
        &self.entry_type
    }

    fn root(&self) -> Arc<dyn ClassSource> {
        Arc::clone(&self.root)
    }

    fn libraries(&self) -> Vec<Arc<dyn ClassSource>> {
        self.libraries.clone()
    }

    fn class_path(&self) -> Option<Arc<dyn ClassSource>> {
        self.class_path.clone()
    }

    fn factory(&self, factory_type: &str) -> Option<Arc<dyn BeanFactory>> {
        self.factories.get(factory_type).cloned()
    }
}

impl fmt::Debug for StandardHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardHolder")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("entry_type", &self.entry_type)
            .field("data_folder", &self.data_folder)
            .field("root", &self.root.location())
            .field("libraries", &self.libraries.len())
            .finish()
    }
}
