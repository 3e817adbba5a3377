//! Resource lookup by URI.
//!
//! | form                 | looked up in                               |
//! |----------------------|--------------------------------------------|
//! | `classpath:a/b.yml`  | host class path                            |
//! | `context:a/b.yml`    | the holder's root archive, then class path |
//! | `bundled:a/b.yml`    | the holder's root archive only             |
//! | `file:///abs/b.yml`  | the file system                            |
//! | `a/b.yml`            | the data folder                            |

use super::container::Context;
use crate::descriptor::ClassSource;
use crate::error::{ContextError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const CLASSPATH_SCHEME: &str = "classpath:";
pub const CONTEXT_SCHEME: &str = "context:";
pub const BUNDLED_SCHEME: &str = "bundled:";
pub const FILE_SCHEME: &str = "file:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    ClassPath(String),
    Context(String),
    Bundled(String),
    File(PathBuf),
    DataFolder(PathBuf),
}

impl Location {
    pub(crate) fn parse(uri: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(ContextError::resource(uri, "uri must not be blank"));
        }
        let normalized = uri.replace('\\', "/");
        if let Some(path) = normalized.strip_prefix(CLASSPATH_SCHEME) {
            return Ok(Location::ClassPath(entry_path(uri, path)?));
        }
        if let Some(path) = normalized.strip_prefix(CONTEXT_SCHEME) {
            return Ok(Location::Context(entry_path(uri, path)?));
        }
        if let Some(path) = normalized.strip_prefix(BUNDLED_SCHEME) {
            return Ok(Location::Bundled(entry_path(uri, path)?));
        }
        if let Some(rest) = normalized.strip_prefix(FILE_SCHEME) {
            let path = match rest.strip_prefix("//") {
                Some(authority_and_path) => match authority_and_path.find('/') {
                    Some(slash) => &authority_and_path[slash..],
                    None => "",
                },
                None => rest,
            };
            if !path.starts_with('/') {
                return Err(ContextError::resource(uri, "file uri must be absolute"));
            }
            return Ok(Location::File(PathBuf::from(path)));
        }
        if let Some(scheme) = scheme_of(&normalized) {
            return Err(ContextError::resource(
                uri,
                format!("unsupported scheme '{scheme}'"),
            ));
        }
        if normalized.starts_with('/') {
            return Err(ContextError::resource(
                uri,
                "relative resource must not start with '/'",
            ));
        }
        Ok(Location::DataFolder(PathBuf::from(normalized)))
    }

    /// Path of the file backing this location, if it is file-backed.
    pub(crate) fn file(&self, data_folder: &Path) -> Option<PathBuf> {
        match self {
            Location::File(path) => Some(path.clone()),
            Location::DataFolder(path) => Some(data_folder.join(path)),
            _ => None,
        }
    }
}

fn entry_path(uri: &str, path: &str) -> Result<String> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Err(ContextError::resource(uri, "missing resource path"));
    }
    Ok(path.to_string())
}

/// `scheme` of `scheme:rest`; a single letter is a drive, not a scheme.
fn scheme_of(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = scheme.len() > 1
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Lower-cased extension of the last path segment of `uri`.
pub(crate) fn extension(uri: &str) -> Option<String> {
    let name = uri.rsplit(['/', '\\', ':']).next()?;
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Whether `uri` is a well-formed resource uri.
pub fn is_valid_uri(uri: &str) -> bool {
    Location::parse(uri).is_ok()
}

impl Context {
    /// Bytes of the resource at `uri`, or `None` when it does not exist.
    pub fn resource(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        let bytes = match Location::parse(uri)? {
            Location::ClassPath(path) => match self.host_class_path() {
                Some(class_path) => fetch(uri, class_path.as_ref(), &path)?,
                None => None,
            },
            Location::Bundled(path) => fetch(uri, self.holder().root().as_ref(), &path)?,
            Location::Context(path) => match fetch(uri, self.holder().root().as_ref(), &path)? {
                Some(bytes) => Some(bytes),
                None => match self.host_class_path() {
                    Some(class_path) => fetch(uri, class_path.as_ref(), &path)?,
                    None => None,
                },
            },
            location @ (Location::File(_) | Location::DataFolder(_)) => {
                match location.file(self.data_folder()) {
                    Some(file) => read_file(uri, &file)?,
                    None => None,
                }
            }
        };
        debug!(
            "Resource '{}' {}",
            uri,
            if bytes.is_some() { "found" } else { "not found" }
        );
        Ok(bytes)
    }

    /// File backing `uri`, for `file:` and data-folder uris.
    pub fn resource_file(&self, uri: &str) -> Result<Option<PathBuf>> {
        Ok(Location::parse(uri)?.file(self.data_folder()))
    }

    fn host_class_path(&self) -> Option<Arc<dyn ClassSource>> {
        self.class_path().or_else(|| self.holder().class_path())
    }
}

fn fetch(uri: &str, source: &dyn ClassSource, path: &str) -> Result<Option<Vec<u8>>> {
    source
        .fetch(path)
        .map_err(|err| ContextError::resource(uri, err.to_string()))
}

fn read_file(uri: &str, file: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(file) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ContextError::resource(uri, err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigService;
    use crate::descriptor::MemorySource;
    use crate::di::{ContextBuilder, StandardHolder};

    fn context(data_folder: &Path) -> Context {
        let root = MemorySource::new("root.jar")
            .with_entry("config.yml", b"root: true".to_vec())
            .with_entry("shared.yml", b"from: root".to_vec());
        let class_path = MemorySource::new("host")
            .with_entry("shared.yml", b"from: host".to_vec())
            .with_entry("host-only.yml", b"from: host".to_vec());
        let holder = StandardHolder::new("demo", "com.acme.App", data_folder, Arc::new(root))
            .class_path(Arc::new(class_path));
        ContextBuilder::new(Arc::new(holder))
            .config_service(ConfigService::empty())
            .build()
    }

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            Location::parse("classpath:/a/b.yml").unwrap(),
            Location::ClassPath("a/b.yml".into())
        );
        assert_eq!(
            Location::parse("context:a.yml").unwrap(),
            Location::Context("a.yml".into())
        );
        assert_eq!(
            Location::parse("file:///etc/app.yml").unwrap(),
            Location::File(PathBuf::from("/etc/app.yml"))
        );
        assert_eq!(
            Location::parse("file:/etc/app.yml").unwrap(),
            Location::File(PathBuf::from("/etc/app.yml"))
        );
        assert_eq!(
            Location::parse("conf\\app.yml").unwrap(),
            Location::DataFolder(PathBuf::from("conf/app.yml"))
        );
    }

    #[test]
    fn test_invalid_uris() {
        assert!(!is_valid_uri(""));
        assert!(!is_valid_uri("bundled:"));
        assert!(!is_valid_uri("https://example.com/a.yml"));
        assert!(!is_valid_uri("file:relative.yml"));
        assert!(!is_valid_uri("/absolute.yml"));
        assert!(is_valid_uri("config.yml"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("conf/app.YML").as_deref(), Some("yml"));
        assert_eq!(extension("bundled:data.json").as_deref(), Some("json"));
        assert_eq!(extension("conf/.hidden"), None);
        assert_eq!(extension("conf/README"), None);
    }

    #[test]
    fn test_resource_schemes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("local.yml"), b"local: 1").unwrap();
        let context = context(dir.path());

        assert_eq!(
            context.resource("bundled:config.yml").unwrap().unwrap(),
            b"root: true"
        );
        assert!(context.resource("bundled:host-only.yml").unwrap().is_none());
        assert_eq!(
            context.resource("context:shared.yml").unwrap().unwrap(),
            b"from: root"
        );
        assert_eq!(
            context.resource("context:host-only.yml").unwrap().unwrap(),
            b"from: host"
        );
        assert_eq!(
            context.resource("classpath:shared.yml").unwrap().unwrap(),
            b"from: host"
        );
        assert_eq!(context.resource("local.yml").unwrap().unwrap(), b"local: 1");
        assert!(context.resource("missing.yml").unwrap().is_none());

        let absolute = format!("file://{}", dir.path().join("local.yml").display());
        assert_eq!(context.resource(&absolute).unwrap().unwrap(), b"local: 1");
    }

    #[test]
    fn test_resource_file() {
        let dir = tempfile::tempdir().unwrap();
        let context = context(dir.path());
        assert_eq!(
            context.resource_file("conf/app.yml").unwrap(),
            Some(dir.path().join("conf/app.yml"))
        );
        assert_eq!(context.resource_file("bundled:app.yml").unwrap(), None);
        assert!(context.resource_file("").is_err());
    }
}
