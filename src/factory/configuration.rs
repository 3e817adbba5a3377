use super::codec::builtin_codec;
use super::serialization::declared_extension;
use super::{BeanFactory, Codec, binding_for, simple_name};
use crate::di::markers;
use crate::di::{Bean, BeanDefinition, Context, Instance, Location, extension};
use crate::error::{ContextError, Result};
use anyhow::Context as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds configuration objects by decoding a resource.
///
/// The marker's `uri` names the resource; `release`, when set, names a
/// default copy that is written to `uri` when the latter is a missing file.
/// The resource is decoded by the codec registered for its extension, or
/// by the built-in JSON and YAML codecs, and handed to the marked type's
/// deserializable binding.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBeanFactory;

impl ConfigurationBeanFactory {
    pub fn new() -> Self {
        Self
    }
}

struct Source {
    uri: String,
    release: Option<String>,
}

impl Source {
    fn of(definition: &BeanDefinition) -> Self {
        let metadata = definition.metadata();
        let normalize = |value: &str| value.trim().replace('\\', "/");
        Self {
            uri: metadata.str_value("uri").map(normalize).unwrap_or_default(),
            release: metadata
                .str_value("release")
                .map(normalize)
                .filter(|release| !release.is_empty()),
        }
    }
}

impl BeanFactory for ConfigurationBeanFactory {
    fn metadata_type(&self) -> &str {
        markers::CONFIGURATION
    }

    fn validate(&self, context: &Context, definition: &BeanDefinition) -> Result<bool> {
        let label = simple_name(markers::CONFIGURATION);
        let source = Source::of(definition);
        let location = match Location::parse(&source.uri) {
            Ok(location) => location,
            Err(err) => {
                warn!("{}: Invalid configuration uri '{}'. ({})", label, source.uri, err);
                return Ok(false);
            }
        };
        if source.uri.ends_with('/') || !has_codec(context, &source.uri) {
            warn!("{}: Invalid configuration extension '{}'.", label, source.uri);
            return Ok(false);
        }
        if let Some(release) = &source.release {
            if release.ends_with('/') || Location::parse(release).is_err() {
                warn!("{}: Invalid configuration release uri '{}'.", label, release);
                return Ok(false);
            }
            if !has_codec(context, release) {
                warn!("{}: Invalid configuration extension '{}'.", label, release);
                return Ok(false);
            }
        }
        let Some(binding) = binding_for(context, markers::CONFIGURATION, definition) else {
            return Ok(false);
        };
        if !binding.can_decode() {
            warn!(
                "{}: binding {} of '{}' is not deserializable, skip.",
                label,
                binding.rust_name(),
                definition.marked().name()
            );
            return Ok(false);
        }

        if let (Some(release), Some(file)) = (&source.release, location.file(context.data_folder())) {
            if !file.exists() {
                let bytes = context
                    .resource(release)?
                    .ok_or_else(|| ContextError::resource(release.as_str(), "release not found"))?;
                write_file(&source.uri, &file, &bytes)?;
                info!("{}: Released '{}' to '{}'.", label, release, file.display());
            }
        }
        Ok(true)
    }

    fn create(&self, context: &Context, definition: &BeanDefinition) -> Result<Instance> {
        let source = Source::of(definition);
        let (bytes, used) = match context.resource(&source.uri)? {
            Some(bytes) => (bytes, source.uri.as_str()),
            None => {
                let release = source.release.as_deref().ok_or_else(|| {
                    ContextError::resource(source.uri.as_str(), "resource not found")
                })?;
                let bytes = context
                    .resource(release)?
                    .ok_or_else(|| ContextError::resource(release, "release not found"))?;
                if let Some(file) = context.resource_file(&source.uri)? {
                    write_file(&source.uri, &file, &bytes)?;
                    debug!("Restored '{}' from '{}'", source.uri, release);
                }
                (bytes, release)
            }
        };

        let codec = codec_for(context, used)?;
        let value = codec
            .decode(&bytes)
            .with_context(|| format!("failed to decode configuration '{used}'"))?;
        let binding = binding_for(context, markers::CONFIGURATION, definition).ok_or_else(|| {
            ContextError::wiring(format!(
                "no type binding for '{}'",
                definition.marked().name()
            ))
        })?;
        let object = binding.decode(value).ok_or_else(|| {
            ContextError::wiring(format!(
                "binding {} is not deserializable",
                binding.rust_name()
            ))
        })??;
        Ok(Instance::new(object, binding))
    }
}

fn serialization_extensions(context: &Context) -> Vec<(String, Arc<Bean>)> {
    context
        .beans()
        .into_iter()
        .filter(|bean| bean.metadata_type() == markers::SERIALIZATION)
        .filter_map(|bean| declared_extension(bean.definition()).map(|ext| (ext, bean)))
        .collect()
}

fn has_codec(context: &Context, uri: &str) -> bool {
    let Some(extension) = extension(uri) else {
        return false;
    };
    builtin_codec(&extension).is_some()
        || serialization_extensions(context)
            .iter()
            .any(|(declared, _)| *declared == extension)
}

/// The codec for `uri`'s extension; registered codecs win over built-ins.
fn codec_for(context: &Context, uri: &str) -> Result<Arc<dyn Codec>> {
    let extension = extension(uri)
        .ok_or_else(|| ContextError::resource(uri, "resource has no file extension"))?;
    let registered = serialization_extensions(context)
        .into_iter()
        .find(|(declared, _)| *declared == extension);
    if let Some((_, bean)) = registered {
        let instance = bean.instance()?;
        return instance.cast::<dyn Codec>().ok_or_else(|| {
            ContextError::wiring(format!("serialization bean '{}' is not a codec", bean.name()))
        });
    }
    builtin_codec(&extension)
        .ok_or_else(|| ContextError::wiring(format!("no codec found for '{extension}'")))
}

fn write_file(uri: &str, file: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|err| ContextError::resource(uri, err.to_string()))?;
    }
    fs::write(file, bytes).map_err(|err| ContextError::resource(uri, err.to_string()))
}
