use super::{BeanFactory, binding_for, simple_name};
use crate::descriptor::{Annotated, MethodDescriptor, TypeDescriptor};
use crate::di::markers;
use crate::di::{BeanDefinition, Context, Instance};
use crate::error::{ContextError, Result};
use tracing::warn;

/// Builds components through a public no-argument constructor or the single
/// public constructor marked `Autowired`.
///
/// Also serves suppliers and any marker type that is itself marked as a
/// component.
#[derive(Debug, Clone)]
pub struct ComponentBeanFactory {
    metadata_type: String,
}

impl ComponentBeanFactory {
    pub fn new() -> Self {
        Self::for_marker(markers::COMPONENT)
    }

    /// A component factory registered for a custom marker type.
    pub fn for_marker(metadata_type: impl Into<String>) -> Self {
        Self {
            metadata_type: metadata_type.into(),
        }
    }
}

impl Default for ComponentBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// The one public constructor marked `Autowired`, if any.
pub(crate) fn autowired_constructor<'a>(
    factory: &str,
    marked: &'a TypeDescriptor,
) -> Result<Option<&'a MethodDescriptor>> {
    let mut found = marked
        .constructors()
        .iter()
        .filter(|ctor| ctor.access().is_public() && ctor.has_marker(markers::AUTOWIRED));
    let first = found.next();
    if found.next().is_some() {
        return Err(ContextError::validation(format!(
            "{}: {} has more than one constructor marked Autowired",
            simple_name(factory),
            marked.name()
        )));
    }
    Ok(first)
}

/// Instantiates `definition` through its binding, autowiring the marked
/// constructor when there is one.
pub(crate) fn construct(
    context: &Context,
    factory: &str,
    definition: &BeanDefinition,
) -> Result<Instance> {
    let marked = definition.marked();
    let binding = binding_for(context, factory, definition).ok_or_else(|| {
        ContextError::wiring(format!("no type binding for '{}'", marked.name()))
    })?;
    let object = match autowired_constructor(factory, marked)? {
        Some(ctor) => {
            let args = context.resolve_arguments(marked, ctor)?;
            binding.construct_autowired(&args).ok_or_else(|| {
                ContextError::wiring(format!(
                    "binding {} has no autowired constructor",
                    binding.rust_name()
                ))
            })??
        }
        None => binding.construct().ok_or_else(|| {
            ContextError::wiring(format!("binding {} has no constructor", binding.rust_name()))
        })?,
    };
    Ok(Instance::new(object, binding))
}

/// Whether `definition` can be constructed, warning about why not.
pub(crate) fn validate_constructible(
    context: &Context,
    factory: &str,
    definition: &BeanDefinition,
) -> Result<bool> {
    let marked = definition.marked();
    let label = simple_name(factory);
    if marked.is_interface() || marked.is_annotation() || marked.is_abstract() {
        warn!("{}: '{}' is not a concrete class, skip.", label, marked.name());
        return Ok(false);
    }
    let autowired = autowired_constructor(factory, marked)?;
    let Some(binding) = binding_for(context, factory, definition) else {
        return Ok(false);
    };
    match autowired {
        Some(_) if !binding.has_autowired_constructor() => {
            warn!(
                "{}: binding {} of '{}' has no autowired constructor, skip.",
                label,
                binding.rust_name(),
                marked.name()
            );
            Ok(false)
        }
        Some(_) => Ok(true),
        None if marked.default_constructor().is_none() => {
            warn!(
                "{}: '{}' has no public no-argument constructor, skip.",
                label,
                marked.name()
            );
            Ok(false)
        }
        None if !binding.has_constructor() => {
            warn!(
                "{}: binding {} of '{}' has no constructor, skip.",
                label,
                binding.rust_name(),
                marked.name()
            );
            Ok(false)
        }
        None => Ok(true),
    }
}

impl BeanFactory for ComponentBeanFactory {
    fn metadata_type(&self) -> &str {
        &self.metadata_type
    }

    fn validate(&self, context: &Context, definition: &BeanDefinition) -> Result<bool> {
        validate_constructible(context, &self.metadata_type, definition)
    }

    fn create(&self, context: &Context, definition: &BeanDefinition) -> Result<Instance> {
        construct(context, &self.metadata_type, definition)
    }
}
