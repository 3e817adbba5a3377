//! Pluggable bean factories, one per metadata marker type.

mod codec;
mod component;
mod configuration;
mod serialization;

pub use codec::{Codec, JsonCodec, YamlCodec};
pub use component::ComponentBeanFactory;
pub use configuration::ConfigurationBeanFactory;
pub use serialization::SerializationBeanFactory;

use crate::di::{BeanDefinition, Context, Instance, TypeBinding};
use crate::error::Result;
use std::sync::Arc;

/// Validates and instantiates the beans of one metadata marker type.
///
/// `validate` runs once while the context loads: `Ok(false)` skips the
/// candidate, an error aborts the load. `create` and `proxy` run every time
/// the bean's provider produces an instance; both must return an instance
/// of exactly the marked type.
pub trait BeanFactory: Send + Sync {
    /// Qualified name of the marker this factory serves.
    fn metadata_type(&self) -> &str;

    fn validate(&self, context: &Context, definition: &BeanDefinition) -> Result<bool>;

    fn create(&self, context: &Context, definition: &BeanDefinition) -> Result<Instance>;

    /// Optionally wraps the wired instance, e.g. in a decorator of the same
    /// type.
    fn proxy(
        &self,
        context: &Context,
        definition: &BeanDefinition,
        instance: Instance,
    ) -> Result<Instance> {
        let _ = (context, definition);
        Ok(instance)
    }
}

/// The binding of a definition's marked type, logging when absent.
pub(crate) fn binding_for(
    context: &Context,
    factory: &str,
    definition: &BeanDefinition,
) -> Option<Arc<TypeBinding>> {
    let binding = context.types().get(definition.marked().name());
    if binding.is_none() {
        tracing::warn!(
            "{}: no type binding for '{}', skip.",
            simple_name(factory),
            definition.marked().name()
        );
    }
    binding
}

pub(crate) fn simple_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}
