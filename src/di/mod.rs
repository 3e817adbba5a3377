//! The component container.
//!
//! A [`Context`] scans the holder's root archive for marked descriptors,
//! registers a [`Bean`] for each, and creates instances through the
//! [`TypeBinding`]s registered for their Rust types.

mod autowire;
mod aware;
mod bean;
mod binding;
mod builder;
mod container;
mod create;
mod holder;
mod injectable;
mod instance;
mod lazy;
pub mod markers;
mod property;
mod resource;
mod scan;
mod status;
#[cfg(test)]
pub(crate) mod testing;

pub use autowire::{AutowireArgs, AutowireValue};
pub use aware::{
    BeanNameAware, ContextAware, EventBusAware, HolderAware, MarkedAware, MetadataAware, SelfAware,
};
pub use bean::{Bean, BeanDefinition, DependsOn, PropertyRequirement, Scope};
pub use binding::{Object, TypeBinding, TypeBindingBuilder};
pub use builder::ContextBuilder;
pub use container::Context;
pub use holder::{ContextHolder, LibraryResolver, StandardHolder};
pub use injectable::{Injectable, TypeRegistry};
pub use instance::{Instance, WeakInstance};
pub use lazy::Lazy;
pub use property::ContextProperty;
pub use resource::{BUNDLED_SCHEME, CLASSPATH_SCHEME, CONTEXT_SCHEME, FILE_SCHEME, is_valid_uri};
pub use status::Status;

pub(crate) use resource::{Location, extension};
