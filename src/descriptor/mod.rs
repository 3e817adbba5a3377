//! Class-file introspection
//!
//! Parses compiled JVM class files into immutable [`TypeDescriptor`]s without
//! loading or running them. Descriptors carry the type hierarchy by name,
//! the declared members and every metadata marker, and resolve referenced
//! types lazily through the [`DescriptorCache`] that produced them.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshestra_context::descriptor::{Annotated, ArchiveSource, DescriptorCache};
//! use std::sync::Arc;
//!
//! let cache = DescriptorCache::new(Some(Arc::new(ArchiveSource::open("app.jar")?)), None);
//! let service = cache.resolve("com.acme.OrderService")?;
//!
//! if let Some(named) = service.marker("com.acme.Named") {
//!     println!("bean name: {:?}", named.str_value("value"));
//! }
//! let repository = cache.resolve("com.acme.Repository")?;
//! println!("is a repository: {}", repository.is_assignable_from(&service));
//! ```

mod access;
mod cache;
mod constant_pool;
mod error;
mod marker;
mod member;
mod parser;
mod reader;
mod signature;
mod source;
mod types;

#[cfg(test)]
pub(crate) mod fixture;

pub use access::AccessFlags;
pub use cache::DescriptorCache;
pub use error::{DescriptorError, Result};
pub use marker::{Annotated, MarkerValue, MetadataMarker, TypeRef};
pub use member::{ConstantValue, FieldDescriptor, MethodDescriptor, ParameterDescriptor};
pub use signature::{
    ClassSignature, FieldType, GenericType, MethodSignature, MethodType, Primitive, TypeArg,
    TypeParameter,
};
pub use source::{ArchiveSource, ClassSource, CompositeSource, DirectorySource, MemorySource};
pub use types::TypeDescriptor;
