//! # Meshestra Context
//!
//! A component container for JVM class archives, with a lifecycle state
//! machine.
//!
//! Meshestra Context reads compiled class files straight from archives,
//! finds the classes carrying component markers, and wires host-side Rust
//! implementations of them together.
//!
//! ## Features
//!
//! - **Descriptor Introspection**: Parse class files into lazily linked type descriptors, with
//!   generic signatures, markers and parameter names
//! - **Component Scanning**: Discover components by package, environment and `DependsOn` rules
//! - **Autowiring**: Constructor and method injection of beans, lazy handles, lists and maps
//! - **Pluggable Factories**: Component, serialization and configuration factories built in,
//!   custom ones registered per marker type
//! - **Lifecycle**: `initialize → load → enable → disable → destroy`, with hooks and ordered
//!   teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshestra_context::prelude::*;
//! use meshestra_context::descriptor::ArchiveSource;
//! use once_cell::sync::OnceCell;
//!
//! // 1. Bind a Rust type to the class `com.acme.Greeter`
//! #[derive(Default)]
//! struct Greeter {
//!     name: OnceCell<String>,
//! }
//!
//! impl Injectable for Greeter {
//!     const TYPE_NAME: &'static str = "com.acme.Greeter";
//!
//!     fn bind(binding: TypeBindingBuilder<Self>) -> TypeBindingBuilder<Self> {
//!         binding.constructor(Greeter::default).bean_name_aware()
//!     }
//! }
//!
//! impl BeanNameAware for Greeter {
//!     fn set_bean_name(&self, name: &str) {
//!         let _ = self.name.set(name.to_string());
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     // 2. Point a holder at the archive
//!     let root = Arc::new(ArchiveSource::open("plugins/acme.jar")?);
//!     let holder = StandardHolder::new("acme", "com.acme.App", "plugins/acme", root);
//!
//!     // 3. Build and drive the context
//!     let context = ContextBuilder::new(Arc::new(holder))
//!         .register::<Greeter>()
//!         .build();
//!     context.initialize()?;
//!     context.load()?;
//!     context.enable()?;
//!
//!     let greeter = context.get::<Greeter>()?;
//!     assert!(greeter.is_some());
//!
//!     context.disable()?;
//!     context.destroy()
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod di;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod messaging;

// Re-export core types
pub use di::{Context, ContextBuilder, Injectable, Lazy, Status};
pub use error::{ContextError, Result};

/// Prelude module for convenient imports
///
/// ```
/// use meshestra_context::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, ContextConfig};
    pub use crate::descriptor::{Annotated, DescriptorCache, MetadataMarker, TypeDescriptor};
    pub use crate::di::{
        AutowireArgs, Bean, BeanDefinition, BeanNameAware, ContextAware, ContextHolder,
        EventBusAware, HolderAware, Injectable, Instance, Lazy, MarkedAware, MetadataAware,
        Scope, SelfAware, StandardHolder, Status, TypeBinding, TypeBindingBuilder, TypeRegistry,
    };
    pub use crate::di::{Context, ContextBuilder};
    pub use crate::error::{ContextError, Result};
    pub use crate::factory::{BeanFactory, Codec};
    pub use crate::lifecycle::{ContextLifecycle, Destroyable, Initializable, LifecycleError};
    pub use crate::messaging::{EventBus, StatusChanged};
    pub use std::sync::Arc;
}
