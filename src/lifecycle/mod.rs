//! Lifecycle Hooks Module
//!
//! Component-level hooks ([`Initializable`], [`Destroyable`]), context-level
//! callbacks ([`ContextLifecycle`]) and the [`LifecycleManager`] that tears
//! instances down in reverse creation order.
//!
//! # Lifecycle Phases
//!
//! ```text
//! DESTROYED
//!    ↓ initialize   on_initialize → reset registries, build class path → on_initialized
//! INITIALIZED
//!    ↓ load         on_load → boot markers, scan, register beans → on_loaded
//! LOADED
//!    ↓ enable       on_enable → create every singleton → on_enabled
//!                     (each instance: construct → aware → autowire → proxy → Initializable)
//! ENABLED
//!    ↓ disable      on_disable → on_disabled
//! DISABLED
//!    ↓ destroy      on_destroy → Destroyable (reverse order) → clear → on_destroyed
//! DESTROYED
//! ```
//!
//! A failure anywhere inside a phase moves the context to `ERROR`.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshestra_context::lifecycle::{Destroyable, Initializable, LifecycleError};
//!
//! impl Initializable for DatabaseService {
//!     fn initialize(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Initializing database connection");
//!         Ok(())
//!     }
//! }
//!
//! impl Destroyable for DatabaseService {
//!     fn destroy(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing database connections");
//!         Ok(())
//!     }
//! }
//! ```

mod error;
mod manager;
mod traits;

pub use error::{LifecycleError, Result};
pub use manager::LifecycleManager;
pub use traits::{ContextLifecycle, Destroyable, Initializable, NoopLifecycle};
