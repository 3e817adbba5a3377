//! Lifecycle hook traits
//!
//! Components opt into these by registering the matching capability on
//! their type binding; the container discovers them on the instance.

use super::LifecycleError;
use crate::di::Context;

/// Runs once per instance, after autowiring and proxying.
///
/// # Example
///
/// ```rust,ignore
/// impl Initializable for DatabaseService {
///     fn initialize(&self) -> Result<(), LifecycleError> {
///         self.pool.connect()
///             .map_err(|e| LifecycleError::init_failed(e.to_string()))
///     }
/// }
/// ```
pub trait Initializable: Send + Sync {
    fn initialize(&self) -> Result<(), LifecycleError>;
}

/// Runs when the owning context is destroyed.
///
/// Instances are destroyed in **reverse order** of creation; a failure is
/// logged and the remaining instances are still destroyed.
pub trait Destroyable: Send + Sync {
    fn destroy(&self) -> Result<(), LifecycleError>;
}

/// Callbacks around each container phase.
///
/// `on_<phase>` runs before the phase body and `on_<phase>ed` after it
/// succeeded. An error from either aborts the phase and puts the context
/// into the error status.
#[allow(unused_variables)]
pub trait ContextLifecycle: Send + Sync {
    fn on_initialize(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_initialized(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_load(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_loaded(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_enable(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_enabled(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_disable(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_disabled(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_destroy(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_destroyed(&self, context: &Context) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// Lifecycle with no callbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLifecycle;

impl ContextLifecycle for NoopLifecycle {}
