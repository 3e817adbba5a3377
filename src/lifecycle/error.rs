//! Lifecycle-specific error types

use thiserror::Error;

/// Errors raised by component and context lifecycle callbacks
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Component initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Component destruction failed
    #[error("Destroy failed: {0}")]
    DestroyFailed(String),

    /// A context lifecycle callback failed
    #[error("Hook execution failed for {phase}: {message}")]
    HookFailed {
        /// Callback that failed, e.g. `on_load`
        phase: String,
        /// Error message
        message: String,
    },
}

impl LifecycleError {
    /// Create an initialization failure error
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a destroy failure error
    pub fn destroy_failed(msg: impl Into<String>) -> Self {
        Self::DestroyFailed(msg.into())
    }

    /// Create a hook failure error
    pub fn hook_failed(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            phase: phase.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
