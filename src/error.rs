use crate::descriptor::DescriptorError;
use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Descriptor parsing failed: {0}")]
    DescriptorParsing(#[from] DescriptorError),

    #[error("Circular dependency detected: {message}")]
    CircularDependency { message: String },

    #[error("Wiring failed: {message}")]
    Wiring { message: String },

    #[error("Invalid container state: {message}")]
    ContainerState { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Failed to destroy {failed} instances")]
    DestroyFailed { failed: usize },

    #[error("Resource '{uri}' unavailable: {message}")]
    Resource { uri: String, message: String },

    #[error(transparent)]
    Factory(#[from] anyhow::Error),
}

impl ContextError {
    pub fn circular(message: impl Into<String>) -> Self {
        Self::CircularDependency {
            message: message.into(),
        }
    }

    pub fn wiring(message: impl Into<String>) -> Self {
        Self::Wiring {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::ContainerState {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn resource(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resource {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

