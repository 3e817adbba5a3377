//! Descriptor-specific error types

use thiserror::Error;

/// Errors raised while locating or parsing compiled class data
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The bytes are not a well-formed class file
    #[error("Malformed class data: {message}")]
    Malformed { message: String },

    /// No source could supply bytes for the requested type
    #[error("Type not found: {name}")]
    NotFound { name: String },

    /// The parsed class declares a different name than the one requested
    #[error("Type name mismatch: expected '{expected}', found '{actual}'")]
    NameMismatch { expected: String, actual: String },

    /// An archive could not be opened or read
    #[error("Archive error in {location}: {message}")]
    Archive { location: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DescriptorError {
    /// Create a malformed-data error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an archive error
    pub fn archive(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Archive {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the referenced type simply does not exist.
    ///
    /// Discovery treats this as a skip condition rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A specialized Result type for descriptor operations
pub type Result<T> = std::result::Result<T, DescriptorError>;
