//! Graphics error types.

use std::fmt;

/// Errors returned when building a device or creating a resource.
///
/// These cover descriptor validation only. Contract violations detected while
/// the driver thread replays commands are not recoverable and panic instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the device.
    InitializationFailed(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// A requested feature exceeds the device capabilities.
    FeatureNotSupported(String),
    /// A resource created by a different device was passed in.
    ForeignResource(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::ForeignResource(msg) => write!(f, "resource belongs to another device: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::InvalidParameter("buffer size must be non-zero".to_string());
        assert_eq!(err.to_string(), "invalid parameter: buffer size must be non-zero");

        let err = GraphicsError::InitializationFailed("backend mismatch".to_string());
        assert_eq!(err.to_string(), "initialization failed: backend mismatch");
    }
}
