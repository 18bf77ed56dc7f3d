//! Graphics error types.
//!
//! [`GraphicsError`] travels on the internal `Result` paths between the
//! context, the registry and the backends. The client facing API turns it
//! into a diagnostic plus a sentinel return value.

use std::fmt;

/// Errors that can occur in the graphics layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to bring up the instance, device or queues.
    InitializationFailed(String),
    /// The backend refused to create an object.
    ResourceCreationFailed(String),
    /// A requested feature is not supported by the device or the backend.
    FeatureNotSupported(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// The GPU device was lost.
    DeviceLost,
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// A handle did not resolve to a live object.
    InvalidHandle,
    /// An internal error occurred.
    Internal(String),
    /// The surface is outdated and needs to be reconfigured.
    SurfaceOutdated,
    /// The surface was lost and needs to be recreated.
    SurfaceLost,
}

impl GraphicsError {
    /// Whether the error leaves the device unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost | Self::OutOfMemory)
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::InvalidHandle => write!(f, "handle does not refer to a live object"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::SurfaceOutdated => write!(f, "surface outdated, needs reconfiguration"),
            Self::SurfaceLost => write!(f, "surface lost, needs recreation"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(GraphicsError::DeviceLost.is_fatal());
        assert!(GraphicsError::OutOfMemory.is_fatal());
        assert!(!GraphicsError::InvalidHandle.is_fatal());
        assert!(!GraphicsError::SurfaceOutdated.is_fatal());
    }
}
