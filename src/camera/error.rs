use thiserror::Error;

/// Camera subsystem errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Permission denied or no user-facing device present.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera stream is not open")]
    NotReady,

    #[error("camera stream has not delivered a frame yet")]
    NoFrame,
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
