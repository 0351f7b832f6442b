use thiserror::Error;

use crate::camera::error::CameraError;
use crate::composite::backdrop::BackdropId;
use crate::composite::error::CompositeError;
use crate::detection::error::DetectionError;

/// Errors surfaced to the presentation layer.
///
/// All of them are recoverable: the session stays in a valid state and
/// `close` always returns it to `Idle`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("face detection unavailable: {0}")]
    DetectionUnavailable(String),

    #[error("no face aligned with the guide")]
    NotAligned,

    #[error("backdrop {id} failed to load: {reason}")]
    BackdropLoadFailed { id: BackdropId, reason: String },

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("unknown backdrop {0}")]
    UnknownBackdrop(BackdropId),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("image processing failed: {0}")]
    Processing(String),
}

impl SessionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::DetectionUnavailable(_) => "detection_unavailable",
            Self::NotAligned => "not_aligned",
            Self::BackdropLoadFailed { .. } => "backdrop_load_failed",
            Self::NotReady(_) => "not_ready",
            Self::UnknownBackdrop(_) => "unknown_backdrop",
            Self::Encode(_) => "encode",
            Self::Processing(_) => "processing",
        }
    }
}

impl From<CameraError> for SessionError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::DeviceUnavailable(reason) => Self::DeviceUnavailable(reason),
            other => Self::NotReady(other.to_string()),
        }
    }
}

impl From<DetectionError> for SessionError {
    fn from(e: DetectionError) -> Self {
        Self::DetectionUnavailable(e.to_string())
    }
}

impl From<CompositeError> for SessionError {
    fn from(e: CompositeError) -> Self {
        match e {
            CompositeError::Encode(inner) => Self::Encode(inner.to_string()),
            other => Self::Processing(other.to_string()),
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, SessionError>;
