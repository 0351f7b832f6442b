use thiserror::Error;

/// Face detection errors.
///
/// "No face in frame" is not an error; providers return `Ok(None)` for it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("face detection unavailable: {0}")]
    Unavailable(String),

    #[error("failed to load detection model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, DetectionError>;
