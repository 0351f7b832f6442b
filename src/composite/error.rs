use thiserror::Error;

/// Pixel and encoding errors from the compositing stage.
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("image has zero width or height")]
    EmptyImage,

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Failures while fetching or decoding a backdrop image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackdropError {
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("cannot fetch {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("broken image: {0}")]
    Decode(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CompositeError>;
