//! Backdrop compositing and watermarking.
//!
//! - **Backdrop**: catalog entries and the async [`BackdropLoader`]
//! - **Engine**: cover-scales backdrop and foreground onto the fixed canvas
//! - **Watermark**: semi-transparent plate plus built-in bitmap font
//! - **Encode**: PNG/JPEG bytes and data URLs for the finished image

pub mod backdrop;
pub mod encode;
pub mod engine;
pub mod error;
pub mod watermark;

pub use backdrop::{
    Backdrop, BackdropCatalog, BackdropId, BackdropLoader, BackdropSource, DefaultBackdropLoader,
};
pub use encode::{EncodedImage, OutputFormat};
pub use engine::{CompositeEngine, CompositeResult, Placement, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use error::{BackdropError, CompositeError};
pub use watermark::{PlateRect, WatermarkStyle};
