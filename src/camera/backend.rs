use std::sync::Arc;

use crate::camera::error::Result;
use crate::camera::types::{FacingMode, Frame, StreamHandle};

/// Platform-agnostic live camera stream.
///
/// Access is exclusive: at most one stream is open per source, and opening an
/// already-open source returns the existing handle without touching the
/// device.
pub trait FrameSource: Send + Sync {
    /// Open the camera matching `facing`.
    ///
    /// Fails with `CameraError::DeviceUnavailable` when permission is denied
    /// or no device exists.
    fn open(&self, facing: FacingMode) -> Result<StreamHandle>;

    /// Latest frame from the stream.
    ///
    /// Fails with `CameraError::NotReady` before a successful `open`.
    fn current_frame(&self) -> Result<Arc<Frame>>;

    /// Release the device. Idempotent.
    fn close(&self);

    /// Whether a stream is currently open.
    fn is_open(&self) -> bool;
}
