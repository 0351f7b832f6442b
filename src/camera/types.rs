use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable camera identifier reported by the frame source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new `DeviceId` from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the inner string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which camera to ask for when opening a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera, facing the subject holding the device.
    #[default]
    User,
    Environment,
}

/// Handle to an open camera stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamHandle {
    pub device_id: DeviceId,
    pub facing: FacingMode,
    pub width: u32,
    pub height: u32,
}

/// A single captured frame from the camera.
///
/// Frames are shared as `Arc<Frame>` and never mutated once pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw pixel data (RGB, row-major, no padding).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture timestamp in microseconds.
    pub timestamp_us: u64,
}

impl Frame {
    /// Wrap an RGB image as a frame.
    pub fn from_image(image: RgbImage, timestamp_us: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            timestamp_us,
        }
    }

    /// Copy the pixels into an `RgbImage`.
    ///
    /// Returns `None` if the buffer length does not match the dimensions.
    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Whether the buffer holds exactly `width * height` RGB pixels.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 3
    }

    /// RGB triple at `(x, y)`. Caller guarantees the frame is well formed
    /// and the coordinate is in bounds.
    pub(crate) fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}
