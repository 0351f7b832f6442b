use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use crate::camera::backend::FrameSource;
use crate::camera::buffer::FrameBuffer;
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{DeviceId, FacingMode, Frame, StreamHandle};

const DUMMY_DEVICE_ID: &str = "dummy:test:camera-001";
const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;

/// How the dummy device answers `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyAvailability {
    Available,
    PermissionDenied,
    NoDevice,
}

/// A fake camera for running without real hardware.
///
/// On `open` it pushes a deterministic gradient test pattern into its frame
/// buffer. Tests and external producers can push further frames with
/// [`DummyFrameSource::push_frame`]. Device opens and releases are counted.
///
/// Enable via `DUMMY_CAMERA=1` environment variable.
pub struct DummyFrameSource {
    buffer: Arc<FrameBuffer>,
    handle: Mutex<Option<StreamHandle>>,
    availability: Mutex<DummyAvailability>,
    width: u32,
    height: u32,
    opens: AtomicU32,
    releases: AtomicU32,
}

impl DummyFrameSource {
    /// Create an available dummy camera producing 320x240 frames.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Create an available dummy camera producing frames of the given size.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            buffer: Arc::new(FrameBuffer::new(3)),
            handle: Mutex::new(None),
            availability: Mutex::new(DummyAvailability::Available),
            width,
            height,
            opens: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        }
    }

    /// Script how subsequent `open` calls answer.
    pub fn set_availability(&self, availability: DummyAvailability) {
        *self.availability.lock() = availability;
    }

    /// Whether the dummy camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// The stable device ID for the dummy camera.
    pub fn device_id() -> DeviceId {
        DeviceId::new(DUMMY_DEVICE_ID)
    }

    /// Deterministic gradient: red ramps left to right, green top to bottom.
    pub fn test_frame(width: u32, height: u32) -> Frame {
        let w = width.max(1);
        let h = height.max(1);
        let image = RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, 128])
        });
        Frame::from_image(image, 0)
    }

    /// Push a frame as if the device had delivered it.
    pub fn push_frame(&self, frame: Frame) {
        self.buffer.push(frame);
    }

    /// Shared frame buffer, for producers feeding the stream.
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Number of times the device was actually opened.
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Number of times the device was actually released.
    pub fn release_count(&self) -> u32 {
        self.releases.load(Ordering::Relaxed)
    }
}

impl Default for DummyFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for DummyFrameSource {
    fn open(&self, facing: FacingMode) -> Result<StreamHandle> {
        let mut handle = self.handle.lock();
        if let Some(existing) = handle.as_ref() {
            return Ok(existing.clone());
        }

        match *self.availability.lock() {
            DummyAvailability::Available => {}
            DummyAvailability::PermissionDenied => {
                return Err(CameraError::DeviceUnavailable(
                    "permission denied".to_string(),
                ))
            }
            DummyAvailability::NoDevice => {
                return Err(CameraError::DeviceUnavailable(
                    "no camera device found".to_string(),
                ))
            }
        }

        let opened = StreamHandle {
            device_id: Self::device_id(),
            facing,
            width: self.width,
            height: self.height,
        };
        self.buffer.push(Self::test_frame(self.width, self.height));
        self.opens.fetch_add(1, Ordering::Relaxed);
        tracing::info!("dummy camera opened ({}x{})", self.width, self.height);
        *handle = Some(opened.clone());
        Ok(opened)
    }

    fn current_frame(&self) -> Result<Arc<Frame>> {
        if self.handle.lock().is_none() {
            return Err(CameraError::NotReady);
        }
        self.buffer.latest().ok_or(CameraError::NoFrame)
    }

    fn close(&self) {
        if self.handle.lock().take().is_some() {
            self.buffer.clear();
            self.releases.fetch_add(1, Ordering::Relaxed);
            tracing::info!("dummy camera released");
        }
    }

    fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }
}
