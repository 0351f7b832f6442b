use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::camera::types::Frame;
use crate::detection::provider::FaceRegion;

/// Guide stroke colour.
const STROKE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Guide stroke width in pixels.
const STROKE_WIDTH: i64 = 3;
/// Dash and gap length along the ellipse, in pixels.
const DASH: f64 = 5.0;
/// Upper bound on arc samples per ellipse.
const MAX_SAMPLES: usize = 100_000;

/// Positioning ellipse drawn around the detected face.
///
/// Horizontal radius is `width / 1.5` and vertical radius the full face
/// height, so the guide frames the head with room for hair and chin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideEllipse {
    pub center_x: f64,
    pub center_y: f64,
    pub radius_x: f64,
    pub radius_y: f64,
}

impl GuideEllipse {
    pub fn around(region: &FaceRegion) -> Self {
        let center = region.center();
        Self {
            center_x: center.x,
            center_y: center.y,
            radius_x: region.width / 1.5,
            radius_y: region.height,
        }
    }

    /// Ramanujan's approximation of the perimeter.
    fn perimeter(&self) -> f64 {
        let (a, b) = (self.radius_x, self.radius_y);
        std::f64::consts::PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt())
    }
}

/// What the guide is telling the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideStatus {
    /// Detector not ready yet; capture is gated.
    Pending,
    /// Detector running, no face in the latest frame.
    Searching,
    /// Face found; capture allowed.
    Aligned,
}

/// Serialisable view of the overlay for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideSnapshot {
    pub status: GuideStatus,
    pub ellipse: Option<GuideEllipse>,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Per-tick positioning guide and the `aligned` signal.
#[derive(Debug, Clone)]
pub struct GuideOverlay {
    status: GuideStatus,
    region: Option<FaceRegion>,
    frame_size: (u32, u32),
}

impl GuideOverlay {
    pub fn new() -> Self {
        Self {
            status: GuideStatus::Pending,
            region: None,
            frame_size: (0, 0),
        }
    }

    /// Apply one detection result. Returns the new `aligned` value.
    pub fn update(&mut self, frame: &Frame, detection: Option<FaceRegion>) -> bool {
        self.frame_size = (frame.width, frame.height);
        self.status = if detection.is_some() {
            GuideStatus::Aligned
        } else {
            GuideStatus::Searching
        };
        self.region = detection;
        self.is_aligned()
    }

    /// Detector could not answer this tick.
    pub fn mark_pending(&mut self) {
        self.status = GuideStatus::Pending;
        self.region = None;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_aligned(&self) -> bool {
        self.status == GuideStatus::Aligned
    }

    pub fn status(&self) -> GuideStatus {
        self.status
    }

    pub fn region(&self) -> Option<&FaceRegion> {
        self.region.as_ref()
    }

    pub fn ellipse(&self) -> Option<GuideEllipse> {
        self.region.as_ref().map(GuideEllipse::around)
    }

    pub fn snapshot(&self) -> GuideSnapshot {
        GuideSnapshot {
            status: self.status,
            ellipse: self.ellipse(),
            frame_width: self.frame_size.0,
            frame_height: self.frame_size.1,
        }
    }

    /// Rasterise the guide onto a transparent frame-sized canvas.
    ///
    /// The canvas is fully transparent when no face is aligned.
    pub fn render(&self) -> RgbaImage {
        let (width, height) = self.frame_size;
        let mut canvas = RgbaImage::new(width, height);
        if let Some(ellipse) = self.ellipse() {
            draw_dashed_ellipse(&mut canvas, &ellipse);
        }
        canvas
    }
}

impl Default for GuideOverlay {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_dashed_ellipse(canvas: &mut RgbaImage, ellipse: &GuideEllipse) {
    let perimeter = ellipse.perimeter();
    if !perimeter.is_finite() || perimeter <= 0.0 {
        return;
    }
    // Two samples per pixel of arc keeps the stroke gap-free.
    let samples = ((perimeter * 2.0).ceil() as usize).min(MAX_SAMPLES);
    let step = perimeter / samples as f64;
    let half = STROKE_WIDTH / 2;

    for i in 0..samples {
        let arc = i as f64 * step;
        if (arc % (2.0 * DASH)) >= DASH {
            continue;
        }
        let theta = std::f64::consts::TAU * i as f64 / samples as f64;
        let px = (ellipse.center_x + ellipse.radius_x * theta.cos()).round() as i64;
        let py = (ellipse.center_y + ellipse.radius_y * theta.sin()).round() as i64;
        for dy in -half..=half {
            for dx in -half..=half {
                let (x, y) = (px + dx, py + dy);
                if x >= 0 && y >= 0 && x < i64::from(canvas.width()) && y < i64::from(canvas.height())
                {
                    canvas.put_pixel(x as u32, y as u32, STROKE);
                }
            }
        }
    }
}
