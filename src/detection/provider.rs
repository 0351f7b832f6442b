use async_trait::async_trait;
use serde::Serialize;

use crate::camera::types::Frame;
use crate::detection::error::Result;

/// A 2D point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding region of the single detected face in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceRegion {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    /// Ordered landmark points (eyes, nose, mouth corners for the built-in
    /// detectors). May be empty.
    pub landmarks: Vec<Point>,
}

impl FaceRegion {
    /// A region covering the whole frame, with full confidence.
    pub fn full_frame(frame: &Frame) -> Self {
        Self::from_box(0.0, 0.0, f64::from(frame.width), f64::from(frame.height), 1.0)
    }

    /// Build a region and place the five proportional landmark anchors.
    pub fn from_box(x: f64, y: f64, width: f64, height: f64, confidence: f64) -> Self {
        const ANCHORS: [(f64, f64); 5] = [
            (0.30, 0.38), // left eye
            (0.70, 0.38), // right eye
            (0.50, 0.58), // nose tip
            (0.35, 0.78), // mouth, left corner
            (0.65, 0.78), // mouth, right corner
        ];
        let landmarks = ANCHORS
            .iter()
            .map(|(fx, fy)| Point::new(x + fx * width, y + fy * height))
            .collect();
        Self {
            x,
            y,
            width,
            height,
            confidence,
            landmarks,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Whether a provider can currently answer `detect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ModelStatus {
    Loading,
    Ready,
    Failed(String),
}

impl ModelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Pluggable face detector.
///
/// Implementations return `Ok(None)` when no face is found or the best
/// candidate falls below their confidence threshold, and reserve `Err` for
/// an unusable provider (e.g. models not loaded). Detection may be slow, so
/// it is async; the caller owns the scheduling.
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    /// Detect at most one face in `frame`.
    async fn detect(&self, frame: &Frame) -> Result<Option<FaceRegion>>;

    /// Readiness of the underlying model.
    fn status(&self) -> ModelStatus {
        ModelStatus::Ready
    }
}
