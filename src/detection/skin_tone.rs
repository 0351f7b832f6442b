//! Classical skin-tone face detector.
//!
//! Pixels are sampled on a grid, converted to YCbCr, and kept when their
//! chroma falls inside the model's Cb/Cr window. The bounding box of the kept
//! samples is the face candidate; its confidence is the share of skin samples
//! inside that box. The tuning lives in a small JSON "model" file so it can
//! be shipped and replaced like a learned model.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::camera::types::Frame;
use crate::detection::error::{DetectionError, Result};
use crate::detection::provider::{DetectionProvider, FaceRegion};

/// File name looked up inside the configured model directory.
pub const MODEL_FILE_NAME: &str = "skin_tone.json";

/// Tuning for [`SkinToneDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinToneModel {
    pub cb_min: f32,
    pub cb_max: f32,
    pub cr_min: f32,
    pub cr_max: f32,
    /// Minimum share of skin samples inside the candidate box.
    pub min_confidence: f64,
    /// Minimum share of the whole frame that must be skin.
    pub min_coverage: f64,
    /// Grid step in pixels between samples.
    pub sample_step: u32,
}

impl Default for SkinToneModel {
    fn default() -> Self {
        Self {
            cb_min: 77.0,
            cb_max: 127.0,
            cr_min: 133.0,
            cr_max: 173.0,
            min_confidence: 0.35,
            min_coverage: 0.02,
            sample_step: 4,
        }
    }
}

impl SkinToneModel {
    fn is_skin(&self, [r, g, b]: [u8; 3]) -> bool {
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
        let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
        (self.cb_min..=self.cb_max).contains(&cb) && (self.cr_min..=self.cr_max).contains(&cr)
    }
}

/// Face detector driven by a [`SkinToneModel`].
pub struct SkinToneDetector {
    model: SkinToneModel,
}

impl SkinToneDetector {
    pub fn new(model: SkinToneModel) -> Self {
        Self { model }
    }

    /// Load the model from `dir/skin_tone.json`.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MODEL_FILE_NAME);
        let model_load_error = |reason: String| DetectionError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| model_load_error(e.to_string()))?;
        let model: SkinToneModel =
            serde_json::from_str(&contents).map_err(|e| model_load_error(e.to_string()))?;
        if model.sample_step == 0 {
            return Err(model_load_error("sample_step must be > 0".to_string()));
        }
        tracing::info!("loaded skin tone model from {}", path.display());
        Ok(Self::new(model))
    }

    pub fn model(&self) -> &SkinToneModel {
        &self.model
    }

    /// Synchronous core of `detect`.
    pub fn locate(&self, frame: &Frame) -> Option<FaceRegion> {
        if !frame.is_well_formed() {
            return None;
        }
        let step = self.model.sample_step.max(1);

        let mut total = 0u64;
        let mut skin = 0u64;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for y in (0..frame.height).step_by(step as usize) {
            for x in (0..frame.width).step_by(step as usize) {
                total += 1;
                if self.model.is_skin(frame.rgb_at(x, y)) {
                    skin += 1;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if skin == 0 || (skin as f64 / total as f64) < self.model.min_coverage {
            return None;
        }

        let box_samples =
            u64::from((max_x - min_x) / step + 1) * u64::from((max_y - min_y) / step + 1);
        let confidence = skin as f64 / box_samples as f64;
        if confidence < self.model.min_confidence {
            return None;
        }

        let width = (max_x - min_x + step).min(frame.width - min_x);
        let height = (max_y - min_y + step).min(frame.height - min_y);
        Some(FaceRegion::from_box(
            f64::from(min_x),
            f64::from(min_y),
            f64::from(width),
            f64::from(height),
            confidence.min(1.0),
        ))
    }
}

impl Default for SkinToneDetector {
    fn default() -> Self {
        Self::new(SkinToneModel::default())
    }
}

#[async_trait]
impl DetectionProvider for SkinToneDetector {
    async fn detect(&self, frame: &Frame) -> Result<Option<FaceRegion>> {
        Ok(self.locate(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    const SKIN: Rgb<u8> = Rgb([224, 172, 140]);
    const BACKGROUND: Rgb<u8> = Rgb([30, 60, 200]);

    /// Blue frame with a skin-toned rectangle.
    fn frame_with_face(x0: u32, y0: u32, w: u32, h: u32) -> Frame {
        let image = RgbImage::from_fn(160, 120, |x, y| {
            if x >= x0 && x < x0 + w && y >= y0 && y < y0 + h {
                SKIN
            } else {
                BACKGROUND
            }
        });
        Frame::from_image(image, 0)
    }

    #[test]
    fn default_model_classifies_reference_colours() {
        let model = SkinToneModel::default();
        assert!(model.is_skin(SKIN.0));
        assert!(!model.is_skin(BACKGROUND.0));
        assert!(!model.is_skin([128, 128, 128]));
    }

    #[test]
    fn locates_skin_rectangle() {
        let detector = SkinToneDetector::default();
        let region = detector.locate(&frame_with_face(40, 20, 64, 80)).unwrap();
        assert_eq!((region.x, region.y), (40.0, 20.0));
        assert_eq!((region.width, region.height), (64.0, 80.0));
        assert!(region.confidence > 0.9);
        assert_eq!(region.landmarks.len(), 5);
    }

    #[test]
    fn no_skin_means_no_face() {
        let detector = SkinToneDetector::default();
        let frame = Frame::from_image(RgbImage::from_pixel(64, 64, BACKGROUND), 0);
        assert!(detector.locate(&frame).is_none());
    }

    #[test]
    fn tiny_skin_patch_is_below_coverage() {
        let detector = SkinToneDetector::default();
        assert!(detector.locate(&frame_with_face(0, 0, 4, 4)).is_none());
    }

    #[test]
    fn scattered_skin_is_below_confidence() {
        // Two distant patches: the bounding box is mostly background.
        let image = RgbImage::from_fn(160, 120, |x, y| {
            let near_origin = x < 16 && y < 16;
            let far_corner = x >= 144 && y >= 104;
            if near_origin || far_corner {
                SKIN
            } else {
                BACKGROUND
            }
        });
        let detector = SkinToneDetector::default();
        assert!(detector.locate(&Frame::from_image(image, 0)).is_none());
    }

    #[test]
    fn malformed_frame_is_no_face() {
        let frame = Frame {
            data: vec![0; 5],
            width: 10,
            height: 10,
            timestamp_us: 0,
        };
        assert!(SkinToneDetector::default().locate(&frame).is_none());
    }

    #[tokio::test]
    async fn load_reads_model_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MODEL_FILE_NAME),
            r#"{"min_confidence": 0.5, "sample_step": 2}"#,
        )
        .unwrap();

        let detector = SkinToneDetector::load(dir.path()).await.unwrap();
        assert_eq!(detector.model().min_confidence, 0.5);
        assert_eq!(detector.model().sample_step, 2);
        assert_eq!(detector.model().cb_min, 77.0);
    }

    #[tokio::test]
    async fn load_fails_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SkinToneDetector::load(dir.path()).await.err().unwrap();
        assert!(matches!(err, DetectionError::ModelLoad { .. }));
    }

    #[tokio::test]
    async fn load_rejects_zero_step() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE_NAME), r#"{"sample_step": 0}"#).unwrap();
        assert!(SkinToneDetector::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn detect_matches_locate() {
        let detector = SkinToneDetector::default();
        let frame = frame_with_face(40, 20, 64, 80);
        assert_eq!(detector.detect(&frame).await.unwrap(), detector.locate(&frame));
    }
}
