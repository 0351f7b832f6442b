use async_trait::async_trait;
use parking_lot::Mutex;

use crate::camera::types::Frame;
use crate::detection::error::Result;
use crate::detection::provider::{DetectionProvider, FaceRegion};

/// What a [`FixedDetector`] reports for each frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    NoFace,
    /// A face covering the whole frame.
    FullFrame,
    Region(FaceRegion),
}

/// Detector that answers from a script instead of looking at pixels.
///
/// Pairs with the dummy camera, whose test pattern contains no face.
pub struct FixedDetector {
    answer: Mutex<Scripted>,
}

impl FixedDetector {
    pub fn new(answer: Scripted) -> Self {
        Self {
            answer: Mutex::new(answer),
        }
    }

    /// Detector that never finds a face.
    pub fn no_face() -> Self {
        Self::new(Scripted::NoFace)
    }

    /// Detector that always finds a face filling the frame.
    pub fn full_frame() -> Self {
        Self::new(Scripted::FullFrame)
    }

    /// Change the answer for subsequent frames.
    pub fn set(&self, answer: Scripted) {
        *self.answer.lock() = answer;
    }
}

#[async_trait]
impl DetectionProvider for FixedDetector {
    async fn detect(&self, frame: &Frame) -> Result<Option<FaceRegion>> {
        Ok(match &*self.answer.lock() {
            Scripted::NoFace => None,
            Scripted::FullFrame => Some(FaceRegion::full_frame(frame)),
            Scripted::Region(region) => Some(region.clone()),
        })
    }
}
