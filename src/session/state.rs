use std::sync::Arc;

use image::RgbImage;
use serde::Serialize;

use crate::camera::types::StreamHandle;
use crate::composite::backdrop::BackdropId;
use crate::composite::engine::CompositeResult;
use crate::composite::watermark::PlateRect;
use crate::detection::overlay::GuideSnapshot;
use crate::detection::provider::ModelStatus;
use crate::diagnostics::stats::DetectionSnapshot;
use crate::enhance::params::EnhancementParams;

/// Coarse session state reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Live,
    Captured,
    Previewing,
}

/// The single frame taken at capture time. Never modified.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub id: u64,
    pub image: Arc<RgbImage>,
    pub timestamp_us: u64,
}

/// Enhancement output, always derived from the pristine capture.
#[derive(Debug, Clone)]
pub struct EnhancedImage {
    /// Enhancement generation that produced this image.
    pub generation: u64,
    pub params: EnhancementParams,
    pub image: Arc<RgbImage>,
}

/// Internal state with the values each state owns.
///
/// `Previewing` cannot exist without both a capture and its enhancement.
#[derive(Debug, Clone, Default)]
pub(crate) enum Phase {
    #[default]
    Idle,
    Live,
    Captured {
        capture: CapturedImage,
    },
    Previewing {
        capture: CapturedImage,
        enhanced: EnhancedImage,
        composite: Option<CompositeResult>,
    },
}

impl Phase {
    pub(crate) fn state(&self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::Live => SessionState::Live,
            Self::Captured { .. } => SessionState::Captured,
            Self::Previewing { .. } => SessionState::Previewing,
        }
    }

    pub(crate) fn capture(&self) -> Option<&CapturedImage> {
        match self {
            Self::Captured { capture } | Self::Previewing { capture, .. } => Some(capture),
            _ => None,
        }
    }
}

/// Summary of a committed composite, without pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSummary {
    pub backdrop_id: BackdropId,
    pub watermark: String,
    pub width: u32,
    pub height: u32,
    pub plate: PlateRect,
}

impl From<&CompositeResult> for CompositeSummary {
    fn from(result: &CompositeResult) -> Self {
        Self {
            backdrop_id: result.backdrop_id,
            watermark: result.watermark.clone(),
            width: result.image.width(),
            height: result.image.height(),
            plate: result.plate,
        }
    }
}

/// Everything the presentation layer needs to render the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub aligned: bool,
    pub guide: GuideSnapshot,
    pub model: ModelStatus,
    pub stream: Option<StreamHandle>,
    pub params: EnhancementParams,
    pub capture_id: Option<u64>,
    /// Params of the enhanced image currently shown, if any.
    pub enhanced_params: Option<EnhancementParams>,
    pub selected_backdrop: Option<BackdropId>,
    pub composite: Option<CompositeSummary>,
    pub diagnostics: DetectionSnapshot,
}
