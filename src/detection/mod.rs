//! Face detection and the positioning guide.
//!
//! - **Provider**: [`DetectionProvider`] trait plus the face region types
//! - **Skin tone**: classical detector whose tuning loads from a model file
//! - **Slot**: holds a provider that is still loading (or failed to load)
//! - **Overlay**: guide ellipse and the `aligned` signal
//! - **Tick**: the scheduled detection loop with its cancellation token

pub mod error;
pub mod fixed;
pub mod overlay;
pub mod provider;
pub mod skin_tone;
pub mod slot;
pub mod tick;

pub use error::DetectionError;
pub use fixed::FixedDetector;
pub use overlay::{GuideEllipse, GuideOverlay, GuideSnapshot, GuideStatus};
pub use provider::{DetectionProvider, FaceRegion, ModelStatus, Point};
pub use skin_tone::{SkinToneDetector, SkinToneModel};
pub use slot::ModelSlot;
pub use tick::{DetectionLoop, LoopExit, TickOutcome, TickSink};
