pub mod camera;
pub mod composite;
pub mod detection;
pub mod diagnostics;
pub mod enhance;
pub mod session;
pub mod settings;

use std::sync::Arc;

use camera::backend::FrameSource;
use camera::dummy::DummyFrameSource;
use composite::backdrop::DefaultBackdropLoader;
use composite::engine::CompositeEngine;
use detection::skin_tone::SkinToneDetector;
use detection::slot::ModelSlot;
use session::controller::{CaptureController, ControllerOptions};
use session::orchestrator::{OrchestratorOptions, SessionOrchestrator};
use settings::types::AppConfig;

/// Create the frame source for the current environment.
///
/// When `DUMMY_CAMERA=1` is set, a simulated camera is used instead.
pub fn create_frame_source() -> Arc<dyn FrameSource> {
    if DummyFrameSource::is_enabled() {
        return Arc::new(DummyFrameSource::new());
    }
    Arc::new(NullSource)
}

/// Frame source used where no native camera backend exists. Every `open`
/// fails with `DeviceUnavailable`.
struct NullSource;

impl FrameSource for NullSource {
    fn open(
        &self,
        _facing: camera::types::FacingMode,
    ) -> camera::error::Result<camera::types::StreamHandle> {
        Err(camera::error::CameraError::DeviceUnavailable(
            "no camera backend on this platform".to_string(),
        ))
    }

    fn current_frame(&self) -> camera::error::Result<Arc<camera::types::Frame>> {
        Err(camera::error::CameraError::NotReady)
    }

    fn close(&self) {}

    fn is_open(&self) -> bool {
        false
    }
}

/// Create the face detector.
///
/// With a `model_dir` the model loads in the background and the detector
/// reports `Loading` until it is installed. Must be called from within a
/// tokio runtime.
pub fn create_detector(config: &AppConfig) -> Arc<ModelSlot> {
    match &config.model_dir {
        Some(dir) => {
            let slot = ModelSlot::loading();
            let dir = dir.clone();
            slot.spawn_load(async move { SkinToneDetector::load(&dir).await });
            slot
        }
        None => ModelSlot::ready(Arc::new(SkinToneDetector::default())),
    }
}

/// Wire a session from config.
pub fn build_session(
    config: &AppConfig,
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn detection::provider::DetectionProvider>,
) -> SessionOrchestrator {
    let controller = CaptureController::new(
        source,
        detector,
        ControllerOptions {
            facing: config.facing,
            tick_interval: config.tick_interval(),
        },
    );
    SessionOrchestrator::new(
        controller,
        OrchestratorOptions {
            catalog: config.catalog(),
            loader: Arc::new(DefaultBackdropLoader::new()),
            engine: CompositeEngine::new(),
            watermark_text: config.watermark_text.clone(),
            backdrop_timeout: config.backdrop_timeout(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera::types::FacingMode;
    use detection::provider::{DetectionProvider, ModelStatus};
    use tempfile::TempDir;

    #[test]
    fn null_source_is_unavailable() {
        let source = NullSource;
        assert!(matches!(
            source.open(FacingMode::User),
            Err(camera::error::CameraError::DeviceUnavailable(_))
        ));
        assert!(!source.is_open());
    }

    #[tokio::test]
    async fn detector_without_model_dir_is_ready() {
        let detector = create_detector(&AppConfig::default());
        assert_eq!(detector.status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn detector_with_missing_model_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            model_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let detector = create_detector(&config);
        for _ in 0..100 {
            if detector.status() != ModelStatus::Loading {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(matches!(detector.status(), ModelStatus::Failed(_)));
    }

    #[tokio::test]
    async fn session_built_on_null_source_cannot_start() {
        let config = AppConfig::default();
        let orchestrator =
            build_session(&config, Arc::new(NullSource), create_detector(&config));
        assert!(matches!(
            orchestrator.start(),
            Err(session::SessionError::DeviceUnavailable(_))
        ));
        assert_eq!(orchestrator.state(), session::SessionState::Idle);
    }
}
