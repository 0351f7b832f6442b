use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::camera::types::Frame;
use crate::detection::error::{DetectionError, Result};
use crate::detection::provider::{DetectionProvider, FaceRegion, ModelStatus};

enum SlotState {
    Loading,
    Ready(Arc<dyn DetectionProvider>),
    Failed(String),
}

/// A detector whose model loads in the background.
///
/// Until the load finishes `detect` returns `DetectionError::Unavailable`,
/// which the detection loop reports as a pending guide rather than a failure.
pub struct ModelSlot {
    state: RwLock<SlotState>,
}

impl ModelSlot {
    /// An empty slot waiting for [`ModelSlot::install`] or [`ModelSlot::fail`].
    pub fn loading() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(SlotState::Loading),
        })
    }

    /// A slot that is ready immediately.
    pub fn ready(provider: Arc<dyn DetectionProvider>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(SlotState::Ready(provider)),
        })
    }

    /// Run `load` on the runtime and install its result.
    pub fn spawn_load<F, P>(self: &Arc<Self>, load: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<P>> + Send + 'static,
        P: DetectionProvider + 'static,
    {
        let slot = Arc::clone(self);
        tokio::spawn(async move {
            match load.await {
                Ok(provider) => slot.install(Arc::new(provider)),
                Err(e) => slot.fail(e.to_string()),
            }
        })
    }

    pub fn install(&self, provider: Arc<dyn DetectionProvider>) {
        *self.state.write() = SlotState::Ready(provider);
        tracing::info!("face detection model ready");
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("face detection model failed to load: {reason}");
        *self.state.write() = SlotState::Failed(reason);
    }
}

#[async_trait]
impl DetectionProvider for ModelSlot {
    async fn detect(&self, frame: &Frame) -> Result<Option<FaceRegion>> {
        // Clone out of the lock; it must not be held across the await.
        let provider = match &*self.state.read() {
            SlotState::Ready(provider) => Arc::clone(provider),
            SlotState::Loading => {
                return Err(DetectionError::Unavailable(
                    "model still loading".to_string(),
                ))
            }
            SlotState::Failed(reason) => return Err(DetectionError::Unavailable(reason.clone())),
        };
        provider.detect(frame).await
    }

    fn status(&self) -> ModelStatus {
        match &*self.state.read() {
            SlotState::Loading => ModelStatus::Loading,
            SlotState::Ready(_) => ModelStatus::Ready,
            SlotState::Failed(reason) => ModelStatus::Failed(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::DummyFrameSource;
    use crate::detection::fixed::FixedDetector;

    #[tokio::test]
    async fn loading_slot_is_unavailable() {
        let slot = ModelSlot::loading();
        let frame = DummyFrameSource::test_frame(4, 4);
        assert_eq!(slot.status(), ModelStatus::Loading);
        assert!(matches!(
            slot.detect(&frame).await,
            Err(DetectionError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn spawned_load_installs_provider() {
        let slot = ModelSlot::loading();
        slot.spawn_load(async { Ok(FixedDetector::full_frame()) })
            .await
            .unwrap();

        assert_eq!(slot.status(), ModelStatus::Ready);
        let frame = DummyFrameSource::test_frame(4, 4);
        assert!(slot.detect(&frame).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_load_keeps_reporting_unavailable() {
        let slot = ModelSlot::loading();
        slot.spawn_load(async {
            Err::<FixedDetector, _>(DetectionError::ModelLoad {
                path: "/models/skin_tone.json".into(),
                reason: "not found".into(),
            })
        })
        .await
        .unwrap();

        assert!(matches!(slot.status(), ModelStatus::Failed(_)));
        let frame = DummyFrameSource::test_frame(4, 4);
        let err = slot.detect(&frame).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
