use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use parking_lot::Mutex;

use crate::camera::types::StreamHandle;
use crate::composite::backdrop::{BackdropCatalog, BackdropId, BackdropLoader};
use crate::composite::encode::{self, EncodedImage, OutputFormat};
use crate::composite::engine::CompositeEngine;
use crate::enhance::EnhancementParams;
use crate::session::controller::{CaptureController, Commit, CompositeJob, EnhanceJob};
use crate::session::error::{Result, SessionError};
use crate::session::state::{SessionSnapshot, SessionState};
use crate::settings::store::PreferencesStore;

/// Backdrop and watermark settings for an orchestrator.
pub struct OrchestratorOptions {
    pub catalog: BackdropCatalog,
    pub loader: Arc<dyn BackdropLoader>,
    pub engine: CompositeEngine,
    pub watermark_text: String,
    pub backdrop_timeout: Duration,
}

/// Entry point for user intents.
///
/// Turns start/capture/adjust/select/regenerate/close into controller
/// transitions and runs the pixel work on the blocking pool. Results that
/// lose a race against a newer request come back as [`Commit::Superseded`].
pub struct SessionOrchestrator {
    controller: Arc<CaptureController>,
    options: OrchestratorOptions,
    /// Decoded backdrops by id.
    backdrops: Mutex<HashMap<BackdropId, Arc<RgbImage>>>,
    preferences: Option<Arc<PreferencesStore>>,
}

impl SessionOrchestrator {
    pub fn new(controller: Arc<CaptureController>, options: OrchestratorOptions) -> Self {
        Self {
            controller,
            options,
            backdrops: Mutex::new(HashMap::new()),
            preferences: None,
        }
    }

    /// Restore saved subtlety and backdrop, and remember future choices.
    pub fn with_preferences(mut self, store: Arc<PreferencesStore>) -> Self {
        let saved = store.get();
        if let Some(subtlety) = saved.subtlety {
            self.controller
                .set_params(EnhancementParams::new(i64::from(subtlety)));
        }
        match saved.backdrop_id {
            Some(id) if self.options.catalog.get(id).is_some() => {
                self.controller.preselect_backdrop(id);
            }
            Some(id) => tracing::warn!("saved backdrop {id} is no longer in the catalog"),
            None => {}
        }
        self.preferences = Some(store);
        self
    }

    pub fn controller(&self) -> &Arc<CaptureController> {
        &self.controller
    }

    pub fn catalog(&self) -> &BackdropCatalog {
        &self.options.catalog
    }

    pub fn start(&self) -> Result<StreamHandle> {
        self.controller.start()
    }

    /// Wait until the guide reports an aligned face.
    ///
    /// Fails with `NotAligned` when `timeout` elapses first.
    pub async fn wait_until_aligned(&self, timeout: Duration) -> Result<()> {
        let mut aligned = self.controller.subscribe_aligned();
        let waited = tokio::time::timeout(timeout, async {
            aligned.wait_for(|a| *a).await.map(|_| ())
        })
        .await;
        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SessionError::NotReady("session dropped".to_string())),
            Err(_) => Err(SessionError::NotAligned),
        }
    }

    /// Capture, enhance and (if a backdrop is selected) composite.
    pub async fn capture(&self) -> Result<Commit> {
        let job = self.controller.capture()?;
        let commit = self.enhance(job).await?;
        if commit == Commit::Committed {
            self.recomposite().await;
        }
        Ok(commit)
    }

    /// Re-run enhancement with a new subtlety.
    pub async fn adjust_params(&self, subtlety: i64) -> Result<Commit> {
        let params = EnhancementParams::new(subtlety);
        let job = self.controller.begin_adjust(params)?;
        if let Some(store) = &self.preferences {
            store.set_subtlety(params.subtlety());
        }
        let commit = self.enhance(job).await?;
        if commit == Commit::Committed {
            self.recomposite().await;
        }
        Ok(commit)
    }

    /// Composite the current enhanced image onto backdrop `id`.
    ///
    /// On a load failure or timeout the previous composite stays in place.
    pub async fn select_backdrop(&self, id: BackdropId) -> Result<Commit> {
        if self.options.catalog.get(id).is_none() {
            tracing::warn!("rejected unknown backdrop {id}");
            return Err(SessionError::UnknownBackdrop(id));
        }
        let job = self.controller.begin_composite(id)?;
        if let Some(store) = &self.preferences {
            store.set_backdrop(id);
        }
        self.composite(job).await
    }

    /// Discard the capture and go live again.
    pub fn regenerate(&self) -> Result<StreamHandle> {
        self.controller.regenerate()
    }

    pub fn close(&self) {
        self.controller.close();
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    /// Encode the finished composite.
    pub fn export(&self, format: OutputFormat) -> Result<EncodedImage> {
        let composite = self
            .controller
            .composite()
            .ok_or_else(|| SessionError::NotReady("no composite to export".to_string()))?;
        Ok(encode::encode(&composite.image, format)?)
    }

    /// Encode the enhanced image without a backdrop.
    pub fn export_enhanced(&self, format: OutputFormat) -> Result<EncodedImage> {
        let enhanced = self
            .controller
            .enhanced_image()
            .ok_or_else(|| SessionError::NotReady("no enhanced image".to_string()))?;
        Ok(encode::encode(&enhanced.image, format)?)
    }

    async fn enhance(&self, job: EnhanceJob) -> Result<Commit> {
        let (job, image) = tokio::task::spawn_blocking(move || {
            let image = job.run();
            (job, image)
        })
        .await
        .map_err(|e| SessionError::Processing(e.to_string()))?;
        Ok(self.controller.commit_enhanced(&job, image))
    }

    /// Refresh the composite for the selected backdrop after the enhanced
    /// image changed. Failures keep the previous composite.
    async fn recomposite(&self) {
        let Some(id) = self.controller.selected_backdrop() else {
            return;
        };
        let result = match self.controller.begin_composite(id) {
            Ok(job) => self.composite(job).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!("could not refresh composite on backdrop {id}: {e}");
        }
    }

    async fn composite(&self, job: CompositeJob) -> Result<Commit> {
        let backdrop = match self.load_backdrop(job.backdrop_id).await {
            Ok(backdrop) => backdrop,
            Err(e) => {
                self.controller.abandon_composite(&job);
                return Err(e);
            }
        };

        let engine = self.options.engine.clone();
        let text = self.options.watermark_text.clone();
        let (job, result) = tokio::task::spawn_blocking(move || {
            let result = engine.composite(&job.foreground, &backdrop, job.backdrop_id, &text);
            (job, result)
        })
        .await
        .map_err(|e| SessionError::Processing(e.to_string()))?;

        match result {
            Ok(result) => Ok(self.controller.commit_composite(&job, result)),
            Err(e) => {
                self.controller.abandon_composite(&job);
                Err(e.into())
            }
        }
    }

    async fn load_backdrop(&self, id: BackdropId) -> Result<Arc<RgbImage>> {
        let cached = self.backdrops.lock().get(&id).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let backdrop = self
            .options
            .catalog
            .get(id)
            .ok_or(SessionError::UnknownBackdrop(id))?;

        let timeout = self.options.backdrop_timeout;
        let loaded = tokio::time::timeout(timeout, self.options.loader.load(backdrop)).await;
        let image = match loaded {
            Ok(Ok(image)) if image.width() > 0 && image.height() > 0 => Arc::new(image),
            Ok(Ok(_)) => return Err(load_failed(id, "image is empty".to_string())),
            Ok(Err(e)) => return Err(load_failed(id, e.to_string())),
            Err(_) => {
                return Err(load_failed(
                    id,
                    format!("timed out after {}ms", timeout.as_millis()),
                ))
            }
        };
        tracing::info!(
            "loaded backdrop {id} \"{}\" ({}x{})",
            backdrop.name,
            image.width(),
            image.height()
        );
        self.backdrops.lock().insert(id, Arc::clone(&image));
        Ok(image)
    }
}

fn load_failed(id: BackdropId, reason: String) -> SessionError {
    tracing::warn!("backdrop {id} failed to load: {reason}");
    SessionError::BackdropLoadFailed { id, reason }
}
