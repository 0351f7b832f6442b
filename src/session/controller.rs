use std::sync::{Arc, Weak};
use std::time::Duration;

use image::RgbImage;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::camera::backend::FrameSource;
use crate::camera::types::{FacingMode, Frame, StreamHandle};
use crate::composite::backdrop::BackdropId;
use crate::composite::engine::CompositeResult;
use crate::detection::overlay::GuideOverlay;
use crate::detection::provider::{DetectionProvider, ModelStatus};
use crate::detection::tick::{DetectionLoop, TickOutcome, TickSink};
use crate::diagnostics::stats::DetectionStats;
use crate::enhance::{self, EnhancementParams};
use crate::session::error::{Result, SessionError};
use crate::session::state::{
    CapturedImage, CompositeSummary, EnhancedImage, Phase, SessionSnapshot, SessionState,
};

/// Stream and tick settings for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub facing: FacingMode,
    pub tick_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// Identifies one request for derived work on one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub capture_id: u64,
    pub generation: u64,
}

/// Whether a finished job's result was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Commit {
    Committed,
    /// A newer request for the same capture (or a reset) won.
    Superseded,
}

/// Enhancement work handed out by the controller.
#[derive(Debug, Clone)]
pub struct EnhanceJob {
    pub ticket: Ticket,
    pub params: EnhancementParams,
    /// The pristine capture.
    pub source: Arc<RgbImage>,
}

impl EnhanceJob {
    pub fn run(&self) -> RgbImage {
        enhance::apply(&self.source, self.params)
    }
}

/// Composite work handed out by the controller.
#[derive(Debug, Clone)]
pub struct CompositeJob {
    pub ticket: Ticket,
    pub backdrop_id: BackdropId,
    /// Generation of the enhanced image used as foreground.
    pub enhanced_generation: u64,
    pub foreground: Arc<RgbImage>,
}

struct Inner {
    phase: Phase,
    params: EnhancementParams,
    overlay: GuideOverlay,
    stats: DetectionStats,
    detection: Option<DetectionLoop>,
    stream: Option<StreamHandle>,
    /// Bumped whenever a live period begins or ends; ticks from older
    /// periods are ignored.
    epoch: u64,
    last_capture_id: u64,
    enhance_gen: u64,
    composite_gen: u64,
    /// Most recently requested backdrop.
    selected_backdrop: Option<BackdropId>,
}

/// The capture state machine and sole owner of session state.
///
/// Every transition takes the single state lock, which is never held
/// across an await. Derived images are computed outside the lock: the
/// controller hands out a job with a [`Ticket`] and only the ticket of the
/// latest request may commit its result.
pub struct CaptureController {
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn DetectionProvider>,
    options: ControllerOptions,
    inner: Mutex<Inner>,
    aligned: watch::Sender<bool>,
}

impl CaptureController {
    pub fn new(
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn DetectionProvider>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (aligned, _) = watch::channel(false);
        Arc::new(Self {
            source,
            detector,
            options,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                params: EnhancementParams::default(),
                overlay: GuideOverlay::new(),
                stats: DetectionStats::new(),
                detection: None,
                stream: None,
                epoch: 0,
                last_capture_id: 0,
                enhance_gen: 0,
                composite_gen: 0,
                selected_backdrop: None,
            }),
            aligned,
        })
    }

    /// `Idle -> Live`: open the camera and start the detection loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<StreamHandle> {
        let mut inner = self.inner.lock();
        if !matches!(inner.phase, Phase::Idle) {
            return Err(reject(&inner, "start"));
        }
        self.go_live(&mut inner)
    }

    /// `Live -> Captured`: take the current frame if a face is aligned.
    ///
    /// Stops the detection loop and returns the first enhancement job.
    pub fn capture(&self) -> Result<EnhanceJob> {
        let mut inner = self.inner.lock();
        if !matches!(inner.phase, Phase::Live) {
            return Err(reject(&inner, "capture"));
        }
        match self.detector.status() {
            ModelStatus::Ready => {}
            ModelStatus::Loading => {
                tracing::warn!("capture rejected: detection model still loading");
                return Err(SessionError::DetectionUnavailable(
                    "model still loading".to_string(),
                ));
            }
            ModelStatus::Failed(reason) => {
                tracing::warn!("capture rejected: detection model failed: {reason}");
                return Err(SessionError::DetectionUnavailable(reason));
            }
        }
        if !inner.overlay.is_aligned() {
            tracing::warn!("capture rejected: no face aligned");
            return Err(SessionError::NotAligned);
        }

        let frame = self.source.current_frame()?;
        let image = frame
            .to_image()
            .ok_or_else(|| SessionError::Processing("captured frame is malformed".to_string()))?;

        inner.last_capture_id += 1;
        inner.enhance_gen += 1;
        let capture = CapturedImage {
            id: inner.last_capture_id,
            image: Arc::new(image),
            timestamp_us: frame.timestamp_us,
        };
        let job = EnhanceJob {
            ticket: Ticket {
                capture_id: capture.id,
                generation: inner.enhance_gen,
            },
            params: inner.params,
            source: Arc::clone(&capture.image),
        };

        if let Some(detection) = inner.detection.take() {
            detection.cancel();
        }
        self.aligned.send_replace(false);
        tracing::info!(
            "captured frame {} ({}x{})",
            capture.id,
            frame.width,
            frame.height
        );
        inner.phase = Phase::Captured { capture };
        Ok(job)
    }

    /// Store an enhancement result. `Captured -> Previewing` on the first
    /// one.
    pub fn commit_enhanced(&self, job: &EnhanceJob, image: RgbImage) -> Commit {
        let mut inner = self.inner.lock();
        let current_capture = inner.phase.capture().map(|c| c.id);
        if inner.enhance_gen != job.ticket.generation
            || current_capture != Some(job.ticket.capture_id)
        {
            tracing::debug!("enhancement {} superseded", job.ticket.generation);
            return Commit::Superseded;
        }

        let enhanced = EnhancedImage {
            generation: job.ticket.generation,
            params: job.params,
            image: Arc::new(image),
        };
        inner.phase = match std::mem::take(&mut inner.phase) {
            Phase::Captured { capture } => {
                tracing::info!("enhancement ready, previewing capture {}", capture.id);
                Phase::Previewing {
                    capture,
                    enhanced,
                    composite: None,
                }
            }
            Phase::Previewing {
                capture, composite, ..
            } => Phase::Previewing {
                capture,
                enhanced,
                composite,
            },
            // `capture()` matched, so the phase holds a capture.
            other => other,
        };
        Commit::Committed
    }

    /// Set the params used by the next capture without starting a job.
    pub fn set_params(&self, params: EnhancementParams) {
        self.inner.lock().params = params;
    }

    /// `Previewing -> Previewing`: recompute from the pristine capture.
    pub fn begin_adjust(&self, params: EnhancementParams) -> Result<EnhanceJob> {
        let mut inner = self.inner.lock();
        let (capture_id, source) = match &inner.phase {
            Phase::Previewing { capture, .. } => (capture.id, Arc::clone(&capture.image)),
            _ => return Err(reject(&inner, "adjust")),
        };
        inner.params = params;
        inner.enhance_gen += 1;
        Ok(EnhanceJob {
            ticket: Ticket {
                capture_id,
                generation: inner.enhance_gen,
            },
            params,
            source,
        })
    }

    /// `Previewing -> Previewing`: request a composite of the current
    /// enhanced image onto `backdrop_id`.
    pub fn begin_composite(&self, backdrop_id: BackdropId) -> Result<CompositeJob> {
        let mut inner = self.inner.lock();
        let (capture_id, enhanced_generation, foreground) = match &inner.phase {
            Phase::Previewing {
                capture, enhanced, ..
            } => (
                capture.id,
                enhanced.generation,
                Arc::clone(&enhanced.image),
            ),
            _ => return Err(reject(&inner, "select a backdrop")),
        };
        inner.composite_gen += 1;
        inner.selected_backdrop = Some(backdrop_id);
        Ok(CompositeJob {
            ticket: Ticket {
                capture_id,
                generation: inner.composite_gen,
            },
            backdrop_id,
            enhanced_generation,
            foreground,
        })
    }

    /// Store a composite. Superseded when a newer composite was requested
    /// or the enhanced image it was built from has been replaced.
    pub fn commit_composite(&self, job: &CompositeJob, result: CompositeResult) -> Commit {
        let mut inner = self.inner.lock();
        if inner.composite_gen != job.ticket.generation {
            tracing::debug!("composite {} superseded", job.ticket.generation);
            return Commit::Superseded;
        }
        match &mut inner.phase {
            Phase::Previewing {
                capture,
                enhanced,
                composite,
            } if capture.id == job.ticket.capture_id
                && enhanced.generation == job.enhanced_generation =>
            {
                tracing::info!("composite ready on backdrop {}", job.backdrop_id);
                *composite = Some(result);
                Commit::Committed
            }
            _ => {
                tracing::debug!("composite {} is stale", job.ticket.generation);
                Commit::Superseded
            }
        }
    }

    /// Give up on a composite request. The selection falls back to the
    /// backdrop of the composite still shown.
    pub fn abandon_composite(&self, job: &CompositeJob) {
        let mut inner = self.inner.lock();
        if inner.composite_gen != job.ticket.generation {
            return;
        }
        inner.selected_backdrop = match &inner.phase {
            Phase::Previewing {
                composite: Some(c), ..
            } => Some(c.backdrop_id),
            _ => None,
        };
    }

    /// Remember a backdrop choice without compositing, e.g. before capture.
    pub fn preselect_backdrop(&self, backdrop_id: BackdropId) {
        self.inner.lock().selected_backdrop = Some(backdrop_id);
    }

    /// `Previewing -> Live`: discard the capture and go live again.
    pub fn regenerate(self: &Arc<Self>) -> Result<StreamHandle> {
        let mut inner = self.inner.lock();
        if !matches!(inner.phase, Phase::Previewing { .. }) {
            return Err(reject(&inner, "regenerate"));
        }
        inner.phase = Phase::Idle;
        inner.enhance_gen += 1;
        inner.composite_gen += 1;
        tracing::info!("regenerating: capture discarded");
        self.go_live(&mut inner)
    }

    /// `any -> Idle`: stop detection, release the camera, drop all images.
    /// Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(detection) = inner.detection.take() {
            detection.cancel();
        }
        self.source.close();
        let was = inner.phase.state();
        inner.phase = Phase::Idle;
        inner.stream = None;
        inner.epoch += 1;
        inner.enhance_gen += 1;
        inner.composite_gen += 1;
        inner.overlay.reset();
        self.aligned.send_replace(false);
        if was != SessionState::Idle {
            tracing::info!("session closed from {was:?}");
        }
    }

    fn go_live(self: &Arc<Self>, inner: &mut Inner) -> Result<StreamHandle> {
        let stream = match self.source.open(self.options.facing) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("cannot go live: {e}");
                inner.phase = Phase::Idle;
                inner.stream = None;
                return Err(e.into());
            }
        };

        inner.epoch += 1;
        inner.phase = Phase::Live;
        inner.stream = Some(stream.clone());
        inner.overlay.reset();
        inner.stats.reset();
        self.aligned.send_replace(false);

        let sink = Arc::new(LiveSink {
            controller: Arc::downgrade(self),
            epoch: inner.epoch,
        });
        inner.detection = Some(DetectionLoop::spawn(
            Arc::clone(&self.source),
            Arc::clone(&self.detector),
            sink,
            self.options.tick_interval,
        ));
        tracing::info!(
            "live on {} ({}x{})",
            stream.device_id,
            stream.width,
            stream.height
        );
        Ok(stream)
    }

    fn apply_tick(
        &self,
        epoch: u64,
        frame: &Frame,
        outcome: TickOutcome,
        latency: Duration,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || !matches!(inner.phase, Phase::Live) {
            return false;
        }
        let aligned = match outcome {
            TickOutcome::Detected(region) => {
                if region.is_some() {
                    inner.stats.record_hit(latency);
                } else {
                    inner.stats.record_miss(latency);
                }
                inner.overlay.update(frame, region)
            }
            TickOutcome::Pending => {
                inner.stats.record_pending();
                inner.overlay.mark_pending();
                false
            }
        };
        self.aligned.send_if_modified(|current| {
            let changed = *current != aligned;
            *current = aligned;
            changed
        });
        tracing::debug!(
            "tick: {:?} in {:.1}ms",
            inner.overlay.status(),
            latency.as_secs_f64() * 1000.0
        );
        true
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().phase.state()
    }

    pub fn is_aligned(&self) -> bool {
        *self.aligned.borrow()
    }

    /// Watch the `aligned` signal.
    pub fn subscribe_aligned(&self) -> watch::Receiver<bool> {
        self.aligned.subscribe()
    }

    pub fn params(&self) -> EnhancementParams {
        self.inner.lock().params
    }

    pub fn selected_backdrop(&self) -> Option<BackdropId> {
        self.inner.lock().selected_backdrop
    }

    /// Copy of the guide for rendering.
    pub fn guide(&self) -> GuideOverlay {
        self.inner.lock().overlay.clone()
    }

    pub fn captured_image(&self) -> Option<Arc<RgbImage>> {
        self.inner
            .lock()
            .phase
            .capture()
            .map(|c| Arc::clone(&c.image))
    }

    pub fn enhanced_image(&self) -> Option<EnhancedImage> {
        match &self.inner.lock().phase {
            Phase::Previewing { enhanced, .. } => Some(enhanced.clone()),
            _ => None,
        }
    }

    pub fn composite(&self) -> Option<CompositeResult> {
        match &self.inner.lock().phase {
            Phase::Previewing { composite, .. } => composite.clone(),
            _ => None,
        }
    }

    /// Whether the detection task is still running.
    pub fn is_detecting(&self) -> bool {
        self.inner
            .lock()
            .detection
            .as_ref()
            .is_some_and(|d| !d.is_finished())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let (enhanced_params, composite) = match &inner.phase {
            Phase::Previewing {
                enhanced,
                composite,
                ..
            } => (
                Some(enhanced.params),
                composite.as_ref().map(CompositeSummary::from),
            ),
            _ => (None, None),
        };
        SessionSnapshot {
            state: inner.phase.state(),
            aligned: inner.overlay.is_aligned(),
            guide: inner.overlay.snapshot(),
            model: self.detector.status(),
            stream: inner.stream.clone(),
            params: inner.params,
            capture_id: inner.phase.capture().map(|c| c.id),
            enhanced_params,
            selected_backdrop: inner.selected_backdrop,
            composite,
            diagnostics: inner.stats.snapshot(),
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.source.close();
    }
}

fn reject(inner: &Inner, operation: &str) -> SessionError {
    let state = inner.phase.state();
    tracing::warn!("rejected {operation} while {state:?}");
    SessionError::NotReady(format!("cannot {operation} while {state:?}"))
}

/// Forwards ticks to the controller for one live period.
struct LiveSink {
    controller: Weak<CaptureController>,
    epoch: u64,
}

impl TickSink for LiveSink {
    fn on_tick(&self, frame: &Frame, outcome: TickOutcome, latency: Duration) -> bool {
        match self.controller.upgrade() {
            Some(controller) => controller.apply_tick(self.epoch, frame, outcome, latency),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::{DummyAvailability, DummyFrameSource};
    use crate::detection::fixed::{FixedDetector, Scripted};
    use crate::detection::slot::ModelSlot;

    const WAIT: Duration = Duration::from_secs(5);

    fn options() -> ControllerOptions {
        ControllerOptions {
            tick_interval: Duration::from_millis(2),
            ..Default::default()
        }
    }

    fn controller_with(
        detector: Arc<dyn DetectionProvider>,
    ) -> (Arc<CaptureController>, Arc<DummyFrameSource>) {
        let source = Arc::new(DummyFrameSource::new());
        let controller = CaptureController::new(source.clone(), detector, options());
        (controller, source)
    }

    async fn wait_aligned(controller: &CaptureController) {
        let mut rx = controller.subscribe_aligned();
        tokio::time::timeout(WAIT, rx.wait_for(|a| *a))
            .await
            .unwrap()
            .unwrap();
    }

    /// A controller in `Previewing` with the first enhancement committed.
    async fn previewing() -> (Arc<CaptureController>, Arc<DummyFrameSource>) {
        let (controller, source) = controller_with(Arc::new(FixedDetector::full_frame()));
        controller.start().unwrap();
        wait_aligned(&controller).await;
        let job = controller.capture().unwrap();
        assert_eq!(controller.commit_enhanced(&job, job.run()), Commit::Committed);
        (controller, source)
    }

    #[tokio::test]
    async fn start_goes_live_once() {
        let (controller, source) = controller_with(Arc::new(FixedDetector::no_face()));
        let stream = controller.start().unwrap();
        assert_eq!(stream.facing, FacingMode::User);
        assert_eq!(controller.state(), SessionState::Live);
        assert!(controller.is_detecting());
        assert_eq!(source.open_count(), 1);

        assert!(matches!(controller.start(), Err(SessionError::NotReady(_))));
        assert_eq!(source.open_count(), 1);
        controller.close();
    }

    #[tokio::test]
    async fn denied_camera_stays_idle() {
        let (controller, source) = controller_with(Arc::new(FixedDetector::full_frame()));
        source.set_availability(DummyAvailability::PermissionDenied);

        let err = controller.start().unwrap_err();
        assert!(matches!(err, SessionError::DeviceUnavailable(_)));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!controller.is_detecting());
    }

    #[tokio::test]
    async fn capture_requires_live() {
        let (controller, _source) = controller_with(Arc::new(FixedDetector::full_frame()));
        assert!(matches!(
            controller.capture(),
            Err(SessionError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn capture_without_face_is_not_aligned() {
        let (controller, _source) = controller_with(Arc::new(FixedDetector::no_face()));
        controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(controller.capture().unwrap_err(), SessionError::NotAligned);
        assert_eq!(controller.state(), SessionState::Live);
        assert!(controller.snapshot().diagnostics.miss_count > 0);
        controller.close();
    }

    #[tokio::test]
    async fn capture_is_blocked_while_model_loads() {
        let (controller, _source) = controller_with(ModelSlot::loading());
        controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.model, ModelStatus::Loading);
        assert!(snapshot.diagnostics.pending_count > 0);
        assert!(matches!(
            controller.capture(),
            Err(SessionError::DetectionUnavailable(_))
        ));
        assert_eq!(controller.state(), SessionState::Live);
        controller.close();
    }

    #[tokio::test]
    async fn capture_stops_detection_and_enhancement_previews() {
        let (controller, _source) = controller_with(Arc::new(FixedDetector::full_frame()));
        controller.start().unwrap();
        wait_aligned(&controller).await;

        let job = controller.capture().unwrap();
        assert_eq!(controller.state(), SessionState::Captured);
        assert!(!controller.is_aligned());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!controller.is_detecting());

        assert_eq!(controller.commit_enhanced(&job, job.run()), Commit::Committed);
        assert_eq!(controller.state(), SessionState::Previewing);
        let enhanced = controller.enhanced_image().unwrap();
        assert_eq!(enhanced.params, EnhancementParams::default());
        assert_eq!(
            enhanced.image.dimensions(),
            controller.captured_image().unwrap().dimensions()
        );
    }

    #[tokio::test]
    async fn losing_the_face_unaligns() {
        let detector = Arc::new(FixedDetector::full_frame());
        let (controller, _source) = controller_with(detector.clone());
        controller.start().unwrap();
        wait_aligned(&controller).await;

        detector.set(Scripted::NoFace);
        let mut rx = controller.subscribe_aligned();
        tokio::time::timeout(WAIT, rx.wait_for(|a| !*a))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.capture().unwrap_err(), SessionError::NotAligned);
        controller.close();
    }

    #[tokio::test]
    async fn adjust_requires_previewing() {
        let (controller, _source) = controller_with(Arc::new(FixedDetector::full_frame()));
        assert!(matches!(
            controller.begin_adjust(EnhancementParams::new(10)),
            Err(SessionError::NotReady(_))
        ));
        assert!(matches!(
            controller.begin_composite(1),
            Err(SessionError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn latest_adjustment_wins() {
        let (controller, _source) = previewing().await;

        let first = controller.begin_adjust(EnhancementParams::new(10)).unwrap();
        let second = controller.begin_adjust(EnhancementParams::new(90)).unwrap();

        assert_eq!(controller.commit_enhanced(&second, second.run()), Commit::Committed);
        assert_eq!(controller.commit_enhanced(&first, first.run()), Commit::Superseded);
        assert_eq!(
            controller.enhanced_image().unwrap().params,
            EnhancementParams::new(90)
        );
        assert_eq!(controller.params(), EnhancementParams::new(90));
    }

    #[tokio::test]
    async fn adjustment_recomputes_from_pristine_capture() {
        let (controller, _source) = previewing().await;
        let captured = controller.captured_image().unwrap();

        let job = controller.begin_adjust(EnhancementParams::new(0)).unwrap();
        controller.commit_enhanced(&job, job.run());
        assert_eq!(*controller.enhanced_image().unwrap().image, *captured);
    }

    #[tokio::test]
    async fn composite_is_superseded_by_newer_enhancement() {
        let (controller, _source) = previewing().await;
        let engine = crate::composite::engine::CompositeEngine::new();
        let backdrop = RgbImage::new(4, 4);

        let composite = controller.begin_composite(2).unwrap();
        let adjust = controller.begin_adjust(EnhancementParams::new(5)).unwrap();
        controller.commit_enhanced(&adjust, adjust.run());

        let result = engine
            .composite(&composite.foreground, &backdrop, 2, "X")
            .unwrap();
        assert_eq!(
            controller.commit_composite(&composite, result),
            Commit::Superseded
        );
        assert!(controller.composite().is_none());
    }

    #[tokio::test]
    async fn composite_commits_and_abandon_restores_selection() {
        let (controller, _source) = previewing().await;
        let engine = crate::composite::engine::CompositeEngine::new();
        let backdrop = RgbImage::new(4, 4);

        let job = controller.begin_composite(1).unwrap();
        let result = engine.composite(&job.foreground, &backdrop, 1, "X").unwrap();
        assert_eq!(controller.commit_composite(&job, result), Commit::Committed);
        assert_eq!(controller.composite().unwrap().backdrop_id, 1);

        let failed = controller.begin_composite(3).unwrap();
        assert_eq!(controller.selected_backdrop(), Some(3));
        controller.abandon_composite(&failed);
        assert_eq!(controller.selected_backdrop(), Some(1));
        assert_eq!(controller.composite().unwrap().backdrop_id, 1);
    }

    #[tokio::test]
    async fn regenerate_returns_to_live() {
        let (controller, source) = previewing().await;
        let stale = controller.begin_adjust(EnhancementParams::new(70)).unwrap();

        controller.regenerate().unwrap();
        assert_eq!(controller.state(), SessionState::Live);
        assert!(controller.captured_image().is_none());
        assert!(controller.is_detecting());
        // Stream was still open, so no second device open.
        assert_eq!(source.open_count(), 1);

        assert_eq!(controller.commit_enhanced(&stale, stale.run()), Commit::Superseded);
        wait_aligned(&controller).await;
        let job = controller.capture().unwrap();
        assert_eq!(job.ticket.capture_id, 2);
        controller.close();
    }

    #[tokio::test]
    async fn regenerate_only_from_previewing() {
        let (controller, _source) = controller_with(Arc::new(FixedDetector::full_frame()));
        controller.start().unwrap();
        assert!(matches!(
            controller.regenerate(),
            Err(SessionError::NotReady(_))
        ));
        controller.close();
    }

    #[tokio::test]
    async fn close_releases_everything_and_is_idempotent() {
        let (controller, source) = previewing().await;
        controller.close();
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.captured_image().is_none());
        assert!(!source.is_open());
        assert_eq!(source.release_count(), 1);

        controller.close();
        assert_eq!(source.release_count(), 1);

        // A fresh start works after close.
        controller.start().unwrap();
        assert_eq!(controller.state(), SessionState::Live);
        controller.close();
    }

    #[tokio::test]
    async fn close_releases_device_once_from_every_state() {
        for target in [
            SessionState::Live,
            SessionState::Captured,
            SessionState::Previewing,
        ] {
            let (controller, source) = controller_with(Arc::new(FixedDetector::full_frame()));
            controller.start().unwrap();
            if target != SessionState::Live {
                wait_aligned(&controller).await;
                let job = controller.capture().unwrap();
                if target == SessionState::Previewing {
                    controller.commit_enhanced(&job, job.run());
                }
            }
            assert_eq!(controller.state(), target);

            controller.close();
            controller.close();
            assert_eq!(controller.state(), SessionState::Idle, "from {target:?}");
            assert_eq!(source.release_count(), 1, "from {target:?}");
            assert!(!source.is_open());
        }

        // Never opened: nothing to release.
        let (controller, source) = controller_with(Arc::new(FixedDetector::full_frame()));
        controller.close();
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(source.release_count(), 0);
    }

    #[tokio::test]
    async fn close_while_captured_supersedes_enhancement() {
        let (controller, _source) = controller_with(Arc::new(FixedDetector::full_frame()));
        controller.start().unwrap();
        wait_aligned(&controller).await;
        let job = controller.capture().unwrap();

        controller.close();
        assert_eq!(controller.commit_enhanced(&job, job.run()), Commit::Superseded);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn snapshot_reflects_preview() {
        let (controller, _source) = previewing().await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, SessionState::Previewing);
        assert_eq!(snapshot.capture_id, Some(1));
        assert_eq!(snapshot.enhanced_params, Some(EnhancementParams::default()));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "previewing");
        assert_eq!(json["params"], 50);
    }
}
