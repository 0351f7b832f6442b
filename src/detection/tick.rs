use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::camera::backend::FrameSource;
use crate::camera::error::CameraError;
use crate::camera::types::Frame;
use crate::detection::provider::{DetectionProvider, FaceRegion};

/// Result of one detection tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The detector answered; `None` means no face.
    Detected(Option<FaceRegion>),
    /// The detector is not ready yet.
    Pending,
}

/// Receives each tick's result.
///
/// Called synchronously from the loop task. Returning `false` detaches the
/// sink and ends the loop.
pub trait TickSink: Send + Sync {
    fn on_tick(&self, frame: &Frame, outcome: TickOutcome, latency: Duration) -> bool;
}

/// Why the loop task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    /// The frame source was closed underneath the loop.
    SourceClosed,
    /// The sink declined further ticks.
    SinkDetached,
}

/// Handle to the running detection task.
///
/// Dropping the handle cancels the task.
pub struct DetectionLoop {
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<LoopExit>>,
}

impl DetectionLoop {
    /// Spawn the tick task on the current runtime.
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn DetectionProvider>,
        sink: Arc<dyn TickSink>,
        interval: Duration,
    ) -> Self {
        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(run(source, detector, sink, interval, cancelled));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Signal cancellation without waiting. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(mut self) -> LoopExit {
        self.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(LoopExit::Cancelled),
            None => LoopExit::Cancelled,
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn DetectionProvider>,
    sink: Arc<dyn TickSink>,
    interval: Duration,
    mut cancelled: watch::Receiver<bool>,
) -> LoopExit {
    tracing::info!("detection loop started ({}ms interval)", interval.as_millis());
    let exit = loop {
        if *cancelled.borrow() {
            break LoopExit::Cancelled;
        }

        match source.current_frame() {
            Ok(frame) => {
                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = cancelled.changed() => break LoopExit::Cancelled,
                    result = detector.detect(&frame) => match result {
                        Ok(region) => TickOutcome::Detected(region),
                        Err(e) => {
                            tracing::debug!("detection pending: {e}");
                            TickOutcome::Pending
                        }
                    },
                };
                // A cancel that raced the detector wins over the result.
                if *cancelled.borrow() {
                    break LoopExit::Cancelled;
                }
                if !sink.on_tick(&frame, outcome, started.elapsed()) {
                    break LoopExit::SinkDetached;
                }
            }
            Err(CameraError::NotReady) => break LoopExit::SourceClosed,
            Err(e) => tracing::debug!("no frame this tick: {e}"),
        }

        tokio::select! {
            biased;
            _ = cancelled.changed() => break LoopExit::Cancelled,
            _ = tokio::time::sleep(interval) => {}
        }
    };
    tracing::info!("detection loop exited: {exit:?}");
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::DummyFrameSource;
    use crate::camera::types::FacingMode;
    use crate::detection::fixed::FixedDetector;
    use crate::detection::slot::ModelSlot;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        outcomes: Mutex<Vec<TickOutcome>>,
        limit: Option<usize>,
    }

    impl TickSink for Recorder {
        fn on_tick(&self, _frame: &Frame, outcome: TickOutcome, _latency: Duration) -> bool {
            let mut outcomes = self.outcomes.lock();
            outcomes.push(outcome);
            self.limit.is_none_or(|limit| outcomes.len() < limit)
        }
    }

    fn open_source() -> Arc<DummyFrameSource> {
        let source = Arc::new(DummyFrameSource::new());
        source.open(FacingMode::User).unwrap();
        source
    }

    #[tokio::test]
    async fn ticks_until_sink_detaches() {
        let sink = Arc::new(Recorder {
            limit: Some(3),
            ..Default::default()
        });
        let detection = DetectionLoop::spawn(
            open_source(),
            Arc::new(FixedDetector::full_frame()),
            sink.clone(),
            Duration::from_millis(1),
        );

        assert_eq!(detection.stop_after_exit().await, LoopExit::SinkDetached);
        let outcomes = sink.outcomes.lock();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, TickOutcome::Detected(Some(_)))));
    }

    #[tokio::test]
    async fn stop_cancels_sleeping_loop() {
        let sink = Arc::new(Recorder::default());
        let detection = DetectionLoop::spawn(
            open_source(),
            Arc::new(FixedDetector::no_face()),
            sink.clone(),
            Duration::from_secs(3600),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(detection.stop().await, LoopExit::Cancelled);
        let outcomes = sink.outcomes.lock();
        assert_eq!(*outcomes, vec![TickOutcome::Detected(None)]);
    }

    #[tokio::test]
    async fn closed_source_ends_loop() {
        let source = open_source();
        source.close();
        let detection = DetectionLoop::spawn(
            source,
            Arc::new(FixedDetector::full_frame()),
            Arc::new(Recorder::default()),
            Duration::from_millis(1),
        );
        assert_eq!(detection.stop_after_exit().await, LoopExit::SourceClosed);
    }

    #[tokio::test]
    async fn loading_model_reports_pending() {
        let sink = Arc::new(Recorder {
            limit: Some(1),
            ..Default::default()
        });
        let detection = DetectionLoop::spawn(
            open_source(),
            ModelSlot::loading(),
            sink.clone(),
            Duration::from_millis(1),
        );
        assert_eq!(detection.stop_after_exit().await, LoopExit::SinkDetached);
        assert_eq!(*sink.outcomes.lock(), vec![TickOutcome::Pending]);
    }

    #[tokio::test]
    async fn dropping_handle_cancels() {
        let sink = Arc::new(Recorder::default());
        let detection = DetectionLoop::spawn(
            open_source(),
            Arc::new(FixedDetector::no_face()),
            sink.clone(),
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(detection);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let settled = sink.outcomes.lock().len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.outcomes.lock().len(), settled);
    }

    impl DetectionLoop {
        /// Wait for the loop to end on its own.
        async fn stop_after_exit(mut self) -> LoopExit {
            let handle = self.handle.take().unwrap();
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap()
        }
    }
}
