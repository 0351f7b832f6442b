use serde::Serialize;
use std::time::{Duration, Instant};

/// Collects diagnostic statistics for a live detection session.
pub struct DetectionStats {
    tick_count: u64,
    hit_count: u64,
    miss_count: u64,
    pending_count: u64,
    start_time: Instant,
    last_latency_us: u64,
    total_latency_us: u64,
}

/// Snapshot of detection stats for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSnapshot {
    pub ticks_per_second: f64,
    pub tick_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub pending_count: u64,
    pub hit_rate: f64,
    pub last_latency_ms: f64,
    pub average_latency_ms: f64,
}

impl DetectionStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            tick_count: 0,
            hit_count: 0,
            miss_count: 0,
            pending_count: 0,
            start_time: Instant::now(),
            last_latency_us: 0,
            total_latency_us: 0,
        }
    }

    /// Record a tick where the detector found a face.
    pub fn record_hit(&mut self, latency: Duration) {
        self.hit_count += 1;
        self.record_answered(latency);
    }

    /// Record a tick where the detector found no face.
    pub fn record_miss(&mut self, latency: Duration) {
        self.miss_count += 1;
        self.record_answered(latency);
    }

    /// Record a tick where the detector was not ready.
    pub fn record_pending(&mut self) {
        self.tick_count += 1;
        self.pending_count += 1;
    }

    fn record_answered(&mut self, latency: Duration) {
        self.tick_count += 1;
        let us = latency.as_micros() as u64;
        self.last_latency_us = us;
        self.total_latency_us += us;
    }

    /// Ticks per second since the stats were created or reset.
    pub fn ticks_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.tick_count as f64 / elapsed
    }

    /// Share of answered ticks that found a face, as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hit_count + self.miss_count;
        if answered == 0 {
            return 0.0;
        }
        (self.hit_count as f64 / answered as f64) * 100.0
    }

    pub fn last_latency_ms(&self) -> f64 {
        self.last_latency_us as f64 / 1000.0
    }

    pub fn average_latency_ms(&self) -> f64 {
        let answered = self.hit_count + self.miss_count;
        if answered == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / answered as f64 / 1000.0
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DetectionSnapshot {
        DetectionSnapshot {
            ticks_per_second: self.ticks_per_second(),
            tick_count: self.tick_count,
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            pending_count: self.pending_count,
            hit_rate: self.hit_rate(),
            last_latency_ms: self.last_latency_ms(),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

impl Default for DetectionStats {
    fn default() -> Self {
        Self::new()
    }
}
