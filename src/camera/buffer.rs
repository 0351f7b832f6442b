use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::camera::types::Frame;

/// Thread-safe ring buffer for camera frames.
///
/// Stores up to `capacity` frames, overwriting the oldest when full.
/// Frames are wrapped in `Arc` so the detection loop and capture get a cheap
/// reference-counted pointer instead of cloning the pixel buffer.
pub struct FrameBuffer {
    slots: Mutex<Ring>,
    /// Monotonic counter incremented on each push. Survives `clear()` so
    /// consumers can tell a fresh stream from a stale frame.
    sequence: AtomicU64,
}

struct Ring {
    frames: Vec<Option<Arc<Frame>>>,
    write_idx: usize,
}

impl FrameBuffer {
    /// Create a new ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Ring {
                frames: (0..capacity).map(|_| None).collect(),
                write_idx: 0,
            }),
            sequence: AtomicU64::new(0),
        }
    }

    /// Push a new frame into the buffer, overwriting the oldest if full.
    pub fn push(&self, frame: Frame) {
        let mut ring = self.slots.lock();
        let capacity = ring.frames.len();
        if capacity == 0 {
            return;
        }
        let idx = ring.write_idx;
        ring.frames[idx] = Some(Arc::new(frame));
        ring.write_idx = (idx + 1) % capacity;
        self.sequence.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the monotonic sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Get the most recently pushed frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let ring = self.slots.lock();
        let capacity = ring.frames.len();
        if capacity == 0 {
            return None;
        }
        let latest_idx = if ring.write_idx == 0 {
            capacity - 1
        } else {
            ring.write_idx - 1
        };
        ring.frames[latest_idx].clone()
    }

    /// Drop every buffered frame. Used when the device is released.
    pub fn clear(&self) {
        let mut ring = self.slots.lock();
        ring.frames.iter_mut().for_each(|slot| *slot = None);
        ring.write_idx = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(value: u8, timestamp: u64) -> Frame {
        Frame {
            data: vec![value; 300],
            width: 10,
            height: 10,
            timestamp_us: timestamp,
        }
    }

    #[test]
    fn frame_buffer_returns_none_when_empty() {
        let buf = FrameBuffer::new(3);
        assert!(buf.latest().is_none());
    }

    #[test]
    fn frame_buffer_stores_and_retrieves_latest() {
        let buf = FrameBuffer::new(3);
        buf.push(make_frame(1, 100));
        buf.push(make_frame(2, 200));

        let latest = buf.latest().unwrap();
        assert_eq!(latest.data[0], 2);
        assert_eq!(latest.timestamp_us, 200);
    }

    #[test]
    fn frame_buffer_overwrites_oldest_when_full() {
        let buf = FrameBuffer::new(3);
        for i in 1..=4 {
            buf.push(make_frame(i, u64::from(i) * 100));
        }

        let latest = buf.latest().unwrap();
        assert_eq!(latest.data[0], 4);
        assert_eq!(buf.sequence(), 4);
    }

    #[test]
    fn frame_buffer_latest_returns_arc_not_clone() {
        let buf = FrameBuffer::new(3);
        buf.push(make_frame(42, 100));

        let a = buf.latest().unwrap();
        let b = buf.latest().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn clear_empties_buffer_but_keeps_sequence() {
        let buf = FrameBuffer::new(2);
        buf.push(make_frame(1, 100));
        buf.clear();
        assert!(buf.latest().is_none());
        assert_eq!(buf.sequence(), 1);
    }

    #[test]
    fn zero_capacity_buffer_ignores_pushes() {
        let buf = FrameBuffer::new(0);
        buf.push(make_frame(1, 100));
        assert!(buf.latest().is_none());
        assert_eq!(buf.sequence(), 0);
    }

    #[test]
    fn frame_buffer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrameBuffer>();
    }
}
