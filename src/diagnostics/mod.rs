// Diagnostics for the live detection loop.

pub mod stats;

pub use stats::{DetectionSnapshot, DetectionStats};
