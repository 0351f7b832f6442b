//! Deterministic enhancement filter chain.
//!
//! [`EnhancementParams`] holds the single user-facing knob (subtlety, 0-100)
//! and maps it to filter [`Coefficients`]. [`apply`] runs the chain on a
//! captured image and always returns a fresh image of the same size.

pub mod params;
pub mod pipeline;

pub use params::{Coefficients, EnhancementParams};
pub use pipeline::{apply, plan, Operation};
