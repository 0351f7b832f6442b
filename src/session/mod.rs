//! The capture session: state machine, intents, and derived-image jobs.
//!
//! [`CaptureController`] owns all session state and its transitions.
//! [`SessionOrchestrator`] is the surface the presentation layer drives: it
//! maps user intents onto the controller and runs enhancement and
//! compositing off the async runtime with last-write-wins commits.

pub mod controller;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use controller::{CaptureController, Commit, ControllerOptions};
pub use error::SessionError;
pub use orchestrator::{OrchestratorOptions, SessionOrchestrator};
pub use state::{SessionSnapshot, SessionState};
