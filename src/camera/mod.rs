// Camera domain: stream lifecycle, frame buffering, and the dummy device.

pub mod backend;
pub mod buffer;
pub mod dummy;
pub mod error;
pub mod types;
