//! Mirror-side reconstruction of a remote device's component tree.

pub mod device;
pub mod engine;

pub use device::{MirrorDevice, StreamingSource};
pub use engine::MirrorEngine;
