#![forbid(unsafe_code)]

//! Shared test doubles for the tessera workspace.

pub mod callbacks;
pub mod engine;

pub use callbacks::RecordingCallbacks;
pub use engine::{EngineOp, StubEngine};
