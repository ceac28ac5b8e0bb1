#![forbid(unsafe_code)]

//! `tessera-core`
//!
//! Boundary contracts for the tessera content-license adapter.
//!
//! The license engine itself is an opaque external component. This crate
//! pins down everything that crosses its boundary:
//! - [`LicenseEngine`]: the operations the adapter drives on the engine.
//! - [`EngineEvents`]: the events the engine emits back, keyed by session id.
//! - [`Storage`], [`Clock`], [`Timer`]: the host capabilities the engine is
//!   constructed with. These are injected explicitly, never global.
//! - [`SessionCallbacks`]: the surface delivered to the media-pipeline caller.
//! - The shared vocabulary: session ids, license/init-data/message types,
//!   key-status maps and the stable caller-facing tag taxonomies.

mod callbacks;
mod engine;
mod host;
mod tags;
mod types;

pub use callbacks::SessionCallbacks;
pub use engine::{
    DecryptRequest, EngineError, EngineEvents, EngineResult, EngineStatus, LicenseEngine,
};
pub use host::{Clock, Storage, Timer, TimerClient, TimerContext};
pub use tags::{KeyStatusTag, SessionErrorTag};
pub use types::{
    EngineKeyStatus, InitDataType, KeyStatusMap, LicenseType, MessageType, SessionId,
};
