#![forbid(unsafe_code)]

//! `tessera-session`
//!
//! The session lifecycle state machine and the concurrent session registry
//! that adapts the opaque license engine to a caller-facing session API.
//!
//! The registry owns every live session, keyed by the engine-assigned
//! identifier, and routes engine-originated events to the owning session
//! under a single lock. Callers hold opaque [`SessionHandle`]s and drive the
//! session directly; asynchronous protocol outcomes flow back exclusively
//! through the caller-supplied callback surface.

mod config;
mod error;
mod registry;
mod session;

pub use config::{ClientInfo, RegistryConfig};
pub use error::{SessionError, SessionResult};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{ClearContent, Session, SessionPhase};
