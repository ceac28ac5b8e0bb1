#![forbid(unsafe_code)]

//! The opaque license-engine boundary.

use thiserror::Error;

use crate::types::{InitDataType, KeyStatusMap, LicenseType, MessageType, SessionId};

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Non-success outcome classes reported by the engine.
///
/// Success is the `Ok` arm of [`EngineResult`], not a status value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    NeedsDeviceCertificate,
    SessionNotFound,
    DecryptError,
    TypeError,
    QuotaExceeded,
    NotSupported,
    Unexpected,
}

/// A non-success result from the opaque engine.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("engine call failed: {0:?}")]
pub struct EngineError(pub EngineStatus);

impl EngineError {
    pub fn status(&self) -> EngineStatus {
        self.0
    }
}

/// One decrypt invocation against the engine.
///
/// `iv` is always exactly 16 bytes; the session normalizes whatever the
/// caller supplied before building this request.
#[derive(Debug)]
pub struct DecryptRequest<'a> {
    /// Cipher bytes to decrypt.
    pub data: &'a [u8],
    /// Identifier of the key to decrypt with.
    pub key_id: &'a [u8],
    /// Normalized initialization vector.
    pub iv: &'a [u8; 16],
}

/// Operations the adapter drives on the opaque license engine.
///
/// The engine runs its own worker thread(s); results of `generate_request`
/// and `update` surface asynchronously through [`EngineEvents`], not through
/// these return values. The engine is constructed with [`Storage`], [`Clock`]
/// and [`Timer`] collaborators (startup wiring, outside this crate).
///
/// [`Storage`]: crate::Storage
/// [`Clock`]: crate::Clock
/// [`Timer`]: crate::Timer
pub trait LicenseEngine: Send + Sync {
    /// Allocate a new session and return its identifier.
    fn create_session(&self, license_type: LicenseType) -> EngineResult<SessionId>;

    /// Start license-request generation from stored init data.
    ///
    /// The request payload arrives later via [`EngineEvents::on_message`].
    fn generate_request(
        &self,
        session_id: &SessionId,
        init_data_type: InitDataType,
        init_data: &[u8],
    ) -> EngineResult<()>;

    /// Load a persisted session.
    fn load(&self, session_id: &SessionId) -> EngineResult<()>;

    /// Feed a license-server response into the session.
    fn update(&self, session_id: &SessionId, response: &[u8]) -> EngineResult<()>;

    /// Remove persisted session state.
    fn remove(&self, session_id: &SessionId) -> EngineResult<()>;

    /// Close the session.
    fn close(&self, session_id: &SessionId) -> EngineResult<()>;

    /// Query the full key-status map for the session.
    fn key_statuses(&self, session_id: &SessionId) -> EngineResult<KeyStatusMap>;

    /// Install a license-server certificate.
    fn set_service_certificate(&self, certificate: &[u8]) -> EngineResult<()>;

    /// Decrypt `request.data` into `output`.
    ///
    /// `output` must be at least `request.data.len()` bytes.
    fn decrypt(&self, request: DecryptRequest<'_>, output: &mut [u8]) -> EngineResult<()>;
}

/// Events the engine emits from its own thread(s), keyed by session id.
///
/// The session registry implements this trait and routes each event to the
/// owning session under its lock. An id with no live session is dropped
/// silently: the engine may emit trailing events for a session the caller
/// already destroyed.
pub trait EngineEvents: Send + Sync {
    /// A license message is ready for delivery to the license server.
    fn on_message(&self, session_id: &SessionId, message_type: MessageType, payload: &[u8]);

    /// The key-status map for the session changed; re-query to observe it.
    fn on_key_statuses_change(&self, session_id: &SessionId);

    /// A previously requested removal finished.
    fn on_remove_complete(&self, session_id: &SessionId);

    /// A deferred engine action completed with the given result.
    fn on_deferred_complete(&self, session_id: &SessionId, result: EngineResult<()>);

    /// The engine requests device individualization.
    fn on_individualization_request(&self, session_id: &SessionId, request: &[u8]);
}
