#![forbid(unsafe_code)]

//! Concurrent session registry.
//!
//! Owns every live session, keyed by the engine-assigned identifier. One
//! mutex serializes map mutation and engine-event forwarding; critical
//! sections are a map operation plus a single forwarding call. Caller-driven
//! session methods go through [`SessionHandle`] and do not take the registry
//! lock.

use std::{collections::HashMap, ops::Deref, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use tessera_core::{
    EngineEvents, EngineResult, LicenseEngine, LicenseType, MessageType, SessionId,
};
use tracing::{debug, warn};

use crate::{
    config::RegistryConfig,
    error::SessionResult,
    session::Session,
};

/// Opaque caller-visible reference to a live session.
///
/// Derefs to [`Session`], so the caller drives the session directly. Pass it
/// back to [`SessionRegistry::destroy_session`] to end the session's life.
pub struct SessionHandle {
    session: Arc<Session>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }
}

impl Deref for SessionHandle {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

/// Registry of live sessions, and the engine's event listener.
///
/// Engine-originated events arrive on the engine's own thread(s) through the
/// [`EngineEvents`] impl; each is routed to the owning session under the
/// registry lock, which also serializes callbacks per session. An event for
/// an identifier with no live session is dropped silently: the engine may
/// emit trailing events for a session the caller already destroyed.
pub struct SessionRegistry {
    engine: Arc<dyn LicenseEngine>,
    config: Arc<RegistryConfig>,
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(engine: Arc<dyn LicenseEngine>, config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            config: Arc::new(config),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Ask the engine for a new session and register it.
    ///
    /// On any failure nothing is retained: no session is constructed and no
    /// identifier is kept.
    pub fn create_session(
        &self,
        license_type: i32,
        init_data_type: &str,
        init_data: Bytes,
        aux_data: Bytes,
    ) -> SessionResult<SessionHandle> {
        let session_id = self
            .engine
            .create_session(LicenseType::from_code(license_type))?;

        let session = Arc::new(Session::new(
            session_id.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&self.config),
        ));
        session.init(license_type, init_data_type, init_data, aux_data)?;

        let mut sessions = self.sessions.lock();
        if sessions
            .insert(session_id.clone(), Arc::clone(&session))
            .is_some()
        {
            // Engine ids are unique by contract; a reissue replaces the
            // stale entry rather than leaving two sessions share one id.
            warn!(session = %session_id, "engine reissued a live session id");
        }
        drop(sessions);

        debug!(session = %session_id, "session created");
        Ok(SessionHandle { session })
    }

    /// Unregister the session and drop it.
    ///
    /// The map entry is removed under the lock, so no dispatch can reach the
    /// session afterwards; the object itself is destroyed outside the lock
    /// window.
    pub fn destroy_session(&self, handle: SessionHandle) {
        let SessionHandle { session } = handle;
        let removed = self.sessions.lock().remove(session.id());
        if removed.is_some() {
            debug!(session = %session.id(), "session destroyed");
        }
    }

    /// Forward a license-server certificate to the engine.
    pub fn set_server_certificate(&self, certificate: &[u8]) -> SessionResult<()> {
        self.engine.set_service_certificate(certificate)?;
        Ok(())
    }

    /// Number of live sessions. Diagnostic only.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    fn with_session(&self, session_id: &SessionId, forward: impl FnOnce(&Session)) {
        let sessions = self.sessions.lock();
        match sessions.get(session_id) {
            Some(session) => forward(session),
            // Expected for sessions the caller already destroyed.
            None => debug!(session = %session_id, "event for unknown session dropped"),
        }
    }
}

impl EngineEvents for SessionRegistry {
    fn on_message(&self, session_id: &SessionId, message_type: MessageType, payload: &[u8]) {
        self.with_session(session_id, |session| {
            session.on_message(message_type, payload);
        });
    }

    fn on_key_statuses_change(&self, session_id: &SessionId) {
        self.with_session(session_id, Session::on_key_statuses_change);
    }

    fn on_remove_complete(&self, session_id: &SessionId) {
        self.with_session(session_id, Session::on_remove_complete);
    }

    fn on_deferred_complete(&self, session_id: &SessionId, result: EngineResult<()>) {
        self.with_session(session_id, |session| {
            session.on_deferred_complete(result);
        });
    }

    fn on_individualization_request(&self, session_id: &SessionId, request: &[u8]) {
        self.with_session(session_id, |session| {
            session.on_individualization_request(request);
        });
    }
}
