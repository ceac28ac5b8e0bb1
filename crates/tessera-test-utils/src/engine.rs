#![forbid(unsafe_code)]

//! Scriptable stand-in for the opaque license engine.
//!
//! Behavior is configured per operation; every call is recorded so tests can
//! assert on exactly what reached the engine. Events are emitted through a
//! weak listener reference, either automatically (mirroring how the real
//! engine reacts to `generate_request`/`update`/`remove`) or injected
//! manually via the `emit_*` helpers.

use std::{
    collections::HashMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;
use tessera_core::{
    DecryptRequest, EngineError, EngineEvents, EngineResult, EngineStatus, InitDataType,
    KeyStatusMap, LicenseEngine, LicenseType, MessageType, SessionId,
};

/// Engine operations whose outcome can be scripted.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum EngineOp {
    Create,
    GenerateRequest,
    Load,
    Update,
    Remove,
    Close,
    KeyStatuses,
    Certificate,
    Decrypt,
}

struct StubState {
    next_session: u32,
    key_statuses: KeyStatusMap,
    failures: HashMap<EngineOp, EngineStatus>,
    request_payload: Vec<u8>,
    emit_message_on_generate: bool,
    emit_statuses_on_update: bool,
    emit_remove_complete: bool,
    last_iv: Option<[u8; 16]>,
    last_decrypt_key_id: Option<Vec<u8>>,
    last_certificate: Option<Vec<u8>>,
    generate_requests: Vec<SessionId>,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            next_session: 0,
            key_statuses: KeyStatusMap::new(),
            failures: HashMap::new(),
            request_payload: b"license-request-payload".to_vec(),
            emit_message_on_generate: true,
            emit_statuses_on_update: true,
            emit_remove_complete: true,
            last_iv: None,
            last_decrypt_key_id: None,
            last_certificate: None,
            generate_requests: Vec::new(),
        }
    }
}

/// Scriptable [`LicenseEngine`] double.
///
/// Decrypt copies cipher bytes through unchanged, so round trips are
/// byte-comparable. The decrypt-call counter increments on every invocation
/// that reaches the engine, which is what "the engine decrypt path was never
/// invoked" assertions count.
#[derive(Default)]
pub struct StubEngine {
    state: Mutex<StubState>,
    decrypt_calls: AtomicUsize,
    listener: Mutex<Option<Weak<dyn EngineEvents>>>,
}

impl StubEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wire the event listener (usually the session registry).
    pub fn attach_listener(&self, listener: Weak<dyn EngineEvents>) {
        *self.listener.lock() = Some(listener);
    }

    /// Script a persistent failure for one operation.
    pub fn fail(&self, op: EngineOp, status: EngineStatus) {
        self.state.lock().failures.insert(op, status);
    }

    /// Clear a scripted failure.
    pub fn succeed(&self, op: EngineOp) {
        self.state.lock().failures.remove(&op);
    }

    /// Replace the whole key-status fixture.
    pub fn set_key_statuses(&self, statuses: KeyStatusMap) {
        self.state.lock().key_statuses = statuses;
    }

    /// Insert or update one key in the fixture.
    pub fn set_key_status(&self, key_id: &[u8], status: tessera_core::EngineKeyStatus) {
        self.state
            .lock()
            .key_statuses
            .insert(bytes::Bytes::copy_from_slice(key_id), status);
    }

    /// Payload emitted with the message produced by `generate_request`.
    pub fn set_request_payload(&self, payload: &[u8]) {
        self.state.lock().request_payload = payload.to_vec();
    }

    /// Disable the automatic message emission on `generate_request`.
    pub fn silence_generate(&self) {
        self.state.lock().emit_message_on_generate = false;
    }

    /// Disable the automatic key-status event on successful `update`.
    pub fn silence_update(&self) {
        self.state.lock().emit_statuses_on_update = false;
    }

    // -- Spies ---------------------------------------------------------------

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    /// IV observed by the most recent decrypt call.
    pub fn last_iv(&self) -> Option<[u8; 16]> {
        self.state.lock().last_iv
    }

    /// Key id observed by the most recent decrypt call.
    pub fn last_decrypt_key_id(&self) -> Option<Vec<u8>> {
        self.state.lock().last_decrypt_key_id.clone()
    }

    pub fn last_certificate(&self) -> Option<Vec<u8>> {
        self.state.lock().last_certificate.clone()
    }

    /// Session ids that had a request generated, in call order.
    pub fn generate_requests(&self) -> Vec<SessionId> {
        self.state.lock().generate_requests.clone()
    }

    // -- Manual event injection ----------------------------------------------

    pub fn emit_message(&self, session_id: &SessionId, message_type: MessageType, payload: &[u8]) {
        if let Some(listener) = self.upgrade_listener() {
            listener.on_message(session_id, message_type, payload);
        }
    }

    pub fn emit_key_statuses_change(&self, session_id: &SessionId) {
        if let Some(listener) = self.upgrade_listener() {
            listener.on_key_statuses_change(session_id);
        }
    }

    pub fn emit_remove_complete(&self, session_id: &SessionId) {
        if let Some(listener) = self.upgrade_listener() {
            listener.on_remove_complete(session_id);
        }
    }

    pub fn emit_deferred_complete(&self, session_id: &SessionId, result: EngineResult<()>) {
        if let Some(listener) = self.upgrade_listener() {
            listener.on_deferred_complete(session_id, result);
        }
    }

    pub fn emit_individualization_request(&self, session_id: &SessionId, request: &[u8]) {
        if let Some(listener) = self.upgrade_listener() {
            listener.on_individualization_request(session_id, request);
        }
    }

    // -- Internals -----------------------------------------------------------

    fn upgrade_listener(&self) -> Option<Arc<dyn EngineEvents>> {
        self.listener.lock().as_ref().and_then(Weak::upgrade)
    }

    fn scripted(&self, op: EngineOp) -> EngineResult<()> {
        match self.state.lock().failures.get(&op) {
            Some(status) => Err(EngineError(*status)),
            None => Ok(()),
        }
    }
}

impl LicenseEngine for StubEngine {
    fn create_session(&self, _license_type: LicenseType) -> EngineResult<SessionId> {
        self.scripted(EngineOp::Create)?;
        let mut state = self.state.lock();
        state.next_session += 1;
        Ok(SessionId::new(format!("session-{}", state.next_session)))
    }

    fn generate_request(
        &self,
        session_id: &SessionId,
        _init_data_type: InitDataType,
        _init_data: &[u8],
    ) -> EngineResult<()> {
        self.scripted(EngineOp::GenerateRequest)?;
        let payload = {
            let mut state = self.state.lock();
            state.generate_requests.push(session_id.clone());
            state
                .emit_message_on_generate
                .then(|| state.request_payload.clone())
        };
        // Emit outside the state lock; the listener will call back in.
        if let Some(payload) = payload {
            self.emit_message(session_id, MessageType::LicenseRequest, &payload);
        }
        Ok(())
    }

    fn load(&self, _session_id: &SessionId) -> EngineResult<()> {
        self.scripted(EngineOp::Load)
    }

    fn update(&self, session_id: &SessionId, _response: &[u8]) -> EngineResult<()> {
        self.scripted(EngineOp::Update)?;
        let emit = self.state.lock().emit_statuses_on_update;
        if emit {
            self.emit_key_statuses_change(session_id);
        }
        Ok(())
    }

    fn remove(&self, session_id: &SessionId) -> EngineResult<()> {
        self.scripted(EngineOp::Remove)?;
        let emit = self.state.lock().emit_remove_complete;
        if emit {
            self.emit_remove_complete(session_id);
        }
        Ok(())
    }

    fn close(&self, _session_id: &SessionId) -> EngineResult<()> {
        self.scripted(EngineOp::Close)
    }

    fn key_statuses(&self, _session_id: &SessionId) -> EngineResult<KeyStatusMap> {
        self.scripted(EngineOp::KeyStatuses)?;
        Ok(self.state.lock().key_statuses.clone())
    }

    fn set_service_certificate(&self, certificate: &[u8]) -> EngineResult<()> {
        self.scripted(EngineOp::Certificate)?;
        self.state.lock().last_certificate = Some(certificate.to_vec());
        Ok(())
    }

    fn decrypt(&self, request: DecryptRequest<'_>, output: &mut [u8]) -> EngineResult<()> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            state.last_iv = Some(*request.iv);
            state.last_decrypt_key_id = Some(request.key_id.to_vec());
        }
        self.scripted(EngineOp::Decrypt)?;
        output[..request.data.len()].copy_from_slice(request.data);
        Ok(())
    }
}
