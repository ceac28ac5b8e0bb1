#![forbid(unsafe_code)]

//! Per-negotiation session state machine.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tessera_core::{
    DecryptRequest, EngineKeyStatus, EngineResult, EngineStatus, InitDataType, KeyStatusMap,
    KeyStatusTag, LicenseEngine, LicenseType, MessageType, SessionCallbacks, SessionId,
};
use tracing::{debug, trace, warn};

use crate::{
    config::RegistryConfig,
    error::{SessionError, SessionResult},
};

/// Separator between the numeric message-type tag and the raw engine payload
/// in outgoing license messages.
const MESSAGE_TYPE_SEPARATOR: &[u8] = b":Type:";

const IV_LEN: usize = 16;

/// Lifecycle phase of a session.
///
/// `Updating` repeats on every accepted response; there is no transition out
/// of `Closed` or `Removed`. The engine remains the authority on whether an
/// operation is legal — the phase is tracked for observability, not enforced
/// as a gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    RequestGenerated,
    Updating,
    Closed,
    Removed,
}

/// Clear content produced by a successful decrypt.
///
/// Ownership moves to the caller; dropping (or consuming) the value releases
/// the buffer exactly once.
#[derive(Debug)]
pub struct ClearContent {
    data: Vec<u8>,
}

impl ClearContent {
    fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for ClearContent {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

struct SessionState {
    license_type: LicenseType,
    init_data_type: InitDataType,
    init_data: Bytes,
    aux_data: Bytes,
    iv: [u8; IV_LEN],
    callback: Option<Arc<dyn SessionCallbacks>>,
    phase: SessionPhase,
}

/// One content-license negotiation context.
///
/// Exclusively owned by the registry; callers drive it through a
/// [`SessionHandle`](crate::SessionHandle). A session is driven by at most
/// one logical caller thread at a time, and engine events reach it serialized
/// by the registry lock. The internal state lock is never held across an
/// engine call, so an engine that calls back synchronously cannot deadlock.
pub struct Session {
    id: SessionId,
    engine: Arc<dyn LicenseEngine>,
    config: Arc<RegistryConfig>,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        engine: Arc<dyn LicenseEngine>,
        config: Arc<RegistryConfig>,
    ) -> Self {
        Self {
            id,
            engine,
            config,
            state: Mutex::new(SessionState {
                license_type: LicenseType::Temporary,
                init_data_type: InitDataType::Cenc,
                init_data: Bytes::new(),
                aux_data: Bytes::new(),
                iv: [0; IV_LEN],
                callback: None,
                phase: SessionPhase::Created,
            }),
        }
    }

    /// Engine-assigned identifier of this session.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    /// Store negotiation parameters.
    ///
    /// Unrecognized license-type codes map to [`LicenseType::Temporary`]; an
    /// unrecognized init-data type string leaves the prior default in place.
    /// Currently infallible; the result is reserved for future validation.
    pub fn init(
        &self,
        license_type: i32,
        init_data_type: &str,
        init_data: Bytes,
        aux_data: Bytes,
    ) -> SessionResult<()> {
        let mut state = self.state.lock();
        state.license_type = LicenseType::from_code(license_type);
        if let Some(parsed) = InitDataType::parse(init_data_type) {
            state.init_data_type = parsed;
        }
        state.init_data = init_data;
        state.aux_data = aux_data;
        Ok(())
    }

    /// Attach a callback and start license-request generation, or detach.
    ///
    /// With a callback, the request is generated from the stored init data
    /// and delivered asynchronously through the message channel — never
    /// returned here. Generation failure is logged only; a caller that sees
    /// no message within its timeout treats the request as failed. With
    /// `None`, the session detaches from its caller.
    pub fn run(&self, callback: Option<Arc<dyn SessionCallbacks>>) {
        match callback {
            Some(callback) => {
                let (init_data_type, init_data) = {
                    let mut state = self.state.lock();
                    state.callback = Some(callback);
                    (state.init_data_type, state.init_data.clone())
                };

                match self
                    .engine
                    .generate_request(&self.id, init_data_type, &init_data)
                {
                    Ok(()) => self.set_phase(SessionPhase::RequestGenerated),
                    Err(err) => warn!(session = %self.id, %err, "license request generation failed"),
                }
            }
            None => {
                self.state.lock().callback = None;
                trace!(session = %self.id, "callback detached");
            }
        }
    }

    /// Feed a license-server response to the engine.
    ///
    /// Deliberately returns nothing: a non-success engine result is reported
    /// by re-querying key status and delivering whatever state surfaces
    /// through the normal status channel.
    pub fn update(&self, response: &[u8]) {
        match self.engine.update(&self.id, response) {
            Ok(()) => self.set_phase(SessionPhase::Updating),
            Err(err) => {
                debug!(session = %self.id, %err, "update rejected, re-querying key status");
                self.on_key_statuses_change();
            }
        }
    }

    /// Load persisted session state.
    pub fn load(&self) -> SessionResult<()> {
        match self.engine.load(&self.id) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.on_key_status_error(err.status());
                Err(err.into())
            }
        }
    }

    /// Remove persisted session state.
    pub fn remove(&self) -> SessionResult<()> {
        match self.engine.remove(&self.id) {
            Ok(()) => {
                self.set_phase(SessionPhase::Removed);
                Ok(())
            }
            Err(err) => {
                self.on_key_status_error(err.status());
                Err(err.into())
            }
        }
    }

    /// Close the session.
    pub fn close(&self) -> SessionResult<()> {
        self.engine.close(&self.id)?;
        self.set_phase(SessionPhase::Closed);
        Ok(())
    }

    /// Decrypt `data` with a usable session key.
    ///
    /// The supplied IV is normalized to exactly 16 bytes: bytes beyond 16 are
    /// discarded, missing bytes are zero-filled. Key selection prefers the
    /// caller-supplied `key_id`; a supplied key that is known but not usable
    /// fails rather than silently decrypting with a different key. Without a
    /// match the first usable key is used. When no usable key exists the
    /// engine decrypt path is never invoked.
    ///
    /// Ownership of the returned buffer passes to the caller.
    pub fn decrypt(&self, iv: &[u8], data: &[u8], key_id: &[u8]) -> SessionResult<ClearContent> {
        let iv = {
            let mut state = self.state.lock();
            let take = iv.len().min(IV_LEN);
            state.iv[..take].copy_from_slice(&iv[..take]);
            state.iv[take..].fill(0);
            state.iv
        };

        let statuses = self.engine.key_statuses(&self.id)?;
        let selected = select_usable_key(&statuses, key_id)
            .ok_or(SessionError::NoUsableKey)?
            .clone();

        let mut clear = Vec::new();
        clear
            .try_reserve_exact(data.len())
            .map_err(|_| SessionError::OutputAllocation)?;
        clear.resize(data.len(), 0);

        self.engine.decrypt(
            DecryptRequest {
                data,
                key_id: &selected,
                iv: &iv,
            },
            &mut clear,
        )?;

        trace!(session = %self.id, bytes = data.len(), "decrypted");
        Ok(ClearContent::new(clear))
    }

    /// Release a buffer previously returned by [`decrypt`](Session::decrypt).
    ///
    /// Fails when no buffer is supplied. Double release is unrepresentable:
    /// the buffer is consumed by value.
    pub fn release_clear_content(&self, content: Option<ClearContent>) -> SessionResult<()> {
        match content {
            Some(content) => {
                drop(content);
                Ok(())
            }
            None => Err(SessionError::MissingClearContent),
        }
    }

    // -- Engine event handlers, reached via the registry ----------------------

    /// A license message is ready: tag it and hand it to the caller together
    /// with the configured destination URL. Unrecognized message types are
    /// dropped.
    pub(crate) fn on_message(&self, message_type: MessageType, payload: &[u8]) {
        match message_type {
            MessageType::LicenseRequest => {
                let Some(callback) = self.callback() else {
                    debug!(session = %self.id, "message ready but no callback attached");
                    return;
                };
                let mut message = message_type.code().to_string().into_bytes();
                message.extend_from_slice(MESSAGE_TYPE_SEPARATOR);
                message.extend_from_slice(payload);
                callback.on_key_message(&message, &self.config.license_server_url);
            }
            other => {
                debug!(session = %self.id, message_type = ?other, "unsupported message type dropped");
            }
        }
    }

    /// Re-query the key-status map and deliver one update per key.
    pub(crate) fn on_key_statuses_change(&self) {
        let Ok(statuses) = self.engine.key_statuses(&self.id) else {
            return;
        };
        let Some(callback) = self.callback() else {
            return;
        };
        for (key_id, status) in &statuses {
            callback.on_key_status_update(KeyStatusTag::from(*status), key_id);
        }
    }

    /// Report every known key as released, regardless of the status the
    /// engine holds for it.
    pub(crate) fn on_remove_complete(&self) {
        let Ok(statuses) = self.engine.key_statuses(&self.id) else {
            return;
        };
        let Some(callback) = self.callback() else {
            return;
        };
        for key_id in statuses.keys() {
            callback.on_key_status_update(KeyStatusTag::Released, key_id);
        }
    }

    pub(crate) fn on_deferred_complete(&self, result: EngineResult<()>) {
        trace!(session = %self.id, ok = result.is_ok(), "deferred action complete");
    }

    pub(crate) fn on_individualization_request(&self, request: &[u8]) {
        trace!(session = %self.id, bytes = request.len(), "individualization requested");
    }

    /// Deliver a single generic error for the session.
    fn on_key_status_error(&self, status: EngineStatus) {
        if let Some(callback) = self.callback() {
            callback.on_key_error(status.into());
        }
    }

    fn callback(&self) -> Option<Arc<dyn SessionCallbacks>> {
        self.state.lock().callback.clone()
    }

    fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.state.lock();
        trace!(session = %self.id, from = ?state.phase, to = ?phase, "phase transition");
        state.phase = phase;
    }
}

/// Pick the key to decrypt with.
///
/// A caller-supplied id that is present in the map wins only while usable; a
/// known-but-unusable key is a failure, not a fallback. An empty or unknown
/// id falls back to the first usable key.
fn select_usable_key<'a>(statuses: &'a KeyStatusMap, wanted: &[u8]) -> Option<&'a Bytes> {
    if !wanted.is_empty() {
        if let Some((key_id, status)) = statuses.get_key_value(wanted) {
            return (*status == EngineKeyStatus::Usable).then_some(key_id);
        }
    }
    statuses
        .iter()
        .find(|(_, status)| **status == EngineKeyStatus::Usable)
        .map(|(key_id, _)| key_id)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tessera_core::SessionErrorTag;
    use tessera_test_utils::{EngineOp, RecordingCallbacks, StubEngine};

    use super::*;

    fn session_with(engine: &Arc<StubEngine>) -> Session {
        let engine: Arc<dyn LicenseEngine> = engine.clone();
        let id = engine.create_session(LicenseType::Temporary).unwrap();
        Session::new(
            id,
            engine,
            Arc::new(RegistryConfig::new("https://license.example/request")),
        )
    }

    fn attached(engine: &Arc<StubEngine>) -> (Session, Arc<RecordingCallbacks>) {
        let session = session_with(engine);
        let callbacks = RecordingCallbacks::new();
        session.state.lock().callback = Some(callbacks.clone());
        (session, callbacks)
    }

    #[test]
    fn init_maps_types_and_stores_payloads() {
        let engine = StubEngine::new();
        let session = session_with(&engine);

        session
            .init(2, "webm", Bytes::from_static(b"init"), Bytes::from_static(b"aux"))
            .unwrap();

        let state = session.state.lock();
        assert_eq!(state.license_type, LicenseType::PersistentLicense);
        assert_eq!(state.init_data_type, InitDataType::WebM);
        assert_eq!(state.init_data.as_ref(), b"init");
        assert_eq!(state.aux_data.as_ref(), b"aux");
    }

    #[test]
    fn init_defaults_survive_unrecognized_inputs() {
        let engine = StubEngine::new();
        let session = session_with(&engine);

        session
            .init(99, "keyids", Bytes::new(), Bytes::new())
            .unwrap();

        let state = session.state.lock();
        assert_eq!(state.license_type, LicenseType::Temporary);
        assert_eq!(state.init_data_type, InitDataType::Cenc);
    }

    #[test]
    fn run_with_callback_generates_request() {
        let engine = StubEngine::new();
        engine.silence_generate();
        let session = session_with(&engine);
        let callbacks = RecordingCallbacks::new();

        session.run(Some(callbacks));

        assert_eq!(engine.generate_requests(), vec![session.id().clone()]);
        assert_eq!(session.phase(), SessionPhase::RequestGenerated);
    }

    #[test]
    fn run_without_callback_detaches() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);

        session.run(None);
        session.on_message(MessageType::LicenseRequest, b"payload");

        assert!(callbacks.messages().is_empty());
        assert!(engine.generate_requests().is_empty());
    }

    #[test]
    fn generation_failure_is_logged_not_raised() {
        let engine = StubEngine::new();
        engine.fail(EngineOp::GenerateRequest, EngineStatus::Unexpected);
        let session = session_with(&engine);

        session.run(Some(RecordingCallbacks::new()));

        assert_eq!(session.phase(), SessionPhase::Created);
    }

    #[test]
    fn message_gets_type_tag_prefix_and_destination() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);

        session.on_message(MessageType::LicenseRequest, b"challenge-bytes");

        let messages = callbacks.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, b"0:Type:challenge-bytes".to_vec());
        assert_eq!(messages[0].1, "https://license.example/request");
    }

    #[rstest]
    #[case(MessageType::LicenseRenewal)]
    #[case(MessageType::LicenseRelease)]
    #[case(MessageType::IndividualizationRequest)]
    fn unsupported_message_types_are_dropped(#[case] message_type: MessageType) {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);

        session.on_message(message_type, b"payload");

        assert!(callbacks.messages().is_empty());
    }

    #[test]
    fn key_status_change_delivers_one_update_per_key() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Usable);
        engine.set_key_status(b"key-b", EngineKeyStatus::Expired);

        session.on_key_statuses_change();

        let updates = callbacks.status_updates();
        assert_eq!(
            updates,
            vec![
                (KeyStatusTag::Usable, b"key-a".to_vec()),
                (KeyStatusTag::Expired, b"key-b".to_vec()),
            ]
        );
    }

    #[test]
    fn remove_complete_reports_every_key_released() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Expired);
        engine.set_key_status(b"key-b", EngineKeyStatus::Usable);

        session.on_remove_complete();

        let updates = callbacks.status_updates();
        assert_eq!(
            updates,
            vec![
                (KeyStatusTag::Released, b"key-a".to_vec()),
                (KeyStatusTag::Released, b"key-b".to_vec()),
            ]
        );
    }

    #[test]
    fn update_failure_reports_through_status_channel() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);
        engine.fail(EngineOp::Update, EngineStatus::TypeError);
        engine.set_key_status(b"key-a", EngineKeyStatus::InternalError);

        session.update(b"bad-response");

        assert_eq!(
            callbacks.status_updates(),
            vec![(KeyStatusTag::InternalError, b"key-a".to_vec())]
        );
        assert_eq!(session.phase(), SessionPhase::Created);
    }

    #[test]
    fn update_success_moves_to_updating() {
        let engine = StubEngine::new();
        engine.silence_update();
        let (session, _callbacks) = attached(&engine);

        session.update(b"response");

        assert_eq!(session.phase(), SessionPhase::Updating);
    }

    #[test]
    fn load_failure_synthesizes_error_callback() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);
        engine.fail(EngineOp::Load, EngineStatus::SessionNotFound);

        assert!(session.load().is_err());
        assert_eq!(callbacks.errors(), vec![SessionErrorTag::SessionNotFound]);
    }

    #[test]
    fn remove_failure_synthesizes_error_callback() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);
        engine.fail(EngineOp::Remove, EngineStatus::QuotaExceeded);

        assert!(session.remove().is_err());
        assert_eq!(callbacks.errors(), vec![SessionErrorTag::QuotaExceeded]);
        assert_eq!(session.phase(), SessionPhase::Created);
    }

    #[test]
    fn close_maps_result_and_moves_phase() {
        let engine = StubEngine::new();
        let (session, callbacks) = attached(&engine);

        session.close().unwrap();

        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(callbacks.errors().is_empty());
    }

    #[test]
    fn short_iv_is_zero_filled_to_sixteen_bytes() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Usable);

        let clear = session
            .decrypt(&[1, 2, 3, 4], b"cipher-bytes", b"key-a")
            .unwrap();

        let mut expected = [0u8; 16];
        expected[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(engine.last_iv(), Some(expected));
        assert_eq!(clear.as_ref(), b"cipher-bytes");
    }

    #[test]
    fn long_iv_is_truncated_to_sixteen_bytes() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Usable);

        let iv: Vec<u8> = (0u8..20).collect();
        session.decrypt(&iv, b"cipher", b"key-a").unwrap();

        let mut expected = [0u8; 16];
        expected.copy_from_slice(&iv[..16]);
        assert_eq!(engine.last_iv(), Some(expected));
    }

    #[test]
    fn decrypt_without_usable_key_never_reaches_engine() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Expired);

        let result = session.decrypt(&[0; 16], b"cipher", b"key-a");

        assert!(matches!(result, Err(SessionError::NoUsableKey)));
        assert_eq!(engine.decrypt_calls(), 0);
    }

    #[test]
    fn decrypt_prefers_the_supplied_key_id() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Usable);
        engine.set_key_status(b"key-b", EngineKeyStatus::Usable);

        session.decrypt(&[0; 16], b"cipher", b"key-b").unwrap();

        assert_eq!(engine.last_decrypt_key_id(), Some(b"key-b".to_vec()));
    }

    #[test]
    fn decrypt_with_unknown_key_id_falls_back_to_first_usable() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Expired);
        engine.set_key_status(b"key-b", EngineKeyStatus::Usable);

        session.decrypt(&[0; 16], b"cipher", b"key-z").unwrap();

        assert_eq!(engine.last_decrypt_key_id(), Some(b"key-b".to_vec()));
    }

    #[test]
    fn decrypt_with_known_but_unusable_key_fails() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::OutputRestricted);
        engine.set_key_status(b"key-b", EngineKeyStatus::Usable);

        let result = session.decrypt(&[0; 16], b"cipher", b"key-a");

        assert!(matches!(result, Err(SessionError::NoUsableKey)));
        assert_eq!(engine.decrypt_calls(), 0);
    }

    #[test]
    fn decrypt_engine_failure_propagates() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Usable);
        engine.fail(EngineOp::Decrypt, EngineStatus::DecryptError);

        let result = session.decrypt(&[0; 16], b"cipher", b"key-a");

        assert!(matches!(result, Err(SessionError::Engine(_))));
    }

    #[test]
    fn release_clear_content_requires_a_buffer() {
        let engine = StubEngine::new();
        let (session, _callbacks) = attached(&engine);
        engine.set_key_status(b"key-a", EngineKeyStatus::Usable);

        let clear = session.decrypt(&[0; 16], b"cipher", b"key-a").unwrap();
        assert!(session.release_clear_content(Some(clear)).is_ok());
        assert!(matches!(
            session.release_clear_content(None),
            Err(SessionError::MissingClearContent)
        ));
    }
}
