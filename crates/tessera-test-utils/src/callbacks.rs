#![forbid(unsafe_code)]

//! Recording sink for the caller-facing callback surface.

use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::{KeyStatusTag, SessionCallbacks, SessionErrorTag};

/// [`SessionCallbacks`] implementation that records every delivery.
#[derive(Default)]
pub struct RecordingCallbacks {
    messages: Mutex<Vec<(Vec<u8>, String)>>,
    status_updates: Mutex<Vec<(KeyStatusTag, Vec<u8>)>>,
    errors: Mutex<Vec<SessionErrorTag>>,
}

impl RecordingCallbacks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivered messages as `(payload, destination_url)` pairs.
    pub fn messages(&self) -> Vec<(Vec<u8>, String)> {
        self.messages.lock().clone()
    }

    /// Delivered key-status updates as `(tag, key_id)` pairs.
    pub fn status_updates(&self) -> Vec<(KeyStatusTag, Vec<u8>)> {
        self.status_updates.lock().clone()
    }

    pub fn errors(&self) -> Vec<SessionErrorTag> {
        self.errors.lock().clone()
    }

    pub fn total_deliveries(&self) -> usize {
        self.messages.lock().len() + self.status_updates.lock().len() + self.errors.lock().len()
    }
}

impl SessionCallbacks for RecordingCallbacks {
    fn on_key_message(&self, message: &[u8], destination_url: &str) {
        self.messages
            .lock()
            .push((message.to_vec(), destination_url.to_owned()));
    }

    fn on_key_status_update(&self, status: KeyStatusTag, key_id: &[u8]) {
        self.status_updates.lock().push((status, key_id.to_vec()));
    }

    fn on_key_error(&self, error: SessionErrorTag) {
        self.errors.lock().push(error);
    }
}
