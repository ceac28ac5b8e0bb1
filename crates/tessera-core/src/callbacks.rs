#![forbid(unsafe_code)]

//! Callback surface delivered to the media-pipeline caller.

use crate::tags::{KeyStatusTag, SessionErrorTag};

/// Caller-supplied sink for asynchronous session outcomes.
///
/// The session borrows this (it never owns the caller); detaching via
/// `Session::run(None)` clears the reference. Invocations for one session are
/// serialized by the registry lock before they reach it.
pub trait SessionCallbacks: Send + Sync {
    /// A license message is ready: tag-prefixed payload plus the destination
    /// URL the caller should deliver it to. Transport is the caller's job.
    fn on_key_message(&self, message: &[u8], destination_url: &str);

    /// One key's status, delivered once per key on every status change.
    fn on_key_status_update(&self, status: KeyStatusTag, key_id: &[u8]);

    /// A generic key error for the whole session.
    fn on_key_error(&self, error: SessionErrorTag);
}
