#![forbid(unsafe_code)]

//! Host capabilities the engine is constructed with.
//!
//! The engine consumes these as injected collaborators. Implementations live
//! in `tessera-host`; test doubles can stand in anywhere.

use std::{any::Any, sync::Arc};

use bytes::Bytes;

/// Named byte-blob store the engine uses for durable state.
///
/// A flat namespace. Misses are represented in-band (`None` / `-1`), never as
/// errors. No transactional semantics across operations.
pub trait Storage: Send + Sync {
    /// Read the named entry, or `None` if absent.
    fn read(&self, name: &str) -> Option<Bytes>;

    /// Write the named entry, overwriting any existing one. Always succeeds.
    fn write(&self, name: &str, data: Bytes);

    /// Whether the named entry exists.
    fn exists(&self, name: &str) -> bool;

    /// Remove the named entry.
    ///
    /// An empty `name` clears **every** entry in the store. This is the
    /// engine's wildcard-delete, not a no-op.
    fn remove(&self, name: &str);

    /// Byte length of the named entry, or `-1` if absent.
    fn size(&self, name: &str) -> i64;

    /// Names of all entries. Order is not significant.
    fn list(&self) -> Vec<String>;
}

/// Monotonic millisecond time source.
///
/// The epoch is arbitrary; only differences are meaningful.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Opaque context handed back unchanged on timer expiry.
pub type TimerContext = Box<dyn Any + Send>;

/// Receiver of timer expiry notifications.
///
/// Delivery happens synchronously on the scheduler's thread; implementations
/// must not block and must not re-enter the scheduler from the notification.
pub trait TimerClient: Send + Sync {
    fn on_timer_expired(&self, context: TimerContext);
}

/// Single-shot, cancelable delayed callbacks keyed by client identity.
pub trait Timer: Send + Sync {
    /// Schedule exactly one expiry notification at now + `delay_ms`.
    ///
    /// `delay_ms` must satisfy `0 < delay_ms < 2^32 - 1`; anything else is a
    /// programming error and panics. The entry fires once and is never
    /// rescheduled.
    fn set_timeout(&self, delay_ms: i64, client: Arc<dyn TimerClient>, context: TimerContext);

    /// Revoke any pending entry whose client identity matches.
    ///
    /// Matching is by client identity only; context is not compared. Absence
    /// is a silent no-op.
    fn cancel(&self, client: &Arc<dyn TimerClient>);
}
