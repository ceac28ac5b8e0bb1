#![forbid(unsafe_code)]

//! Monotonic millisecond clock.

use std::time::Instant;

use tessera_core::Clock;

/// [`Clock`] backed by [`Instant`], anchored at construction.
///
/// The epoch is the moment the clock was created; only differences between
/// readings are meaningful to the engine.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}
