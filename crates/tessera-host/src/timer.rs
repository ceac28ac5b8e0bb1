#![forbid(unsafe_code)]

//! Single-shot timer scheduler.
//!
//! A dedicated worker thread holds a lock-protected set of pending entries
//! and sleeps on a `Condvar` until the earliest deadline. Expiry delivery is
//! synchronous on the worker thread, outside the queue lock, so clients may
//! schedule or cancel from within a notification without deadlocking — but
//! they must not block there.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tessera_core::{Timer, TimerClient, TimerContext};
use tracing::{debug, trace};

struct TimerEntry {
    deadline: Instant,
    client: Arc<dyn TimerClient>,
    context: TimerContext,
}

struct TimerQueue {
    entries: Vec<TimerEntry>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<TimerQueue>,
    condvar: Condvar,
}

/// [`Timer`] implementation backed by a dedicated scheduler thread.
///
/// Entries fire exactly once and are removed before delivery; there is no
/// automatic reschedule. Cancellation matches by client identity only.
/// Dropping the scheduler stops the thread; entries still pending at that
/// point are discarded without firing.
pub struct TimerScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TimerQueue {
                entries: Vec::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || run_scheduler(&shared))
        };

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Number of outstanding scheduled entries. Diagnostic only.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().entries.len()
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for TimerScheduler {
    fn set_timeout(&self, delay_ms: i64, client: Arc<dyn TimerClient>, context: TimerContext) {
        // Out-of-range delays are a programming error, not a recoverable one.
        assert!(
            delay_ms > 0 && delay_ms < i64::from(u32::MAX),
            "timer delay out of range: {delay_ms}ms"
        );

        let deadline = Instant::now() + Duration::from_millis(delay_ms as u64);
        trace!(delay_ms, "schedule timer");

        let mut queue = self.shared.queue.lock();
        queue.entries.push(TimerEntry {
            deadline,
            client,
            context,
        });
        self.shared.condvar.notify_all();
    }

    fn cancel(&self, client: &Arc<dyn TimerClient>) {
        let mut queue = self.shared.queue.lock();
        let before = queue.entries.len();
        queue
            .entries
            .retain(|entry| !Arc::ptr_eq(&entry.client, client));
        let removed = before - queue.entries.len();
        if removed > 0 {
            trace!(removed, "cancel timers");
            // Wake the worker so it recomputes its wait deadline.
            self.shared.condvar.notify_all();
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            let discarded = queue.entries.len();
            queue.entries.clear();
            if discarded > 0 {
                debug!(discarded, "scheduler dropped with pending timers");
            }
        }
        self.shared.condvar.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_scheduler(shared: &Shared) {
    trace!("timer scheduler started");
    let mut queue = shared.queue.lock();

    loop {
        if queue.shutdown {
            break;
        }

        let now = Instant::now();
        let mut due = Vec::new();
        let mut index = 0;
        while index < queue.entries.len() {
            if queue.entries[index].deadline <= now {
                due.push(queue.entries.swap_remove(index));
            } else {
                index += 1;
            }
        }

        if !due.is_empty() {
            due.sort_by_key(|entry| entry.deadline);
            // Deliver outside the lock; a client may re-arm or cancel here.
            MutexGuard::unlocked(&mut queue, || {
                for entry in due {
                    entry.client.on_timer_expired(entry.context);
                }
            });
            continue;
        }

        match queue.entries.iter().map(|entry| entry.deadline).min() {
            Some(next) => {
                shared.condvar.wait_until(&mut queue, next);
            }
            None => shared.condvar.wait(&mut queue),
        }
    }

    trace!("timer scheduler stopped");
}
