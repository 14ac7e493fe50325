//! Cancellable per-user start-timeout timers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

/// At most one live timer per user; scheduling a new one aborts the old.
///
/// Each timer carries a generation so a fired task only clears its own
/// entry.
#[derive(Default)]
pub struct TimeoutTimers {
    next_generation: AtomicU64,
    timers: Mutex<HashMap<i64, (u64, AbortHandle)>>,
}

impl TimeoutTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the future built by `make(generation)` after `delay`
    pub fn schedule<F, Fut>(&self, user_id: i64, delay: Duration, make: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let task = make(generation);

        // Spawn under the map lock so a fast timer cannot finish before its
        // entry exists
        let mut timers = self.timers.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let previous = timers.insert(user_id, (generation, handle.abort_handle()));
        drop(timers);

        if let Some((_, previous)) = previous {
            previous.abort();
        }

        tracing::debug!(user_id, generation, delay_secs = delay.as_secs(), "Timer scheduled");
        generation
    }

    /// Abort the user's timer. Returns true if one was pending.
    pub fn cancel(&self, user_id: i64) -> bool {
        let Some((generation, handle)) = self.timers.lock().remove(&user_id) else {
            return false;
        };
        handle.abort();
        tracing::debug!(user_id, generation, "Timer cancelled");
        true
    }

    /// Called by a fired timer; leaves a newer timer in place
    pub fn finish(&self, user_id: i64, generation: u64) {
        let mut timers = self.timers.lock();
        if timers.get(&user_id).is_some_and(|(g, _)| *g == generation) {
            timers.remove(&user_id);
        }
    }

    pub fn is_pending(&self, user_id: i64) -> bool {
        self.timers.lock().contains_key(&user_id)
    }
}
