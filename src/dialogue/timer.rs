//! Single-shot deferred events.

use crate::dialogue::event::{Event, SessionHandle};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A cancellable timer that posts one event into a session inbox.
///
/// At most one firing is outstanding: arming aborts the previous task and
/// bumps the generation, so a firing that was already queued before the
/// re-arm is recognised as stale by [`OneShotTimer::fire`].
#[derive(Debug, Default)]
pub struct OneShotTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer. Returns the generation of this arming.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, after: Duration, handle: &SessionHandle, event: fn(u64) -> Event) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let handle = handle.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            handle.post(event(generation));
        }));

        generation
    }

    /// Disarm. Harmless when nothing is armed.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Accept a firing. Returns true only for the current, still-armed generation.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.task.is_some() && generation == self.generation {
            self.task = None;
            true
        } else {
            false
        }
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
