//! Cancellable delayed task.
//!
//! A [`ScheduledTask`] runs the most recently scheduled future once a quiet
//! window has passed without another `schedule` call. Rescheduling aborts
//! the pending run, so bursts of calls collapse into the last one.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A debounced task slot.
#[derive(Debug)]
pub struct ScheduledTask {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    /// Creates an empty slot with the given quiet window.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Returns the quiet window.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `task` to run after the quiet window, replacing any
    /// pending run.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!("quiet window elapsed, running task");
            task.await;
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous
            && !previous.is_finished()
        {
            debug!("superseding pending task");
            previous.abort();
        }
    }

    /// Aborts the pending run. Returns true if one was still pending.
    pub fn cancel(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                debug!("cancelled pending task");
                true
            }
            _ => false,
        }
    }

    /// Returns true if a scheduled run has not completed yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
