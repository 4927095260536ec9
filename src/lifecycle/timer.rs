//! One-shot timers
//!
//! A scheduled timer is owned by whoever armed it: dropping the handle
//! cancels it. [`OneShotTimer::unref`] releases ownership so the timer fires
//! on its own without anything holding on to it or waiting for it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A callback scheduled to run once after a delay
#[must_use = "dropping the timer cancels it; call `unref` to let it fire unattended"]
pub struct OneShotTimer {
    handle: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    /// Arm a timer that runs `f` after `delay`
    pub fn schedule<F, Fut>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f().await;
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Detach the timer from its owner. It still fires, but nothing waits on
    /// it and it cannot be cancelled any more.
    pub fn unref(mut self) {
        self.handle.take();
    }

    /// Cancel the timer if it has not fired yet
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// True once the callback has finished or the timer was cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
