//! # UI-thread boundary: post primitive and a cooperative main loop.
//!
//! The host application owns a single "UI thread" (a cooperative main loop).
//! The runtime never touches it directly; everything that must run there goes
//! through the [`UiPost`] primitive, which posts a closure for later execution
//! in posting order.
//!
//! ## Architecture
//! ```text
//! Scheduler (Affinity::Ui jobs) ──┐
//!                                 ├──► UiPost::post(job) ──► [unbounded queue]
//! Bus (UI-affinity handlers)   ───┘                                │
//!                                                                  ▼
//!                                                        MainLoop::run()
//!                                                     (one job at a time, FIFO)
//! ```
//!
//! ## Rules
//! - **FIFO**: jobs run in posting order relative to each other.
//! - **No ordering across threads**: UI jobs have no ordering guarantee
//!   relative to background work.
//! - **Panic isolation**: a panicking job is confined and logged; the loop
//!   keeps draining.
//!
//! Hosts with a real main loop (a GUI toolkit, a game loop) implement
//! [`UiPost`] over their own "run on main thread" facility. [`MainLoop`] is
//! the built-in stand-in used by demos and tests.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::scheduler::panic_message;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread placement for submitted work and handler invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// Run on the shared worker pool, serialized by key.
    #[default]
    Background,
    /// Post to the host main loop; FIFO relative to other UI work only.
    Ui,
}

/// The single primitive the runtime needs from the host main loop.
pub trait UiPost: Send + Sync + 'static {
    /// Enqueues `job` to run on the UI thread. Must not block.
    fn post(&self, job: Job);
}

/// Cheap clonable sender half of [`MainLoop`].
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl UiPost for UiHandle {
    fn post(&self, job: Job) {
        // Send only fails after the loop has stopped; late jobs are dropped,
        // matching a host loop that has already exited.
        let _ = self.tx.send(job);
    }
}

/// Built-in cooperative main loop.
///
/// Drains posted jobs one at a time until [`MainLoop::stop_token`] is
/// cancelled or every [`UiHandle`] is dropped.
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Job>,
    handle: UiHandle,
    stop: CancellationToken,
}

impl MainLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: UiHandle { tx },
            stop: CancellationToken::new(),
        }
    }

    /// Returns a posting handle usable from any thread.
    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// Token that stops the loop when cancelled.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Runs the loop until stopped.
    ///
    /// Jobs execute inline, one at a time, in posting order. A panicking job
    /// is caught and logged; the loop continues with the next job.
    pub async fn run(mut self) {
        drop(self.handle);
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                job = self.rx.recv() => match job {
                    Some(job) => {
                        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                            tracing::warn!(reason = %panic_message(panic), "ui job panicked");
                        }
                    }
                    None => break,
                },
            }
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_run_in_posting_order() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let stop = main_loop.stop_token();
        let driver = tokio::spawn(main_loop.run());

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            handle.post(Box::new(move || seen.lock().unwrap().push(i)));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());

        stop.cancel();
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_the_loop() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let stop = main_loop.stop_token();
        let driver = tokio::spawn(main_loop.run());

        let ran = Arc::new(AtomicUsize::new(0));
        handle.post(Box::new(|| panic!("boom")));
        let ran_after = Arc::clone(&ran);
        handle.post(Box::new(move || {
            ran_after.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        stop.cancel();
        driver.await.unwrap();
    }
}
