//! # Scheduler: the submit surface for deferred service work.
//!
//! [`Scheduler::submit`] enqueues a zero-argument closure under a named
//! serialization key and returns immediately. The closure does everything
//! itself (computes, stores into the cache, dispatches results), so the
//! scheduler knows nothing about messages or listeners.
//!
//! ## Architecture
//! ```text
//!                submit("users", Background, job)
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!   [SerialQueue "users"]       [SerialQueue "feed"]     ...per-key, lazy
//!            │                           │
//!       drainer task                drainer task
//!            ▼                           ▼
//!      blocking pool  ◄─── shared, implementation-defined size ───►
//!
//!                submit(_, Ui, job) ──────────► UiPost::post(job)
//! ```
//!
//! ## Rules
//! - **Per key**: FIFO, non-overlapping. **Across keys**: unordered.
//! - **UI jobs**: FIFO relative to other UI jobs only; the serial key is
//!   ignored for them.
//! - **No cancellation**: every submitted job runs to completion or panics;
//!   panics are confined to the job.
//! - Liveness of interested listeners is not checked here; a job runs fully
//!   even if everyone who cared is already gone. Delivery-time sweeping in
//!   the bus handles that case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use crate::scheduler::queue::SerialQueue;
use crate::ui::{Affinity, Job, UiPost};

/// Executes submitted closures under per-key serialization with optional
/// UI-thread affinity.
pub struct Scheduler {
    queues: Mutex<HashMap<Arc<str>, SerialQueue>>,
    ui: Arc<dyn UiPost>,
    runtime: Handle,
}

impl Scheduler {
    /// Creates a scheduler that posts UI-affinity work through `ui`.
    ///
    /// Must be called from within a tokio runtime; queue drainers are
    /// spawned onto the current runtime.
    pub fn new(ui: Arc<dyn UiPost>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            ui,
            runtime: Handle::current(),
        }
    }

    /// Enqueues `work` and returns immediately.
    ///
    /// Background work lands on the queue for `serial`, created lazily on
    /// first use. UI work is posted to the main loop in submission order.
    pub fn submit(&self, serial: &str, affinity: Affinity, work: Job) {
        match affinity {
            Affinity::Ui => self.ui.post(work),
            Affinity::Background => self.queue_for(serial).push(work),
        }
    }

    /// Looks up or lazily creates the queue for `serial`.
    ///
    /// The lock covers only map access; the returned handle pushes without
    /// holding it. Queues live for the life of the scheduler.
    fn queue_for(&self, serial: &str) -> SerialQueue {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(queue) = queues.get(serial) {
            return queue.clone();
        }
        let name: Arc<str> = serial.into();
        let queue = SerialQueue::spawn(Arc::clone(&name), &self.runtime);
        queues.insert(name, queue.clone());
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MainLoop;
    use std::time::{Duration, Instant};

    fn scheduler_with_ui() -> (Scheduler, tokio_util::sync::CancellationToken) {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let stop = main_loop.stop_token();
        tokio::spawn(main_loop.run());
        (Scheduler::new(Arc::new(handle)), stop)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_runs_in_submission_order_without_overlap() {
        let (scheduler, stop) = scheduler_with_ui();
        let spans = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4u32 {
            let spans = Arc::clone(&spans);
            scheduler.submit(
                "serial",
                Affinity::Background,
                Box::new(move || {
                    let start = Instant::now();
                    std::thread::sleep(Duration::from_millis(30));
                    spans.lock().unwrap().push((i, start, Instant::now()));
                }),
            );
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        let spans = spans.lock().unwrap();
        assert_eq!(
            spans.iter().map(|(i, _, _)| *i).collect::<Vec<_>>(),
            vec![0, 1, 2, 3],
        );
        for pair in spans.windows(2) {
            let (_, _, prev_end) = pair[0];
            let (_, next_start, _) = pair[1];
            assert!(prev_end <= next_start, "tasks on one key overlapped");
        }
        stop.cancel();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_keys_run_concurrently() {
        let (scheduler, stop) = scheduler_with_ui();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        let slow_done = done_tx.clone();
        scheduler.submit(
            "slow",
            Affinity::Background,
            Box::new(move || {
                std::thread::sleep(Duration::from_millis(200));
                let _ = slow_done.send("slow");
            }),
        );
        scheduler.submit(
            "fast",
            Affinity::Background,
            Box::new(move || {
                let _ = done_tx.send("fast");
            }),
        );

        // The fast key must not wait for the slow key's backlog.
        assert_eq!(done_rx.recv().await, Some("fast"));
        assert_eq!(done_rx.recv().await, Some("slow"));
        stop.cancel();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panic_is_confined_to_its_task() {
        let (scheduler, stop) = scheduler_with_ui();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        scheduler.submit("serial", Affinity::Background, Box::new(|| panic!("boom")));
        scheduler.submit(
            "serial",
            Affinity::Background,
            Box::new(move || {
                let _ = done_tx.send(());
            }),
        );

        assert_eq!(done_rx.recv().await, Some(()));
        stop.cancel();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ui_jobs_run_in_posting_order() {
        let (scheduler, stop) = scheduler_with_ui();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5u32 {
            let seen = Arc::clone(&seen);
            scheduler.submit(
                "ignored-for-ui",
                Affinity::Ui,
                Box::new(move || seen.lock().unwrap().push(i)),
            );
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        stop.cancel();
    }
}
