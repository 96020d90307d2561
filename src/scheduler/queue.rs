//! # Serial queue: one key, one drainer.
//!
//! A `SerialQueue` owns the pending-job list for a single serialization key.
//! The producer side is a non-blocking unbounded send; the consumer side is
//! one spawned drainer that pops jobs FIFO and runs each to completion on
//! the blocking pool before popping the next. That single in-flight job is
//! the queue's "currently running" flag.
//!
//! ```text
//! submit(k, job) ──► [unbounded queue k] ──► drainer k ──► spawn_blocking(job)
//!                                               │               (await)
//!                                               └──── next job only after ◄──┘
//! ```
//!
//! ## Rules
//! - Jobs for one key never overlap and run in submission order.
//! - The queue is unbounded; a hot key can grow its backlog without limit.
//! - A panicking job is caught, logged, and dropped; later jobs still run.
//! - Queues are never destroyed once created (keys are typically derived
//!   from call signatures, so the population is open-ended).

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::ui::Job;

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Producer handle for one serialization key.
#[derive(Clone)]
pub(crate) struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Creates the queue and spawns its drainer on `runtime`.
    pub(crate) fn spawn(name: Arc<str>, runtime: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let workers = runtime.clone();

        runtime.spawn(async move {
            while let Some(job) = rx.recv().await {
                let key = Arc::clone(&name);
                let finished = workers.spawn_blocking(move || {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                        tracing::warn!(
                            serial = %key,
                            reason = %panic_message(panic),
                            "task panicked; queue continues",
                        );
                    }
                });
                // Awaiting the worker before the next recv() is what keeps
                // tasks on this key strictly non-overlapping.
                if finished.await.is_err() {
                    tracing::warn!(serial = %name, "worker aborted");
                }
            }
        });

        Self { tx }
    }

    /// Appends a job to the pending list. Never blocks.
    pub(crate) fn push(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("serial queue drainer is gone; job dropped");
        }
    }
}
