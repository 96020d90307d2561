//! Per-key serialized task execution.
//!
//! ## Contents
//! - [`Scheduler`] the submit surface: background work serialized by key,
//!   UI work posted to the host main loop
//! - `SerialQueue` (internal) one lazily-created drainer per serial key
//!
//! ## Quick reference
//! - **Within one key**: strict submission order, never overlapping.
//! - **Across keys**: concurrent, bounded by the tokio blocking pool.
//! - **UI affinity**: bypasses serial keys entirely; FIFO among UI jobs.
//! - **Failures**: panics are confined to the job; the queue keeps going.

mod queue;
mod scheduler;

pub(crate) use queue::panic_message;
pub use scheduler::Scheduler;
