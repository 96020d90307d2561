//! Listener registry and message fan-out.
//!
//! ## Contents
//! - [`Bus`] subscription table + two-phase dispatch with dead-listener
//!   sweeping and cached/fresh delivery ordering
//! - [`Listener`] / [`HandlerSet`] the declared-interest contract: one
//!   subscription per declared handler, built at registration time
//! - Subscription metadata types: [`Scope`], [`Priority`], [`ListenerId`],
//!   [`Interest`]
//! - [`Registration`] RAII guard tying unregistration to the listener's
//!   scope
//!
//! ## Quick reference
//! - Liveness is probed with a weak upgrade on every dispatch visit; a dead
//!   subscription is swept exactly once, the next time dispatch sees it.
//! - Per (listener, query id), a cached message is never observed after a
//!   fresh one.

mod bus;
mod handler_set;
mod subscription;

pub use bus::{Bus, Registration};
pub use handler_set::{Delivery, HandlerSet, Listener};
pub use subscription::{Interest, ListenerId, Priority, Scope};
