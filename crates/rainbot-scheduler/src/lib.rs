//! `rainbot-scheduler`: per-recipient daily triggers with durable storage.
//!
//! # Overview
//!
//! Each recipient has at most one [`rainbot_core::Trigger`]: a local
//! `hour:minute` in an IANA time zone. The [`Scheduler`] persists triggers
//! through a [`rainbot_store::Store`], reloads them on [`Scheduler::start`],
//! and a single tokio loop hands due triggers to the dispatch side as
//! [`Fire`] values over an mpsc channel.
//!
//! # Lifecycle
//!
//! `new` (idle) → `start` (running) → `stop` (stopped). Upserts and removals
//! are accepted in every state; triggers only fire while running.

pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use schedule::next_fire;
pub use types::{Fire, SchedulerState};
