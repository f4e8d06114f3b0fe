//! Shared configuration, error and domain types for the rainbot workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::RainbotConfig;
pub use error::{RainbotError, Result};
pub use types::{ForecastSummary, Location, RecipientId, Trigger, TriggerPayload};
