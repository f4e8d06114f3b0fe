use rainbot_store::StoreError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The durable store rejected the write; the change was not applied.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// The provided trigger definition is invalid (bad time or unknown zone).
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Scheduler is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
