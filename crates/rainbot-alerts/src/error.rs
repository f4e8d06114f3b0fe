use rainbot_scheduler::SchedulerError;
use rainbot_store::StoreError;
use rainbot_weather::WeatherError;
use thiserror::Error;

/// Failures while handling a recipient's command.
///
/// Each variant maps to one reply; none of them end the conversation.
#[derive(Debug, Error)]
pub enum AlertError {
    /// The text did not contain an unambiguous time of day.
    #[error("could not read a time of day from {input:?}")]
    TimeParse { input: String },

    #[error("no location stored for recipient")]
    NoLocation,

    /// Time zone lookup failed; no trigger was created or changed.
    #[error("time zone unresolved: {0}")]
    Unresolved(#[source] WeatherError),

    #[error("forecast unavailable: {0}")]
    Forecast(#[source] WeatherError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AlertError>;
