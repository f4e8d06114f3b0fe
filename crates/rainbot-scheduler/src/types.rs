use chrono::{DateTime, Utc};
use rainbot_core::types::Trigger;

/// One firing of a trigger, handed to the dispatch side.
#[derive(Debug, Clone, PartialEq)]
pub struct Fire {
    pub trigger: Trigger,
    /// The instant the trigger was due (may be slightly before delivery).
    pub scheduled_for: DateTime<Utc>,
}

/// Lifecycle of a [`crate::Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed; triggers can be upserted but nothing fires.
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}
