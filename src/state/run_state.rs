use crate::TrawlError;
use std::fmt;

/// Lifecycle of one crawl run
///
/// ```text
/// Idle -> Running -> Draining -> Done
///            |           |
///            +-----------+--> Cancelled
///  (any non-terminal) ------> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Engine built, nothing seeded yet
    Idle,

    /// Workers are pulling from the frontier
    Running,

    /// Frontier exhausted, waiting for workers to exit
    Draining,

    /// All work completed
    Done,

    /// Stopped by an external signal; partial results kept
    Cancelled,

    /// Shared crawl state became unusable
    Aborted,
}

impl RunState {
    /// Returns true if the run can make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Aborted)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Draining)
                | (Draining, Done)
                | (Running, Cancelled)
                | (Draining, Cancelled)
                | (Idle, Aborted)
                | (Running, Aborted)
                | (Draining, Aborted)
        )
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: RunState) -> Result<(), TrawlError> {
        if !self.can_transition_to(next) {
            return Err(TrawlError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::debug!("Run state {} -> {}", self, next);
        *self = next;
        Ok(())
    }

    /// Process exit code conventionally associated with a terminal state
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Done => 0,
            Self::Cancelled => 130,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
