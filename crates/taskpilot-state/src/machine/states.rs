//! Engine states - the phases a workflow run moves through

use serde::{Deserialize, Serialize};

/// Defines the possible states of the engine's lifecycle.
///
/// `Idle` is both the initial state and the state `reset`/`retry`
/// return to. `Completed` is the only terminal state; `Error` is left
/// exclusively through `retry` or `reset`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No workflow in flight, awaiting `start`.
    Idle,

    /// Asking the oracle for a plan and normalizing the result.
    Planning,

    /// Dispatching steps, one at a time, in log order.
    Running,

    /// Every step consumed. Terminal.
    Completed,

    /// Planning or a step failed, or the run was cancelled.
    Error {
        message: String,
        failed_at: String, // ISO timestamp
    },
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Idle
    }
}

impl EngineState {
    /// Check if this is a terminal state (no more transitions expected
    /// without caller intervention).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if the engine is mid-run (an oracle or tool call may be
    /// in flight).
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Planning | Self::Running)
    }

    /// Get a human-readable description of the current state.
    pub fn description(&self) -> &str {
        match self {
            Self::Idle => "Ready for a task",
            Self::Planning => "Generating plan",
            Self::Running => "Executing steps",
            Self::Completed => "Completed",
            Self::Error { .. } => "Failed",
        }
    }
}
