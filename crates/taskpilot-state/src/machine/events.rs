//! Engine events - triggers for state transitions

use serde::{Deserialize, Serialize};

/// Defines the events that drive the engine's FSM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEvent {
    /// `start` passed validation and a fresh workflow exists.
    StartAccepted,

    /// A plan was extracted and normalized into pending steps.
    PlanReady { step_count: usize },

    /// Plan generation or extraction failed.
    PlanningFailed { error: String },

    /// The step under the cursor began dispatch.
    StepStarted { step_id: String },

    /// The current step produced a result and the cursor advanced.
    StepCompleted { step_id: String },

    /// The current step raised; the cursor did not advance.
    StepFailed { step_id: String, error: String },

    /// Every step has been consumed.
    WorkflowCompleted,

    /// The in-flight run was cancelled by the caller.
    Cancelled,

    /// Caller asked to leave the error state, discarding the workflow.
    RetryRequested,

    /// Caller asked for a full reset.
    ResetRequested,
}

impl EngineEvent {
    /// Check if this event reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::PlanningFailed { .. } | Self::StepFailed { .. } | Self::Cancelled
        )
    }

    /// Check if this event is caller-initiated.
    pub fn is_caller_event(&self) -> bool {
        matches!(
            self,
            Self::StartAccepted | Self::Cancelled | Self::RetryRequested | Self::ResetRequested
        )
    }
}
