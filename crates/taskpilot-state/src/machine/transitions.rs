//! State transitions - FSM transition logic
//!
//! The transition function is pure: it computes the next state from the
//! current state and an event, and nothing else. Events that do not
//! apply in the current state leave it unchanged.

use thiserror::Error;

use super::events::EngineEvent;
use super::states::EngineState;

/// Error type for operations that require a specific state.
#[derive(Error, Debug, Clone)]
pub enum TransitionError {
    #[error("invalid transition from {from:?} on {event}")]
    InvalidTransition { from: EngineState, event: String },
}

/// Represents a committed state transition.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: EngineState,
    /// The state after the transition.
    pub to: EngineState,
    /// The event that triggered the transition.
    pub event: EngineEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for the engine lifecycle.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: EngineState,
    /// Transition history (bounded).
    history: Vec<StateTransition>,
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self {
            current_state: EngineState::Idle,
            history: Vec::new(),
            max_history: 50,
        }
    }

    /// Create a state machine with a specific initial state.
    pub fn with_state(state: EngineState) -> Self {
        Self {
            current_state: state,
            history: Vec::new(),
            max_history: 50,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.current_state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event, commit the resulting state, and record the
    /// transition.
    pub fn handle_event(&mut self, event: EngineEvent) -> StateTransition {
        let old_state = self.current_state.clone();
        let new_state = compute_next_state(&old_state, &event);
        let changed = old_state != new_state;

        self.current_state = new_state.clone();

        let transition = StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        };

        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        transition
    }

    /// Check whether an event would change the state, without
    /// committing anything.
    pub fn can_transition(&self, event: &EngineEvent) -> bool {
        compute_next_state(&self.current_state, event) != self.current_state
    }

    /// Drop back to Idle without recording a transition.
    pub fn reset(&mut self) {
        self.current_state = EngineState::Idle;
    }
}

fn failed(error: &str) -> EngineState {
    EngineState::Error {
        message: error.to_string(),
        failed_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Compute the next state given the current state and an event.
fn compute_next_state(state: &EngineState, event: &EngineEvent) -> EngineState {
    use EngineEvent::*;
    use EngineState::*;

    match (state, event) {
        // ========== Start ==========
        (Idle, StartAccepted) => Planning,

        // ========== Planning ==========
        (Planning, PlanReady { .. }) => Running,
        (Planning, PlanningFailed { error }) => failed(error),
        (Planning, Cancelled) => failed("cancelled"),

        // ========== Execution ==========
        (Running, StepStarted { .. }) => Running,
        (Running, StepCompleted { .. }) => Running,
        (Running, WorkflowCompleted) => Completed,
        (Running, StepFailed { error, .. }) => failed(error),
        (Running, Cancelled) => failed("cancelled"),

        // ========== Recovery ==========
        (Error { .. }, RetryRequested) => Idle,
        (_, ResetRequested) => Idle,

        // ========== Default: no transition ==========
        _ => state.clone(),
    }
}
