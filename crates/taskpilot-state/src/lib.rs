//! taskpilot-state - Engine lifecycle state machine
//!
//! A closed state enumeration plus a pure `(state, event) -> state`
//! transition function. Side effects (oracle calls, tool calls) live in
//! the engine's interpreter loop, never here, so the transition logic
//! stays unit-testable without any mocking.

pub mod machine;

// Re-export commonly used types
pub use machine::{EngineEvent, EngineState, StateMachine, StateTransition, TransitionError};
