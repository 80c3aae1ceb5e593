use serde::Serialize;

use taskpilot_core::Workflow;
use taskpilot_state::EngineState;

/// Read-only view of `{state, workflow}` delivered to subscribers and
/// returned by `get_state`.
///
/// Snapshots are clones: no holder can reach back into the engine's
/// workflow, so external mutation cannot move the cursor or edit the
/// step log.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub workflow: Workflow,
}
