use std::sync::Arc;

use crate::prompt;

/// Caller-supplied pre-flight validation of task input.
pub type InputValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Configuration for the task engine.
pub struct EngineConfig {
    /// Role description prepended to every prompt. Falls back to the
    /// built-in role when unset.
    pub system_prompt: Option<String>,

    /// Upper bound on the step log, counting planned and appended
    /// steps. Oversized plans are rejected; proposals past the limit
    /// are dropped.
    pub max_plan_steps: usize,

    /// Use the streaming oracle call for decision steps so they can be
    /// cancelled mid-response.
    pub stream_decisions: bool,

    /// Rejects task input before anything else runs. `start` fails
    /// with an invalid-input error when this returns false.
    pub input_validator: Option<InputValidator>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_plan_steps: 32,
            stream_decisions: true,
            input_validator: None,
        }
    }
}

impl EngineConfig {
    pub fn role(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(prompt::DEFAULT_ROLE)
    }
}
