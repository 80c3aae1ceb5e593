use thiserror::Error;

use taskpilot_extract::ExtractError;
use taskpilot_llm::OracleError;
use taskpilot_tools::ToolError;

/// Everything that can go wrong below or inside the engine.
///
/// All of these are caught at the engine boundary and converted into a
/// step/workflow failure plus a transition to the error state; the only
/// variant a caller sees as a rejected call is `InvalidInput`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("planning failed: {0}")]
    Planning(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("tool error: {0}")]
    Tool(ToolError),

    #[error("transport error: {detail}")]
    Transport { status: Option<u16>, detail: String },

    #[error("cancelled")]
    Cancelled,
}

impl From<OracleError> for EngineError {
    fn from(error: OracleError) -> Self {
        match error {
            OracleError::Cancelled => Self::Cancelled,
            other => Self::Transport {
                status: other.status(),
                detail: other.to_string(),
            },
        }
    }
}
