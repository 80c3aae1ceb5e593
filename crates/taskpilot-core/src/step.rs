//! Step - one unit of planned work
//!
//! Every step carries a type tag that determines its execution
//! strategy:
//! - LLM decisions (model call, structured result)
//! - Tool executions (forwarded to the tool registry)
//! - User input (host-mediated interaction)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameter key naming the tool a `tool_execution` step invokes.
pub const TOOL_NAME_KEY: &str = "toolName";

/// Parameter key holding the argument map forwarded to the tool.
pub const TOOL_ARGS_KEY: &str = "parameters";

/// Type of a step - determines how the engine dispatches it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Model call whose output must yield a structured decision.
    LlmDecision,

    /// Invocation of a registered tool.
    ToolExecution,

    /// Host-mediated user interaction.
    UserInput,

    /// Anything the plan produced that is none of the above. Kept so a
    /// malformed plan entry fails at dispatch time, not at parse time.
    #[serde(untagged)]
    Unknown(String),
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::LlmDecision => "llm_decision",
            Self::ToolExecution => "tool_execution",
            Self::UserInput => "user_input",
            Self::Unknown(other) => other.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// Status of a step.
///
/// Monotonic within one execution attempt:
/// `Pending -> Running -> {Completed | Failed}`. `Skipped` is reachable
/// only by external override, never by the engine's advance logic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Check if this status represents a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One unit of planned work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the owning workflow.
    pub id: String,

    /// Execution strategy tag.
    #[serde(rename = "type")]
    pub step_type: StepType,

    /// Plan metadata, produced by the planning phase.
    pub title: String,

    /// Longer plan metadata.
    #[serde(default)]
    pub description: String,

    /// Open key/value map; shape depends on `step_type`. For tool
    /// executions it must contain `toolName` plus an argument map under
    /// `parameters`.
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub status: StepStatus,

    /// Present iff `status == Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Present iff `status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set when the step reaches a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// When execution started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Wall-clock duration of execution in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        step_type: StepType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            step_type,
            title: title.into(),
            description: description.into(),
            parameters: HashMap::new(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            timestamp: None,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, serde_json::Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Tool name for a `tool_execution` step, if present.
    pub fn tool_name(&self) -> Option<&str> {
        self.parameters.get(TOOL_NAME_KEY).and_then(|v| v.as_str())
    }

    /// Argument map forwarded to the tool; defaults to an empty object.
    pub fn tool_arguments(&self) -> serde_json::Value {
        self.parameters
            .get(TOOL_ARGS_KEY)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }

    /// Mark as started.
    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark as completed with a result.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.finish();
    }

    /// Mark as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finish();
    }

    /// External override: mark as skipped without running.
    pub fn skip(&mut self) {
        self.status = StepStatus::Skipped;
        self.finish();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.timestamp = Some(now);
        if let Some(start) = self.started_at {
            self.duration_ms = Some((now - start).num_milliseconds().max(0) as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_type_serialization_uses_snake_case_tags() {
        let json = serde_json::to_string(&StepType::LlmDecision).unwrap();
        assert_eq!(json, "\"llm_decision\"");
        let parsed: StepType = serde_json::from_str("\"tool_execution\"").unwrap();
        assert_eq!(parsed, StepType::ToolExecution);
    }

    #[test]
    fn unrecognized_step_type_is_preserved() {
        let parsed: StepType = serde_json::from_str("\"teleport\"").unwrap();
        assert_eq!(parsed, StepType::Unknown("teleport".to_string()));
        assert!(!parsed.is_known());
    }

    #[test]
    fn lifecycle_sets_terminal_fields() {
        let mut step = Step::new("s1", StepType::UserInput, "ask", "ask the user");
        assert_eq!(step.status, StepStatus::Pending);

        step.start();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.complete(serde_json::json!({"ok": true}));
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.result.is_some());
        assert!(step.error.is_none());
        assert!(step.timestamp.is_some());
        assert!(step.duration_ms.is_some());
    }

    #[test]
    fn failure_records_error_only() {
        let mut step = Step::new("s1", StepType::ToolExecution, "run", "run a tool");
        step.start();
        step.fail("boom");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.as_deref(), Some("boom"));
        assert!(step.result.is_none());
    }

    #[test]
    fn skip_is_terminal_without_result_or_error() {
        let mut step = Step::new("s1", StepType::UserInput, "ask", "");
        step.skip();
        assert_eq!(step.status, StepStatus::Skipped);
        assert!(step.status.is_terminal());
        assert!(step.result.is_none());
        assert!(step.error.is_none());
        assert!(step.timestamp.is_some());
    }

    #[test]
    fn tool_accessors_read_wire_keys() {
        let mut params = HashMap::new();
        params.insert(TOOL_NAME_KEY.to_string(), serde_json::json!("read_file"));
        params.insert(TOOL_ARGS_KEY.to_string(), serde_json::json!({"path": "a.rs"}));
        let step =
            Step::new("s1", StepType::ToolExecution, "read", "").with_parameters(params);

        assert_eq!(step.tool_name(), Some("read_file"));
        assert_eq!(step.tool_arguments(), serde_json::json!({"path": "a.rs"}));
    }

    #[test]
    fn tool_arguments_default_to_empty_object() {
        let step = Step::new("s1", StepType::ToolExecution, "t", "");
        assert_eq!(step.tool_arguments(), serde_json::json!({}));
    }
}
