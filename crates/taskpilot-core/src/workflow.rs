//! Workflow - the unit of orchestration
//!
//! A workflow owns an append-only log of steps and a cursor into it.
//! Completed indices are never revisited; the cursor only moves forward
//! (a reset discards the whole workflow instead of rewinding it).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::step::{Step, StepStatus};

/// Overall status of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The unit of orchestration: an ordered step log plus a cursor.
///
/// Invariant: `0 <= current_step <= steps.len()`; when
/// `current_step == steps.len()` the workflow is logically complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,

    /// Set once at plan-generation time.
    pub title: String,
    pub summary: String,

    /// Insertion order is execution order. Append-only.
    pub steps: Vec<Step>,

    /// Zero-based cursor into `steps`.
    pub current_step: usize,

    pub status: WorkflowStatus,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation; never decreases.
    pub updated_at: DateTime<Utc>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            summary: String::new(),
            steps: Vec::new(),
            current_step: 0,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a step to the log.
    ///
    /// Step ids must stay unique within the workflow; an empty or
    /// colliding id is replaced with a fresh one.
    pub fn append_step(&mut self, mut step: Step) -> &Step {
        if step.id.trim().is_empty() || self.contains_step(&step.id) {
            step.id = Uuid::new_v4().to_string();
        }
        self.steps.push(step);
        self.touch();
        self.steps.last().expect("just pushed")
    }

    pub fn contains_step(&self, id: &str) -> bool {
        self.steps.iter().any(|s| s.id == id)
    }

    /// The step under the cursor, if any.
    pub fn current(&self) -> Option<&Step> {
        self.steps.get(self.current_step)
    }

    pub fn current_mut(&mut self) -> Option<&mut Step> {
        let index = self.current_step;
        self.touch();
        self.steps.get_mut(index)
    }

    /// Advance the cursor past the current step. Saturates at the end
    /// of the log so the cursor invariant can never be violated.
    pub fn advance(&mut self) {
        if self.current_step < self.steps.len() {
            self.current_step += 1;
            self.touch();
        }
    }

    /// Logically complete: every step has been consumed.
    pub fn is_complete(&self) -> bool {
        self.current_step == self.steps.len()
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.touch();
    }

    /// Steps before the cursor that completed with a result, in order.
    pub fn completed_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps[..self.current_step.min(self.steps.len())]
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
    }

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }

    /// Progress as a fraction of steps in a terminal state (0.0 - 1.0).
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 1.0;
        }
        let terminal = self.steps.iter().filter(|s| s.status.is_terminal()).count();
        terminal as f64 / self.steps.len() as f64
    }

    /// Concatenation of every recorded step error, one per line.
    pub fn error_summary(&self) -> String {
        self.steps
            .iter()
            .filter_map(|s| {
                s.error
                    .as_deref()
                    .map(|error| format!("[{}] {}: {}", s.id, s.title, error))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepType;

    fn step(id: &str) -> Step {
        Step::new(id, StepType::UserInput, id, "")
    }

    #[test]
    fn empty_workflow_is_complete() {
        let workflow = Workflow::new();
        assert!(workflow.is_complete());
        assert_eq!(workflow.current_step, 0);
    }

    #[test]
    fn append_preserves_order_and_uniqueness() {
        let mut workflow = Workflow::new();
        workflow.append_step(step("a"));
        workflow.append_step(step("b"));
        let replaced = workflow.append_step(step("a")).id.clone();

        assert_eq!(workflow.steps.len(), 3);
        assert_eq!(workflow.steps[0].id, "a");
        assert_eq!(workflow.steps[1].id, "b");
        assert_ne!(replaced, "a");
    }

    #[test]
    fn advance_saturates_at_log_end() {
        let mut workflow = Workflow::new();
        workflow.append_step(step("a"));
        assert!(!workflow.is_complete());

        workflow.advance();
        assert!(workflow.is_complete());
        workflow.advance();
        assert_eq!(workflow.current_step, 1);
    }

    #[test]
    fn updated_at_never_decreases() {
        let mut workflow = Workflow::new();
        let before = workflow.updated_at;
        workflow.append_step(step("a"));
        assert!(workflow.updated_at >= before);
        let mid = workflow.updated_at;
        workflow.advance();
        assert!(workflow.updated_at >= mid);
    }

    #[test]
    fn error_summary_concatenates_step_errors() {
        let mut workflow = Workflow::new();
        workflow.append_step(step("a"));
        workflow.append_step(step("b"));
        workflow.steps[0].fail("first failure");
        workflow.steps[1].fail("second failure");

        let summary = workflow.error_summary();
        assert!(summary.contains("first failure"));
        assert!(summary.contains("second failure"));
        assert_eq!(summary.lines().count(), 2);
    }

    #[test]
    fn completed_steps_only_reports_steps_before_cursor() {
        let mut workflow = Workflow::new();
        workflow.append_step(step("a"));
        workflow.append_step(step("b"));
        workflow.steps[0].complete(serde_json::json!("done"));
        workflow.advance();

        let seen: Vec<&str> = workflow.completed_steps().map(|s| s.id.as_str()).collect();
        assert_eq!(seen, vec!["a"]);
    }
}
