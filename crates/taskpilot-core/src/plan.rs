//! Plan and decision shapes recovered from model output
//!
//! The planning phase requests a JSON array of `PlannedStep` objects;
//! decision steps request a single `DecisionOutcome` object. Both are
//! deliberately lenient: every field except the type tag defaults, since
//! the producer is a language model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::step::{Step, StepType};

/// One entry of the plan array returned by the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub step_type: StepType,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl PlannedStep {
    /// Normalize into a pending [`Step`]. Id uniqueness is enforced by
    /// the workflow on append.
    pub fn into_step(self) -> Step {
        Step::new(self.id, self.step_type, self.title, self.description)
            .with_parameters(self.parameters)
    }
}

/// Advisory directive carried by a decision result.
///
/// Recorded for observers; the engine's advance logic does not branch
/// on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NextStepDirective {
    #[default]
    Continue,
    Complete,
    Error,
}

/// The object shape a decision step's model output must yield.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    #[serde(rename = "nextStep", default)]
    pub next_step: NextStepDirective,

    #[serde(default)]
    pub id: String,

    /// Type tag of the proposed follow-up step, if any.
    #[serde(rename = "type", default)]
    pub step_type: Option<StepType>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl DecisionOutcome {
    /// A decision proposes a follow-up step when it carries a fresh id
    /// and a known type tag.
    pub fn proposed_step(&self) -> Option<Step> {
        let step_type = self.step_type.clone()?;
        if !step_type.is_known() || self.id.trim().is_empty() {
            return None;
        }
        Some(
            Step::new(
                self.id.clone(),
                step_type,
                self.title.clone(),
                self.description.clone(),
            )
            .with_parameters(self.parameters.clone()),
        )
    }
}
