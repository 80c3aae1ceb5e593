//! TaskEngine - the interpreter loop around the pure state machine
//!
//! State transitions are computed by `taskpilot-state`; this module
//! performs the side effects between them (oracle calls, tool calls,
//! workflow bookkeeping) and broadcasts a snapshot after every
//! committed transition.
//!
//! One engine instance drives one workflow at a time. The mutable
//! borrow taken by `start` makes racing starts unrepresentable; the
//! only suspend points are the calls out to the oracle and the tool
//! registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskpilot_core::{
    DecisionOutcome, NextStepDirective, PlannedStep, Step, StepStatus, StepType, Workflow,
    WorkflowStatus,
};
use taskpilot_extract::{extract_array, extract_object};
use taskpilot_llm::Oracle;
use taskpilot_state::{EngineEvent, StateMachine, TransitionError};
use taskpilot_tools::{format_catalog, ToolError, ToolRegistry};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::prompt;
use crate::snapshot::EngineSnapshot;

/// Id of the synthetic step that represents plan generation itself.
const PLAN_STEP_ID: &str = "plan";

const TITLE_LIMIT: usize = 64;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber = Box<dyn Fn(&EngineSnapshot) + Send + Sync>;

struct DispatchOutcome {
    result: serde_json::Value,
    proposed: Option<Step>,
}

impl DispatchOutcome {
    fn plain(result: serde_json::Value) -> Self {
        Self {
            result,
            proposed: None,
        }
    }
}

pub struct TaskEngine {
    oracle: Arc<dyn Oracle>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
    machine: StateMachine,
    workflow: Workflow,
    errors: Vec<String>,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_subscriber_id: u64,
    cancel: CancellationToken,
}

impl TaskEngine {
    pub fn new(oracle: Arc<dyn Oracle>, tools: Arc<ToolRegistry>) -> Self {
        Self::with_config(oracle, tools, EngineConfig::default())
    }

    pub fn with_config(
        oracle: Arc<dyn Oracle>,
        tools: Arc<ToolRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            tools,
            config,
            machine: StateMachine::new(),
            workflow: Workflow::new(),
            errors: Vec::new(),
            subscribers: Vec::new(),
            next_subscriber_id: 0,
            cancel: CancellationToken::new(),
        }
    }

    // ========== Lifecycle operations ==========

    /// Start a new workflow for `input` and drive it to a terminal
    /// state.
    ///
    /// Rejects with `InvalidInput` when the input is empty or fails the
    /// configured validation predicate; every later failure is observed
    /// through snapshots, never as a returned error. Any prior workflow
    /// is discarded first, so repeated calls are safe.
    pub async fn start(&mut self, input: &str) -> Result<(), EngineError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EngineError::InvalidInput("task input is empty".to_string()));
        }
        if let Some(validator) = &self.config.input_validator {
            if !validator(input) {
                return Err(EngineError::InvalidInput(
                    "task input rejected by validator".to_string(),
                ));
            }
        }

        self.begin_workflow(input);
        self.apply(EngineEvent::StartAccepted);

        match self.run_planning(input).await {
            Ok(step_count) => {
                self.workflow.set_status(WorkflowStatus::Running);
                self.apply(EngineEvent::PlanReady { step_count });
            }
            Err(EngineError::Cancelled) => {
                self.record_cancellation();
                return Ok(());
            }
            Err(error) => {
                let message = error.to_string();
                self.fail_current_step(&message);
                self.errors.push(message.clone());
                self.workflow.set_status(WorkflowStatus::Failed);
                self.apply(EngineEvent::PlanningFailed { error: message });
                return Ok(());
            }
        }

        self.run_steps().await;
        Ok(())
    }

    /// Unconditionally return to idle with an empty workflow. Never
    /// fails.
    pub fn reset(&mut self) {
        self.cancel = CancellationToken::new();
        self.workflow = Workflow::new();
        self.errors.clear();
        self.apply(EngineEvent::ResetRequested);
    }

    /// Leave the error state, discarding the failed workflow. The
    /// caller must `start` again to produce a fresh plan; partially
    /// executed plans are never resumed.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        if !self.machine.state().is_error() {
            return Err(TransitionError::InvalidTransition {
                from: self.machine.state().clone(),
                event: "retry".to_string(),
            });
        }
        self.cancel = CancellationToken::new();
        self.workflow = Workflow::new();
        self.errors.clear();
        self.apply(EngineEvent::RetryRequested);
        Ok(())
    }

    /// Signal cancellation of the in-flight run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for cancelling the current run from another task.
    /// Invalidated by `start`/`reset`/`retry`, which mint a new token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ========== Inspection ==========

    /// Read-only snapshot of `{state, workflow}`. Never blocks.
    pub fn get_state(&self) -> EngineSnapshot {
        self.snapshot()
    }

    /// Workflow-level error list for the current run.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Every recorded error, one per line.
    pub fn error_summary(&self) -> String {
        self.errors.join("\n")
    }

    // ========== Subscriptions ==========

    /// Register a callback invoked synchronously after every committed
    /// transition. A panicking subscriber is isolated and logged; it
    /// never blocks delivery to the others or corrupts engine state.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: Fn(&EngineSnapshot) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_subscriber_id);
        self.next_subscriber_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    // ========== Planning phase ==========

    fn begin_workflow(&mut self, input: &str) {
        self.machine.reset();
        self.errors.clear();
        self.cancel = CancellationToken::new();

        let mut workflow = Workflow::new();
        workflow.title = truncate_title(input);
        workflow.summary = input.to_string();
        workflow.append_step(Step::new(
            PLAN_STEP_ID,
            StepType::LlmDecision,
            "Generate plan",
            "Ask the model for an ordered step list",
        ));
        self.workflow = workflow;
    }

    async fn run_planning(&mut self, input: &str) -> Result<usize, EngineError> {
        if let Some(step) = self.workflow.current_mut() {
            step.start();
        }

        let catalog = format_catalog(&self.tools.list_schemas());
        let planning_prompt = prompt::build_planning_prompt(self.config.role(), &catalog, input);
        let completion = self.oracle.generate(&planning_prompt).await?;

        let value = extract_array(&completion.content)
            .map_err(|error| EngineError::Planning(error.to_string()))?;
        let entries = value.as_array().cloned().unwrap_or_default();
        if entries.is_empty() {
            return Err(EngineError::Planning(
                "model produced an empty plan".to_string(),
            ));
        }
        if entries.len() > self.config.max_plan_steps {
            return Err(EngineError::Planning(format!(
                "plan has {} steps, limit is {}",
                entries.len(),
                self.config.max_plan_steps
            )));
        }

        let mut planned = Vec::with_capacity(entries.len());
        for entry in entries {
            let step: PlannedStep = serde_json::from_value(entry)
                .map_err(|error| EngineError::Planning(format!("malformed plan entry: {error}")))?;
            planned.push(step);
        }

        let step_count = planned.len();
        if let Some(step) = self.workflow.current_mut() {
            step.complete(serde_json::json!({ "stepCount": step_count }));
        }
        self.workflow.advance();
        for step in planned {
            self.workflow.append_step(step.into_step());
        }
        log::info!(
            "plan ready: {} steps for workflow {}",
            step_count,
            self.workflow.id
        );
        Ok(step_count)
    }

    // ========== Execution phase ==========

    async fn run_steps(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                self.record_cancellation();
                return;
            }
            if self.workflow.is_complete() {
                self.workflow.set_status(WorkflowStatus::Completed);
                self.apply(EngineEvent::WorkflowCompleted);
                return;
            }

            let step = match self.workflow.current_mut() {
                Some(step) => {
                    step.start();
                    step.clone()
                }
                None => continue,
            };
            let step_id = step.id.clone();
            self.apply(EngineEvent::StepStarted {
                step_id: step_id.clone(),
            });

            match self.dispatch_step(&step).await {
                Ok(DispatchOutcome { result, proposed }) => {
                    if let Some(step) = self.workflow.current_mut() {
                        step.complete(result);
                    }
                    self.workflow.advance();
                    if let Some(step) = proposed {
                        self.append_proposed(step);
                    }
                    self.apply(EngineEvent::StepCompleted { step_id });
                }
                Err(EngineError::Cancelled) => {
                    self.record_cancellation();
                    return;
                }
                Err(error) => {
                    let message = error.to_string();
                    self.fail_current_step(&message);
                    self.errors.push(message.clone());
                    self.workflow.set_status(WorkflowStatus::Failed);
                    self.apply(EngineEvent::StepFailed {
                        step_id,
                        error: message,
                    });
                    return;
                }
            }
        }
    }

    async fn dispatch_step(&self, step: &Step) -> Result<DispatchOutcome, EngineError> {
        match step.step_type.clone() {
            StepType::LlmDecision => self.dispatch_decision(step).await,
            StepType::ToolExecution => self.dispatch_tool(step).await.map(DispatchOutcome::plain),
            // Baseline behavior: acknowledge immediately. Suspending
            // into an awaiting-input state until the host supplies a
            // value is an extension point, not exercised here.
            StepType::UserInput => Ok(DispatchOutcome::plain(serde_json::json!({
                "acknowledged": true,
                "prompt": step.description.clone(),
            }))),
            StepType::Unknown(tag) => Err(EngineError::UnknownStepType(tag)),
        }
    }

    async fn dispatch_decision(&self, step: &Step) -> Result<DispatchOutcome, EngineError> {
        let catalog = format_catalog(&self.tools.list_schemas());
        let prior = render_prior_results(&self.workflow);
        let decision_prompt = prompt::build_decision_prompt(
            self.config.role(),
            &step.title,
            &step.description,
            &prior,
            &catalog,
        );

        let completion = if self.config.stream_decisions {
            self.oracle
                .generate_stream(&decision_prompt, self.cancel.clone(), &mut |chunk| {
                    log::trace!("decision chunk: {} bytes", chunk.len());
                })
                .await?
        } else {
            self.oracle.generate(&decision_prompt).await?
        };

        let value = extract_object(&completion.content)?;

        // The advisory directive is recorded with the result, never
        // used to move the cursor. A well-formed follow-up proposal is
        // appended to the log when the directive asks to continue.
        let proposed = serde_json::from_value::<DecisionOutcome>(value.clone())
            .ok()
            .filter(|outcome| outcome.next_step == NextStepDirective::Continue)
            .and_then(|outcome| outcome.proposed_step());

        Ok(DispatchOutcome {
            result: value,
            proposed,
        })
    }

    async fn dispatch_tool(&self, step: &Step) -> Result<serde_json::Value, EngineError> {
        let tool_name = step.tool_name().ok_or_else(|| {
            EngineError::MissingParameter(format!(
                "step '{}' has no '{}' parameter",
                step.id,
                taskpilot_core::TOOL_NAME_KEY
            ))
        })?;
        if !self.tools.contains(tool_name) {
            return Err(EngineError::UnknownTool(tool_name.to_string()));
        }

        log::debug!("invoking tool '{}' for step '{}'", tool_name, step.id);
        self.tools
            .invoke(tool_name, step.tool_arguments())
            .await
            .map_err(|error| match error {
                ToolError::NotFound(name) => EngineError::UnknownTool(name),
                other => EngineError::Tool(other),
            })
    }

    fn append_proposed(&mut self, step: Step) {
        if self.workflow.contains_step(&step.id) {
            log::debug!("decision re-proposed existing step '{}', ignoring", step.id);
            return;
        }
        if self.workflow.steps.len() >= self.config.max_plan_steps {
            log::warn!(
                "step limit {} reached, dropping proposed step '{}'",
                self.config.max_plan_steps,
                step.id
            );
            return;
        }
        log::info!("appending step '{}' proposed during execution", step.id);
        self.workflow.append_step(step);
    }

    // ========== Failure bookkeeping ==========

    fn fail_current_step(&mut self, message: &str) {
        if let Some(step) = self.workflow.current_mut() {
            if step.status == StepStatus::Running {
                step.fail(message);
            }
        }
    }

    fn record_cancellation(&mut self) {
        let message = EngineError::Cancelled.to_string();
        self.fail_current_step(&message);
        self.errors.push(message);
        self.workflow.set_status(WorkflowStatus::Failed);
        self.apply(EngineEvent::Cancelled);
    }

    // ========== Transition commit and broadcast ==========

    fn apply(&mut self, event: EngineEvent) {
        let transition = self.machine.handle_event(event);
        log::debug!(
            "engine transition: {:?} -> {:?} (changed: {})",
            transition.from,
            transition.to,
            transition.changed
        );
        self.notify();
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        for (id, callback) in &self.subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(&snapshot)));
            if outcome.is_err() {
                log::error!("subscriber {id:?} panicked; continuing delivery");
            }
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.machine.state().clone(),
            workflow: self.workflow.clone(),
        }
    }
}

fn truncate_title(input: &str) -> String {
    let first_line = input.lines().next().unwrap_or_default();
    if first_line.chars().count() <= TITLE_LIMIT {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(TITLE_LIMIT).collect();
    format!("{cut}…")
}

/// Concatenate results of every completed step before the cursor, in
/// execution order, for embedding into decision prompts.
fn render_prior_results(workflow: &Workflow) -> String {
    let mut output = String::new();
    for step in workflow.completed_steps() {
        if step.id == PLAN_STEP_ID {
            continue;
        }
        let result = step
            .result
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_default();
        output.push_str(&format!("### {} ({})\n{}\n\n", step.title, step.id, result));
    }
    if output.is_empty() {
        output.push_str("No prior step results.\n");
    }
    output
}
