use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskpilot_core::{StepStatus, StepType, WorkflowStatus};
use taskpilot_engine::{EngineConfig, EngineSnapshot, TaskEngine};
use taskpilot_llm::{ChunkSink, Completion, Oracle, OracleError};
use taskpilot_state::EngineState;
use taskpilot_tools::{Tool, ToolError, ToolRegistry};

/// Oracle that replays canned responses in order and fails with a
/// transport error once the script runs dry.
struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedOracle {
    fn new<const N: usize>(responses: [&str; N]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(&self, _prompt: &str) -> taskpilot_llm::Result<Completion> {
        let mut responses = self.responses.lock().unwrap();
        let content = responses.pop_front().ok_or_else(|| OracleError::Api {
            status: 500,
            detail: "script exhausted".to_string(),
        })?;
        Ok(Completion {
            content,
            usage: None,
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        on_chunk: ChunkSink<'_>,
    ) -> taskpilot_llm::Result<Completion> {
        if cancel.is_cancelled() {
            return Err(OracleError::Cancelled);
        }
        let completion = self.generate(prompt).await?;
        on_chunk(&completion.content);
        Ok(completion)
    }
}

/// Oracle that plans normally but aborts every streamed decision call,
/// as a user-initiated stop would.
struct CancellingOracle {
    plan: String,
}

#[async_trait]
impl Oracle for CancellingOracle {
    async fn generate(&self, _prompt: &str) -> taskpilot_llm::Result<Completion> {
        Ok(Completion {
            content: self.plan.clone(),
            usage: None,
        })
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        cancel: CancellationToken,
        _on_chunk: ChunkSink<'_>,
    ) -> taskpilot_llm::Result<Completion> {
        cancel.cancel();
        Err(OracleError::Cancelled)
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the arguments back"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"text": {"type": "string", "description": "Text to echo"}},
            "required": ["text"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Ok(serde_json::json!({"echoed": args}))
    }
}

fn fenced_plan(steps_json: &str) -> String {
    format!("Here is the plan:\n```json\n{steps_json}\n```\nDone.")
}

fn user_input_plan(ids: &[&str]) -> String {
    let steps: Vec<String> = ids
        .iter()
        .map(|id| {
            format!(
                "{{\"id\":\"{id}\",\"type\":\"user_input\",\"title\":\"{id}\",\"description\":\"step {id}\",\"parameters\":{{}}}}"
            )
        })
        .collect();
    fenced_plan(&format!("[{}]", steps.join(",")))
}

fn recording_subscriber(
    engine: &mut TaskEngine,
) -> Arc<Mutex<Vec<EngineSnapshot>>> {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);
    engine.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot.clone());
    });
    snapshots
}

#[tokio::test]
async fn plan_normalization_creates_pending_steps_in_order() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1", "s2", "s3"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));
    let snapshots = recording_subscriber(&mut engine);

    engine.start("triage the failing build").await.unwrap();

    // The first snapshot in the running state carries the freshly
    // normalized plan: three pending steps after the synthetic one.
    let snapshots = snapshots.lock().unwrap();
    let first_running = snapshots
        .iter()
        .find(|s| s.state == EngineState::Running)
        .expect("running snapshot");
    let ids: Vec<&str> = first_running.workflow.steps[1..]
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert!(first_running.workflow.steps[1..]
        .iter()
        .all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn full_run_reaches_completed() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1", "s2"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("walk the happy path").await.unwrap();

    let snapshot = engine.get_state();
    assert_eq!(snapshot.state, EngineState::Completed);
    assert_eq!(snapshot.workflow.status, WorkflowStatus::Completed);
    assert!(snapshot.workflow.is_complete());
    assert!(snapshot
        .workflow
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));
    assert!(engine.errors().is_empty());
}

#[tokio::test]
async fn cursor_is_monotonic_and_advances_one_step_at_a_time() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1", "s2", "s3"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));
    let snapshots = recording_subscriber(&mut engine);

    engine.start("check the cursor invariant").await.unwrap();

    let snapshots = snapshots.lock().unwrap();
    let mut previous = 0usize;
    for snapshot in snapshots.iter() {
        let cursor = snapshot.workflow.current_step;
        assert!(cursor <= snapshot.workflow.steps.len());
        assert!(cursor >= previous, "cursor went backwards");
        assert!(cursor - previous <= 1, "cursor jumped by more than one");
        previous = cursor;
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.workflow.current_step, last.workflow.steps.len());
}

#[tokio::test]
async fn tool_step_invokes_registered_tool() {
    let plan = fenced_plan(
        "[{\"id\":\"t1\",\"type\":\"tool_execution\",\"title\":\"echo\",\"description\":\"\",\
         \"parameters\":{\"toolName\":\"echo\",\"parameters\":{\"text\":\"hi\"}}}]",
    );
    let oracle = ScriptedOracle::new([plan.as_str()]);
    let tools = Arc::new(ToolRegistry::new());
    tools.register(EchoTool).unwrap();
    let mut engine = TaskEngine::new(oracle, tools);

    engine.start("echo something").await.unwrap();

    let snapshot = engine.get_state();
    assert_eq!(snapshot.state, EngineState::Completed);
    let result = snapshot.workflow.steps[1].result.as_ref().unwrap();
    assert_eq!(result["echoed"]["text"], "hi");
}

#[tokio::test]
async fn unknown_tool_drives_engine_to_error_without_advancing() {
    let plan = fenced_plan(
        "[{\"id\":\"t1\",\"type\":\"tool_execution\",\"title\":\"shred\",\"description\":\"\",\
         \"parameters\":{\"toolName\":\"shred\",\"parameters\":{}}},\
         {\"id\":\"t2\",\"type\":\"user_input\",\"title\":\"never\",\"description\":\"\",\"parameters\":{}}]",
    );
    let oracle = ScriptedOracle::new([plan.as_str()]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("dispatch an unregistered tool").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    assert_eq!(snapshot.workflow.status, WorkflowStatus::Failed);

    let failed = &snapshot.workflow.steps[1];
    assert_eq!(failed.status, StepStatus::Failed);
    assert!(failed.error.as_ref().unwrap().contains("unknown tool"));
    // The cursor stays on the failed step and the following step never
    // starts.
    assert_eq!(snapshot.workflow.current_step, 1);
    assert_eq!(snapshot.workflow.steps[2].status, StepStatus::Pending);
    assert!(engine.error_summary().contains("unknown tool"));
}

#[tokio::test]
async fn missing_tool_name_is_a_missing_parameter_failure() {
    let plan = fenced_plan(
        "[{\"id\":\"t1\",\"type\":\"tool_execution\",\"title\":\"no name\",\"description\":\"\",\
         \"parameters\":{\"parameters\":{}}}]",
    );
    let oracle = ScriptedOracle::new([plan.as_str()]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("forget the tool name").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    assert!(engine.error_summary().contains("missing parameter"));
}

#[tokio::test]
async fn unknown_step_type_fails_at_dispatch() {
    let plan = fenced_plan(
        "[{\"id\":\"s1\",\"type\":\"user_input\",\"title\":\"ok\",\"description\":\"\",\"parameters\":{}},\
         {\"id\":\"s2\",\"type\":\"teleport\",\"title\":\"bad\",\"description\":\"\",\"parameters\":{}}]",
    );
    let oracle = ScriptedOracle::new([plan.as_str()]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("plan with a bogus step type").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    // The well-formed step before it still ran.
    assert_eq!(snapshot.workflow.steps[1].status, StepStatus::Completed);
    assert!(engine
        .error_summary()
        .contains("unknown step type: teleport"));
}

#[tokio::test]
async fn decision_result_is_recorded_and_complete_directive_does_not_halt() {
    let plan = fenced_plan(
        "[{\"id\":\"d1\",\"type\":\"llm_decision\",\"title\":\"assess\",\"description\":\"\",\"parameters\":{}},\
         {\"id\":\"u1\",\"type\":\"user_input\",\"title\":\"confirm\",\"description\":\"\",\"parameters\":{}}]",
    );
    let decision = "```json\n{\"nextStep\": \"complete\", \"summary\": \"nothing left\"}\n```";
    let oracle = ScriptedOracle::new([plan.as_str(), decision]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("advisory directive is metadata").await.unwrap();

    let snapshot = engine.get_state();
    // `nextStep: complete` is advisory; the loop still consumed u1.
    assert_eq!(snapshot.state, EngineState::Completed);
    assert_eq!(snapshot.workflow.steps.len(), 3);
    assert_eq!(snapshot.workflow.steps[2].status, StepStatus::Completed);

    let recorded = snapshot.workflow.steps[1].result.as_ref().unwrap();
    assert_eq!(recorded["nextStep"], "complete");
}

#[tokio::test]
async fn decision_can_append_a_follow_up_step() {
    let plan = fenced_plan(
        "[{\"id\":\"d1\",\"type\":\"llm_decision\",\"title\":\"assess\",\"description\":\"\",\"parameters\":{}}]",
    );
    let decision = "```json\n{\"nextStep\": \"continue\", \"id\": \"extra\", \"type\": \"user_input\", \
                    \"title\": \"one more\", \"description\": \"appended mid-run\", \"parameters\": {}}\n```";
    let oracle = ScriptedOracle::new([plan.as_str(), decision]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("grow the plan while running").await.unwrap();

    let snapshot = engine.get_state();
    assert_eq!(snapshot.state, EngineState::Completed);
    assert_eq!(snapshot.workflow.steps.len(), 3);
    let appended = &snapshot.workflow.steps[2];
    assert_eq!(appended.id, "extra");
    assert_eq!(appended.step_type, StepType::UserInput);
    assert_eq!(appended.status, StepStatus::Completed);
}

#[tokio::test]
async fn empty_plan_fails_planning() {
    let oracle = ScriptedOracle::new(["```json\n[]\n```"]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("produce nothing").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    assert_eq!(snapshot.workflow.status, WorkflowStatus::Failed);
    assert!(engine.error_summary().contains("planning failed"));
    // The synthetic planning step carries the failure.
    assert_eq!(snapshot.workflow.steps[0].status, StepStatus::Failed);
}

#[tokio::test]
async fn unparseable_plan_fails_planning_with_extraction_cause() {
    let oracle = ScriptedOracle::new(["I would rather chat about the weather."]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("refuse to produce a plan").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    assert!(engine.error_summary().contains("no structured data"));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_anything_runs() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));
    let snapshots = recording_subscriber(&mut engine);

    assert!(engine.start("   ").await.is_err());
    assert_eq!(engine.get_state().state, EngineState::Idle);
    assert!(snapshots.lock().unwrap().is_empty());
}

#[tokio::test]
async fn validator_rejection_is_an_invalid_input_error() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1"])]);
    let config = EngineConfig {
        input_validator: Some(Arc::new(|input: &str| input.starts_with("task:"))),
        ..Default::default()
    };
    let mut engine = TaskEngine::with_config(oracle, Arc::new(ToolRegistry::new()), config);

    let err = engine.start("not prefixed").await.unwrap_err();
    assert!(err.to_string().contains("invalid input"));

    engine.start("task: prefixed fine").await.unwrap();
    assert_eq!(engine.get_state().state, EngineState::Completed);
}

#[tokio::test]
async fn reset_clears_state_from_any_point() {
    let oracle = ScriptedOracle::new(["no plan here"]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("end up in the error state").await.unwrap();
    assert!(engine.get_state().state.is_error());

    engine.reset();

    let snapshot = engine.get_state();
    assert_eq!(snapshot.state, EngineState::Idle);
    assert!(snapshot.workflow.steps.is_empty());
    assert_eq!(snapshot.workflow.current_step, 0);
    assert!(engine.errors().is_empty());
}

#[tokio::test]
async fn retry_leaves_error_but_is_rejected_elsewhere() {
    let oracle = ScriptedOracle::new(["garbage", &user_input_plan(&["s1"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    // Not in error yet: retry refused.
    assert!(engine.retry().is_err());

    engine.start("fail the first attempt").await.unwrap();
    assert!(engine.get_state().state.is_error());

    engine.retry().unwrap();
    assert_eq!(engine.get_state().state, EngineState::Idle);
    assert!(engine.errors().is_empty());

    // A fresh start after retry plans from scratch.
    engine.start("second attempt").await.unwrap();
    assert_eq!(engine.get_state().state, EngineState::Completed);
}

#[tokio::test]
async fn repeated_start_discards_the_previous_workflow() {
    let first = user_input_plan(&["a1"]);
    let second = user_input_plan(&["b1", "b2"]);
    let oracle = ScriptedOracle::new([first.as_str(), second.as_str()]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("first task").await.unwrap();
    let first_id = engine.get_state().workflow.id;

    engine.start("second task").await.unwrap();
    let snapshot = engine.get_state();
    assert_ne!(snapshot.workflow.id, first_id);
    assert_eq!(snapshot.workflow.steps.len(), 3);
    assert_eq!(snapshot.workflow.steps[1].id, "b1");
}

#[tokio::test]
async fn panicking_subscriber_does_not_block_the_others() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.subscribe(|_snapshot| panic!("misbehaving observer"));
    let received = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&received);
    engine.subscribe(move |_snapshot| {
        *counter.lock().unwrap() += 1;
    });

    engine.start("survive a bad subscriber").await.unwrap();

    assert_eq!(engine.get_state().state, EngineState::Completed);
    assert!(*received.lock().unwrap() > 0);
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    let received = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&received);
    let id = engine.subscribe(move |_snapshot| {
        *counter.lock().unwrap() += 1;
    });

    assert!(engine.unsubscribe(id));
    assert!(!engine.unsubscribe(id));

    engine.start("nobody is listening").await.unwrap();
    assert_eq!(*received.lock().unwrap(), 0);
}

#[tokio::test]
async fn cancellation_mid_stream_is_distinguished_from_transport_failure() {
    let plan = fenced_plan(
        "[{\"id\":\"d1\",\"type\":\"llm_decision\",\"title\":\"assess\",\"description\":\"\",\"parameters\":{}}]",
    );
    let oracle = Arc::new(CancellingOracle { plan });
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("cancel during the decision").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    assert_eq!(engine.errors(), ["cancelled"]);
    assert!(!engine.error_summary().contains("transport"));
    assert_eq!(snapshot.workflow.steps[1].error.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn transport_failure_is_reported_as_such() {
    let plan = fenced_plan(
        "[{\"id\":\"d1\",\"type\":\"llm_decision\",\"title\":\"assess\",\"description\":\"\",\"parameters\":{}}]",
    );
    // Script runs dry before the decision call.
    let oracle = ScriptedOracle::new([plan.as_str()]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("lose the connection").await.unwrap();

    let snapshot = engine.get_state();
    assert!(snapshot.state.is_error());
    assert!(engine.error_summary().contains("transport error"));
    assert!(engine.error_summary().contains("script exhausted"));
}

#[tokio::test]
async fn snapshots_are_detached_copies() {
    let oracle = ScriptedOracle::new([&user_input_plan(&["s1"])]);
    let mut engine = TaskEngine::new(oracle, Arc::new(ToolRegistry::new()));

    engine.start("hand out copies").await.unwrap();

    let mut snapshot = engine.get_state();
    snapshot.workflow.steps.clear();
    snapshot.workflow.current_step = 0;

    let fresh = engine.get_state();
    assert_eq!(fresh.workflow.steps.len(), 2);
    assert_eq!(fresh.workflow.current_step, 2);
}
