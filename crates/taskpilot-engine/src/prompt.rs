//! Prompt construction for planning and decision calls
//!
//! Exact wording is a tuning concern; the requested output shapes are
//! contractual and must stay recoverable by the extractor.

pub const DEFAULT_ROLE: &str = "You are the planning and decision engine of an editor \
assistant. You break a unit of work into small verifiable steps and drive them to \
completion with the available tools.";

/// Output-format contract for plan generation.
const PLAN_FORMAT: &str = r#"## OUTPUT FORMAT

Respond with ONLY a JSON array of step objects, inside a ```json fence.
Each step object has exactly these fields:

- "id": short unique step identifier
- "type": one of "llm_decision", "tool_execution", "user_input"
- "title": short human-readable title
- "description": what the step must accomplish
- "parameters": object; for "tool_execution" it must contain "toolName"
  and a "parameters" object with the tool's arguments

Example:

```json
[
  {
    "id": "s1",
    "type": "tool_execution",
    "title": "Read the file",
    "description": "Load src/main.rs so it can be reviewed",
    "parameters": {"toolName": "read_file", "parameters": {"path": "src/main.rs"}}
  },
  {
    "id": "s2",
    "type": "llm_decision",
    "title": "Review the contents",
    "description": "Decide whether the file needs changes",
    "parameters": {}
  }
]
```
"#;

/// Output-format contract for decision steps.
const DECISION_FORMAT: &str = r#"## OUTPUT FORMAT

Respond with ONLY a JSON object, inside a ```json fence, shaped:

```json
{
  "nextStep": "continue",
  "id": "s3",
  "type": "tool_execution",
  "title": "Apply the fix",
  "description": "Write the corrected file back",
  "parameters": {"toolName": "write_file", "parameters": {"path": "src/main.rs"}}
}
```

- "nextStep" is "continue", "complete" or "error"
- the remaining fields describe a follow-up step when one is needed;
  reuse an existing step id if no new work is required
"#;

/// Build the plan-generation prompt from the role description, the
/// rendered tool catalogue, and the serialized task input.
pub fn build_planning_prompt(role: &str, catalog: &str, input: &str) -> String {
    format!(
        "{role}\n\n{catalog}\n## TASK INPUT\n\n{input}\n\n{PLAN_FORMAT}"
    )
}

/// Build a decision-step prompt from the step metadata, the
/// concatenated prior step results, and the tool catalogue.
pub fn build_decision_prompt(
    role: &str,
    title: &str,
    description: &str,
    prior_results: &str,
    catalog: &str,
) -> String {
    format!(
        "{role}\n\n## CURRENT STEP\n\n{title}\n{description}\n\n\
         ## PRIOR STEP RESULTS\n\n{prior_results}\n{catalog}\n{DECISION_FORMAT}"
    )
}
