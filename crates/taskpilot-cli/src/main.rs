use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use colored::Colorize;

use taskpilot_engine::{EngineConfig, TaskEngine};
use taskpilot_llm::OpenAiOracle;
use taskpilot_tools::{Tool, ToolError, ToolRegistry};

#[derive(Parser)]
#[command(name = "taskpilot")]
#[command(about = "Plan and execute an agent task from the terminal")]
#[command(version)]
struct Cli {
    /// Task input handed to the planner
    task: String,

    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Disable streaming for decision steps
    #[arg(long, default_value = "false")]
    no_stream: bool,
}

/// Minimal demonstration tool so generated plans have something to
/// call. Real hosts register their own catalogue.
#[derive(Debug)]
struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back to the workflow"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Text to echo"}
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Ok(serde_json::json!({"echo": args.get("text").cloned().unwrap_or_default()}))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let oracle = Arc::new(
        OpenAiOracle::new(cli.api_key)
            .with_base_url(cli.base_url)
            .with_model(cli.model),
    );
    let tools = Arc::new(ToolRegistry::new());
    tools
        .register(EchoTool)
        .map_err(|e| anyhow::anyhow!("tool registration failed: {e}"))?;

    let config = EngineConfig {
        stream_decisions: !cli.no_stream,
        ..Default::default()
    };
    let mut engine = TaskEngine::with_config(oracle, tools, config);

    engine.subscribe(|snapshot| {
        let cursor = snapshot.workflow.current_step;
        let total = snapshot.workflow.steps.len();
        println!(
            "{} {} ({}/{})",
            "state:".dimmed(),
            snapshot.state.description().bold(),
            cursor,
            total
        );
    });

    engine.start(&cli.task).await?;

    let snapshot = engine.get_state();
    println!();
    println!("{}", snapshot.workflow.title.bold());
    for step in &snapshot.workflow.steps {
        let marker = match step.status.as_str() {
            "completed" => "✓".green(),
            "failed" => "✗".red(),
            "skipped" => "-".dimmed(),
            _ => "·".dimmed(),
        };
        println!("  {} {} [{}]", marker, step.title, step.status.as_str());
        if let Some(error) = &step.error {
            println!("      {}", error.red());
        }
    }

    let errors = engine.error_summary();
    if !errors.is_empty() {
        eprintln!("\n{}\n{}", "errors:".red().bold(), errors);
        std::process::exit(1);
    }

    Ok(())
}
