use anyhow::{anyhow, bail, Result};
use clap::Parser;
use novel_agent::agents::AnalyzerOptions;
use novel_agent::aggregator::WorkflowAggregator;
use novel_agent::runtime::InProcessRuntime;
use novel_agent_sdk::{
    log_error, log_info, log_progress, log_stage_complete_console, log_stage_start_console,
    log_warning, AgentRuntime, AgentStatus, MessageContent,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;

/// Simulated novel-generation workflow: runs the mock plot analyzer and
/// streams its progress to the console.
#[derive(Debug, Parser)]
#[command(name = "novel-agent")]
struct Cli {
    /// Working title of the novel
    #[arg(long)]
    title: Option<String>,

    /// Premise or background for the story
    #[arg(long)]
    description: Option<String>,

    /// Genre of the novel
    #[arg(long)]
    genre: Option<String>,

    /// Theme to weave through the story (repeatable)
    #[arg(long = "theme")]
    themes: Vec<String>,

    /// Override the simulated delay between steps, in milliseconds
    #[arg(long)]
    step_delay_ms: Option<u64>,

    /// Inject a simulated failure before step N (1-5)
    #[arg(long)]
    fail_at_step: Option<usize>,

    /// Print registered agents and their input schemas as JSON, then exit
    #[arg(long)]
    list_agents: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = InProcessRuntime::with_analyzer_options(AnalyzerOptions {
        step_delay: cli.step_delay_ms.map(Duration::from_millis),
        fail_at_step: cli.fail_at_step,
    });

    if cli.list_agents {
        let agents = runtime.list_agents().map_err(|e| anyhow!("{}", e))?;
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    let title = cli
        .title
        .ok_or_else(|| anyhow!("--title is required (or use --list-agents)"))?;

    let mut params = HashMap::new();
    params.insert("title".to_string(), title.clone());
    if let Some(description) = cli.description {
        params.insert("description".to_string(), description);
    }
    if let Some(genre) = cli.genre {
        params.insert("genre".to_string(), genre);
    }
    if !cli.themes.is_empty() {
        params.insert("themes".to_string(), cli.themes.join(","));
    }

    // The receiver is subscribed before the run starts, so the loop below
    // sees the opening status message
    let (_handle, mut rx) = runtime
        .execute_agent("plot-analyzer", params)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    log_stage_start_console!("plot", format!("Analyzing \"{}\"", title));

    let mut aggregator = WorkflowAggregator::new();
    loop {
        match rx.recv().await {
            Ok(message) => {
                match &message.content {
                    MessageContent::Status { message: text, .. } => log_info!("{}", text),
                    MessageContent::Progress {
                        current,
                        message: text,
                        ..
                    } => log_progress!(current, text),
                    MessageContent::Result { data, .. } => {
                        log_stage_complete_console!("plot");
                        if let Some(summary) = data.get("plot_summary").and_then(|v| v.as_str()) {
                            log_info!("{}", summary);
                        }
                    }
                    MessageContent::Error { error, .. } => log_error!("{}", error),
                }

                let terminal = message.content.is_terminal();
                aggregator.apply(&message);
                if terminal {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log_warning!("Lagged behind the message stream, skipped {}", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    let state = aggregator
        .state()
        .ok_or_else(|| anyhow!("run produced no workflow state"))?;

    println!();
    log_info!(
        "Workflow {}: {:?} ({}% total)",
        state.id,
        state.status,
        state.total_progress
    );
    for stage in novel_agent_sdk::AgentStage::all() {
        let stage_state = &state.stages[&stage];
        let duration = match (stage_state.start_time, stage_state.end_time) {
            (Some(start), Some(end)) => {
                format!(" in {}ms", (end - start).num_milliseconds())
            }
            _ => String::new(),
        };
        log_info!(
            "  {}: {:?} {}%{}",
            stage,
            stage_state.status,
            stage_state.progress,
            duration
        );
    }

    if state.status == AgentStatus::Error {
        bail!("plot analysis failed");
    }

    Ok(())
}
