//! Mock plot analyzer agent.
//!
//! Simulates the plot stage of the novel-generation workflow: a fixed
//! sequence of delayed steps emitting status, progress and a terminal
//! result (or error) through a [`MessageSink`].

use anyhow::{anyhow, bail, Result};
use novel_agent_sdk::{
    async_trait, AgentDefinition, AgentMessage, AgentStage, AgentStatus, Character,
    FullAgentMetadata, MessageSink, NovelStructure,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::RunnableAgent;
use crate::mock_data::{self, DEFAULT_GENRE};

/// Progress checkpoints between the opening status and the final result:
/// (percent, message, delay after emission in ms)
const STEPS: [(u8, &str, u64); 4] = [
    (20, "Analyzing themes and genre...", 800),
    (40, "Building character structure...", 1200),
    (60, "Organizing plot elements...", 900),
    (80, "Optimizing story structure...", 700),
];

/// Delay between the opening status message and the first progress step
const START_DELAY_MS: u64 = 1000;

/// Input for a plot analysis run
#[derive(Debug, Clone, Serialize, Deserialize, AgentDefinition)]
#[agent(
    id = "plot-analyzer",
    name = "Plot Analyzer",
    description = "Analyzes a premise into plot structure, characters and themes",
    stage = "plot"
)]
pub struct PlotAnalysis {
    #[field(label = "Title", description = "Working title of the novel")]
    pub title: String,
    #[field(label = "Description", description = "Premise or background for the story")]
    pub description: Option<String>,
    #[field(label = "Genre", description = "Genre of the novel")]
    pub genre: Option<String>,
    #[field(label = "Themes", description = "Themes to weave through the story")]
    pub themes: Vec<String>,
}

impl PlotAnalysis {
    /// Build an input from CLI-style string params.
    /// `themes` is a comma-separated list.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let title = params
            .get("title")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("required field 'title' missing"))?
            .trim()
            .to_string();

        let optional = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let themes = params
            .get("themes")
            .map(|v| {
                v.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            title,
            description: optional("description"),
            genre: optional("genre"),
            themes,
        })
    }
}

/// Result payload of a successful plot analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotAnalysisResult {
    pub plot_summary: String,
    pub characters: Vec<Character>,
    pub themes: Vec<String>,
    pub genre: String,
    pub target_word_count: u32,
    pub structure: NovelStructure,
}

/// Simulation knobs for the mock analyzer
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    /// Overrides every inter-step delay when set (tests use zero)
    pub step_delay: Option<Duration>,
    /// Injects a simulated failure before emitting step N (1-5,
    /// where 1-4 are the progress checkpoints and 5 the completion)
    pub fail_at_step: Option<usize>,
}

/// Mock agent for the plot stage.
///
/// Runs at most one analysis at a time; a second call while processing is
/// rejected without emitting. `stop()` is a best-effort flag checked before
/// each emission, it does not cancel an in-flight delay.
pub struct PlotAnalyzerAgent {
    agent_id: String,
    stage: AgentStage,
    is_processing: AtomicBool,
    stopped: AtomicBool,
    options: AnalyzerOptions,
}

impl Default for PlotAnalyzerAgent {
    fn default() -> Self {
        Self::with_options(AnalyzerOptions::default())
    }
}

impl PlotAnalyzerAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AnalyzerOptions) -> Self {
        let metadata = PlotAnalysis::metadata();
        Self {
            agent_id: metadata.id,
            stage: metadata.stage,
            is_processing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            options,
        }
    }

    /// Run one plot analysis, emitting the staged message sequence.
    /// Rejects if a run is already in flight.
    pub async fn analyze(
        &self,
        input: PlotAnalysis,
        sink: &MessageSink,
    ) -> Result<PlotAnalysisResult> {
        if !self.try_begin() {
            bail!("plot analyzer is already processing");
        }

        let result = self.run_steps(input, sink).await;
        self.is_processing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_steps(
        &self,
        input: PlotAnalysis,
        sink: &MessageSink,
    ) -> Result<PlotAnalysisResult> {
        sink.send(AgentMessage::status(
            &self.agent_id,
            self.stage,
            AgentStatus::Processing,
            "Starting plot analysis...",
        ));
        self.sleep(START_DELAY_MS).await;

        for (index, (percent, message, delay_ms)) in STEPS.iter().enumerate() {
            self.checkpoint(sink, index + 1)?;
            sink.send(AgentMessage::progress(
                &self.agent_id,
                self.stage,
                *percent,
                *message,
            ));
            self.sleep(*delay_ms).await;
        }

        self.checkpoint(sink, STEPS.len() + 1)?;

        let result = self.build_result(&input);
        sink.send(AgentMessage::progress(
            &self.agent_id,
            self.stage,
            100,
            "Plot analysis complete",
        ));
        sink.send(AgentMessage::result(
            &self.agent_id,
            self.stage,
            serde_json::to_value(&result)?,
            "Plot analysis complete",
        ));

        Ok(result)
    }

    /// Abort silently when stopped; emit a single error when a simulated
    /// failure is injected at this step.
    fn checkpoint(&self, sink: &MessageSink, step: usize) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            bail!("plot analysis stopped");
        }
        if self.options.fail_at_step == Some(step) {
            let error = format!("simulated failure at step {}", step);
            sink.send(AgentMessage::error(
                &self.agent_id,
                self.stage,
                error.clone(),
                "Plot analysis failed",
            ));
            bail!(error);
        }
        Ok(())
    }

    fn build_result(&self, input: &PlotAnalysis) -> PlotAnalysisResult {
        let mut structure = mock_data::mock_novel_structure();
        structure.id = Uuid::new_v4();
        structure.title = input.title.clone();
        if let Some(description) = &input.description {
            structure.description = description.clone();
        }
        if let Some(genre) = &input.genre {
            structure.genre = genre.clone();
        }
        if !input.themes.is_empty() {
            structure.themes = input.themes.clone();
        }
        structure.plot_summary = generate_plot_summary(input);
        structure.updated_at = chrono::Utc::now();

        PlotAnalysisResult {
            plot_summary: structure.plot_summary.clone(),
            characters: structure.characters.clone(),
            themes: structure.themes.clone(),
            genre: structure.genre.clone(),
            target_word_count: structure.target_word_count,
            structure,
        }
    }

    async fn sleep(&self, default_ms: u64) {
        let delay = self
            .options
            .step_delay
            .unwrap_or(Duration::from_millis(default_ms));
        tokio::time::sleep(delay).await;
    }
}

/// Templated summary derived from the run input
fn generate_plot_summary(input: &PlotAnalysis) -> String {
    let genre = input.genre.as_deref().unwrap_or(DEFAULT_GENRE);
    let base = format!("\"{}\" is a {} novel ", input.title, genre);

    match &input.description {
        Some(description) => format!("{}centered on {}.", base, description),
        None => format!(
            "{}about people growing as they confront the challenges of their time.",
            base
        ),
    }
}

#[async_trait]
impl RunnableAgent for PlotAnalyzerAgent {
    fn metadata(&self) -> FullAgentMetadata {
        FullAgentMetadata {
            metadata: PlotAnalysis::metadata(),
            fields: PlotAnalysis::fields(),
        }
    }

    fn try_begin(&self) -> bool {
        if self.is_processing.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.stopped.store(false, Ordering::SeqCst);
        true
    }

    async fn run(
        &self,
        params: HashMap<String, String>,
        sink: MessageSink,
    ) -> Result<serde_json::Value> {
        let outcome = async {
            let input = PlotAnalysis::from_params(&params)?;
            let result = self.run_steps(input, &sink).await?;
            Ok(serde_json::to_value(result)?)
        }
        .await;
        self.is_processing.store(false, Ordering::SeqCst);
        outcome
    }

    fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novel_agent_sdk::{FieldType, MessageContent};
    use std::sync::Arc;

    fn instant_agent() -> PlotAnalyzerAgent {
        PlotAnalyzerAgent::with_options(AnalyzerOptions {
            step_delay: Some(Duration::ZERO),
            fail_at_step: None,
        })
    }

    fn sample_input() -> PlotAnalysis {
        PlotAnalysis {
            title: "The Debug Chronicles".to_string(),
            description: None,
            genre: None,
            themes: vec!["innovation".to_string()],
        }
    }

    #[test]
    fn derive_exposes_metadata_and_field_schema() {
        let metadata = PlotAnalysis::metadata();
        assert_eq!(metadata.id, "plot-analyzer");
        assert_eq!(metadata.stage, AgentStage::Plot);

        let fields = PlotAnalysis::fields();
        let title = fields.iter().find(|f| f.name == "title").unwrap();
        assert!(title.required);
        assert_eq!(title.cli_arg, "--title");

        let description = fields.iter().find(|f| f.name == "description").unwrap();
        assert!(!description.required);

        let themes = fields.iter().find(|f| f.name == "themes").unwrap();
        assert!(!themes.required);
        assert!(matches!(themes.field_type, FieldType::List));
    }

    #[test]
    fn from_params_parses_themes_and_rejects_missing_title() {
        let mut params = HashMap::new();
        params.insert("title".to_string(), "Race Conditions".to_string());
        params.insert("themes".to_string(), "innovation, teamwork".to_string());

        let input = PlotAnalysis::from_params(&params).unwrap();
        assert_eq!(input.title, "Race Conditions");
        assert_eq!(input.themes, vec!["innovation", "teamwork"]);
        assert!(input.genre.is_none());

        assert!(PlotAnalysis::from_params(&HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn successful_run_emits_monotonic_progress_ending_at_100() {
        let agent = instant_agent();
        let sink = MessageSink::new(64);

        let result = agent.analyze(sample_input(), &sink).await.unwrap();
        assert_eq!(result.structure.title, "The Debug Chronicles");
        assert_eq!(result.themes, vec!["innovation"]);
        assert!(!agent.is_processing());

        let messages = sink.messages(None);
        assert!(matches!(
            messages[0].content,
            MessageContent::Status {
                status: AgentStatus::Processing,
                ..
            }
        ));

        let progress: Vec<u8> = messages
            .iter()
            .filter_map(|m| match &m.content {
                MessageContent::Progress { current, .. } => Some(*current),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![20, 40, 60, 80, 100]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        // Exactly one terminal message, and it is the last one
        let terminals = messages.iter().filter(|m| m.content.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert!(messages.last().unwrap().content.is_terminal());
        assert!(matches!(
            messages.last().unwrap().content,
            MessageContent::Result { .. }
        ));
    }

    #[tokio::test]
    async fn injected_failure_emits_single_error_and_rejects() {
        let agent = PlotAnalyzerAgent::with_options(AnalyzerOptions {
            step_delay: Some(Duration::ZERO),
            fail_at_step: Some(2),
        });
        let sink = MessageSink::new(64);

        let result = agent.analyze(sample_input(), &sink).await;
        assert!(result.is_err());
        assert!(!agent.is_processing());

        let messages = sink.messages(None);
        let terminals: Vec<_> = messages
            .iter()
            .filter(|m| m.content.is_terminal())
            .collect();
        assert_eq!(terminals.len(), 1);
        assert!(matches!(
            terminals[0].content,
            MessageContent::Error { .. }
        ));
        // Failure at step 2: only the 20% checkpoint was reached
        assert!(messages
            .iter()
            .all(|m| m.metadata.progress <= 20));
        assert!(messages.last().unwrap().content.is_terminal());
    }

    #[tokio::test]
    async fn analyze_rejects_while_processing_without_emitting() {
        let agent = Arc::new(PlotAnalyzerAgent::with_options(AnalyzerOptions {
            step_delay: Some(Duration::from_millis(50)),
            fail_at_step: None,
        }));
        let first_sink = MessageSink::new(64);

        let task_agent = agent.clone();
        let task_sink = first_sink.clone();
        let first = tokio::spawn(async move {
            task_agent.analyze(sample_input(), &task_sink).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(agent.is_processing());

        let second_sink = MessageSink::new(64);
        let rejected = agent.analyze(sample_input(), &second_sink).await;
        assert!(rejected.is_err());
        assert!(second_sink.messages(None).is_empty());

        assert!(first.await.unwrap().is_ok());
        assert!(!agent.is_processing());
    }

    #[tokio::test]
    async fn stop_prevents_further_emission() {
        let agent = Arc::new(PlotAnalyzerAgent::with_options(AnalyzerOptions {
            step_delay: Some(Duration::from_millis(50)),
            fail_at_step: None,
        }));
        let sink = MessageSink::new(64);

        let task_agent = agent.clone();
        let task_sink = sink.clone();
        let run = tokio::spawn(async move {
            task_agent.analyze(sample_input(), &task_sink).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        agent.stop();

        assert!(run.await.unwrap().is_err());
        assert!(!agent.is_processing());

        // Aborted without a terminal message
        let messages = sink.messages(None);
        assert!(messages.iter().all(|m| !m.content.is_terminal()));
    }
}
