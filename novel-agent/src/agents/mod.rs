//! Mock workflow agents

use anyhow::Result;
use novel_agent_sdk::{async_trait, FullAgentMetadata, MessageSink};
use std::collections::HashMap;

pub mod plot_analyzer;

pub use plot_analyzer::{AnalyzerOptions, PlotAnalysis, PlotAnalysisResult, PlotAnalyzerAgent};

/// Runtime-facing seam for workflow agents.
///
/// An agent runs at most one analysis at a time, emits its message sequence
/// through the provided sink, and returns the result payload of the run.
#[async_trait]
pub trait RunnableAgent: Send + Sync {
    /// Agent metadata plus its input field schema
    fn metadata(&self) -> FullAgentMetadata;

    /// Atomically reserve the agent for a run. Returns false, without
    /// emitting, if a run is already in flight. A successful reservation is
    /// released when [`run`](RunnableAgent::run) returns.
    fn try_begin(&self) -> bool;

    /// Execute one reserved run from CLI-style string params.
    /// The caller must hold the reservation from
    /// [`try_begin`](RunnableAgent::try_begin); `run` releases it on exit.
    async fn run(
        &self,
        params: HashMap<String, String>,
        sink: MessageSink,
    ) -> Result<serde_json::Value>;

    /// Whether a run is currently in flight
    fn is_processing(&self) -> bool;

    /// Best-effort cancellation: prevents further emission, does not
    /// cancel an in-flight delay.
    fn stop(&self);
}
