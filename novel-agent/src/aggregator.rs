//! Workflow aggregator: folds the agent message stream into a single
//! [`WorkflowState`] snapshot.

use novel_agent_sdk::{
    AgentMessage, AgentStatus, MessageContent, StageState, WorkflowState,
};

/// Pure reducer over incoming agent messages.
///
/// Keeps the live [`WorkflowState`] for the current run plus the full
/// message log in arrival order. State is memory-only and discarded on
/// [`reset`](WorkflowAggregator::reset).
#[derive(Debug, Default)]
pub struct WorkflowAggregator {
    state: Option<WorkflowState>,
    messages: Vec<AgentMessage>,
}

impl WorkflowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current run snapshot, if a run has started
    pub fn state(&self) -> Option<&WorkflowState> {
        self.state.as_ref()
    }

    /// All messages observed since the last reset, in arrival order
    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    /// Whether the current run is still processing
    pub fn is_processing(&self) -> bool {
        self.state
            .as_ref()
            .map(|s| s.status == AgentStatus::Processing)
            .unwrap_or(false)
    }

    /// Fold one message into the workflow state.
    ///
    /// A `Status(Processing)` message starts a fresh run; progress within a
    /// stage is clamped non-decreasing; `Result`/`Error` finalize the run and
    /// any message after a terminal one is logged but ignored by the state.
    pub fn apply(&mut self, message: &AgentMessage) {
        self.messages.push(message.clone());

        let stage = message.metadata.stage;
        match &message.content {
            MessageContent::Status { status, .. } => {
                if *status == AgentStatus::Processing {
                    let mut state = WorkflowState::new(
                        format!("workflow-{}", message.metadata.timestamp.timestamp_millis()),
                        stage,
                    );
                    state.stages.insert(
                        stage,
                        StageState {
                            status: AgentStatus::Processing,
                            progress: message.metadata.progress,
                            start_time: Some(message.metadata.timestamp),
                            end_time: None,
                            error: None,
                        },
                    );
                    self.state = Some(state);
                }
            }
            MessageContent::Progress { current, .. } => {
                if let Some(state) = self.state.as_mut() {
                    if state.is_finished() {
                        return;
                    }
                    let entry = state.stages.entry(stage).or_default();
                    // Monotonic within a stage: regressions are clamped
                    entry.progress = entry.progress.max(*current);
                    state.total_progress = entry.progress;
                }
            }
            MessageContent::Result { .. } => {
                if let Some(state) = self.state.as_mut() {
                    if state.is_finished() {
                        return;
                    }
                    let entry = state.stages.entry(stage).or_default();
                    entry.status = AgentStatus::Completed;
                    entry.progress = 100;
                    entry.end_time = Some(message.metadata.timestamp);
                    state.status = AgentStatus::Completed;
                    state.total_progress = 100;
                }
            }
            MessageContent::Error { error, .. } => {
                if let Some(state) = self.state.as_mut() {
                    if state.is_finished() {
                        return;
                    }
                    let entry = state.stages.entry(stage).or_default();
                    entry.status = AgentStatus::Error;
                    entry.error = Some(error.clone());
                    entry.end_time = Some(message.metadata.timestamp);
                    state.status = AgentStatus::Error;
                }
            }
        }
    }

    /// Discard the run state and message log
    pub fn reset(&mut self) {
        self.state = None;
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novel_agent_sdk::AgentStage;

    const AGENT: &str = "plot-analyzer";
    const STAGE: AgentStage = AgentStage::Plot;

    fn successful_sequence() -> Vec<AgentMessage> {
        let mut messages = vec![AgentMessage::status(
            AGENT,
            STAGE,
            AgentStatus::Processing,
            "starting",
        )];
        for percent in [20, 40, 60, 80, 100] {
            messages.push(AgentMessage::progress(AGENT, STAGE, percent, "working"));
        }
        messages.push(AgentMessage::result(
            AGENT,
            STAGE,
            serde_json::json!({"ok": true}),
            "done",
        ));
        messages
    }

    #[test]
    fn folds_successful_run_to_completed() {
        let mut aggregator = WorkflowAggregator::new();
        for message in successful_sequence() {
            aggregator.apply(&message);
        }

        let state = aggregator.state().unwrap();
        assert_eq!(state.status, AgentStatus::Completed);
        assert_eq!(state.total_progress, 100);
        assert_eq!(state.current_stage, STAGE);

        let stage = &state.stages[&STAGE];
        assert_eq!(stage.status, AgentStatus::Completed);
        assert_eq!(stage.progress, 100);
        assert!(stage.start_time.is_some());
        assert!(stage.end_time.is_some());
        assert!(stage.error.is_none());

        // Untouched stages stay idle
        let outline = &state.stages[&AgentStage::Outline];
        assert_eq!(outline.status, AgentStatus::Idle);

        assert!(!aggregator.is_processing());
        assert_eq!(aggregator.messages().len(), 7);
    }

    #[test]
    fn status_processing_starts_a_fresh_run() {
        let mut aggregator = WorkflowAggregator::new();
        for message in successful_sequence() {
            aggregator.apply(&message);
        }
        assert!(aggregator.state().unwrap().is_finished());

        // A new status message replaces the finished run
        aggregator.apply(&AgentMessage::status(
            AGENT,
            STAGE,
            AgentStatus::Processing,
            "starting again",
        ));
        let state = aggregator.state().unwrap();
        assert_eq!(state.status, AgentStatus::Processing);
        assert_eq!(state.total_progress, 0);
        assert_eq!(state.stages[&STAGE].progress, 0);
        assert!(state.stages[&STAGE].end_time.is_none());
    }

    #[test]
    fn progress_is_clamped_non_decreasing() {
        let mut aggregator = WorkflowAggregator::new();
        aggregator.apply(&AgentMessage::status(
            AGENT,
            STAGE,
            AgentStatus::Processing,
            "starting",
        ));
        aggregator.apply(&AgentMessage::progress(AGENT, STAGE, 60, "working"));
        aggregator.apply(&AgentMessage::progress(AGENT, STAGE, 40, "regression"));

        let state = aggregator.state().unwrap();
        assert_eq!(state.stages[&STAGE].progress, 60);
        assert_eq!(state.total_progress, 60);
    }

    #[test]
    fn error_finalizes_stage_and_halts_folding() {
        let mut aggregator = WorkflowAggregator::new();
        aggregator.apply(&AgentMessage::status(
            AGENT,
            STAGE,
            AgentStatus::Processing,
            "starting",
        ));
        aggregator.apply(&AgentMessage::progress(AGENT, STAGE, 20, "working"));
        aggregator.apply(&AgentMessage::error(AGENT, STAGE, "boom", "failed"));

        {
            let state = aggregator.state().unwrap();
            assert_eq!(state.status, AgentStatus::Error);
            let stage = &state.stages[&STAGE];
            assert_eq!(stage.status, AgentStatus::Error);
            assert_eq!(stage.error.as_deref(), Some("boom"));
            assert!(stage.end_time.is_some());
        }

        // Post-terminal messages are logged but do not mutate state
        aggregator.apply(&AgentMessage::progress(AGENT, STAGE, 80, "late"));
        let state = aggregator.state().unwrap();
        assert_eq!(state.status, AgentStatus::Error);
        assert_eq!(state.stages[&STAGE].progress, 20);
        assert_eq!(aggregator.messages().len(), 4);
    }

    #[test]
    fn progress_before_any_status_is_ignored() {
        let mut aggregator = WorkflowAggregator::new();
        aggregator.apply(&AgentMessage::progress(AGENT, STAGE, 20, "orphan"));
        assert!(aggregator.state().is_none());
        assert_eq!(aggregator.messages().len(), 1);
    }

    #[test]
    fn reset_clears_state_and_log() {
        let mut aggregator = WorkflowAggregator::new();
        for message in successful_sequence() {
            aggregator.apply(&message);
        }

        aggregator.reset();
        assert!(aggregator.state().is_none());
        assert!(aggregator.messages().is_empty());
        assert!(!aggregator.is_processing());
    }
}
