//! In-process agent runtime.
//!
//! Registers agents, validates inputs against their field schemas and runs
//! them on tokio tasks. Each run gets its own [`MessageSink`]: messages are
//! broadcast to live subscribers and buffered for historical retrieval.

use anyhow::anyhow;
use novel_agent_sdk::{
    async_trait, AgentMessage, AgentResult, AgentRuntime, FullAgentMetadata, MessageSink,
    RunHandle, RunStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::agents::{AnalyzerOptions, PlotAnalyzerAgent, RunnableAgent};

/// Broadcast capacity per run; a full lap of the mock sequence is 7 messages
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Internal state for one agent run
struct RunState {
    status: RunStatus,
    sink: MessageSink,
    agent: Arc<dyn RunnableAgent>,
}

/// In-process runtime implementation: agents run as tokio tasks instead of
/// external processes, wired to subscribers through explicit channels.
pub struct InProcessRuntime {
    /// Registered agents (id -> agent)
    agents: Arc<Mutex<HashMap<String, Arc<dyn RunnableAgent>>>>,
    /// Active and finished runs (uuid -> state)
    runs: Arc<Mutex<HashMap<Uuid, RunState>>>,
}

impl InProcessRuntime {
    /// Create a runtime with the default mock agents registered
    pub fn new() -> Self {
        Self::with_analyzer_options(AnalyzerOptions::default())
    }

    /// Create a runtime whose plot analyzer uses the given simulation knobs
    pub fn with_analyzer_options(options: AnalyzerOptions) -> Self {
        let runtime = Self::empty();
        runtime.register(Arc::new(PlotAnalyzerAgent::with_options(options)));
        runtime
    }

    /// Create a runtime with no agents registered
    pub fn empty() -> Self {
        Self {
            agents: Arc::new(Mutex::new(HashMap::new())),
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register an agent under its metadata id
    pub fn register(&self, agent: Arc<dyn RunnableAgent>) {
        let id = agent.metadata().metadata.id;
        self.agents.lock().unwrap().insert(id, agent);
    }

    /// Drop bookkeeping for runs that have finished, freeing memory
    pub fn cleanup_finished_runs(&self) {
        let mut runs = self.runs.lock().unwrap();
        runs.retain(|_, state| state.status == RunStatus::Running);
    }

    fn get_agent(&self, id: &str) -> AgentResult<Arc<dyn RunnableAgent>> {
        let agents = self.agents.lock().unwrap();
        agents
            .get(id)
            .cloned()
            .ok_or_else(|| format!("Agent '{}' not found", id).into())
    }
}

impl Default for InProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRuntime for InProcessRuntime {
    fn list_agents(&self) -> AgentResult<Vec<FullAgentMetadata>> {
        let agents = self.agents.lock().unwrap();
        Ok(agents.values().map(|a| a.metadata()).collect())
    }

    fn get_agent_metadata(&self, id: &str) -> AgentResult<FullAgentMetadata> {
        Ok(self.get_agent(id)?.metadata())
    }

    fn validate_inputs(&self, id: &str, params: &HashMap<String, String>) -> AgentResult<()> {
        let agent = self.get_agent(id)?;

        // Check required fields
        for field in agent.metadata().fields {
            let missing = params
                .get(&field.name)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true);
            if field.required && missing {
                return Err(format!("Required field '{}' missing", field.name).into());
            }
        }

        Ok(())
    }

    async fn execute_agent(
        &self,
        id: &str,
        params: HashMap<String, String>,
    ) -> AgentResult<(RunHandle, broadcast::Receiver<AgentMessage>)> {
        // Validate inputs
        self.validate_inputs(id, &params)?;

        // Reserve the agent before spawning so a second call rejects
        // synchronously; the run task releases the reservation
        let agent = self.get_agent(id)?;
        if !agent.try_begin() {
            return Err(anyhow!("Agent '{}' is already processing", id).into());
        }

        let sink = MessageSink::new(MESSAGE_CHANNEL_CAPACITY);
        // Subscribe before the run starts so no messages are missed
        let rx = sink.subscribe();
        let run_id = Uuid::new_v4();

        let state = RunState {
            status: RunStatus::Running,
            sink: sink.clone(),
            agent: agent.clone(),
        };
        self.runs.lock().unwrap().insert(run_id, state);

        // Run the agent on its own task and record the outcome
        let runs = self.runs.clone();
        tokio::spawn(async move {
            let outcome = agent.run(params, sink).await;
            let mut runs = runs.lock().unwrap();
            if let Some(state) = runs.get_mut(&run_id) {
                // A cancelled run was already marked failed
                if state.status == RunStatus::Running {
                    state.status = match outcome {
                        Ok(_) => RunStatus::Completed,
                        Err(_) => RunStatus::Failed,
                    };
                }
            }
        });

        Ok((RunHandle::new(run_id, id.to_string()), rx))
    }

    async fn subscribe_messages(
        &self,
        handle_id: &Uuid,
    ) -> AgentResult<broadcast::Receiver<AgentMessage>> {
        let runs = self.runs.lock().unwrap();
        let state = runs
            .get(handle_id)
            .ok_or_else(|| anyhow!("Run not found: {}", handle_id))?;
        Ok(state.sink.subscribe())
    }

    async fn get_messages(
        &self,
        handle_id: &Uuid,
        limit: Option<usize>,
    ) -> AgentResult<Vec<AgentMessage>> {
        let runs = self.runs.lock().unwrap();
        let state = runs
            .get(handle_id)
            .ok_or_else(|| anyhow!("Run not found: {}", handle_id))?;
        Ok(state.sink.messages(limit))
    }

    async fn get_status(&self, handle_id: &Uuid) -> AgentResult<RunStatus> {
        let runs = self.runs.lock().unwrap();
        let state = runs
            .get(handle_id)
            .ok_or_else(|| anyhow!("Run not found: {}", handle_id))?;
        Ok(state.status.clone())
    }

    async fn cancel_run(&self, handle_id: &Uuid) -> AgentResult<()> {
        let mut runs = self.runs.lock().unwrap();
        let state = runs
            .get_mut(handle_id)
            .ok_or_else(|| anyhow!("Run not found: {}", handle_id))?;

        if state.status == RunStatus::Running {
            state.agent.stop();
            state.status = RunStatus::Failed;
        }

        Ok(())
    }
}
