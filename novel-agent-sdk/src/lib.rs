// Re-export the derive macro
pub use novel_agent_macros::AgentDefinition;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// One phase of the novel-generation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStage {
    Plot,
    Outline,
    Writing,
    Validation,
    Diagram,
}

impl AgentStage {
    /// All stages in workflow order
    pub fn all() -> [AgentStage; 5] {
        [
            AgentStage::Plot,
            AgentStage::Outline,
            AgentStage::Writing,
            AgentStage::Validation,
            AgentStage::Diagram,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStage::Plot => "plot",
            AgentStage::Outline => "outline",
            AgentStage::Writing => "writing",
            AgentStage::Validation => "validation",
            AgentStage::Diagram => "diagram",
        }
    }
}

impl std::fmt::Display for AgentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an agent or workflow stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Processing,
    Completed,
    Error,
    Waiting,
}

/// Agent metadata (id, name, description, stage)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub stage: AgentStage,
}

/// Complete agent metadata with input fields (for JSON export)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullAgentMetadata {
    #[serde(flatten)]
    pub metadata: AgentMetadata,
    pub fields: Vec<FieldSchema>,
}

/// Input field schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub label: String,
    pub description: String,
    pub cli_arg: String,
    pub required: bool,
    pub default: Option<String>,
}

/// Field type enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Comma-separated list of values
    List,
    Select {
        options: Vec<String>,
    },
}

/// Trait that agent input structs must implement (auto-implemented by derive macro)
pub trait AgentDefinition {
    fn metadata() -> AgentMetadata;
    fn fields() -> Vec<FieldSchema>;
    fn print_metadata(&self);
}

/// Message payload, variant by message type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Agent status transition
    Status { status: AgentStatus, message: String },
    /// Progress update within a stage
    Progress {
        current: u8,
        total: u8,
        message: String,
    },
    /// Terminal result of a successful run
    Result {
        data: serde_json::Value,
        message: String,
    },
    /// Terminal error of a failed run
    Error { error: String, message: String },
}

impl MessageContent {
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageContent::Status { .. } => "status",
            MessageContent::Progress { .. } => "progress",
            MessageContent::Result { .. } => "result",
            MessageContent::Error { .. } => "error",
        }
    }

    /// Result and Error terminate a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageContent::Result { .. } | MessageContent::Error { .. }
        )
    }
}

/// Per-message metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub stage: AgentStage,
    /// Overall stage progress at emission time, 0-100
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
}

/// Discrete message emitted by an agent during a run.
/// Immutable once emitted; ordering is emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub agent_id: String,
    pub content: MessageContent,
    pub metadata: MessageMetadata,
}

impl AgentMessage {
    fn new(agent_id: &str, stage: AgentStage, progress: u8, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            content,
            metadata: MessageMetadata {
                stage,
                progress,
                timestamp: Utc::now(),
            },
        }
    }

    pub fn status(
        agent_id: &str,
        stage: AgentStage,
        status: AgentStatus,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            agent_id,
            stage,
            0,
            MessageContent::Status {
                status,
                message: message.into(),
            },
        )
    }

    pub fn progress(
        agent_id: &str,
        stage: AgentStage,
        current: u8,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            agent_id,
            stage,
            current,
            MessageContent::Progress {
                current,
                total: 100,
                message: message.into(),
            },
        )
    }

    pub fn result(
        agent_id: &str,
        stage: AgentStage,
        data: serde_json::Value,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            agent_id,
            stage,
            100,
            MessageContent::Result {
                data,
                message: message.into(),
            },
        )
    }

    pub fn error(
        agent_id: &str,
        stage: AgentStage,
        error: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            agent_id,
            stage,
            0,
            MessageContent::Error {
                error: error.into(),
                message: message.into(),
            },
        )
    }
}

/// State of a single workflow stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageState {
    pub status: AgentStatus,
    pub progress: u8,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for StageState {
    fn default() -> Self {
        Self {
            status: AgentStatus::Idle,
            progress: 0,
            start_time: None,
            end_time: None,
            error: None,
        }
    }
}

/// Snapshot of a workflow run, assembled from the agent message stream.
/// One live instance per run; discarded on reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    pub status: AgentStatus,
    pub current_stage: AgentStage,
    pub stages: HashMap<AgentStage, StageState>,
    pub total_progress: u8,
}

impl WorkflowState {
    /// Fresh run state with all stages idle
    pub fn new(id: impl Into<String>, current_stage: AgentStage) -> Self {
        let stages = AgentStage::all()
            .into_iter()
            .map(|stage| (stage, StageState::default()))
            .collect();

        Self {
            id: id.into(),
            status: AgentStatus::Processing,
            current_stage,
            stages,
            total_progress: 0,
        }
    }

    /// Whether the run has reached a terminal status
    pub fn is_finished(&self) -> bool {
        matches!(self.status, AgentStatus::Completed | AgentStatus::Error)
    }
}

/// Explicit message channel between an agent and its subscribers.
///
/// Replaces ad-hoc global event dispatch: every emitted message is broadcast
/// to live subscribers and appended to a persistent buffer for historical
/// retrieval.
#[derive(Debug, Clone)]
pub struct MessageSink {
    tx: broadcast::Sender<AgentMessage>,
    buffer: Arc<Mutex<Vec<AgentMessage>>>,
}

impl MessageSink {
    /// Create a sink with the given broadcast capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Emit a message to subscribers and the buffer.
    /// A send with no live subscribers is not an error.
    pub fn send(&self, message: AgentMessage) {
        self.buffer.lock().unwrap().push(message.clone());
        let _ = self.tx.send(message);
    }

    /// Subscribe to messages emitted after this point
    pub fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.tx.subscribe()
    }

    /// Retrieve buffered messages, most recent `limit` if given
    pub fn messages(&self, limit: Option<usize>) -> Vec<AgentMessage> {
        let buffer = self.buffer.lock().unwrap();
        if let Some(limit) = limit {
            buffer.iter().rev().take(limit).rev().cloned().collect()
        } else {
            buffer.clone()
        }
    }
}

/// Run status for runtime tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Handle for tracking an async agent run
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub id: Uuid,
    pub agent_id: String,
}

impl RunHandle {
    pub fn new(id: Uuid, agent_id: String) -> Self {
        Self { id, agent_id }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Runtime trait for agent discovery and execution
/// This provides a unified API for CLI and embedding consumers
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// List all registered agents with metadata
    fn list_agents(&self) -> AgentResult<Vec<FullAgentMetadata>>;

    /// Get detailed metadata for a specific agent
    fn get_agent_metadata(&self, id: &str) -> AgentResult<FullAgentMetadata>;

    /// Validate inputs against the agent's field schema before execution
    fn validate_inputs(&self, id: &str, params: &HashMap<String, String>) -> AgentResult<()>;

    /// Execute an agent asynchronously.
    ///
    /// The returned receiver is subscribed before the run starts, so it sees
    /// the full message sequence from the initial status message on.
    async fn execute_agent(
        &self,
        id: &str,
        params: HashMap<String, String>,
    ) -> AgentResult<(RunHandle, broadcast::Receiver<AgentMessage>)>;

    /// Subscribe to messages from a running agent.
    ///
    /// Late subscribers only see messages emitted after this point; use
    /// [`get_messages`](AgentRuntime::get_messages) for history.
    async fn subscribe_messages(
        &self,
        handle_id: &Uuid,
    ) -> AgentResult<broadcast::Receiver<AgentMessage>>;

    /// Get buffered messages for a run
    async fn get_messages(
        &self,
        handle_id: &Uuid,
        limit: Option<usize>,
    ) -> AgentResult<Vec<AgentMessage>>;

    /// Get current status of a run
    async fn get_status(&self, handle_id: &Uuid) -> AgentResult<RunStatus>;

    /// Cancel a running agent (best effort, no further emission)
    async fn cancel_run(&self, handle_id: &Uuid) -> AgentResult<()>;
}

// ============================================================================
// Novel Structure Types
// ============================================================================

/// Character role within the story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Protagonist,
    Antagonist,
    Supporting,
    Minor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub role: CharacterRole,
    pub description: String,
    pub traits: Vec<String>,
    pub relationships: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStructure {
    pub id: String,
    pub number: u32,
    pub title: String,
    pub content: String,
    pub word_count: u32,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterStructure {
    pub id: String,
    pub number: u32,
    pub title: String,
    pub summary: String,
    pub word_count: u32,
    pub sections: Vec<SectionStructure>,
    pub themes: Vec<String>,
    pub characters: Vec<String>,
}

/// Full novel structure produced by the plot analysis stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelStructure {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub themes: Vec<String>,
    pub target_word_count: u32,
    pub current_word_count: u32,
    pub characters: Vec<Character>,
    pub chapters: Vec<ChapterStructure>,
    pub plot_summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored console output for human-readable logs, complementing the
// structured AgentMessage stream consumed programmatically.
// ============================================================================

/// Logs the start of a workflow stage with a header and description.
///
/// # Example
/// ```
/// use novel_agent_sdk::log_stage_start_console;
/// log_stage_start_console!("plot", "Analyzing plot structure");
/// ```
///
/// Outputs:
/// ```text
/// ═══ STAGE plot ═══
/// Analyzing plot structure
/// ```
#[macro_export]
macro_rules! log_stage_start_console {
    ($stage:expr, $description:expr) => {
        println!("\x1b[1;36m═══ STAGE {} ═══\x1b[0m", $stage);
        println!("\x1b[36m{}\x1b[0m", $description);
    };
}

/// Logs the completion of a workflow stage.
///
/// # Example
/// ```
/// use novel_agent_sdk::log_stage_complete_console;
/// log_stage_complete_console!("plot");
/// ```
///
/// Outputs:
/// ```text
/// ✓ Stage plot complete
/// ```
#[macro_export]
macro_rules! log_stage_complete_console {
    ($stage:expr) => {
        println!("\x1b[32m✓ Stage {} complete\x1b[0m", $stage);
    };
}

/// Logs progress of an operation.
///
/// # Example
/// ```
/// use novel_agent_sdk::log_progress;
/// log_progress!(60, "Organizing plot elements");
/// ```
///
/// Outputs:
/// ```text
/// Progress: 60% — Organizing plot elements
/// ```
#[macro_export]
macro_rules! log_progress {
    ($current:expr, $message:expr) => {
        println!("\x1b[36mProgress: {}% — {}\x1b[0m", $current, $message);
    };
}

/// Logs an informational message.
///
/// # Example
/// ```
/// use novel_agent_sdk::log_info;
/// log_info!("Starting plot analysis...");
/// ```
///
/// Outputs:
/// ```text
/// ℹ Starting plot analysis...
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use novel_agent_sdk::log_warning;
/// log_warning!("Run cancelled before completion");
/// ```
///
/// Outputs:
/// ```text
/// ⚠ Warning: Run cancelled before completion
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs an error message.
///
/// # Example
/// ```
/// use novel_agent_sdk::log_error;
/// log_error!("Plot analysis failed");
/// ```
///
/// Outputs:
/// ```text
/// ✗ Plot analysis failed
/// ```
#[macro_export]
macro_rules! log_error {
    ($message:expr) => {
        println!("\x1b[31m✗ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[31m✗ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a debug message (intended to be used conditionally).
///
/// # Example
/// ```
/// use novel_agent_sdk::log_debug;
/// log_debug!("Emitting progress message");
/// let pct = 40;
/// log_debug!("Progress at {}%", pct);
/// ```
///
/// Outputs:
/// ```text
/// [DEBUG] Emitting progress message
/// [DEBUG] Progress at 40%
/// ```
#[macro_export]
macro_rules! log_debug {
    ($message:expr) => {
        println!("\x1b[2m[DEBUG] {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[2m[DEBUG] {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_workflow_state_has_all_stages_idle() {
        let state = WorkflowState::new("workflow-1", AgentStage::Plot);
        assert_eq!(state.stages.len(), 5);
        for stage in AgentStage::all() {
            let stage_state = &state.stages[&stage];
            assert_eq!(stage_state.status, AgentStatus::Idle);
            assert_eq!(stage_state.progress, 0);
            assert!(stage_state.start_time.is_none());
        }
        assert!(!state.is_finished());
    }

    #[test]
    fn message_constructors_set_metadata_progress() {
        let msg = AgentMessage::progress("plot-analyzer", AgentStage::Plot, 40, "working");
        assert_eq!(msg.metadata.progress, 40);
        assert_eq!(msg.metadata.stage, AgentStage::Plot);
        assert!(!msg.content.is_terminal());

        let msg = AgentMessage::result(
            "plot-analyzer",
            AgentStage::Plot,
            serde_json::json!({"ok": true}),
            "done",
        );
        assert_eq!(msg.metadata.progress, 100);
        assert!(msg.content.is_terminal());
    }

    #[test]
    fn message_content_serializes_with_type_tag() {
        let msg = AgentMessage::error("plot-analyzer", AgentStage::Plot, "boom", "failed");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"]["type"], "error");
        assert_eq!(json["content"]["error"], "boom");
        assert_eq!(json["metadata"]["stage"], "plot");

        let back: AgentMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.content.type_name(), "error");
    }

    #[test]
    fn sink_buffers_messages_without_subscribers() {
        let sink = MessageSink::new(16);
        sink.send(AgentMessage::status(
            "plot-analyzer",
            AgentStage::Plot,
            AgentStatus::Processing,
            "starting",
        ));
        sink.send(AgentMessage::progress(
            "plot-analyzer",
            AgentStage::Plot,
            20,
            "working",
        ));

        assert_eq!(sink.messages(None).len(), 2);
        assert_eq!(sink.messages(Some(1)).len(), 1);
        assert_eq!(sink.messages(Some(1))[0].metadata.progress, 20);
    }
}
