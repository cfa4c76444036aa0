//! Actions - requests made by an agent or a user
//!
//! On the wire an action is `{"action": <type>, "args": {...}}`. The same
//! shape is used for memory snapshots handed to agents.

use crate::error::EventError;
use devloop_schema::{ActionType, AgentState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request for something to happen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum Action {
    /// Read a file
    Read { path: String },
    /// Write a file
    Write { path: String, content: String },
    /// Run a shell command
    Run {
        command: String,
        #[serde(default)]
        background: bool,
    },
    /// Run an interactive code cell
    RunIpython { code: String },
    /// Kill a background command
    Kill { command_id: i64 },
    /// Open a URL
    Browse { url: String },
    /// Search long-term memory
    Recall { query: String },
    /// Record a thought
    Think { thought: String },
    /// Send a message to the other party
    Message {
        content: String,
        #[serde(default)]
        wait_for_response: bool,
    },
    /// Hand a task to another agent
    Delegate {
        agent: String,
        #[serde(default)]
        inputs: Map<String, Value>,
    },
    /// The task is complete
    Finish {
        #[serde(default)]
        outputs: Map<String, Value>,
    },
    /// The task cannot be completed
    Reject {
        #[serde(default)]
        reason: String,
    },
    /// Add a subtask to the plan
    AddTask {
        parent: String,
        goal: String,
    },
    /// Change the state of a subtask
    ModifyTask { id: String, state: String },
    /// Request a lifecycle state change
    ChangeAgentState { agent_state: AgentState },
    /// Do nothing
    Null {},
}

impl Action {
    /// Message action
    #[must_use]
    pub fn message(content: impl Into<String>, wait_for_response: bool) -> Self {
        Self::Message {
            content: content.into(),
            wait_for_response,
        }
    }

    /// Shell command action
    #[must_use]
    pub fn run(command: impl Into<String>) -> Self {
        Self::Run {
            command: command.into(),
            background: false,
        }
    }

    /// Finish action without outputs
    #[must_use]
    pub fn finish() -> Self {
        Self::Finish {
            outputs: Map::new(),
        }
    }

    /// Null action
    #[must_use]
    pub fn null() -> Self {
        Self::Null {}
    }

    /// Vocabulary tag of this action
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Read { .. } => ActionType::Read,
            Self::Write { .. } => ActionType::Write,
            Self::Run { .. } => ActionType::Run,
            Self::RunIpython { .. } => ActionType::RunIpython,
            Self::Kill { .. } => ActionType::Kill,
            Self::Browse { .. } => ActionType::Browse,
            Self::Recall { .. } => ActionType::Recall,
            Self::Think { .. } => ActionType::Think,
            Self::Message { .. } => ActionType::Message,
            Self::Delegate { .. } => ActionType::Delegate,
            Self::Finish { .. } => ActionType::Finish,
            Self::Reject { .. } => ActionType::Reject,
            Self::AddTask { .. } => ActionType::AddTask,
            Self::ModifyTask { .. } => ActionType::ModifyTask,
            Self::ChangeAgentState { .. } => ActionType::ChangeAgentState,
            Self::Null {} => ActionType::Null,
        }
    }

    /// Whether this is the null action
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null {})
    }

    /// Human readable summary shown to clients
    #[must_use]
    pub fn message_text(&self) -> String {
        match self {
            Self::Read { path } => format!("Reading file: {path}"),
            Self::Write { path, .. } => format!("Writing file: {path}"),
            Self::Run { command, .. } => format!("Running command: {command}"),
            Self::RunIpython { code } => format!("Running Python code interactively: {code}"),
            Self::Kill { command_id } => format!("Killing command: {command_id}"),
            Self::Browse { url } => format!("Browsing URL: {url}"),
            Self::Recall { query } => format!("Let me dive into my memories to find what you're looking for! Searching for: '{query}'."),
            Self::Think { thought } => thought.clone(),
            Self::Message { content, .. } => content.clone(),
            Self::Delegate { agent, .. } => format!("I'm asking {agent} for help with this task."),
            Self::Finish { .. } => "All done! What's next on the agenda?".to_string(),
            Self::Reject { .. } => "Task is rejected by the agent.".to_string(),
            Self::AddTask { goal, .. } => format!("Added task: {goal}"),
            Self::ModifyTask { id, state } => format!("Set task {id} to {state}"),
            Self::ChangeAgentState { agent_state } => {
                format!("Agent state changed to {agent_state}")
            }
            Self::Null {} => "No action".to_string(),
        }
    }

    /// `{"action": <type>, "args": {...}}` snapshot
    ///
    /// # Errors
    /// Only fails if an argument value cannot be represented as JSON.
    pub fn to_memory(&self) -> Result<Value, EventError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode an action dict
    ///
    /// `args` may be omitted and defaults to an empty object.
    ///
    /// # Errors
    /// - `EventError::MissingField` when `action` is absent or not a string
    /// - `EventError::UnknownAction` for an unrecognized action name
    /// - `EventError::NotAnEvent` for `initialize`
    /// - `EventError::InvalidArgs` when `args` do not fit the action
    pub fn from_dict(value: &Value) -> Result<Self, EventError> {
        let name = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("action"))?;

        let action_type: ActionType = name
            .parse()
            .map_err(|_| EventError::UnknownAction(name.to_string()))?;
        if action_type == ActionType::Init {
            return Err(EventError::NotAnEvent(action_type));
        }

        let args = match value.get("args") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(args) => args.clone(),
        };

        let normalized = serde_json::json!({ "action": name, "args": args });
        serde_json::from_value(normalized).map_err(|source| EventError::InvalidArgs {
            kind: name.to_string(),
            source,
        })
    }
}
