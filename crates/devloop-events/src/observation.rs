//! Observations - typed results of executed actions
//!
//! On the wire an observation is
//! `{"observation": <tag>, "content": "...", "extras": {...}}`. The seven
//! [`ObservationType`] categories carry results; three control tags
//! (`agent_state_changed`, `error`, `null`) carry lifecycle information.

use crate::error::EventError;
use devloop_schema::{AgentState, ObservationType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TRUNCATION_NOTICE: &str = "\n[... Observation truncated due to length ...]\n";

/// Tag-specific fields of an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "observation", content = "extras", rename_all = "snake_case")]
pub enum ObservationExtras {
    /// File content
    Read { path: String },
    /// Page content of a URL
    Browse {
        url: String,
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        error: bool,
    },
    /// Shell command output
    Run {
        command_id: i64,
        command: String,
        exit_code: i32,
    },
    /// Code cell output
    RunIpython { code: String },
    /// Memory search result
    Recall {
        #[serde(default)]
        query: String,
        #[serde(default)]
        memories: Vec<String>,
    },
    /// User message
    Chat {},
    /// Outputs of a delegated task
    Delegate {
        #[serde(default)]
        outputs: Map<String, Value>,
    },
    /// Lifecycle change
    AgentStateChanged { agent_state: AgentState },
    /// Failure report
    Error {},
    /// Nothing observed
    Null {},
}

/// Typed result of executing an action
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Main payload
    pub content: String,
    /// Tag and tag-specific fields
    pub extras: ObservationExtras,
}

impl Observation {
    /// Build from parts
    #[inline]
    #[must_use]
    pub fn new(content: impl Into<String>, extras: ObservationExtras) -> Self {
        Self {
            content: content.into(),
            extras,
        }
    }

    /// File content observation
    #[must_use]
    pub fn read(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(content, ObservationExtras::Read { path: path.into() })
    }

    /// Command output observation
    #[must_use]
    pub fn run(
        command_id: i64,
        command: impl Into<String>,
        exit_code: i32,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            content,
            ObservationExtras::Run {
                command_id,
                command: command.into(),
                exit_code,
            },
        )
    }

    /// User message observation
    #[must_use]
    pub fn chat(content: impl Into<String>) -> Self {
        Self::new(content, ObservationExtras::Chat {})
    }

    /// Lifecycle change observation
    #[must_use]
    pub fn agent_state_changed(agent_state: AgentState) -> Self {
        Self::new("", ObservationExtras::AgentStateChanged { agent_state })
    }

    /// Error observation
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::new(content, ObservationExtras::Error {})
    }

    /// Null observation
    #[must_use]
    pub fn null() -> Self {
        Self::new("", ObservationExtras::Null {})
    }

    /// Result category, `None` for control observations
    #[must_use]
    pub fn observation_type(&self) -> Option<ObservationType> {
        match &self.extras {
            ObservationExtras::Read { .. } => Some(ObservationType::Read),
            ObservationExtras::Browse { .. } => Some(ObservationType::Browse),
            ObservationExtras::Run { .. } => Some(ObservationType::Run),
            ObservationExtras::RunIpython { .. } => Some(ObservationType::RunIpython),
            ObservationExtras::Recall { .. } => Some(ObservationType::Recall),
            ObservationExtras::Chat {} => Some(ObservationType::Chat),
            ObservationExtras::Delegate { .. } => Some(ObservationType::Delegate),
            ObservationExtras::AgentStateChanged { .. }
            | ObservationExtras::Error {}
            | ObservationExtras::Null {} => None,
        }
    }

    /// Wire tag
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match &self.extras {
            ObservationExtras::AgentStateChanged { .. } => "agent_state_changed",
            ObservationExtras::Error {} => "error",
            ObservationExtras::Null {} => "null",
            _ => self
                .observation_type()
                .map_or("null", |kind| kind.as_str()),
        }
    }

    /// Main payload
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether this is the null observation
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.extras, ObservationExtras::Null {})
    }

    /// New lifecycle state, if this is a state change
    #[inline]
    #[must_use]
    pub fn agent_state(&self) -> Option<AgentState> {
        match self.extras {
            ObservationExtras::AgentStateChanged { agent_state } => Some(agent_state),
            _ => None,
        }
    }

    /// Human readable summary shown to clients
    #[must_use]
    pub fn message_text(&self) -> String {
        match &self.extras {
            ObservationExtras::Read { path } => format!("I read the file {path}."),
            ObservationExtras::Browse { url, .. } => format!("Visited {url}"),
            ObservationExtras::Run {
                command, exit_code, ..
            } => format!("Command `{command}` executed with exit code {exit_code}."),
            ObservationExtras::RunIpython { .. } => "Code executed in IPython cell.".to_string(),
            ObservationExtras::Recall { .. } => "Summarizing memories".to_string(),
            ObservationExtras::Delegate { .. } => "Delegated agent finished.".to_string(),
            ObservationExtras::AgentStateChanged { agent_state } => {
                format!("Agent state changed to {agent_state}")
            }
            ObservationExtras::Null {} => "No observation".to_string(),
            ObservationExtras::Chat {} | ObservationExtras::Error {} => self.content.clone(),
        }
    }

    /// Keep at most `max_chars` characters of content
    ///
    /// Longer content keeps its head and tail halves joined by a notice.
    /// Returns whether anything was cut.
    pub fn truncate_content(&mut self, max_chars: usize) -> bool {
        let total = self.content.chars().count();
        if total <= max_chars {
            return false;
        }
        let head_len = max_chars / 2;
        let tail_len = max_chars - head_len;
        let head: String = self.content.chars().take(head_len).collect();
        let tail: String = self.content.chars().skip(total - tail_len).collect();
        self.content = format!("{head}{TRUNCATION_NOTICE}{tail}");
        true
    }

    /// `{"observation", "content", "extras"}` snapshot
    ///
    /// # Errors
    /// Only fails if an extras value cannot be represented as JSON.
    pub fn to_memory(&self) -> Result<Value, EventError> {
        let mut value = serde_json::to_value(&self.extras)?;
        if let Value::Object(map) = &mut value {
            map.insert("content".to_string(), Value::String(self.content.clone()));
        }
        Ok(value)
    }

    /// Decode an observation dict
    ///
    /// `content` defaults to empty and `extras` to an empty object.
    ///
    /// # Errors
    /// - `EventError::MissingField` when `observation` is absent
    /// - `EventError::UnknownObservation` for an unrecognized tag
    /// - `EventError::InvalidArgs` when `extras` do not fit the tag
    pub fn from_dict(value: &Value) -> Result<Self, EventError> {
        let tag = value
            .get("observation")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("observation"))?;
        let known = tag.parse::<ObservationType>().is_ok()
            || matches!(tag, "agent_state_changed" | "error" | "null");
        if !known {
            return Err(EventError::UnknownObservation(tag.to_string()));
        }

        let content = value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let extras = match value.get("extras") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(extras) => extras.clone(),
        };

        let normalized = serde_json::json!({ "observation": tag, "extras": extras });
        let extras = serde_json::from_value(normalized).map_err(|source| {
            EventError::InvalidArgs {
                kind: tag.to_string(),
                source,
            }
        })?;
        Ok(Self { content, extras })
    }
}
