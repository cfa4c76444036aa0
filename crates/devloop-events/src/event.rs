//! Event envelope

use crate::action::Action;
use crate::error::EventError;
use crate::observation::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position of an event in its stream (starts at 0, strictly increasing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// Raw value
    #[inline]
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// The agent or its controller
    Agent,
    /// The connected client
    User,
}

impl EventSource {
    /// Wire value
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an event carries
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// A request
    Action(Action),
    /// A result
    Observation(Observation),
}

impl From<Action> for EventPayload {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl From<Observation> for EventPayload {
    fn from(observation: Observation) -> Self {
        Self::Observation(observation)
    }
}

impl EventPayload {
    /// Memory snapshot of the payload
    ///
    /// # Errors
    /// Propagates JSON encoding failures.
    pub fn to_memory(&self) -> Result<Value, EventError> {
        match self {
            Self::Action(action) => action.to_memory(),
            Self::Observation(observation) => observation.to_memory(),
        }
    }

    /// Human readable summary
    #[must_use]
    pub fn message_text(&self) -> String {
        match self {
            Self::Action(action) => action.message_text(),
            Self::Observation(observation) => observation.message_text(),
        }
    }

    /// Decode either an action or an observation dict
    ///
    /// # Errors
    /// `EventError::MissingField("action")` when neither tag is present,
    /// otherwise whatever the specific decoder reports.
    pub fn from_dict(value: &Value) -> Result<Self, EventError> {
        if value.get("observation").is_some() {
            Observation::from_dict(value).map(Self::Observation)
        } else {
            Action::from_dict(value).map(Self::Action)
        }
    }
}

/// One entry of an event stream
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Position in the stream
    pub id: EventId,
    /// When the stream accepted the event
    pub timestamp: DateTime<Utc>,
    /// Producer
    pub source: EventSource,
    /// Event this one responds to
    pub cause: Option<EventId>,
    /// Action or observation
    pub payload: EventPayload,
}

impl Event {
    /// The action, if this event carries one
    #[inline]
    #[must_use]
    pub fn as_action(&self) -> Option<&Action> {
        match &self.payload {
            EventPayload::Action(action) => Some(action),
            EventPayload::Observation(_) => None,
        }
    }

    /// The observation, if this event carries one
    #[inline]
    #[must_use]
    pub fn as_observation(&self) -> Option<&Observation> {
        match &self.payload {
            EventPayload::Observation(observation) => Some(observation),
            EventPayload::Action(_) => None,
        }
    }

    /// Null actions and null observations are never relayed
    #[must_use]
    pub fn is_null(&self) -> bool {
        match &self.payload {
            EventPayload::Action(action) => action.is_null(),
            EventPayload::Observation(observation) => observation.is_null(),
        }
    }

    /// Human readable summary
    #[must_use]
    pub fn message(&self) -> String {
        self.payload.message_text()
    }

    /// Flat dict sent to clients
    ///
    /// Envelope keys (`id`, `timestamp`, `source`, `message`, optional
    /// `cause`) merged with the payload's memory snapshot.
    ///
    /// # Errors
    /// Propagates JSON encoding failures.
    pub fn to_dict(&self) -> Result<Value, EventError> {
        let mut dict = self.payload.to_memory()?;
        if let Value::Object(map) = &mut dict {
            map.insert("id".to_string(), Value::from(self.id.0));
            map.insert(
                "timestamp".to_string(),
                Value::String(self.timestamp.to_rfc3339()),
            );
            map.insert(
                "source".to_string(),
                Value::String(self.source.as_str().to_string()),
            );
            map.insert("message".to_string(), Value::String(self.message()));
            if let Some(cause) = self.cause {
                map.insert("cause".to_string(), Value::from(cause.0));
            }
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devloop_schema::AgentState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(payload: impl Into<EventPayload>, cause: Option<EventId>) -> Event {
        Event {
            id: EventId(3),
            timestamp: DateTime::parse_from_rfc3339("2024-04-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            source: EventSource::Agent,
            cause,
            payload: payload.into(),
        }
    }

    #[test]
    fn action_dict() {
        let dict = event(Action::run("ls"), None).to_dict().unwrap();
        assert_eq!(
            dict,
            json!({
                "id": 3,
                "timestamp": "2024-04-01T12:00:00+00:00",
                "source": "agent",
                "message": "Running command: ls",
                "action": "run",
                "args": {"command": "ls", "background": false}
            })
        );
    }

    #[test]
    fn observation_dict_carries_cause() {
        let dict = event(Observation::run(1, "ls", 0, "out"), Some(EventId(2)))
            .to_dict()
            .unwrap();
        assert_eq!(dict["observation"], "run");
        assert_eq!(dict["content"], "out");
        assert_eq!(dict["cause"], 2);
        assert_eq!(dict["message"], "Command `ls` executed with exit code 0.");
    }

    #[test]
    fn null_detection() {
        assert!(event(Action::null(), None).is_null());
        assert!(event(Observation::null(), None).is_null());
        assert!(!event(Observation::agent_state_changed(AgentState::Init), None).is_null());
    }

    #[test]
    fn payload_from_dict_picks_decoder() {
        let obs = EventPayload::from_dict(&json!({"observation": "error", "content": "bad"})).unwrap();
        assert_eq!(obs, EventPayload::Observation(Observation::error("bad")));

        let act = EventPayload::from_dict(&json!({"action": "think", "args": {"thought": "hm"}})).unwrap();
        assert_eq!(act, EventPayload::Action(Action::Think { thought: "hm".into() }));
    }

    #[test]
    fn source_wire_values() {
        assert_eq!(serde_json::to_value(EventSource::User).unwrap(), json!("user"));
        assert_eq!(EventSource::Agent.to_string(), "agent");
    }
}
