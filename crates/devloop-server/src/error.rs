//! Error types for devloop sessions
//!
//! Provides error handling for:
//! - Configuration loading
//! - Agent lookup and stepping
//! - Client-requested state changes
//! - Session delivery

use devloop_events::EventError;
use devloop_schema::AgentState;

/// Main server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be read or a value is malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// No agent registered under the requested name
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Agent failed while stepping
    #[error("agent failed: {0}")]
    Agent(#[from] AgentError),

    /// No session registered for the id
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The client side of a session went away
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// Event stream or event decoding failure
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// Illegal state change
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// File system failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Whether the error only affects the current request
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::AgentNotFound(_) | Self::StateMachine(_) | Self::Agent(_) => {
                true
            }
            Self::Event(e) => e.is_client_error(),
            Self::SessionNotFound(_) | Self::SessionClosed(_) | Self::Io(_) => false,
        }
    }
}

/// Failures reported by an agent implementation
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    /// The language model call failed
    #[error("llm error: {0}")]
    Llm(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

/// State change errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// The requested change is neither valid nor ignorable from the current state
    #[error("cannot change agent state from {current} to {requested}")]
    Unrecognized {
        /// State the controller is in
        current: AgentState,
        /// State the client asked for
        requested: AgentState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::AgentNotFound("Ghost".to_string());
        assert_eq!(err.to_string(), "agent not found: Ghost");

        let err = ServerError::from(StateMachineError::Unrecognized {
            current: AgentState::Finished,
            requested: AgentState::Running,
        });
        assert!(err.to_string().contains("from finished to running"));
    }

    #[test]
    fn recoverability() {
        assert!(ServerError::Config("bad".into()).is_recoverable());
        assert!(ServerError::Event(EventError::UnknownAction("x".into())).is_recoverable());
        assert!(!ServerError::Event(EventError::StreamClosed).is_recoverable());
        assert!(!ServerError::SessionClosed("sid".into()).is_recoverable());
    }

    #[test]
    fn agent_error_converts() {
        let err: ServerError = AgentError::Llm("rate limited".into()).into();
        assert!(matches!(err, ServerError::Agent(AgentError::Llm(_))));
    }
}
