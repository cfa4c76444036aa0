//! Error types for event decoding and streaming

use devloop_schema::ActionType;

/// Event error type
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A required key is absent from an event dict
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The `action` key names no known action
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The `observation` key names no known observation
    #[error("unknown observation: {0}")]
    UnknownObservation(String),

    /// The action exists but never travels as an event
    #[error("{0} is a client command, not an event")]
    NotAnEvent(ActionType),

    /// Arguments do not match the action or observation shape
    #[error("invalid arguments for {kind}: {source}")]
    InvalidArgs {
        /// Action or observation tag
        kind: String,
        /// Underlying decode failure
        #[source]
        source: serde_json::Error,
    },

    /// Encoding failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stream no longer accepts events
    #[error("event stream closed")]
    StreamClosed,
}

impl EventError {
    /// Whether the error came from malformed client input
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::UnknownAction(_)
                | Self::UnknownObservation(_)
                | Self::NotAnEvent(_)
                | Self::InvalidArgs { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_error_display() {
        assert_eq!(
            EventError::MissingField("action").to_string(),
            "missing field: action"
        );
        assert_eq!(
            EventError::NotAnEvent(ActionType::Init).to_string(),
            "initialize is a client command, not an event"
        );
    }

    #[test]
    fn client_errors() {
        assert!(EventError::UnknownAction("fly".into()).is_client_error());
        assert!(!EventError::StreamClosed.is_client_error());
    }
}
