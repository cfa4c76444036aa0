//! Error types for the schema vocabulary

/// Raised when a wire string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The value is not part of the vocabulary
    #[error("unknown {kind}: {value:?}")]
    Unknown {
        /// Vocabulary that was searched
        kind: &'static str,
        /// Offending value
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_display_names_kind_and_value() {
        let err = SchemaError::Unknown {
            kind: "observation type",
            value: "teleport".to_string(),
        };
        assert_eq!(err.to_string(), "unknown observation type: \"teleport\"");
    }
}
