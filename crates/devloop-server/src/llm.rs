//! Language model settings handed to agents

use serde::{Deserialize, Serialize};

/// Connection settings for an agent's language model
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name
    pub model: String,
    /// API key
    pub api_key: Option<String>,
    /// Endpoint override
    pub base_url: Option<String>,
}

impl LlmConfig {
    /// Settings for `model` with no key and the default endpoint
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: None,
        }
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// With endpoint
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }
}

// Keys never reach logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "********"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_masks_key() {
        let llm = LlmConfig::new("gpt-4").with_api_key(Some("sk-live".into()));
        let shown = format!("{llm:?}");
        assert!(shown.contains("gpt-4"));
        assert!(!shown.contains("sk-live"));
    }
}
