//! Configuration keys

string_enum! {
    /// Configuration key, also used verbatim as the environment variable name
    pub enum ConfigType: "config key" {
        /// API key handed to the language model client
        LlmApiKey => "LLM_API_KEY",
        /// Base URL of the language model endpoint
        LlmBaseUrl => "LLM_BASE_URL",
        /// Language model name
        LlmModel => "LLM_MODEL",
        /// Registered agent name
        Agent => "AGENT",
        /// Step budget of one task
        MaxIterations => "MAX_ITERATIONS",
        /// Character budget of a recorded observation
        MaxChars => "MAX_CHARS",
        /// Directory the agent operates on
        WorkspaceBase => "WORKSPACE_BASE",
    }
}

impl ConfigType {
    /// Key name inside a TOML config file
    #[must_use]
    pub fn file_key(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether the value must not be echoed back to logs or clients
    #[inline]
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::LlmApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_is_lower_case() {
        assert_eq!(ConfigType::MaxIterations.file_key(), "max_iterations");
        assert_eq!(ConfigType::LlmApiKey.file_key(), "llm_api_key");
    }

    #[test]
    fn only_api_key_is_secret() {
        let secrets: Vec<_> = ConfigType::ALL.iter().filter(|k| k.is_secret()).collect();
        assert_eq!(secrets, vec![&ConfigType::LlmApiKey]);
    }
}
