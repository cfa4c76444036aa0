//! Layered application configuration
//!
//! Precedence, lowest first: built-in defaults, a TOML file, environment
//! variables named after [`ConfigType`] keys. Per-session overrides sent by a
//! client are resolved with [`AppConfig::arg_or_default`].

use crate::error::ServerError;
use crate::llm::LlmConfig;
use devloop_schema::ConfigType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Placeholder printed instead of secret values
pub const REDACTED: &str = "********";

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language model name
    pub llm_model: String,
    /// Language model API key
    pub llm_api_key: Option<String>,
    /// Language model endpoint
    pub llm_base_url: Option<String>,
    /// Registered agent name
    pub agent: String,
    /// Step budget of one task
    pub max_iterations: u32,
    /// Character budget of a recorded observation
    pub max_chars: usize,
    /// Directory the agent operates on
    pub workspace_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_model: "gpt-3.5-turbo-1106".to_string(),
            llm_api_key: None,
            llm_base_url: None,
            agent: "EchoAgent".to_string(),
            max_iterations: 100,
            max_chars: 5_000_000,
            workspace_base: "./workspace".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults only
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With agent name
    #[inline]
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// With step budget
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Defaults, then `path` (or `config.toml` if present), then the environment
    ///
    /// # Errors
    /// - `ServerError::Io` if an explicitly given file cannot be read
    /// - `ServerError::Config` on malformed TOML or values
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_vars(std::env::vars())
    }

    /// Parse a TOML file on top of the defaults
    ///
    /// # Errors
    /// `ServerError::Io` or `ServerError::Config`.
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading configuration file");
        Self::from_toml_str(&raw)
    }

    /// Parse TOML on top of the defaults
    ///
    /// # Errors
    /// `ServerError::Config` on malformed TOML or mistyped values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ServerError> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Override values from `(name, value)` pairs named after config keys
    ///
    /// Unrelated names are skipped, so the whole process environment can be
    /// passed in.
    ///
    /// # Errors
    /// `ServerError::Config` when a numeric key has a non-numeric value.
    pub fn apply_vars<I>(mut self, vars: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Ok(key) = name.parse::<ConfigType>() {
                self.set(key, &value)?;
            }
        }
        Ok(self)
    }

    /// Set one value from its string form
    ///
    /// Empty strings clear optional values.
    ///
    /// # Errors
    /// `ServerError::Config` when a numeric key has a non-numeric value.
    pub fn set(&mut self, key: ConfigType, value: &str) -> Result<(), ServerError> {
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match key {
            ConfigType::LlmApiKey => self.llm_api_key = optional(),
            ConfigType::LlmBaseUrl => self.llm_base_url = optional(),
            ConfigType::LlmModel => self.llm_model = value.to_string(),
            ConfigType::Agent => self.agent = value.to_string(),
            ConfigType::MaxIterations => self.max_iterations = parse_number(key, value)?,
            ConfigType::MaxChars => self.max_chars = parse_number(key, value)?,
            ConfigType::WorkspaceBase => self.workspace_base = value.to_string(),
        }
        Ok(())
    }

    /// String form of one value
    #[must_use]
    pub fn get(&self, key: ConfigType) -> Option<String> {
        match key {
            ConfigType::LlmApiKey => self.llm_api_key.clone(),
            ConfigType::LlmBaseUrl => self.llm_base_url.clone(),
            ConfigType::LlmModel => Some(self.llm_model.clone()),
            ConfigType::Agent => Some(self.agent.clone()),
            ConfigType::MaxIterations => Some(self.max_iterations.to_string()),
            ConfigType::MaxChars => Some(self.max_chars.to_string()),
            ConfigType::WorkspaceBase => Some(self.workspace_base.clone()),
        }
    }

    /// Client-supplied argument for `key`, else the configured value
    ///
    /// Arguments are keyed by the upper-case config name. Empty strings and
    /// nulls count as absent.
    #[must_use]
    pub fn arg_or_default(&self, args: &Map<String, Value>, key: ConfigType) -> Option<String> {
        let supplied = match args.get(key.as_str()) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Null | Value::String(_)) | None => None,
            Some(other) => Some(other.to_string()),
        };
        supplied.or_else(|| self.get(key))
    }

    /// Language model settings
    #[must_use]
    pub fn llm(&self) -> LlmConfig {
        LlmConfig::new(self.llm_model.clone())
            .with_api_key(self.llm_api_key.clone())
            .with_base_url(self.llm_base_url.clone())
    }

    /// TOML rendering with secrets masked
    ///
    /// # Errors
    /// `ServerError::Config` if rendering fails.
    pub fn to_toml_redacted(&self) -> Result<String, ServerError> {
        let mut shown =
            toml::Value::try_from(self).map_err(|e| ServerError::Config(e.to_string()))?;
        if let Some(table) = shown.as_table_mut() {
            for key in ConfigType::ALL.iter().filter(|key| key.is_secret()) {
                if let Some(value) = table.get_mut(&key.file_key()) {
                    *value = toml::Value::String(REDACTED.to_string());
                }
            }
        }
        toml::to_string_pretty(&shown).map_err(|e| ServerError::Config(e.to_string()))
    }
}

/// Parse a numeric config value, naming the key on failure
pub(crate) fn parse_number<T: std::str::FromStr>(key: ConfigType, value: &str) -> Result<T, ServerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("invalid {key}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::new();
        assert_eq!(config.agent, "EchoAgent");
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.max_chars, 5_000_000);
        assert_eq!(config.get(ConfigType::LlmApiKey), None);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            agent = "PlannerAgent"
            max_iterations = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.agent, "PlannerAgent");
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.llm_model, "gpt-3.5-turbo-1106");
    }

    #[test]
    fn toml_type_errors_are_config_errors() {
        let err = AppConfig::from_toml_str("max_iterations = \"lots\"").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn vars_override_and_skip_unrelated() {
        let config = AppConfig::new()
            .apply_vars(vars(&[
                ("PATH", "/usr/bin"),
                ("LLM_MODEL", "local-model"),
                ("MAX_CHARS", "42"),
                ("LLM_API_KEY", "sk-test"),
            ]))
            .unwrap();
        assert_eq!(config.llm_model, "local-model");
        assert_eq!(config.max_chars, 42);
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_number_in_vars() {
        let err = AppConfig::new()
            .apply_vars(vars(&[("MAX_ITERATIONS", "ten")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_ITERATIONS"));
    }

    #[test]
    fn empty_var_clears_optional() {
        let mut config = AppConfig::new();
        config.set(ConfigType::LlmBaseUrl, "http://localhost:8080").unwrap();
        config.set(ConfigType::LlmBaseUrl, "").unwrap();
        assert_eq!(config.llm_base_url, None);
    }

    #[test]
    fn arg_or_default_prefers_non_empty_args() {
        let config = AppConfig::new();
        let args = json!({
            "AGENT": "PlannerAgent",
            "LLM_MODEL": "",
            "MAX_ITERATIONS": 5
        });
        let args = args.as_object().unwrap();
        assert_eq!(
            config.arg_or_default(args, ConfigType::Agent).as_deref(),
            Some("PlannerAgent")
        );
        assert_eq!(
            config.arg_or_default(args, ConfigType::LlmModel).as_deref(),
            Some("gpt-3.5-turbo-1106")
        );
        assert_eq!(
            config.arg_or_default(args, ConfigType::MaxIterations).as_deref(),
            Some("5")
        );
        assert_eq!(config.arg_or_default(args, ConfigType::LlmApiKey), None);
    }

    #[test]
    fn redacted_toml_hides_api_key() {
        let mut config = AppConfig::new();
        config.set(ConfigType::LlmApiKey, "sk-secret").unwrap();
        let rendered = config.to_toml_redacted().unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains(&format!("llm_api_key = \"{REDACTED}\"")));
    }

    #[test]
    fn redacted_toml_leaves_unset_secret_absent() {
        let rendered = AppConfig::new().to_toml_redacted().unwrap();
        assert!(!rendered.contains("llm_api_key"));
        assert!(!rendered.contains(REDACTED));
        assert!(rendered.contains("agent = \"EchoAgent\""));
    }

    #[test]
    fn llm_settings_follow_config() {
        let mut config = AppConfig::new();
        config.set(ConfigType::LlmBaseUrl, "http://localhost:4000").unwrap();
        let llm = config.llm();
        assert_eq!(llm.model, "gpt-3.5-turbo-1106");
        assert_eq!(llm.api_key, None);
        assert_eq!(llm.base_url.as_deref(), Some("http://localhost:4000"));
    }
}
