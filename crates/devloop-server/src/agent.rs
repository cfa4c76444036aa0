//! Agents and the registry that constructs them by name

use crate::error::{AgentError, ServerError};
use crate::llm::LlmConfig;
use crate::state::State;
use async_trait::async_trait;
use devloop_events::Action;
use std::collections::HashMap;
use std::sync::Arc;

/// Decides the next action for a task
#[async_trait]
pub trait Agent: Send {
    /// Registered name
    fn name(&self) -> &str;

    /// Produce the next action given everything known about the task
    async fn step(&mut self, state: &State) -> Result<Action, AgentError>;

    /// Drop any per-task memory
    fn reset(&mut self) {}
}

/// Builds a fresh agent for a session
pub type AgentFactory = Arc<dyn Fn(LlmConfig) -> Box<dyn Agent> + Send + Sync>;

/// Agent constructors keyed by name
#[derive(Clone, Default)]
pub struct AgentRegistry {
    factories: HashMap<String, AgentFactory>,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

impl AgentRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in agents
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EchoAgent::NAME, |llm| -> Box<dyn Agent> {
            Box::new(EchoAgent::new(llm))
        });
        registry
    }

    /// Register (or replace) a constructor
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(LlmConfig) -> Box<dyn Agent> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Whether `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the agent registered under `name`
    ///
    /// # Errors
    /// `ServerError::AgentNotFound` for unknown names.
    pub fn create(&self, name: &str, llm: LlmConfig) -> Result<Box<dyn Agent>, ServerError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ServerError::AgentNotFound(name.to_string()))?;
        Ok(factory(llm))
    }
}

/// Repeats every user message back and waits for the next one
///
/// With no unanswered message it finishes the task.
#[derive(Debug)]
pub struct EchoAgent {
    llm: LlmConfig,
    answered: usize,
}

impl EchoAgent {
    /// Registry name
    pub const NAME: &'static str = "EchoAgent";

    #[must_use]
    pub fn new(llm: LlmConfig) -> Self {
        Self { llm, answered: 0 }
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn step(&mut self, state: &State) -> Result<Action, AgentError> {
        tracing::trace!(model = %self.llm.model, iteration = state.iteration, "echo step");
        if state.inputs.len() > self.answered {
            self.answered = state.inputs.len();
            let input = state.latest_input().unwrap_or_default();
            return Ok(Action::message(input, true));
        }
        Ok(Action::finish())
    }

    fn reset(&mut self) {
        self.answered = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_defaults() {
        let registry = AgentRegistry::with_defaults();
        assert!(registry.contains("EchoAgent"));
        assert_eq!(registry.names(), vec!["EchoAgent"]);
    }

    #[test]
    fn unknown_agent() {
        let registry = AgentRegistry::with_defaults();
        let err = registry
            .create("Ghost", LlmConfig::new("gpt-4"))
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::AgentNotFound(name) if name == "Ghost"));
    }

    #[tokio::test]
    async fn echo_agent_replies_once_per_input() {
        let registry = AgentRegistry::with_defaults();
        let mut agent = registry.create("EchoAgent", LlmConfig::new("gpt-4")).unwrap();
        let mut state = State::new(1000);
        state.add_input("ping");

        assert_eq!(agent.step(&state).await.unwrap(), Action::message("ping", true));
        assert_eq!(agent.step(&state).await.unwrap(), Action::finish());

        agent.reset();
        assert_eq!(agent.step(&state).await.unwrap(), Action::message("ping", true));
    }
}
