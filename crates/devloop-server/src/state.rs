//! Per-task state handed to agents on every step

use devloop_events::{Action, Observation};

/// What an agent knows about the current task
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Steps taken so far
    pub iteration: u32,
    /// User messages, oldest first
    pub inputs: Vec<String>,
    /// Completed steps
    pub history: Vec<(Action, Observation)>,
    max_chars: usize,
}

impl State {
    /// Empty state truncating recorded observations to `max_chars`
    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self {
            iteration: 0,
            inputs: Vec::new(),
            history: Vec::new(),
            max_chars,
        }
    }

    /// Most recent user message
    #[inline]
    #[must_use]
    pub fn latest_input(&self) -> Option<&str> {
        self.inputs.last().map(String::as_str)
    }

    /// Record a user message
    pub fn add_input(&mut self, input: impl Into<String>) {
        self.inputs.push(input.into());
    }

    /// Record a completed step
    pub fn record(&mut self, action: Action, mut observation: Observation) {
        if observation.truncate_content(self.max_chars) {
            tracing::debug!(
                iteration = self.iteration,
                max_chars = self.max_chars,
                "observation truncated"
            );
        }
        self.history.push((action, observation));
    }

    /// Character budget of a recorded observation
    #[inline]
    #[must_use]
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Forget everything about the task
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.inputs.clear();
        self.history.clear();
    }
}
