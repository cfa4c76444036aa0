//! Agent lifecycle states

string_enum! {
    /// Lifecycle state of an agent controller
    pub enum AgentState: "agent state" {
        /// The agent is being loaded
        Loading => "loading",
        /// The agent is initialized and waiting for a task
        Init => "init",
        /// The agent is running a task
        Running => "running",
        /// The agent is waiting for user input
        AwaitingUserInput => "awaiting_user_input",
        /// The agent is paused
        Paused => "paused",
        /// The agent was stopped by the user
        Stopped => "stopped",
        /// The agent finished its task
        Finished => "finished",
        /// An error occurred during the task
        Error => "error",
    }
}

impl AgentState {
    /// Whether no further step will happen without a new task
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Finished | Self::Error)
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Loading
    }
}
