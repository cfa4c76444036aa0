//! Turning actions into observations
//!
//! Executing file, shell, browser or memory actions needs a sandboxed
//! runtime. The controller only depends on this trait; [`NullExecutor`] is
//! used when no runtime is attached.

use async_trait::async_trait;
use devloop_events::{Action, Observation};

/// Executes actions that need a runtime
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run `action` and report what happened
    async fn execute(&self, action: &Action) -> Observation;
}

/// Executor without a runtime: every action yields a null observation
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExecutor;

#[async_trait]
impl ActionExecutor for NullExecutor {
    async fn execute(&self, action: &Action) -> Observation {
        tracing::debug!(action = %action.action_type(), "no runtime attached");
        Observation::null()
    }
}
