//! devloop server - agent sessions behind a client connection
//!
//! One [`AgentUnit`] per connected client:
//! - Dispatches client requests (initialize, actions, state changes)
//! - Creates the [`AgentController`] that steps the configured agent
//! - Relays agent events back to the client through a [`SessionSender`]
//!
//! # Example
//!
//! ```rust,ignore
//! use devloop_server::{AgentRegistry, AgentUnit, AppConfig, SessionManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), devloop_server::ServerError> {
//! let sessions = Arc::new(SessionManager::new());
//! let mut outbox = sessions.add_session("sid-1");
//! let unit = AgentUnit::new(
//!     "sid-1",
//!     sessions.clone(),
//!     AgentRegistry::with_defaults(),
//!     Arc::new(AppConfig::load(None)?),
//! );
//!
//! unit.handle_client_message(serde_json::json!({"action": "initialize", "args": {}}))
//!     .await?;
//! let first = outbox.recv().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod llm;
pub mod logging;
pub mod session;
pub mod state;
pub mod state_machine;
pub mod unit;

pub use agent::{Agent, AgentFactory, AgentRegistry, EchoAgent};
pub use config::AppConfig;
pub use controller::AgentController;
pub use error::{AgentError, ServerError, StateMachineError};
pub use executor::{ActionExecutor, NullExecutor};
pub use llm::LlmConfig;
pub use session::{SessionManager, SessionSender};
pub use state::State;
pub use state_machine::TransitionOutcome;
pub use unit::AgentUnit;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with devloop sessions
    pub use crate::{
        Agent, AgentController, AgentRegistry, AgentUnit, AppConfig, LlmConfig, ServerError,
        SessionManager, SessionSender, State,
    };
    pub use devloop_events::{Action, EventSource, EventStream, Observation};
    pub use devloop_schema::{ActionType, AgentState, ConfigType, ObservationType};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
