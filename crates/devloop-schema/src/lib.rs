//! devloop schema - the shared string vocabulary
//!
//! Every kind of thing that crosses a process or client boundary in devloop
//! is identified by a short, stable string tag:
//! - [`ObservationType`] - what kind of result an action produced
//! - [`ActionType`] - what an agent or user asked to happen
//! - [`AgentState`] - lifecycle state of an agent controller
//! - [`ConfigType`] - configuration keys (also environment variable names)
//!
//! All of them share one operation set: `as_str`, `FromStr`, `Display`,
//! serde as the wire value, and an `ALL` listing in declaration order.
//!
//! # Example
//!
//! ```rust
//! use devloop_schema::ObservationType;
//!
//! let kind: ObservationType = "run_ipython".parse().unwrap();
//! assert_eq!(kind, ObservationType::RunIpython);
//! assert_eq!(kind.to_string(), "run_ipython");
//! ```

#![warn(unreachable_pub)]

#[macro_use]
mod macros;

pub mod action;
pub mod agent_state;
pub mod config_type;
pub mod error;
pub mod observation;

pub use action::ActionType;
pub use agent_state::AgentState;
pub use config_type::ConfigType;
pub use error::SchemaError;
pub use observation::ObservationType;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
