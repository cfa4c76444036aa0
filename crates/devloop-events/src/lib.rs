//! devloop events - actions, observations and the event stream
//!
//! Agents and users communicate exclusively through [`Event`]s:
//! - An [`Action`] is a request (read a file, run a command, send a message)
//! - An [`Observation`] is the typed result of executing an action
//! - The [`EventStream`] assigns ids, keeps the history and delivers events
//!   to every subscriber in order
//!
//! # Example
//!
//! ```rust,ignore
//! use devloop_events::{Action, EventSource, EventStream};
//!
//! # async fn example() -> Result<(), devloop_events::EventError> {
//! let stream = EventStream::new();
//! let id = stream
//!     .add_event(Action::message("hello", false), EventSource::User)?;
//! stream.flush().await;
//! assert_eq!(id.value(), 0);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod action;
pub mod error;
pub mod event;
pub mod observation;
pub mod stream;

pub use action::Action;
pub use error::EventError;
pub use event::{Event, EventId, EventPayload, EventSource};
pub use observation::{Observation, ObservationExtras};
pub use stream::{EventStream, EventSubscriber, SubscriberId};

/// Re-exported vocabulary
pub use devloop_schema::{ActionType, AgentState, ObservationType};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
