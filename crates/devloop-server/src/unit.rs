//! Agent unit - one client session's agent
//!
//! An [`AgentUnit`] owns the session's event stream, creates the controller
//! when the client initializes, routes client requests into the stream and
//! relays agent-produced events back to the client.

use crate::agent::AgentRegistry;
use crate::config::{parse_number, AppConfig};
use crate::controller::AgentController;
use crate::error::ServerError;
use crate::executor::{ActionExecutor, NullExecutor};
use crate::session::SessionSender;
use crate::state_machine::{self, TransitionOutcome};
use async_trait::async_trait;
use devloop_events::{
    Action, Event, EventSource, EventStream, EventSubscriber, Observation, SubscriberId,
};
use devloop_schema::{ActionType, AgentState, ConfigType};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Sent when a client request names no action or an unparsable one
pub const INVALID_ACTION: &str = "Invalid action";
/// Sent when a request needs a controller that was never created
pub const NO_AGENT_STARTED: &str = "No agent started.";
/// Sent when a requested state change is not allowed from the current state
pub const STATE_NOT_RECOGNIZED: &str = "Current task state not recognized.";
/// Sent when the controller cannot be built from the initialize arguments
pub const CONTROLLER_ERROR: &str =
    "Error creating controller. Please check the agent name and numeric settings, then initialize again.";

/// Session with an agent
pub struct AgentUnit {
    sid: String,
    stream: EventStream,
    sessions: Arc<dyn SessionSender>,
    registry: AgentRegistry,
    config: Arc<AppConfig>,
    executor: Arc<dyn ActionExecutor>,
    controller: Mutex<Option<Arc<AgentController>>>,
    relay: SubscriberId,
}

impl std::fmt::Debug for AgentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentUnit")
            .field("sid", &self.sid)
            .field("stream", &self.stream)
            .field("controller", &self.controller.lock())
            .finish_non_exhaustive()
    }
}

impl AgentUnit {
    /// Create a unit with its own event stream
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(
        sid: impl Into<String>,
        sessions: Arc<dyn SessionSender>,
        registry: AgentRegistry,
        config: Arc<AppConfig>,
    ) -> Self {
        let sid = sid.into();
        let stream = EventStream::new();
        let relay = stream.subscribe(Arc::new(ClientRelay {
            sid: sid.clone(),
            sessions: Arc::clone(&sessions),
        }));
        Self {
            sid,
            stream,
            sessions,
            registry,
            config,
            executor: Arc::new(NullExecutor),
            controller: Mutex::new(None),
            relay,
        }
    }

    /// Use `executor` for actions that need a runtime
    ///
    /// Applies to controllers created afterwards.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// The session's event stream
    #[inline]
    #[must_use]
    pub fn stream(&self) -> &EventStream {
        &self.stream
    }

    /// Current controller, if the client initialized
    #[must_use]
    pub fn controller(&self) -> Option<Arc<AgentController>> {
        self.controller.lock().clone()
    }

    /// Send an error message to the client
    ///
    /// # Errors
    /// Session delivery failures.
    pub async fn send_error(&self, message: &str) -> Result<(), ServerError> {
        self.sessions.send_error(&self.sid, message).await
    }

    /// Send a plain message to the client
    ///
    /// # Errors
    /// Session delivery failures.
    pub async fn send_message(&self, message: &str) -> Result<(), ServerError> {
        self.sessions.send_message(&self.sid, message).await
    }

    /// Send raw data to the client
    ///
    /// # Errors
    /// Session delivery failures.
    pub async fn send(&self, data: Value) -> Result<(), ServerError> {
        self.sessions.send(&self.sid, data).await
    }

    /// Entry point for a raw client message `{"action": ..., "args": {...}}`
    ///
    /// # Errors
    /// Session delivery failures and a closed stream; malformed requests are
    /// reported to the client instead.
    pub async fn handle_client_message(&self, message: Value) -> Result<(), ServerError> {
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_owned);
        self.dispatch(action.as_deref(), &message).await
    }

    /// Route one client request
    ///
    /// # Errors
    /// Session delivery failures and a closed stream.
    pub async fn dispatch(&self, action: Option<&str>, data: &Value) -> Result<(), ServerError> {
        tracing::debug!(sid = %self.sid, action, "dispatching client action");
        let Some(action) = action else {
            return self.send_error(INVALID_ACTION).await;
        };

        if action == ActionType::Init.as_str() {
            return self.create_controller(data).await;
        }

        let mut dict = data.as_object().cloned().unwrap_or_default();
        dict.insert("action".to_string(), Value::String(action.to_string()));
        match Action::from_dict(&Value::Object(dict)) {
            Ok(Action::ChangeAgentState { agent_state }) => self.set_agent_state(agent_state).await,
            Ok(action) => {
                self.stream.add_event(action, EventSource::User)?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(sid = %self.sid, action, error = %e, "rejected client action");
                self.send_error(INVALID_ACTION).await
            }
        }
    }

    /// Build the controller from initialize arguments and announce `init`
    ///
    /// Empty-string arguments fall back to the configuration. Any failure is
    /// logged and reported to the client.
    ///
    /// # Errors
    /// Session delivery failures and a closed stream.
    pub async fn create_controller(&self, start_event: &Value) -> Result<(), ServerError> {
        let args: Map<String, Value> = start_event
            .get("args")
            .and_then(Value::as_object)
            .map(|args| {
                args.iter()
                    .filter(|(_, value)| value.as_str() != Some(""))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let agent = self.arg(&args, ConfigType::Agent);
        let model = self.arg(&args, ConfigType::LlmModel);
        tracing::info!(sid = %self.sid, agent = %agent, model = %model, "creating agent");

        match self.build_controller(&args, &agent, model) {
            Ok(controller) => {
                let previous = self.controller.lock().replace(controller);
                if let Some(previous) = previous {
                    previous.close();
                }
            }
            Err(e) => {
                tracing::error!(sid = %self.sid, error = %e, "error creating controller");
                return self.send_error(CONTROLLER_ERROR).await;
            }
        }
        self.init_done().await
    }

    fn arg(&self, args: &Map<String, Value>, key: ConfigType) -> String {
        self.config.arg_or_default(args, key).unwrap_or_default()
    }

    fn build_controller(
        &self,
        args: &Map<String, Value>,
        agent: &str,
        model: String,
    ) -> Result<Arc<AgentController>, ServerError> {
        let max_iterations: u32 = parse_number(
            ConfigType::MaxIterations,
            &self.arg(args, ConfigType::MaxIterations),
        )?;
        let max_chars: usize =
            parse_number(ConfigType::MaxChars, &self.arg(args, ConfigType::MaxChars))?;
        let mut llm = self.config.llm();
        llm.model = model;
        llm.api_key = self.config.arg_or_default(args, ConfigType::LlmApiKey);

        let agent = self.registry.create(agent, llm)?;
        Ok(AgentController::new(
            self.sid.clone(),
            self.stream.clone(),
            agent,
            Arc::clone(&self.executor),
            max_iterations,
            max_chars,
        ))
    }

    /// Announce that the controller is ready
    ///
    /// # Errors
    /// Session delivery failures and a closed stream.
    pub async fn init_done(&self) -> Result<(), ServerError> {
        if self.controller().is_none() {
            return self.send_error(NO_AGENT_STARTED).await;
        }
        self.stream.add_event(
            Observation::agent_state_changed(AgentState::Init),
            EventSource::User,
        )?;
        Ok(())
    }

    /// Request a lifecycle change on behalf of the client
    ///
    /// # Errors
    /// Session delivery failures and a closed stream.
    pub async fn set_agent_state(&self, new_state: AgentState) -> Result<(), ServerError> {
        let Some(controller) = self.controller() else {
            return self.send_error(NO_AGENT_STARTED).await;
        };

        let current = controller.get_agent_state();
        match state_machine::evaluate(current, new_state) {
            Ok(outcome) => {
                if outcome == TransitionOutcome::Ignore {
                    tracing::debug!(sid = %self.sid, %current, requested = %new_state, "state request needs no transition");
                }
                self.stream.add_event(
                    Observation::agent_state_changed(new_state),
                    EventSource::User,
                )?;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(sid = %self.sid, error = %e, "state request rejected");
                self.send_error(STATE_NOT_RECOGNIZED).await
            }
        }
    }

    /// Stop the controller and the stream
    pub fn close(&self) {
        if let Some(controller) = self.controller.lock().take() {
            controller.close();
        }
        self.stream.unsubscribe(self.relay);
        self.stream.close();
    }
}

/// Forwards agent events to the client
struct ClientRelay {
    sid: String,
    sessions: Arc<dyn SessionSender>,
}

#[async_trait]
impl EventSubscriber for ClientRelay {
    async fn on_event(&self, event: Arc<Event>) {
        if event.is_null() || event.source != EventSource::Agent {
            return;
        }
        let dict = match event.to_dict() {
            Ok(dict) => dict,
            Err(e) => {
                tracing::error!(sid = %self.sid, event_id = %event.id, error = %e, "cannot encode event");
                return;
            }
        };
        if let Err(e) = self.sessions.send(&self.sid, dict).await {
            tracing::warn!(sid = %self.sid, event_id = %event.id, error = %e, "cannot relay event");
        }
    }
}
