//! Agent controller - drives one agent over an event stream
//!
//! The controller:
//! - Adopts lifecycle changes requested by the user and confirms them
//! - Turns user messages into task input
//! - Steps the agent while running, publishing every action and its
//!   observation to the stream
//! - Enforces the iteration budget

use crate::agent::Agent;
use crate::error::ServerError;
use crate::executor::ActionExecutor;
use crate::state::State;
use async_trait::async_trait;
use devloop_events::{
    Action, Event, EventId, EventPayload, EventSource, EventStream, EventSubscriber, Observation,
    SubscriberId,
};
use devloop_schema::AgentState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct Inner {
    agent_state: AgentState,
    task: State,
    closed: bool,
}

/// Steps one agent on behalf of one session
pub struct AgentController {
    sid: String,
    stream: EventStream,
    agent: tokio::sync::Mutex<Box<dyn Agent>>,
    agent_name: String,
    executor: Arc<dyn ActionExecutor>,
    max_iterations: u32,
    inner: Mutex<Inner>,
    loop_active: AtomicBool,
    subscription: Mutex<Option<SubscriberId>>,
    me: Weak<AgentController>,
}

impl std::fmt::Debug for AgentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentController")
            .field("sid", &self.sid)
            .field("agent", &self.agent_name)
            .field("state", &self.get_agent_state())
            .field("iteration", &self.iteration())
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl AgentController {
    /// Create a controller and subscribe it to `stream`
    ///
    /// The controller starts in [`AgentState::Loading`]. The stream only
    /// holds a weak reference; dropping the returned `Arc` detaches it.
    #[must_use]
    pub fn new(
        sid: impl Into<String>,
        stream: EventStream,
        agent: Box<dyn Agent>,
        executor: Arc<dyn ActionExecutor>,
        max_iterations: u32,
        max_chars: usize,
    ) -> Arc<Self> {
        let agent_name = agent.name().to_string();
        let controller = Arc::new_cyclic(|me| Self {
            sid: sid.into(),
            stream: stream.clone(),
            agent: tokio::sync::Mutex::new(agent),
            agent_name,
            executor,
            max_iterations,
            inner: Mutex::new(Inner {
                agent_state: AgentState::Loading,
                task: State::new(max_chars),
                closed: false,
            }),
            loop_active: AtomicBool::new(false),
            subscription: Mutex::new(None),
            me: me.clone(),
        });

        let id = stream.subscribe(Arc::new(ControllerSubscriber(Arc::downgrade(&controller))));
        *controller.subscription.lock() = Some(id);
        tracing::info!(
            sid = %controller.sid,
            agent = %controller.agent_name,
            max_iterations,
            max_chars,
            "controller created"
        );
        controller
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Name of the driven agent
    #[inline]
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Current lifecycle state
    #[must_use]
    pub fn get_agent_state(&self) -> AgentState {
        self.inner.lock().agent_state
    }

    /// Steps taken in the current task
    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.inner.lock().task.iteration
    }

    /// Step budget
    #[inline]
    #[must_use]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Copy of the task state
    #[must_use]
    pub fn task_state(&self) -> State {
        self.inner.lock().task.clone()
    }

    /// Whether [`close`](Self::close) was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Detach from the stream and stop stepping
    pub fn close(&self) {
        self.inner.lock().closed = true;
        if let Some(id) = self.subscription.lock().take() {
            self.stream.unsubscribe(id);
        }
        tracing::info!(sid = %self.sid, "controller closed");
    }

    /// Adopt `new` and publish it as an agent event
    fn set_agent_state(&self, new: AgentState) -> Result<(), ServerError> {
        let old = std::mem::replace(&mut self.inner.lock().agent_state, new);
        tracing::info!(sid = %self.sid, from = %old, to = %new, "agent state changed");
        self.stream
            .add_event(Observation::agent_state_changed(new), EventSource::Agent)?;
        Ok(())
    }

    async fn handle_event(&self, event: Arc<Event>) {
        if event.source != EventSource::User || self.is_closed() {
            return;
        }
        let result = match &event.payload {
            EventPayload::Observation(observation) => match observation.agent_state() {
                Some(requested) => self.on_state_request(requested).await,
                None => Ok(()),
            },
            EventPayload::Action(Action::Message { content, .. }) => self.on_user_message(content),
            EventPayload::Action(Action::ChangeAgentState { agent_state }) => {
                self.on_state_request(*agent_state).await
            }
            EventPayload::Action(action) if action.is_null() => Ok(()),
            EventPayload::Action(action) => self.on_user_action(event.id, action).await,
        };
        if let Err(e) = result {
            tracing::warn!(sid = %self.sid, event_id = %event.id, error = %e, "failed to handle user event");
        }
    }

    async fn on_state_request(&self, requested: AgentState) -> Result<(), ServerError> {
        self.set_agent_state(requested)?;
        match requested {
            AgentState::Running => self.start_loop(),
            AgentState::Stopped => {
                self.agent.lock().await.reset();
                self.inner.lock().task.reset();
            }
            _ => {}
        }
        Ok(())
    }

    fn on_user_message(&self, content: &str) -> Result<(), ServerError> {
        let current = {
            let mut inner = self.inner.lock();
            inner.task.add_input(content);
            inner.agent_state
        };
        if matches!(current, AgentState::Init | AgentState::AwaitingUserInput) {
            self.set_agent_state(AgentState::Running)?;
            self.start_loop();
        }
        Ok(())
    }

    async fn on_user_action(&self, cause: EventId, action: &Action) -> Result<(), ServerError> {
        let observation = self.executor.execute(action).await;
        if !observation.is_null() {
            self.stream
                .add_event_with_cause(observation, EventSource::Agent, Some(cause))?;
        }
        Ok(())
    }

    fn start_loop(&self) {
        if let Some(me) = self.me.upgrade() {
            tokio::spawn(me.run_loop());
        }
    }

    /// Step loop (runs in its own tokio task, at most one per controller)
    async fn run_loop(self: Arc<Self>) {
        loop {
            if self
                .loop_active
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            while self.get_agent_state() == AgentState::Running && !self.is_closed() {
                if let Err(e) = self.step_once().await {
                    tracing::warn!(sid = %self.sid, error = %e, "step loop aborted");
                    break;
                }
                tokio::task::yield_now().await;
            }
            self.loop_active.store(false, Ordering::Release);

            // A resume may have arrived between the last check and the release.
            if self.get_agent_state() != AgentState::Running || self.is_closed() {
                return;
            }
        }
    }

    async fn step_once(&self) -> Result<(), ServerError> {
        let (snapshot, exhausted) = {
            let inner = self.inner.lock();
            (
                inner.task.clone(),
                inner.task.iteration >= self.max_iterations,
            )
        };
        if exhausted {
            return self.fail(format!(
                "Agent reached maximum number of iterations ({})",
                self.max_iterations
            ));
        }

        let result = {
            let mut agent = self.agent.lock().await;
            agent.step(&snapshot).await
        };
        let action = match result {
            Ok(action) => action,
            Err(e) => return self.fail(format!("Agent error: {e}")),
        };

        if self.get_agent_state() != AgentState::Running {
            tracing::debug!(sid = %self.sid, "state changed while stepping, dropping action");
            return Ok(());
        }

        let iteration = {
            let mut inner = self.inner.lock();
            inner.task.iteration += 1;
            inner.task.iteration
        };
        tracing::debug!(sid = %self.sid, iteration, action = %action.action_type(), "agent step");

        let action_id = self.stream.add_event(action.clone(), EventSource::Agent)?;
        let (observation, next_state) = self.resolve(&action).await;
        if !observation.is_null() {
            self.stream.add_event_with_cause(
                observation.clone(),
                EventSource::Agent,
                Some(action_id),
            )?;
        }
        self.inner.lock().task.record(action, observation);

        if let Some(state) = next_state {
            self.advance_from_running(state)?;
        }
        Ok(())
    }

    /// Move to `new` only if no other change landed since the step began
    ///
    /// Returns whether the state changed.
    fn advance_from_running(&self, new: AgentState) -> Result<bool, ServerError> {
        let advanced = {
            let mut inner = self.inner.lock();
            let running = inner.agent_state == AgentState::Running;
            if running {
                inner.agent_state = new;
            }
            running
        };
        if !advanced {
            tracing::debug!(sid = %self.sid, to = %new, "state changed during step, keeping it");
            return Ok(false);
        }
        tracing::info!(sid = %self.sid, from = %AgentState::Running, to = %new, "agent state changed");
        self.stream
            .add_event(Observation::agent_state_changed(new), EventSource::Agent)?;
        Ok(true)
    }

    /// Observation for `action` and the state it moves the agent to
    async fn resolve(&self, action: &Action) -> (Observation, Option<AgentState>) {
        match action {
            Action::Message {
                wait_for_response, ..
            } => (
                Observation::null(),
                wait_for_response.then_some(AgentState::AwaitingUserInput),
            ),
            Action::Finish { .. } => (Observation::null(), Some(AgentState::Finished)),
            Action::Reject { .. } => (Observation::null(), Some(AgentState::Error)),
            Action::ChangeAgentState { agent_state } => (Observation::null(), Some(*agent_state)),
            Action::Think { .. }
            | Action::AddTask { .. }
            | Action::ModifyTask { .. }
            | Action::Null {} => (Observation::null(), None),
            _ => (self.executor.execute(action).await, None),
        }
    }

    fn fail(&self, message: String) -> Result<(), ServerError> {
        tracing::error!(sid = %self.sid, %message, "agent run failed");
        self.stream
            .add_event(Observation::error(message), EventSource::Agent)?;
        self.set_agent_state(AgentState::Error)
    }
}

struct ControllerSubscriber(Weak<AgentController>);

#[async_trait]
impl EventSubscriber for ControllerSubscriber {
    async fn on_event(&self, event: Arc<Event>) {
        if let Some(controller) = self.0.upgrade() {
            controller.handle_event(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::EchoAgent;
    use crate::executor::NullExecutor;
    use crate::llm::LlmConfig;
    use std::time::Duration;

    async fn wait_for_state(controller: &AgentController, expected: AgentState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.get_agent_state() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("controller never reached {expected}"));
    }

    fn echo_controller(stream: &EventStream, max_iterations: u32) -> Arc<AgentController> {
        AgentController::new(
            "sid-test",
            stream.clone(),
            Box::new(EchoAgent::new(LlmConfig::new("test-model"))),
            Arc::new(NullExecutor),
            max_iterations,
            1_000,
        )
    }

    #[tokio::test]
    async fn user_init_is_confirmed_by_agent() {
        let stream = EventStream::new();
        let controller = echo_controller(&stream, 10);
        assert_eq!(controller.get_agent_state(), AgentState::Loading);

        stream
            .add_event(Observation::agent_state_changed(AgentState::Init), EventSource::User)
            .unwrap();
        wait_for_state(&controller, AgentState::Init).await;
        stream.flush().await;

        let last = stream.history().last().cloned().unwrap();
        assert_eq!(last.source, EventSource::Agent);
        assert_eq!(
            last.as_observation().and_then(Observation::agent_state),
            Some(AgentState::Init)
        );
    }

    #[tokio::test]
    async fn message_runs_echo_until_waiting() {
        let stream = EventStream::new();
        let controller = echo_controller(&stream, 10);
        stream
            .add_event(Observation::agent_state_changed(AgentState::Init), EventSource::User)
            .unwrap();
        stream
            .add_event(Action::message("hello", false), EventSource::User)
            .unwrap();

        wait_for_state(&controller, AgentState::AwaitingUserInput).await;
        assert_eq!(controller.iteration(), 1);

        let echoed = stream
            .history()
            .iter()
            .filter(|e| e.source == EventSource::Agent)
            .find_map(|e| e.as_action().cloned());
        assert_eq!(echoed, Some(Action::message("hello", true)));
    }

    #[tokio::test]
    async fn iteration_budget_moves_to_error() {
        let stream = EventStream::new();
        let controller = echo_controller(&stream, 0);
        stream
            .add_event(Observation::agent_state_changed(AgentState::Init), EventSource::User)
            .unwrap();
        stream
            .add_event(Action::message("hello", false), EventSource::User)
            .unwrap();

        wait_for_state(&controller, AgentState::Error).await;
        let has_error = stream.history().iter().any(|e| {
            e.as_observation()
                .is_some_and(|o| o.tag() == "error" && o.content.contains("maximum number of iterations"))
        });
        assert!(has_error);
    }

    #[tokio::test]
    async fn closed_controller_ignores_events() {
        let stream = EventStream::new();
        let controller = echo_controller(&stream, 10);
        controller.close();
        stream
            .add_event(Observation::agent_state_changed(AgentState::Init), EventSource::User)
            .unwrap();
        stream.flush().await;
        assert_eq!(controller.get_agent_state(), AgentState::Loading);
        assert_eq!(stream.len(), 1);
    }

    #[tokio::test]
    async fn step_outcome_does_not_override_user_change() {
        let stream = EventStream::new();
        let controller = echo_controller(&stream, 10);
        controller.inner.lock().agent_state = AgentState::Paused;

        assert!(!controller
            .advance_from_running(AgentState::AwaitingUserInput)
            .unwrap());
        assert_eq!(controller.get_agent_state(), AgentState::Paused);
        assert!(stream.is_empty());

        controller.inner.lock().agent_state = AgentState::Running;
        assert!(controller
            .advance_from_running(AgentState::AwaitingUserInput)
            .unwrap());
        assert_eq!(controller.get_agent_state(), AgentState::AwaitingUserInput);
        let last = stream.history().last().cloned().unwrap();
        assert_eq!(last.source, EventSource::Agent);
        assert_eq!(
            last.as_observation().and_then(Observation::agent_state),
            Some(AgentState::AwaitingUserInput)
        );
    }
}
