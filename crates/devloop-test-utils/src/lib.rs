//! Testing utilities for devloop workspace
//!
//! Shared agents, executors, subscribers and channel helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use devloop_events::{Action, Event, EventStream, EventSubscriber, Observation};
use devloop_server::{
    ActionExecutor, Agent, AgentError, AgentRegistry, AgentUnit, AppConfig, SessionManager, State,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const SID: &str = "test-session";
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Plays back a fixed list of steps, then finishes
///
/// Clones share the reset counter.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    script: VecDeque<Result<Action, AgentError>>,
    original: VecDeque<Result<Action, AgentError>>,
    resets: Arc<AtomicUsize>,
}

impl ScriptedAgent {
    pub const NAME: &'static str = "ScriptedAgent";

    pub fn new(steps: Vec<Result<Action, AgentError>>) -> Self {
        let script: VecDeque<_> = steps.into();
        Self {
            original: script.clone(),
            script,
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times any clone was reset
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn actions(actions: Vec<Action>) -> Self {
        Self::new(actions.into_iter().map(Ok).collect())
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn step(&mut self, _state: &State) -> Result<Action, AgentError> {
        self.script.pop_front().unwrap_or_else(|| Ok(Action::finish()))
    }

    fn reset(&mut self) {
        self.script = self.original.clone();
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Never stops asking to run `true`
#[derive(Debug, Default)]
pub struct LoopingAgent;

#[async_trait]
impl Agent for LoopingAgent {
    fn name(&self) -> &str {
        "LoopingAgent"
    }

    async fn step(&mut self, _state: &State) -> Result<Action, AgentError> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(Action::run("true"))
    }
}

/// Registry with the defaults plus a scripted agent
pub fn registry_with_script(script: ScriptedAgent) -> AgentRegistry {
    let mut registry = AgentRegistry::with_defaults();
    registry.register(ScriptedAgent::NAME, move |_| -> Box<dyn Agent> {
        Box::new(script.clone())
    });
    registry.register("LoopingAgent", |_| -> Box<dyn Agent> { Box::new(LoopingAgent) });
    registry
}

/// Answers run actions with a fixed output, ignores everything else
#[derive(Debug, Clone)]
pub struct CannedExecutor {
    pub output: String,
    pub executed: Arc<Mutex<Vec<Action>>>,
}

impl CannedExecutor {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ActionExecutor for CannedExecutor {
    async fn execute(&self, action: &Action) -> Observation {
        self.executed.lock().push(action.clone());
        match action {
            Action::Run { command, .. } => Observation::run(1, command.clone(), 0, self.output.clone()),
            _ => Observation::null(),
        }
    }
}

/// Keeps every delivered event
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<Arc<Event>>>,
}

impl RecordingSubscriber {
    pub fn attach(stream: &EventStream) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        stream.subscribe(recorder.clone());
        recorder
    }

    pub fn events(&self) -> Vec<Arc<Event>> {
        self.events.lock().clone()
    }

    /// Wait until some delivered event satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Arc<Event>
    where
        F: Fn(&Event) -> bool,
    {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                if let Some(found) = self.events.lock().iter().find(|event| predicate(event.as_ref())).cloned() {
                    return found;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("event did not arrive in time")
    }
}

#[async_trait]
impl EventSubscriber for RecordingSubscriber {
    async fn on_event(&self, event: Arc<Event>) {
        self.events.lock().push(event);
    }
}

/// Unit on a fresh session, returning the client's receiving end
pub fn setup_unit(
    registry: AgentRegistry,
    config: AppConfig,
) -> (AgentUnit, Arc<SessionManager>, mpsc::Receiver<Value>) {
    let sessions = Arc::new(SessionManager::new());
    let rx = sessions.add_session(SID);
    let unit = AgentUnit::new(SID, sessions.clone(), registry, Arc::new(config));
    (unit, sessions, rx)
}

/// Receive client messages until one satisfies `predicate`; returns all received
pub async fn recv_until<F>(rx: &mut mpsc::Receiver<Value>, predicate: F) -> Vec<Value>
where
    F: Fn(&Value) -> bool,
{
    let mut seen = Vec::new();
    let received = tokio::time::timeout(TIMEOUT, async {
        while let Some(message) = rx.recv().await {
            let done = predicate(&message);
            seen.push(message);
            if done {
                return;
            }
        }
        panic!("session closed before the expected message");
    })
    .await;
    assert!(received.is_ok(), "expected message not received, got {seen:?}");
    seen
}

/// Predicate for a relayed agent state change
pub fn is_state(message: &Value, state: &str) -> bool {
    message["observation"] == "agent_state_changed" && message["extras"]["agent_state"] == state
}
