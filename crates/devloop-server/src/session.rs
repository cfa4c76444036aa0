//! Outgoing client channels
//!
//! Provides [`SessionSender`], the seam agent units talk to clients through,
//! and [`SessionManager`], an in-process implementation with one bounded
//! channel per session.

use crate::error::ServerError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Default per-session channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Delivers JSON messages to connected clients
#[async_trait]
pub trait SessionSender: Send + Sync {
    /// Send raw data
    async fn send(&self, sid: &str, data: Value) -> Result<(), ServerError>;

    /// Send `{"error": true, "message": ...}`
    async fn send_error(&self, sid: &str, message: &str) -> Result<(), ServerError> {
        self.send(sid, json!({ "error": true, "message": message }))
            .await
    }

    /// Send `{"message": ...}`
    async fn send_message(&self, sid: &str, message: &str) -> Result<(), ServerError> {
        self.send(sid, json!({ "message": message })).await
    }
}

/// Session table backed by tokio channels
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, mpsc::Sender<Value>>,
    capacity: usize,
}

impl SessionManager {
    /// Manager with the default channel capacity
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Manager with `capacity` buffered messages per session
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register `sid`, replacing any previous registration
    ///
    /// Returns the receiving end the connection drains.
    pub fn add_session(&self, sid: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.sessions.insert(sid.to_string(), tx).is_some() {
            tracing::info!(sid, "session replaced");
        } else {
            tracing::info!(sid, "session added");
        }
        rx
    }

    /// Unregister `sid`; returns whether it was registered
    pub fn remove_session(&self, sid: &str) -> bool {
        let removed = self.sessions.remove(sid).is_some();
        if removed {
            tracing::info!(sid, "session removed");
        }
        removed
    }

    /// Whether `sid` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, sid: &str) -> bool {
        self.sessions.contains_key(sid)
    }

    /// Number of registered sessions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionSender for SessionManager {
    async fn send(&self, sid: &str, data: Value) -> Result<(), ServerError> {
        // Clone the sender so no map guard is held across the await.
        let sender = self
            .sessions
            .get(sid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServerError::SessionNotFound(sid.to_string()))?;
        sender
            .send(data)
            .await
            .map_err(|_| ServerError::SessionClosed(sid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_reaches_receiver() {
        let manager = SessionManager::new();
        let mut rx = manager.add_session("a");
        manager.send("a", json!({"x": 1})).await.unwrap();
        assert_eq!(rx.recv().await, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn error_and_message_shapes() {
        let manager = SessionManager::new();
        let mut rx = manager.add_session("a");
        manager.send_error("a", "boom").await.unwrap();
        manager.send_message("a", "hi").await.unwrap();
        assert_eq!(rx.recv().await, Some(json!({"error": true, "message": "boom"})));
        assert_eq!(rx.recv().await, Some(json!({"message": "hi"})));
    }

    #[tokio::test]
    async fn unknown_and_closed_sessions() {
        let manager = SessionManager::new();
        assert!(matches!(
            manager.send("nope", json!({})).await,
            Err(ServerError::SessionNotFound(_))
        ));

        let rx = manager.add_session("gone");
        drop(rx);
        assert!(matches!(
            manager.send("gone", json!({})).await,
            Err(ServerError::SessionClosed(_))
        ));
    }

    #[test]
    fn add_and_remove() {
        let manager = SessionManager::with_capacity(0);
        let _rx = manager.add_session("a");
        assert!(manager.contains("a"));
        assert_eq!(manager.len(), 1);
        assert!(manager.remove_session("a"));
        assert!(!manager.remove_session("a"));
        assert!(manager.is_empty());
    }
}
