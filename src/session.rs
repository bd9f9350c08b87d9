//! Session Manager.
//!
//! Owns the live sessions keyed by identifier. A session is created when a
//! client opens the SSE stream and destroyed when that stream goes away;
//! everything else only looks sessions up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::{SessionStream, TransportChannel};

/// Path clients POST messages to.
pub const MESSAGE_PATH: &str = "/message";

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    channel: Arc<TransportChannel>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn channel(&self) -> &TransportChannel {
        &self.channel
    }

    /// Deliver one serialized JSON-RPC message on this session's stream.
    pub async fn send(&self, message: String) -> Result<(), TransportError> {
        self.channel.send(message).await
    }
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    keep_alive: Duration,
}

impl SessionManager {
    pub fn new(keep_alive: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            keep_alive,
        }
    }

    /// Register a new session and open its transport. The returned stream
    /// carries the session's frames; dropping it destroys the session.
    pub fn create(&self) -> (Arc<Session>, SessionStream) {
        let mut sessions = self.sessions.write();
        let mut id = Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let (channel, receiver) = TransportChannel::new(id.clone(), self.keep_alive);
        let channel = Arc::new(channel);
        channel.open(format!("{}?sessionId={}", MESSAGE_PATH, id));

        let session = Arc::new(Session {
            id: id.clone(),
            created_at: Utc::now(),
            channel: channel.clone(),
        });
        sessions.insert(id.clone(), session.clone());
        info!(session_id = %id, active = sessions.len(), "Session opened");
        drop(sessions);

        let stream = SessionStream::new(channel, receiver, self.clone());
        (session, stream)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<Session>, TransportError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::SessionNotFound(id.to_string()))
    }

    /// Remove a session and close its transport. Destroying an absent
    /// session is a no-op.
    pub fn destroy(&self, id: &str) {
        let removed = self.sessions.write().remove(id);
        if let Some(session) = removed {
            session.channel.close();
            info!(
                session_id = %id,
                age_secs = (Utc::now() - session.created_at()).num_seconds(),
                "Session closed"
            );
        }
    }

    /// Close every live session, ending their streams.
    pub fn close_all(&self) {
        let drained: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.channel.close();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Closed all sessions");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelState, Frame, DEFAULT_KEEP_ALIVE};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_create_registers_unique_sessions() {
        let sessions = SessionManager::new(DEFAULT_KEEP_ALIVE);
        let (a, _stream_a) = sessions.create();
        let (b, _stream_b) = sessions.create();
        assert_ne!(a.id(), b.id());
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.lookup(a.id()).unwrap().id(), a.id());
        assert_eq!(a.channel().state(), ChannelState::Open);
    }

    #[tokio::test]
    async fn test_first_frame_is_endpoint() {
        let sessions = SessionManager::new(DEFAULT_KEEP_ALIVE);
        let (session, mut stream) = sessions.create();
        assert_eq!(
            stream.next().await,
            Some(Frame::Endpoint(format!("/message?sessionId={}", session.id())))
        );
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let sessions = SessionManager::new(DEFAULT_KEEP_ALIVE);
        let (session, _stream) = sessions.create();
        let id = session.id().to_string();
        sessions.destroy(&id);
        sessions.destroy(&id);
        assert!(matches!(
            sessions.lookup(&id),
            Err(TransportError::SessionNotFound(_))
        ));
        assert!(session.channel().is_closed());
    }

    #[tokio::test]
    async fn test_dropping_stream_destroys_session() {
        let sessions = SessionManager::new(DEFAULT_KEEP_ALIVE);
        let (session, stream) = sessions.create();
        drop(stream);
        assert!(sessions.lookup(session.id()).is_err());
        assert!(sessions.is_empty());
        assert!(session.send("{}".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_messages_stay_on_their_session() {
        let sessions = SessionManager::new(DEFAULT_KEEP_ALIVE);
        let (a, mut stream_a) = sessions.create();
        let (_b, mut stream_b) = sessions.create();
        stream_a.next().await;
        stream_b.next().await;

        a.send("for-a".into()).await.unwrap();
        assert_eq!(stream_a.next().await, Some(Frame::Message("for-a".into())));
        let nothing = tokio::time::timeout(Duration::from_millis(50), stream_b.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_close_all_ends_streams() {
        let sessions = SessionManager::new(DEFAULT_KEEP_ALIVE);
        let (_a, mut stream) = sessions.create();
        sessions.close_all();
        assert!(sessions.is_empty());
        assert_eq!(stream.next().await, None);
    }
}
