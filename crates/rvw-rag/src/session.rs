//! Per-session chat history
//!
//! Sessions are created lazily on first reference and kept in a moka cache,
//! optionally evicted after an idle period. Each session guards its history
//! with an async mutex; the orchestrator holds that lock for a whole turn so
//! turns on one session never interleave.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rvw_core::{ChatMessage, RagConfig};
use tokio::sync::{Mutex, MutexGuard};

/// Ordered messages of one conversation
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    messages: Vec<ChatMessage>,
}

impl SessionHistory {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A conversation and its history
#[derive(Debug)]
pub struct Session {
    id: String,
    history: Mutex<SessionHistory>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            history: Mutex::new(SessionHistory::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the history until the guard drops
    pub async fn lock(&self) -> MutexGuard<'_, SessionHistory> {
        self.history.lock().await
    }
}

/// Registry of live sessions
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, Arc<Session>>,
}

impl SessionStore {
    /// `idle_timeout` of `None` keeps sessions for the life of the store
    pub fn new(idle_timeout: Option<Duration>, max_capacity: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(idle) = idle_timeout {
            builder = builder.time_to_idle(idle);
        }
        Self {
            sessions: builder.build(),
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        let idle = (config.session_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(config.session_idle_timeout_secs));
        Self::new(idle, config.session_max_capacity)
    }

    /// Return the session for `session_id`, creating it on first use.
    ///
    /// Concurrent first references resolve to the same instance.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        self.sessions
            .get_with(session_id.to_string(), async {
                tracing::debug!(session_id, "Creating session");
                Arc::new(Session::new(session_id))
            })
            .await
    }

    /// Append one message to a session's history
    pub async fn append(&self, session_id: &str, message: ChatMessage) {
        let session = self.get_or_create(session_id).await;
        session.lock().await.push(message);
    }

    /// Snapshot of a session's history; empty for unknown ids
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        match self.sessions.get(session_id).await {
            Some(session) => session.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvw_core::ChatRole;

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        let store = SessionStore::default();
        let a = store.get_or_create("user-session").await;
        let b = store.get_or_create("user-session").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), "user-session");
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_reference_shares_instance() {
        let store = SessionStore::default();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_or_create("shared").await })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_append_and_history() {
        let store = SessionStore::default();
        store.append("s1", ChatMessage::user("hi")).await;
        store.append("s1", ChatMessage::assistant("hello")).await;
        store.append("s2", ChatMessage::user("other")).await;

        let history = store.history("s1").await;
        let roles: Vec<_> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);
        assert_eq!(store.history("s2").await.len(), 1);
    }

    #[tokio::test]
    async fn test_history_of_unknown_session_is_empty() {
        let store = SessionStore::default();
        assert!(store.history("nobody").await.is_empty());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let store = SessionStore::new(Some(Duration::from_millis(50)), 100);
        store.append("short-lived", ChatMessage::user("hi")).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.history("short-lived").await.is_empty());
    }

    #[test]
    fn test_zero_idle_timeout_disables_eviction() {
        let config = RagConfig {
            session_idle_timeout_secs: 0,
            ..Default::default()
        };
        let store = SessionStore::from_config(&config);
        assert!(store.sessions.policy().time_to_idle().is_none());
    }
}
