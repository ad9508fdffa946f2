//! In-memory session history.
//!
//! Sessions are keyed by an opaque caller-supplied id. The store keeps at
//! most `max_sessions` transcripts; creating one beyond that evicts the
//! least-recently-used session. Each transcript sits behind its own async
//! mutex so the chat pipeline can hold one session stable across a whole
//! read-generate-append cycle while other sessions proceed in parallel.
//!
//! Transcripts are append-only and live only for the process lifetime.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tokio::sync::Mutex as AsyncMutex;

use crate::models::Message;

/// Shared handle on one session's transcript.
pub type SessionHandle = Arc<AsyncMutex<Vec<Message>>>;

/// LRU map from session id to transcript.
pub struct HistoryStore {
    sessions: Mutex<LruCache<String, SessionHandle>>,
}

impl HistoryStore {
    /// Create a store that keeps at most `max_sessions` transcripts.
    pub fn new(max_sessions: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The session's transcript handle, created empty if absent. Touching a
    /// session marks it most recently used.
    pub fn session(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .get_or_insert(id.to_string(), || Arc::new(AsyncMutex::new(Vec::new())))
            .clone()
    }

    /// Append a message to a session's transcript, creating the session if
    /// needed.
    pub async fn append(&self, id: &str, message: Message) {
        let handle = self.session(id);
        handle.lock().await.push(message);
    }

    /// Snapshot of a session's messages in insertion order. Unknown ids
    /// yield an empty history and do not create the session.
    pub async fn history(&self, id: &str) -> Vec<Message> {
        let handle = self.lookup(id);
        match handle {
            Some(h) => h.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Empty a session's transcript. The session key stays alive, so a
    /// cleared session is a fresh conversation rather than a forgotten one.
    pub async fn clear(&self, id: &str) {
        if let Some(handle) = self.lookup(id) {
            handle.lock().await.clear();
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.get(id).cloned()
    }
}
