//! Registry of concurrent sessions, keyed by id.
//!
//! Each session's mutable state is isolated behind its own handle; the
//! registry itself needs only simple mutual exclusion on insert, lookup,
//! and remove, so sessions never contend with each other.

use crate::error::{LivecapError, Result};
use crate::pipeline::orchestrator::EngineHandle;
use crate::pipeline::types::TranscriptSegment;
use crate::session::session::{Session, SessionConfig, SessionState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Serializable status view of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub segment_count: usize,
    pub speaker_count: usize,
    pub degraded_chunks: u32,
    pub failure: Option<String>,
}

impl SessionStatus {
    fn of(session: &Session) -> Self {
        Self {
            id: session.id().to_string(),
            state: session.state(),
            created_at: session.created_at(),
            segment_count: session.segment_count(),
            speaker_count: session.speaker_count(),
            degraded_chunks: session.degraded_chunks(),
            failure: session.failure().map(|f| f.to_string()),
        }
    }
}

struct SessionEntry {
    session: Session,
    engine: Option<EngineHandle>,
}

/// Top-level registry: create, look up, cancel, and delete sessions by id.
pub struct SessionRegistry {
    config: SessionConfig,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    counter: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry; new sessions inherit `config`.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates and registers a new session, returning its handle.
    pub fn create(&self) -> Session {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}_{:04}", Utc::now().format("%Y%m%d_%H%M%S"), n);
        let session = Session::new(&id, self.config);
        self.lock().insert(
            id,
            SessionEntry {
                session: session.clone(),
                engine: None,
            },
        );
        session
    }

    /// Associates a running engine with its session, so deleting the session
    /// can shut the pipeline down.
    pub fn attach_engine(&self, id: &str, engine: EngineHandle) -> Result<()> {
        let mut sessions = self.lock();
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| LivecapError::SessionNotFound { id: id.to_string() })?;
        entry.engine = Some(engine);
        Ok(())
    }

    /// Looks up a session handle.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.lock().get(id).map(|entry| entry.session.clone())
    }

    /// Status of one session.
    pub fn status(&self, id: &str) -> Result<SessionStatus> {
        self.get(id)
            .map(|session| SessionStatus::of(&session))
            .ok_or_else(|| LivecapError::SessionNotFound { id: id.to_string() })
    }

    /// Ordered transcript so far; available mid-session.
    pub fn transcript(&self, id: &str) -> Result<Vec<TranscriptSegment>> {
        self.get(id)
            .map(|session| session.segments())
            .ok_or_else(|| LivecapError::SessionNotFound { id: id.to_string() })
    }

    /// All sessions, in no particular order.
    pub fn list(&self) -> Vec<SessionStatus> {
        self.lock()
            .values()
            .map(|entry| SessionStatus::of(&entry.session))
            .collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cancels a session without removing it.
    pub fn cancel(&self, id: &str, reason: &str) -> Result<()> {
        let sessions = self.lock();
        let entry = sessions
            .get(id)
            .ok_or_else(|| LivecapError::SessionNotFound { id: id.to_string() })?;
        match &entry.engine {
            Some(engine) => engine.request_cancel(reason),
            None => entry.session.cancel(reason),
        }
        Ok(())
    }

    /// Removes a session, shutting down its pipeline if one is attached.
    pub fn delete(&self, id: &str) -> Result<()> {
        let entry = self
            .lock()
            .remove(id)
            .ok_or_else(|| LivecapError::SessionNotFound { id: id.to_string() })?;
        if let Some(engine) = entry.engine {
            // No-op on a session that already reached a terminal state
            engine.cancel("session deleted");
        }
        Ok(())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
