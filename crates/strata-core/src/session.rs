//! Per-session cursor state.
//!
//! Searches store their arguments here under an opaque cursor id; page
//! fetches recompute the search from the stored arguments. The cursor is
//! removed by whichever fetch first serves the last page.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use strata_proto::Filter;

/// The arguments of one stored search.
#[derive(Debug, Clone)]
pub struct SearchArgs {
    /// Model class searched.
    pub class_name: String,
    /// Equality filters.
    pub filters: Vec<Filter>,
}

/// One client session with its cursor table.
pub struct Session {
    id: String,
    last_activity: AtomicU64,
    cursors: DashMap<String, SearchArgs>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            last_activity: AtomicU64::new(now_timestamp()),
            cursors: DashMap::new(),
        }
    }

    /// The session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record activity on this session.
    pub fn touch(&self) {
        self.last_activity.store(now_timestamp(), Ordering::SeqCst);
    }

    /// Whether the session has been idle past the timeout.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        let last = self.last_activity.load(Ordering::SeqCst);
        now_timestamp().saturating_sub(last) > timeout.as_secs()
    }

    /// Store search arguments, returning a fresh opaque cursor id.
    pub fn store_cursor(&self, args: SearchArgs) -> String {
        let cursor_id = uuid::Uuid::new_v4().simple().to_string();
        self.cursors.insert(cursor_id.clone(), args);
        cursor_id
    }

    /// Look up stored search arguments.
    pub fn cursor(&self, cursor_id: &str) -> Option<SearchArgs> {
        self.cursors.get(cursor_id).map(|entry| entry.clone())
    }

    /// Remove a cursor. Returns whether it existed.
    pub fn remove_cursor(&self, cursor_id: &str) -> bool {
        self.cursors.remove(cursor_id).is_some()
    }

    /// Number of live cursors.
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }
}

fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Manages all active sessions.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    timeout: Duration,
}

impl SessionManager {
    /// Create a manager with the given idle timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout,
        }
    }

    /// Get or create the session for a client-supplied id, touching it.
    pub fn session(&self, id: &str) -> Arc<Session> {
        let session = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new(id.to_string())))
            .clone();
        session.touch();
        session
    }

    /// Number of active sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle past the timeout. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let timeout = self.timeout;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_expired(timeout));
        before - self.sessions.len()
    }
}
