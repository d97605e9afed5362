//! In-process session state keyed by flow token.
//!
//! Sessions accumulate every `data_exchange` payload of one flow run. The
//! store is the only mutable state shared between requests; callers receive
//! owned snapshots and never hold the lock across I/O.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

/// Inactivity window after which a session is swept (60 minutes).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

/// Sweeper period (30 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30 * 60;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub data: Map<String, Value>,
    pub last_activity: DateTime<Utc>,
}

pub trait SessionStore: Send + Sync {
    fn get(&self, token: &str) -> Option<SessionSnapshot>;

    /// Create an empty session, replacing any previous one under `token`.
    fn start(&self, token: &str, now: DateTime<Utc>) -> SessionSnapshot;

    /// Shallow-merge `partial` into the session, creating it when absent.
    fn merge(&self, token: &str, partial: &Map<String, Value>, now: DateTime<Utc>)
        -> SessionSnapshot;

    fn delete(&self, token: &str) -> bool;

    /// Remove sessions idle for longer than `ttl`; returns how many were removed.
    fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionSnapshot>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionSnapshot>> {
        match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, token: &str) -> Option<SessionSnapshot> {
        self.sessions().get(token).cloned()
    }

    fn start(&self, token: &str, now: DateTime<Utc>) -> SessionSnapshot {
        let snapshot = SessionSnapshot { data: Map::new(), last_activity: now };
        self.sessions().insert(token.to_owned(), snapshot.clone());
        snapshot
    }

    fn merge(
        &self,
        token: &str,
        partial: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> SessionSnapshot {
        let mut sessions = self.sessions();
        let session = sessions
            .entry(token.to_owned())
            .or_insert_with(|| SessionSnapshot { data: Map::new(), last_activity: now });
        for (key, value) in partial {
            session.data.insert(key.clone(), value.clone());
        }
        session.last_activity = now;
        session.clone()
    }

    fn delete(&self, token: &str) -> bool {
        self.sessions().remove(token).is_some()
    }

    fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity <= ttl);
        before - sessions.len()
    }

    fn len(&self) -> usize {
        self.sessions().len()
    }
}
