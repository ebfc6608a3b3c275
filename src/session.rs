//! Session Store: holds the SQL awaiting human approval between an
//! `analyze` call and the matching `execute` call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::context::DatabaseContext;
use crate::planner::Plan;

/// Default time a pending session stays claimable before the sweeper drops
/// it, used when `SESSION_TTL_SECONDS` isn't set.
pub const DEFAULT_TTL_SECONDS: u64 = 900;

/// Interval between sweeper passes.
const SWEEP_INTERVAL_SECS: u64 = 30;

/// Everything the executor needs once a session's SQL is approved: the
/// generated SQL was handed back to the caller already, but the plan and
/// context are needed again for debugging and interpretation.
#[derive(Debug, Clone)]
pub struct Session {
    pub utterance: String,
    pub plan: Plan,
    pub context: DatabaseContext,
    pub generated_sql: String,
}

struct Entry {
    session: Session,
    created_at: Instant,
}

/// In-memory store of sessions awaiting `execute`. `put` is atomic insert,
/// `take` is atomic read-and-delete so two concurrent `execute` calls for
/// the same id can never both succeed.
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates a store with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Creates a store with the default TTL.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECONDS))
    }

    /// Stores a session under a freshly generated id and returns it.
    pub async fn put(&self, session: Session) -> String {
        let id = Uuid::new_v4().to_string();
        self.entries.lock().await.insert(
            id.clone(),
            Entry {
                session,
                created_at: Instant::now(),
            },
        );
        id
    }

    /// Removes and returns the session for `id`, if it exists and hasn't
    /// expired. This is the only way a session is consumed: once taken, a
    /// second `take` for the same id returns `None`.
    pub async fn take(&self, id: &str) -> Option<Session> {
        let mut entries = self.entries.lock().await;
        let entry = entries.remove(id)?;
        if entry.created_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.session)
    }

    /// Drops every entry older than the TTL. Intended to run periodically
    /// via `spawn_sweeper`.
    async fn sweep(&self) {
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Spawns a background task that periodically evicts expired sessions.
/// Returns the task's handle so the caller can abort it on shutdown.
pub fn spawn_sweeper(store: Arc<SessionStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            store.sweep().await;
        }
    })
}
