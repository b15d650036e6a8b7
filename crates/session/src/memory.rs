//! In-memory [`SessionStore`] with sliding expiry and periodic pruning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::SessionError;
use crate::identity::{Identity, SessionId, TokenPair};
use crate::traits::SessionStore;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between prune sweeps: 24 hours.
pub const DEFAULT_PRUNE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    identity: Arc<Identity>,
    expires_at: Instant,
}

/// Session store backed by a process-local map.
///
/// Each successful `get` extends the session by the full TTL.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        MemorySessionStore {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of sessions currently held, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a background task that prunes expired sessions every `period`.
    ///
    /// The task holds only a weak reference and exits once the store is dropped.
    pub fn spawn_pruner(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(strong) = store.upgrade() else {
                    break;
                };
                match strong.prune_expired().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!(pruned = n, "pruned expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "session prune failed"),
                }
            }
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, Entry>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Backend(format!("lock poisoned: {e}")))
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        MemorySessionStore::new(DEFAULT_SESSION_TTL)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session: &SessionId) -> Result<Option<Arc<Identity>>, SessionError> {
        let mut sessions = self.lock()?;
        let now = Instant::now();
        match sessions.get_mut(session) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Ok(Some(Arc::clone(&entry.identity)))
            }
            Some(_) => {
                sessions.remove(session);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session: SessionId, identity: Arc<Identity>) -> Result<(), SessionError> {
        let expires_at = Instant::now() + self.ttl;
        self.lock()?.insert(
            session,
            Entry {
                identity,
                expires_at,
            },
        );
        Ok(())
    }

    async fn update(&self, identity: &Identity, tokens: TokenPair) -> Result<(), SessionError> {
        let bound = self
            .lock()?
            .values()
            .any(|entry| std::ptr::eq(Arc::as_ptr(&entry.identity), identity));
        if !bound {
            // In-flight requests may outlive their session; they still get the new tokens.
            tracing::debug!(
                user = %identity.profile().id,
                "refreshed identity is no longer bound to a session"
            );
        }
        identity.set_tokens(tokens);
        Ok(())
    }

    async fn remove(&self, session: &SessionId) -> Result<(), SessionError> {
        self.lock()?.remove(session);
        Ok(())
    }

    async fn prune_expired(&self) -> Result<usize, SessionError> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        let now = Instant::now();
        sessions.retain(|_, entry| entry.expires_at > now);
        Ok(before - sessions.len())
    }
}
