use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::identity::{Identity, SessionId, TokenPair};

/// Server-side binding between sessions and their [`Identity`].
///
/// Exactly one identity is bound to a session at a time. Implementations
/// keep identities for the session lifetime only and must never persist
/// tokens to durable storage.
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Look up the identity bound to a session.
    ///
    /// Expired sessions are reported as `Ok(None)`.
    async fn get(&self, session: &SessionId) -> Result<Option<Arc<Identity>>, SessionError>;

    /// Bind an identity to a session, replacing any previous binding.
    async fn put(&self, session: SessionId, identity: Arc<Identity>) -> Result<(), SessionError>;

    /// Store a refreshed token pair on an identity.
    ///
    /// The identity is mutated in place, so every request holding the same
    /// `Arc<Identity>` sees the new tokens.
    async fn update(&self, identity: &Identity, tokens: TokenPair) -> Result<(), SessionError>;

    /// Unbind a session (sign-out).
    async fn remove(&self, session: &SessionId) -> Result<(), SessionError>;

    /// Drop every expired session. Returns the number removed.
    async fn prune_expired(&self) -> Result<usize, SessionError>;
}
