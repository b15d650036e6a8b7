/// All errors that can be returned by a [`SessionStore`](crate::SessionStore).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A backend-specific failure (lock poisoning, serialization, etc.).
    #[error("session backend error: {0}")]
    Backend(String),
}
