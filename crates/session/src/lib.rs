//! Session-scoped credential storage for the camel gateway.
//!
//! An [`Identity`] is the OAuth2 token pair plus user profile produced by a
//! completed sign-in. It is shared as `Arc<Identity>` between the session
//! store and every in-flight request of that session, so a token refresh
//! performed by one request is visible to all of them.

mod error;
mod identity;
mod memory;
mod traits;

pub use error::SessionError;
pub use identity::{Identity, Profile, SessionId, TokenPair};
pub use memory::{MemorySessionStore, DEFAULT_PRUNE_PERIOD, DEFAULT_SESSION_TTL};
pub use traits::SessionStore;
