use std::fmt;
use std::sync::RwLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;

// ──────────────────────────────────────────────
// SessionId
// ──────────────────────────────────────────────

/// Opaque session identifier carried in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier from 32 random bytes.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        SessionId(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap an identifier read back from a cookie.
    ///
    /// Returns `None` for values that could not have come from [`generate`](Self::generate).
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 43
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| SessionId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Session ids are bearer secrets; keep them out of logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", &self.0[..self.0.len().min(6)])
    }
}

// ──────────────────────────────────────────────
// TokenPair / Profile
// ──────────────────────────────────────────────

/// An OAuth2 access token and the refresh token that can renew it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// Absent when the provider did not issue one; such identities cannot
    /// be refreshed.
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        TokenPair {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// The signed-in user's profile as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Profile {
    /// Decode a profile from the platform's user-info JSON.
    ///
    /// Only `id` is required; unknown fields are ignored.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

/// Authorization state of one signed-in session.
///
/// Tokens are mutated in place when a refresh succeeds. `refresh_lock`
/// serializes refresh exchanges for this identity so that concurrent
/// requests that all hit a 401 perform at most one exchange.
pub struct Identity {
    profile: Profile,
    tokens: RwLock<TokenPair>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Identity {
    pub fn new(profile: Profile, tokens: TokenPair) -> Self {
        Identity {
            profile,
            tokens: RwLock::new(tokens),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Snapshot of the current token pair.
    pub fn tokens(&self) -> TokenPair {
        // Recover data even if a writer panicked; the pair is replaced atomically.
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> String {
        self.tokens().access_token
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens().refresh_token
    }

    /// Replace both tokens.
    pub fn set_tokens(&self, tokens: TokenPair) {
        *self.tokens.write().unwrap_or_else(|e| e.into_inner()) = tokens;
    }

    /// Lock held for the duration of a refresh-token exchange.
    pub fn refresh_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.refresh_lock
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("profile", &self.profile)
            .field("tokens", &self.tokens())
            .finish()
    }
}
