//! Error taxonomy for remote evaluation.
//!
//! [`EvalError`] is what the transport, client and refresh layers produce.
//! [`GatewayError`] is the only error kind that crosses the
//! [`FileResolver`](crate::FileResolver) boundary; callers map its variants
//! to their own presentation.

/// Errors produced below the resolver boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The platform answered 401. Only the refresh layer acts on this.
    #[error("access token rejected by the platform")]
    Unauthorized,

    /// Re-authentication is required: the token could not be refreshed or
    /// the refreshed token was rejected too.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-2xx status other than 401, or a transport-level failure such as a
    /// timeout (`status` is `None` in that case).
    #[error("{}", transport_message(.status, .body))]
    Transport { status: Option<u16>, body: String },

    /// The response body was not the expected evaluation envelope.
    #[error("malformed evaluation response: {0}")]
    Decode(String),
}

fn transport_message(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("platform returned HTTP {code}: {body}"),
        None => format!("request to platform failed: {body}"),
    }
}

/// Errors surfaced to callers of the file resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The file is absent under both schema generations.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The stored state did not have the shape the operation expects.
    #[error("could not read the file index: {0}")]
    Schema(String),

    /// The user must sign in again.
    #[error("authentication required: {0}")]
    Auth(String),

    /// The platform could not be reached or returned an error status.
    #[error("platform request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },
}

impl From<EvalError> for GatewayError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Unauthorized => {
                GatewayError::Auth("access token rejected by the platform".to_string())
            }
            EvalError::Auth(msg) => GatewayError::Auth(msg),
            EvalError::Transport { status, body } => GatewayError::Transport {
                status,
                message: body,
            },
            EvalError::Decode(msg) => GatewayError::Schema(msg),
        }
    }
}

/// Errors from the OAuth2 token and profile endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    /// The endpoint answered with a non-2xx status.
    #[error("OAuth endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The endpoint could not be reached.
    #[error("OAuth request failed: {0}")]
    Transport(String),

    /// The endpoint answered 2xx with a body we could not use.
    #[error("invalid OAuth response: {0}")]
    InvalidResponse(String),
}
