//! Session cookie handling and the sign-in gate for `/action/*`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use camel_session::{Identity, SessionId};

use super::state::AppState;

pub(crate) const SESSION_COOKIE: &str = "camel_session";

/// Cookie lifetime in seconds.
const SESSION_MAX_AGE: u64 = 24 * 60 * 60;

/// Identity of the signed-in caller, placed in request extensions by
/// [`require_session`].
#[derive(Clone)]
pub(crate) struct CurrentIdentity(pub(crate) Arc<Identity>);

/// Session id from the `Cookie` header, if present and well formed.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value.trim()))
}

pub(crate) fn session_cookie(session: &SessionId) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={SESSION_MAX_AGE}",
        session.as_str()
    )
}

pub(crate) fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0")
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::warn!("redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Pass requests with a live session through; send everyone else to the
/// authorization server, remembering where they were going.
pub(crate) async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(session) = session_from_headers(request.headers()) {
        match state.sessions.get(&session).await {
            Ok(Some(identity)) => {
                request.extensions_mut().insert(CurrentIdentity(identity));
                return next.run(request).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    let original = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    tracing::debug!(path = %original, "no session, redirecting to sign-in");
    found(&state.tokens.authorize_url(Some(&original)))
}

/// Whether `target` may be used as a post-sign-in redirect: a local absolute
/// path or an https URL.
pub(crate) fn is_safe_return_target(target: &str) -> bool {
    if let Some(rest) = target.strip_prefix('/') {
        return !rest.starts_with('/') && !rest.starts_with('\\');
    }
    target
        .strip_prefix("https://")
        .is_some_and(|host| !host.is_empty() && !host.starts_with('/'))
}
