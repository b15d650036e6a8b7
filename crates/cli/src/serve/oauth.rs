//! Sign-in, callback and sign-out routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use camel_session::{Identity, SessionId};
use serde::Deserialize;

use super::session::{
    expired_session_cookie, found, is_safe_return_target, session_cookie, session_from_headers,
};
use super::state::AppState;

pub(crate) const DENIED_PATH: &str = "/oauth/denied";

#[derive(Debug, Deserialize)]
pub(crate) struct SigninParams {
    #[serde(rename = "redirectOnshapeUri")]
    redirect_onshape_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /oauth/signin
pub(crate) async fn handle_signin(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SigninParams>,
) -> Response {
    let return_to = params
        .redirect_onshape_uri
        .as_deref()
        .filter(|uri| !uri.is_empty());
    found(&state.tokens.authorize_url(return_to))
}

/// GET /oauth/redirect
pub(crate) async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = &params.error {
        tracing::info!(error = %error, "authorization denied");
        return found(DENIED_PATH);
    }
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        tracing::info!("callback without authorization code");
        return found(DENIED_PATH);
    };

    let tokens = match state.tokens.exchange_code(code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "authorization code exchange failed");
            return found(DENIED_PATH);
        }
    };
    let profile = match state.tokens.fetch_profile(&tokens.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "profile lookup failed");
            return found(DENIED_PATH);
        }
    };

    let user = profile.id.clone();
    let session = SessionId::generate();
    let identity = Arc::new(Identity::new(profile, tokens));
    if let Err(e) = state.sessions.put(session.clone(), identity).await {
        tracing::error!(error = %e, "could not store new session");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    tracing::info!(user = %user, "signed in");

    let target = params
        .state
        .as_deref()
        .filter(|target| is_safe_return_target(target))
        .unwrap_or("/");
    with_cookie(found(target), &session_cookie(&session))
}

/// GET /oauth/denied
pub(crate) async fn handle_denied() -> Html<&'static str> {
    Html(DENIED_PAGE)
}

/// GET /oauth/signout
pub(crate) async fn handle_signout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(session) = session_from_headers(&headers) {
        if let Err(e) = state.sessions.remove(&session).await {
            tracing::warn!(error = %e, "could not remove session");
        }
    }
    with_cookie(found("/"), &expired_session_cookie())
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
            response
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

const DENIED_PAGE: &str = "<!DOCTYPE html>
<html>
<head><meta charset=\"utf-8\"><title>Access denied</title></head>
<body>
<h1>Access denied</h1>
<p>The application was not granted access to your account. Close this panel and try again to sign in.</p>
</body>
</html>
";
