//! `camel-gateway serve` -- the HTTP front end.
//!
//! Endpoints:
//! - GET /                                                   - Redirect to the project page
//! - GET /health                                             - Liveness
//! - GET /oauth/signin                                       - Start the OAuth flow
//! - GET /oauth/redirect                                     - OAuth callback
//! - GET /oauth/denied                                       - Access denied notice
//! - GET /oauth/signout                                      - Drop the session
//! - GET /action/d/{did}/{wv}/{wvid}/e/{eid}/panel           - File list (HTML)
//! - GET /action/d/{did}/{wv}/{wvid}/e/{eid}/f/{fileName}/download - One file
//! - GET /action/d/{did}/{wv}/{wvid}/e/{eid}/files           - Every file (JSON)
//!
//! `/action/*` requires a session cookie.

mod actions;
mod oauth;
mod session;
mod state;


use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use time::format_description::well_known::Rfc3339;
use tower_http::trace::TraceLayer;

use self::actions::{handle_download, handle_files, handle_panel};
use self::oauth::{handle_callback, handle_denied, handle_signin, handle_signout};
use self::session::{found, require_session};
pub(crate) use self::state::AppState;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({ "error": message })))
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let actions = Router::new()
        .route("/action/d/{did}/{wv}/{wvid}/e/{eid}/panel", get(handle_panel))
        .route(
            "/action/d/{did}/{wv}/{wvid}/e/{eid}/f/{fileName}/download",
            get(handle_download),
        )
        .route("/action/d/{did}/{wv}/{wvid}/e/{eid}/files", get(handle_files))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/oauth/signin", get(handle_signin))
        .route("/oauth/redirect", get(handle_callback))
        .route("/oauth/denied", get(handle_denied))
        .route("/oauth/signout", get(handle_signout))
        .merge(actions)
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(
    port: u16,
    state: Arc<AppState>,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        tracing::info!(%socket_addr, "camel gateway listening on https");
        axum_server::bind_rustls(socket_addr, config)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "camel gateway listening on http");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "could not install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// GET /
async fn handle_root(State(state): State<Arc<AppState>>) -> Response {
    found(&state.main_page_redirect)
}

/// GET /health
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.format(&Rfc3339).ok(),
    });
    (StatusCode::OK, Json(response))
}

/// Fallback handler for unmatched routes.
async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}
