//! Application state shared across request handlers.

use std::sync::Arc;

use camel_eval::{
    EvaluationClient, Evaluator, FileResolver, HttpTransport, OAuthClient, RefreshingEvaluator,
    TokenProvider,
};
use camel_session::{MemorySessionStore, SessionStore, DEFAULT_PRUNE_PERIOD};
use time::OffsetDateTime;

use crate::config::GatewayConfig;

pub(crate) struct AppState {
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) resolver: FileResolver<Arc<dyn Evaluator>>,
    /// Target of `GET /`.
    pub(crate) main_page_redirect: String,
    pub(crate) started_at: OffsetDateTime,
}

impl AppState {
    pub(crate) fn new(
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<dyn TokenProvider>,
        evaluator: Arc<dyn Evaluator>,
        main_page_redirect: String,
    ) -> Self {
        AppState {
            sessions,
            tokens,
            resolver: FileResolver::new(evaluator),
            main_page_redirect,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    /// Wire the production stack: in-memory sessions with a background
    /// pruner, the HTTPS token endpoint and the refreshing evaluation client.
    pub(crate) fn from_config(config: &GatewayConfig) -> Self {
        let memory = Arc::new(MemorySessionStore::new(config.session_ttl));
        memory.spawn_pruner(DEFAULT_PRUNE_PERIOD);
        let sessions: Arc<dyn SessionStore> = memory;

        let tokens: Arc<dyn TokenProvider> =
            Arc::new(OAuthClient::new(config.oauth.clone(), config.api_timeout));

        let client = EvaluationClient::new(HttpTransport::new(&config.api_url, config.api_timeout));
        let evaluator: Arc<dyn Evaluator> = Arc::new(RefreshingEvaluator::with_store(
            client,
            tokens.clone(),
            sessions.clone(),
        ));

        AppState::new(sessions, tokens, evaluator, config.main_page_redirect.clone())
    }
}
