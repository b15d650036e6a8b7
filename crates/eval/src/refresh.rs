//! Transparent token refresh around an [`Evaluator`].
//!
//! Per logical call the interceptor moves through
//! `Initial -> Refreshing -> Retrying`. A 401 in `Initial` triggers one
//! refresh-token exchange and one replay; a 401 in `Retrying` ends the call
//! with [`EvalError::Auth`]. Every other outcome is returned as-is.
//!
//! Refreshes are single-flight per identity: the exchange runs under the
//! identity's refresh lock, and a caller that finds the rejected token
//! already replaced reuses the new one instead of exchanging again. Most
//! providers invalidate a refresh token after one use, so a second exchange
//! would fail and sign the user out.

use std::sync::Arc;

use async_trait::async_trait;
use camel_session::{Identity, SessionStore};

use crate::client::Evaluator;
use crate::context::DocumentContext;
use crate::error::EvalError;
use crate::oauth::TokenProvider;
use crate::value::TypedValue;

/// Where one logical call is in the refresh state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallState {
    /// First attempt with the identity's current token.
    Initial,
    /// The token was rejected; exchange the refresh token.
    Refreshing { rejected_token: String },
    /// Replay with the refreshed token. No further refresh is allowed.
    Retrying,
}

pub struct RefreshingEvaluator<E, P> {
    inner: E,
    provider: P,
    store: Option<Arc<dyn SessionStore>>,
}

impl<E: Evaluator, P: TokenProvider> RefreshingEvaluator<E, P> {
    /// Refreshed tokens are written straight onto the identity.
    pub fn new(inner: E, provider: P) -> Self {
        RefreshingEvaluator {
            inner,
            provider,
            store: None,
        }
    }

    /// Refreshed tokens are saved through `store`.
    pub fn with_store(inner: E, provider: P, store: Arc<dyn SessionStore>) -> Self {
        RefreshingEvaluator {
            inner,
            provider,
            store: Some(store),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn refresh(&self, identity: &Identity, rejected_token: &str) -> Result<(), EvalError> {
        let _guard = identity.refresh_lock().lock().await;

        if identity.access_token() != rejected_token {
            tracing::debug!(
                user = %identity.profile().id,
                "access token already refreshed by a concurrent call"
            );
            return Ok(());
        }

        let refresh_token = identity
            .refresh_token()
            .ok_or_else(|| EvalError::Auth("no refresh token for this session".to_string()))?;

        let tokens = self.provider.refresh(&refresh_token).await.map_err(|e| {
            tracing::warn!(user = %identity.profile().id, error = %e, "token refresh failed");
            EvalError::Auth(format!("token refresh failed: {e}"))
        })?;

        match &self.store {
            Some(store) => store.update(identity, tokens).await.map_err(|e| {
                EvalError::Auth(format!("could not save refreshed tokens: {e}"))
            })?,
            None => identity.set_tokens(tokens),
        }
        tracing::info!(user = %identity.profile().id, "access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl<E: Evaluator, P: TokenProvider> Evaluator for RefreshingEvaluator<E, P> {
    async fn evaluate(
        &self,
        context: &DocumentContext,
        script: &str,
    ) -> Result<Option<TypedValue>, EvalError> {
        let identity = &context.identity;
        let mut state = CallState::Initial;

        loop {
            state = match state {
                CallState::Refreshing { rejected_token } => {
                    self.refresh(identity, &rejected_token).await?;
                    CallState::Retrying
                }
                attempt => {
                    let token = identity.access_token();
                    match self.inner.evaluate(context, script).await {
                        Err(EvalError::Unauthorized) if attempt == CallState::Initial => {
                            CallState::Refreshing {
                                rejected_token: token,
                            }
                        }
                        Err(EvalError::Unauthorized) => {
                            return Err(EvalError::Auth(
                                "access token rejected after refresh".to_string(),
                            ))
                        }
                        outcome => return outcome,
                    }
                }
            };
        }
    }
}
