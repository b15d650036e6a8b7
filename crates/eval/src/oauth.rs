//! OAuth2 authorization-code and refresh-token exchanges against the
//! platform's authorization server.
//!
//! [`TokenProvider`] is the seam: the sign-in routes and the
//! [`RefreshingEvaluator`](crate::RefreshingEvaluator) both receive one
//! explicitly rather than looking up a registered strategy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camel_session::{Profile, TokenPair};

use crate::error::OAuthError;

/// Registered client credentials and endpoint URLs.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_url: String,
    pub token_url: String,
    pub user_profile_url: String,
    /// Absolute URL of the gateway's OAuth callback route.
    pub redirect_url: String,
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("user_profile_url", &self.user_profile_url)
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// URL that starts the authorization-code flow. `state` is returned
    /// unchanged to the callback.
    fn authorize_url(&self, state: Option<&str>) -> String;

    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenPair, OAuthError>;

    /// Exchange a refresh token for a new token pair.
    ///
    /// When the server does not rotate the refresh token, the returned pair
    /// carries the one that was passed in.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, OAuthError>;

    /// Fetch the signed-in user's profile.
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, OAuthError>;
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    fn authorize_url(&self, state: Option<&str>) -> String {
        (**self).authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenPair, OAuthError> {
        (**self).exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, OAuthError> {
        (**self).refresh(refresh_token).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, OAuthError> {
        (**self).fetch_profile(access_token).await
    }
}

// ──────────────────────────────────────────────
// OAuthClient
// ──────────────────────────────────────────────

/// [`TokenProvider`] over HTTPS using `ureq` inside `spawn_blocking`.
pub struct OAuthClient {
    config: OAuthConfig,
    agent: ureq::Agent,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, timeout: Duration) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        OAuthClient {
            config,
            agent: ureq::Agent::new_with_config(agent_config),
        }
    }

    async fn post_token_form(
        &self,
        mut form: Vec<(&'static str, String)>,
    ) -> Result<serde_json::Value, OAuthError> {
        let agent = self.agent.clone();
        let url = self.config.token_url.clone();
        form.push(("client_id", self.config.client_id.clone()));
        form.push(("client_secret", self.config.client_secret.clone()));

        run_blocking(move || {
            let response = agent
                .post(&url)
                .header("Accept", "application/json")
                .send_form(form)
                .map_err(|e| OAuthError::Transport(e.to_string()))?;
            read_json(response)
        })
        .await
    }
}

#[async_trait]
impl TokenProvider for OAuthClient {
    fn authorize_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}",
            self.config.authorization_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_url),
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenPair, OAuthError> {
        let json = self
            .post_token_form(vec![
                ("grant_type", "authorization_code".to_string()),
                ("code", code.to_string()),
                ("redirect_uri", self.config.redirect_url.clone()),
            ])
            .await?;
        parse_token_response(&json, None)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, OAuthError> {
        let json = self
            .post_token_form(vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.to_string()),
            ])
            .await?;
        parse_token_response(&json, Some(refresh_token))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, OAuthError> {
        let agent = self.agent.clone();
        let url = self.config.user_profile_url.clone();
        let bearer = format!("Bearer {access_token}");

        let json = run_blocking(move || {
            let response = agent
                .get(&url)
                .header("Authorization", &bearer)
                .header("Accept", "application/json")
                .call()
                .map_err(|e| OAuthError::Transport(e.to_string()))?;
            read_json(response)
        })
        .await?;

        Profile::from_json(&json)
            .ok_or_else(|| OAuthError::InvalidResponse("profile without an id".to_string()))
    }
}

async fn run_blocking<F>(f: F) -> Result<serde_json::Value, OAuthError>
where
    F: FnOnce() -> Result<serde_json::Value, OAuthError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OAuthError::Transport(format!("task join error: {e}")))?
}

fn read_json(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<serde_json::Value, OAuthError> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| OAuthError::Transport(format!("failed to read response body: {e}")))?;
    if !(200..300).contains(&status) {
        return Err(OAuthError::Http { status, body });
    }
    serde_json::from_str(&body)
        .map_err(|e| OAuthError::InvalidResponse(format!("response is not JSON: {e}")))
}

/// Read `access_token` / `refresh_token` from a token endpoint response.
pub fn parse_token_response(
    json: &serde_json::Value,
    previous_refresh_token: Option<&str>,
) -> Result<TokenPair, OAuthError> {
    let access_token = json
        .get("access_token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::InvalidResponse("missing access_token".to_string()))?;
    let refresh_token = json
        .get("refresh_token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .or(previous_refresh_token)
        .map(str::to_string);
    Ok(TokenPair::new(access_token, refresh_token))
}
