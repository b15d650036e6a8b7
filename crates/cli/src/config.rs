//! Gateway configuration, read once from the process environment.

use std::time::Duration;

use camel_eval::{OAuthConfig, DEFAULT_API_TIMEOUT};
use camel_session::DEFAULT_SESSION_TTL;

/// Path of the OAuth callback route, appended to the external host name.
pub(crate) const OAUTH_CALLBACK_PATH: &str = "/oauth/redirect";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Everything the server needs besides its listen address.
#[derive(Debug, Clone)]
pub(crate) struct GatewayConfig {
    pub(crate) oauth: OAuthConfig,
    /// Base URL of the platform REST API.
    pub(crate) api_url: String,
    /// Where `/` sends visitors.
    pub(crate) main_page_redirect: String,
    pub(crate) api_timeout: Duration,
    pub(crate) session_ttl: Duration,
}

impl GatewayConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as missing.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let seconds = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|&s| s > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| ConfigError::Invalid {
                        name: key,
                        message: format!("expected a positive number of seconds, got '{raw}'"),
                    }),
            }
        };

        let external_hostname = require("EXTERNAL_HOSTNAME")?;
        let redirect_url = format!(
            "https://{}{}",
            external_hostname.trim_end_matches('/'),
            OAUTH_CALLBACK_PATH
        );

        Ok(GatewayConfig {
            oauth: OAuthConfig {
                client_id: require("ONSHAPE_APP_CLIENT_ID")?,
                client_secret: require("ONSHAPE_APP_CLIENT_SECRET")?,
                authorization_url: require("ONSHAPE_AUTHORIZATION_URL")?,
                token_url: require("ONSHAPE_TOKEN_URL")?,
                user_profile_url: require("ONSHAPE_USER_PROFILE_URL")?,
                redirect_url,
            },
            api_url: require("ONSHAPE_API_URL")?,
            main_page_redirect: require("MAIN_PAGE_REDIRECT")?,
            api_timeout: seconds("CAMEL_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT)?,
            session_ttl: seconds("CAMEL_SESSION_TTL_SECS", DEFAULT_SESSION_TTL)?,
        })
    }
}
