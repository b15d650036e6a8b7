//! Production [`Transport`] over HTTPS.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Every call is bounded by a global timeout;
//! a call that times out fails and is not retried.

use std::time::Duration;

use async_trait::async_trait;

use super::{ApiRequest, ApiResponse, Transport};
use crate::error::EvalError;

/// Default bound on one platform API call.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        HttpTransport {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, EvalError> {
        let agent = self.agent.clone();
        let url = self.url_for(&request.path);

        tokio::task::spawn_blocking(move || {
            let mut builder = agent.post(&url);
            for (key, value) in &request.query {
                builder = builder.query(key, value);
            }
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let mut response =
                builder
                    .send_json(&request.body)
                    .map_err(|e| EvalError::Transport {
                        status: None,
                        body: e.to_string(),
                    })?;

            let status = response.status().as_u16();
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| EvalError::Transport {
                    status: Some(status),
                    body: format!("failed to read response body: {e}"),
                })?;

            Ok(ApiResponse { status, body })
        })
        .await
        .map_err(|e| EvalError::Transport {
            status: None,
            body: format!("task join error: {e}"),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let transport = HttpTransport::new("https://cad.example.com/api/", DEFAULT_API_TIMEOUT);
        assert_eq!(
            transport.url_for("/v5/partstudios/d/1/w/2/e/3/featurescript"),
            "https://cad.example.com/api/v5/partstudios/d/1/w/2/e/3/featurescript"
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        // Port 9 on localhost (discard) is closed in test environments.
        let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2));
        let err = transport
            .send(ApiRequest::post("/x", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Transport { status: None, .. }));
    }
}
