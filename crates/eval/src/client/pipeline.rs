//! Ordered request/response transforms applied around a [`Transport`](super::Transport) call.

use camel_session::Identity;

use super::{ApiRequest, ApiResponse};
use crate::error::EvalError;

/// Longest response body kept in a transport error message.
const MAX_ERROR_BODY: usize = 512;

/// `Request -> Request` transform.
pub trait RequestLayer: Send + Sync {
    fn apply(&self, request: ApiRequest, identity: &Identity) -> ApiRequest;
}

/// `Response -> Result<Response, Error>` transform.
pub trait ResponseLayer: Send + Sync {
    fn inspect(&self, response: ApiResponse) -> Result<ApiResponse, EvalError>;
}

/// Attaches the identity's current access token.
pub struct BearerAuth;

impl RequestLayer for BearerAuth {
    fn apply(&self, mut request: ApiRequest, identity: &Identity) -> ApiRequest {
        request.set_header(
            "Authorization",
            format!("Bearer {}", identity.access_token()),
        );
        request.set_header("Accept", "application/json".to_string());
        request
    }
}

/// Classifies the response status: 2xx passes, 401 is
/// [`EvalError::Unauthorized`], anything else a transport error.
pub struct StatusCheck;

impl ResponseLayer for StatusCheck {
    fn inspect(&self, response: ApiResponse) -> Result<ApiResponse, EvalError> {
        match response.status {
            200..=299 => Ok(response),
            401 => Err(EvalError::Unauthorized),
            status => Err(EvalError::Transport {
                status: Some(status),
                body: truncate(response.body),
            }),
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

/// Request layers run in insertion order before the transport call;
/// response layers run in insertion order after it.
#[derive(Default)]
pub struct Pipeline {
    request_layers: Vec<Box<dyn RequestLayer>>,
    response_layers: Vec<Box<dyn ResponseLayer>>,
}

impl Pipeline {
    /// Empty pipeline: requests go out untouched and every status passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// [`BearerAuth`] then [`StatusCheck`].
    pub fn standard() -> Self {
        Pipeline::new()
            .with_request_layer(BearerAuth)
            .with_response_layer(StatusCheck)
    }

    pub fn with_request_layer(mut self, layer: impl RequestLayer + 'static) -> Self {
        self.request_layers.push(Box::new(layer));
        self
    }

    pub fn with_response_layer(mut self, layer: impl ResponseLayer + 'static) -> Self {
        self.response_layers.push(Box::new(layer));
        self
    }

    pub fn prepare(&self, request: ApiRequest, identity: &Identity) -> ApiRequest {
        self.request_layers
            .iter()
            .fold(request, |req, layer| layer.apply(req, identity))
    }

    pub fn inspect(&self, response: ApiResponse) -> Result<ApiResponse, EvalError> {
        self.response_layers
            .iter()
            .try_fold(response, |resp, layer| layer.inspect(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_identity;

    struct Tag(&'static str);

    impl RequestLayer for Tag {
        fn apply(&self, mut request: ApiRequest, _identity: &Identity) -> ApiRequest {
            let seen = request.header("x-trace").unwrap_or("").to_string();
            request.set_header("X-Trace", format!("{seen}{}", self.0));
            request
        }
    }

    #[test]
    fn request_layers_run_in_order() {
        let identity = test_identity("a1", None);
        let pipeline = Pipeline::new()
            .with_request_layer(Tag("1"))
            .with_request_layer(Tag("2"));
        let request = pipeline.prepare(ApiRequest::post("/p", serde_json::json!({})), &identity);
        assert_eq!(request.header("X-Trace"), Some("12"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn bearer_auth_replaces_stale_header() {
        let identity = test_identity("fresh", None);
        let mut request = ApiRequest::post("/p", serde_json::json!({}));
        request.set_header("authorization", "Bearer stale".to_string());
        let request = BearerAuth.apply(request, &identity);
        assert_eq!(request.header("Authorization"), Some("Bearer fresh"));
        assert_eq!(
            request
                .headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("authorization"))
                .count(),
            1
        );
    }

    #[test]
    fn status_check_classifies() {
        let ok = ApiResponse {
            status: 204,
            body: String::new(),
        };
        assert!(StatusCheck.inspect(ok).is_ok());

        let unauthorized = ApiResponse {
            status: 401,
            body: String::new(),
        };
        assert_eq!(
            StatusCheck.inspect(unauthorized),
            Err(EvalError::Unauthorized)
        );

        let long = ApiResponse {
            status: 500,
            body: "é".repeat(600),
        };
        match StatusCheck.inspect(long) {
            Err(EvalError::Transport { status, body }) => {
                assert_eq!(status, Some(500));
                assert!(body.len() <= MAX_ERROR_BODY + '…'.len_utf8());
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn empty_pipeline_passes_everything() {
        let response = ApiResponse {
            status: 401,
            body: "x".to_string(),
        };
        assert!(Pipeline::new().inspect(response).is_ok());
    }
}
