//! Evaluation client: one authenticated call to the FeatureScript endpoint.
//!
//! Three pieces compose here:
//! - [`Transport`] moves an [`ApiRequest`] over the wire ([`http::HttpTransport`]
//!   in production, scripted mocks in tests)
//! - [`pipeline::Pipeline`] applies ordered request and response layers
//!   (bearer token, status classification) around the transport
//! - [`EvaluationClient`] builds the request from a [`DocumentContext`] and
//!   decodes the `result` field of the response

pub mod http;
pub mod pipeline;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::DocumentContext;
use crate::error::EvalError;
use crate::value::TypedValue;

use self::pipeline::Pipeline;

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

/// A JSON POST to the platform API, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl ApiRequest {
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        ApiRequest {
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value of the same name.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

/// Status and raw body of a platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

// ──────────────────────────────────────────────
// Traits
// ──────────────────────────────────────────────

/// Sends a request and returns whatever status the platform answered with.
///
/// Only failures to obtain a response at all (timeouts, connection errors)
/// are errors; they are reported as `EvalError::Transport { status: None, .. }`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, EvalError>;
}

/// Evaluates a script against a document.
///
/// `Ok(None)` means the script produced no value (the engine reports a
/// thrown script error as a `null` result). Interpreting the value, including
/// its tag, is the caller's job.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        context: &DocumentContext,
        script: &str,
    ) -> Result<Option<TypedValue>, EvalError>;
}

#[async_trait]
impl<T: Evaluator + ?Sized> Evaluator for Arc<T> {
    async fn evaluate(
        &self,
        context: &DocumentContext,
        script: &str,
    ) -> Result<Option<TypedValue>, EvalError> {
        (**self).evaluate(context, script).await
    }
}

// ──────────────────────────────────────────────
// EvaluationClient
// ──────────────────────────────────────────────

/// [`Evaluator`] that performs exactly one transport call per evaluation.
pub struct EvaluationClient<T> {
    transport: T,
    pipeline: Pipeline,
}

impl<T: Transport> EvaluationClient<T> {
    /// Client with the standard pipeline (bearer token, status check).
    pub fn new(transport: T) -> Self {
        Self::with_pipeline(transport, Pipeline::standard())
    }

    pub fn with_pipeline(transport: T, pipeline: Pipeline) -> Self {
        EvaluationClient {
            transport,
            pipeline,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The request that `evaluate` would send, before pipeline layers run.
    pub fn build_request(context: &DocumentContext, script: &str) -> ApiRequest {
        let mut request = ApiRequest::post(
            context.featurescript_path(),
            serde_json::json!({ "script": script }),
        );
        request.query = context.query();
        request
    }
}

#[async_trait]
impl<T: Transport> Evaluator for EvaluationClient<T> {
    async fn evaluate(
        &self,
        context: &DocumentContext,
        script: &str,
    ) -> Result<Option<TypedValue>, EvalError> {
        let request = self
            .pipeline
            .prepare(Self::build_request(context, script), &context.identity);
        tracing::debug!(path = %request.path, "evaluating featurescript");

        let response = self.transport.send(request).await?;
        let response = self.pipeline.inspect(response)?;
        decode_result(&response.body)
    }
}

/// Extract `result` from an evaluation response body.
pub fn decode_result(body: &str) -> Result<Option<TypedValue>, EvalError> {
    let envelope: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| EvalError::Decode(format!("response is not JSON: {e}")))?;
    match envelope.get("result") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(result) => TypedValue::from_json(result)
            .map(Some)
            .map_err(|e| EvalError::Decode(e.to_string())),
    }
}
