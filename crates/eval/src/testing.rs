//! Test doubles shared by this crate's unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use camel_session::{Identity, Profile, TokenPair};

use crate::client::{ApiRequest, ApiResponse, Transport};
use crate::error::{EvalError, OAuthError};
use crate::oauth::TokenProvider;
use crate::value::TypedValue;

pub(crate) fn test_identity(access: &str, refresh: Option<&str>) -> Arc<Identity> {
    Arc::new(Identity::new(
        Profile {
            id: "user-1".to_string(),
            name: Some("Test User".to_string()),
            email: None,
        },
        TokenPair::new(access, refresh.map(str::to_string)),
    ))
}

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, EvalError> + Send + Sync>;

/// Transport that records requests and answers from a queue or a handler.
pub(crate) struct MockTransport {
    requests: Mutex<Vec<ApiRequest>>,
    queue: Mutex<VecDeque<Result<ApiResponse, EvalError>>>,
    handler: Option<Handler>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        MockTransport {
            requests: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            handler: None,
        }
    }

    pub(crate) fn with_handler(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, EvalError> + Send + Sync + 'static,
    ) -> Self {
        MockTransport {
            handler: Some(Box::new(handler)),
            ..MockTransport::new()
        }
    }

    pub(crate) fn push_result(&self, result: Option<TypedValue>) {
        let result = result.map(|v| v.to_json()).unwrap_or(serde_json::Value::Null);
        let body = serde_json::json!({ "result": result, "notices": [] }).to_string();
        self.push(Ok(ApiResponse { status: 200, body }));
    }

    pub(crate) fn push_status(&self, status: u16, body: &str) {
        self.push(Ok(ApiResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub(crate) fn push_failure(&self, message: &str) {
        self.push(Err(EvalError::Transport {
            status: None,
            body: message.to_string(),
        }));
    }

    fn push(&self, response: Result<ApiResponse, EvalError>) {
        self.queue.lock().unwrap().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, EvalError> {
        let response = match &self.handler {
            Some(handler) => handler(&request),
            None => self
                .queue
                .lock()
                .unwrap()
                .pop_front()
                .expect("MockTransport: no response queued"),
        };
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// Token provider that hands out one fixed token pair and counts exchanges.
pub(crate) struct MockTokenProvider {
    next: Option<TokenPair>,
    delay: Duration,
    refreshes: Mutex<Vec<String>>,
}

impl MockTokenProvider {
    pub(crate) fn new(access: &str, refresh: &str) -> Self {
        MockTokenProvider {
            next: Some(TokenPair::new(access, Some(refresh.to_string()))),
            delay: Duration::ZERO,
            refreshes: Mutex::new(Vec::new()),
        }
    }

    /// Every exchange is rejected.
    pub(crate) fn failing() -> Self {
        MockTokenProvider {
            next: None,
            ..MockTokenProvider::new("", "")
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn refresh_count(&self) -> usize {
        self.refreshes.lock().unwrap().len()
    }

    pub(crate) fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refreshes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    fn authorize_url(&self, state: Option<&str>) -> String {
        format!("https://oauth.test/authorize?state={}", state.unwrap_or(""))
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenPair, OAuthError> {
        self.next
            .clone()
            .ok_or_else(|| OAuthError::InvalidResponse("rejected".to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, OAuthError> {
        self.refreshes
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next.clone().ok_or_else(|| OAuthError::Http {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<Profile, OAuthError> {
        Ok(Profile {
            id: "user-1".to_string(),
            name: None,
            email: None,
        })
    }
}

// ──────────────────────────────────────────────
// FakeDocument
// ──────────────────────────────────────────────

enum Behavior {
    Document {
        current: Option<Vec<(String, String)>>,
        legacy_index: Option<Vec<(String, String)>>,
        variables: Vec<(String, String)>,
    },
    Answer(Option<TypedValue>),
    Fail(EvalError),
}

/// Evaluator that plays a Part Studio holding files under either schema.
///
/// It recognizes exactly the scripts the resolver generates and panics on
/// anything else.
pub(crate) struct FakeDocument {
    behavior: Behavior,
    calls: Mutex<usize>,
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn string_map(pairs: &[(String, String)]) -> TypedValue {
    TypedValue::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.as_str().into(), v.as_str().into()))
            .collect(),
    )
}

fn tagged(entries: Vec<(&str, TypedValue)>) -> TypedValue {
    TypedValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

fn lookup(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

impl FakeDocument {
    fn new(behavior: Behavior) -> Self {
        FakeDocument {
            behavior,
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn current(files: &[(&str, &str)]) -> Self {
        Self::new(Behavior::Document {
            current: Some(owned(files)),
            legacy_index: None,
            variables: Vec::new(),
        })
    }

    pub(crate) fn legacy(index: &[(&str, &str)], variables: &[(&str, &str)]) -> Self {
        Self::new(Behavior::Document {
            current: None,
            legacy_index: Some(owned(index)),
            variables: owned(variables),
        })
    }

    pub(crate) fn empty() -> Self {
        Self::new(Behavior::Document {
            current: None,
            legacy_index: None,
            variables: Vec::new(),
        })
    }

    /// Answers every script with `value`.
    pub(crate) fn answering(value: Option<TypedValue>) -> Self {
        Self::new(Behavior::Answer(value))
    }

    pub(crate) fn failing(error: EvalError) -> Self {
        Self::new(Behavior::Fail(error))
    }

    pub(crate) fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn run_document(
        script: &str,
        current: &Option<Vec<(String, String)>>,
        legacy_index: &Option<Vec<(String, String)>>,
        variables: &[(String, String)],
    ) -> Option<TypedValue> {
        use crate::resolver::*;

        if script == list_file_names_script() {
            let names = current
                .as_ref()
                .or(legacy_index.as_ref())
                .map(|pairs| pairs.iter().map(|(k, _)| k.as_str().into()).collect())
                .unwrap_or_default();
            return Some(TypedValue::Array(names));
        }

        if script == all_files_script() {
            return Some(match (current, legacy_index) {
                (Some(files), _) => tagged(vec![
                    ("schema", "current".into()),
                    ("files", string_map(files)),
                ]),
                (None, Some(index)) => tagged(vec![
                    ("schema", "legacy".into()),
                    ("index", string_map(index)),
                ]),
                (None, None) => tagged(vec![("schema", "none".into())]),
            });
        }

        let literals: Vec<String> = script
            .split('"')
            .skip(1)
            .step_by(2)
            .filter(|s| s.starts_with("\\u"))
            .filter_map(crate::script::unescape)
            .collect();

        if let Some(name) = literals.iter().find(|l| script == lookup_script(l)) {
            if let Some(content) = current.as_ref().and_then(|files| lookup(files, name)) {
                return Some(tagged(vec![
                    ("schema", "current".into()),
                    ("content", content.as_str().into()),
                ]));
            }
            if let Some(variable) = legacy_index.as_ref().and_then(|index| lookup(index, name)) {
                return Some(tagged(vec![
                    ("schema", "legacy".into()),
                    ("variable", variable.as_str().into()),
                ]));
            }
            return None;
        }

        if let Some(variable) = literals.iter().find(|l| script == dereference_script(l)) {
            return lookup(variables, variable).map(|v| v.as_str().into());
        }

        let pairs: Vec<(String, String)> = literals
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| (c[0].clone(), c[1].clone()))
            .collect();
        if script == dereference_all_script(&pairs) {
            // getVariable throws on a missing variable, failing the whole script.
            let found: Option<Vec<(String, String)>> = pairs
                .iter()
                .map(|(name, variable)| {
                    lookup(variables, variable).map(|content| (name.clone(), content))
                })
                .collect();
            return found.map(|files| string_map(&files));
        }

        panic!("FakeDocument: unexpected script {script}");
    }
}

#[async_trait]
impl crate::client::Evaluator for FakeDocument {
    async fn evaluate(
        &self,
        _context: &crate::context::DocumentContext,
        script: &str,
    ) -> Result<Option<TypedValue>, EvalError> {
        *self.calls.lock().unwrap() += 1;
        match &self.behavior {
            Behavior::Document {
                current,
                legacy_index,
                variables,
            } => Ok(Self::run_document(script, current, legacy_index, variables)),
            Behavior::Answer(value) => Ok(value.clone()),
            Behavior::Fail(error) => Err(error.clone()),
        }
    }
}
