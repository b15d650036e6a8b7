//! End-to-end tests of the evaluation stack through the public API:
//! `FileResolver` over `RefreshingEvaluator` over `EvaluationClient`,
//! with a scripted transport standing in for the platform.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camel_eval::{
    ApiRequest, ApiResponse, DocumentContext, EvalError, EvaluationClient, FileResolver,
    GatewayError, OAuthError, RefreshingEvaluator, TokenProvider, Transport, TypedValue,
    WorkspaceOrVersion, NO_CONFIGURATION_SENTINEL,
};
use camel_session::{Identity, MemorySessionStore, Profile, SessionId, SessionStore, TokenPair};

/// Platform double: accepts only `accepted_token` and answers every
/// accepted evaluation with `result`. Clones share one request log.
#[derive(Clone)]
struct Platform {
    accepted_token: String,
    result: TypedValue,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl Platform {
    fn new(accepted_token: &str, result: TypedValue) -> Self {
        Platform {
            accepted_token: accepted_token.to_string(),
            result,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for Platform {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, EvalError> {
        let expected = format!("Bearer {}", self.accepted_token);
        let authorized = request.header("Authorization") == Some(expected.as_str());
        self.requests.lock().unwrap().push(request);
        if !authorized {
            return Ok(ApiResponse {
                status: 401,
                body: "Unauthorized".to_string(),
            });
        }
        let body = serde_json::json!({ "result": self.result.to_json() }).to_string();
        Ok(ApiResponse { status: 200, body })
    }
}

/// Token endpoint double that counts exchanges. Clones share the counter.
#[derive(Clone)]
struct TokenEndpoint {
    issue: Option<TokenPair>,
    exchanges: Arc<Mutex<usize>>,
}

impl TokenEndpoint {
    fn issuing(access: &str, refresh: &str) -> Self {
        TokenEndpoint {
            issue: Some(TokenPair::new(access, Some(refresh.to_string()))),
            exchanges: Arc::new(Mutex::new(0)),
        }
    }

    fn rejecting() -> Self {
        TokenEndpoint {
            issue: None,
            exchanges: Arc::new(Mutex::new(0)),
        }
    }

    fn exchanges(&self) -> usize {
        *self.exchanges.lock().unwrap()
    }
}

#[async_trait]
impl TokenProvider for TokenEndpoint {
    fn authorize_url(&self, _state: Option<&str>) -> String {
        "https://oauth.test/authorize".to_string()
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenPair, OAuthError> {
        Err(OAuthError::InvalidResponse("not used".to_string()))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, OAuthError> {
        *self.exchanges.lock().unwrap() += 1;
        self.issue.clone().ok_or(OAuthError::Http {
            status: 400,
            body: "invalid_grant".to_string(),
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<Profile, OAuthError> {
        Err(OAuthError::InvalidResponse("not used".to_string()))
    }
}

fn identity(access: &str) -> Arc<Identity> {
    Arc::new(Identity::new(
        Profile {
            id: "user-42".to_string(),
            name: None,
            email: None,
        },
        TokenPair::new(access, Some("refresh-1".to_string())),
    ))
}

fn context(identity: Arc<Identity>) -> DocumentContext {
    DocumentContext::new("doc1", WorkspaceOrVersion::Workspace, "ws1", "el1", identity)
        .with_configuration(Some(NO_CONFIGURATION_SENTINEL))
}

fn listing() -> TypedValue {
    TypedValue::Array(vec!["a.nc".into(), "b.nc".into()])
}

type Stack = FileResolver<RefreshingEvaluator<EvaluationClient<Platform>, TokenEndpoint>>;

fn stack(platform: &Platform, tokens: &TokenEndpoint, store: Arc<dyn SessionStore>) -> Stack {
    FileResolver::new(RefreshingEvaluator::with_store(
        EvaluationClient::new(platform.clone()),
        tokens.clone(),
        store,
    ))
}

#[tokio::test]
async fn expired_token_is_refreshed_and_saved_to_the_session() {
    let platform = Platform::new("fresh", listing());
    let tokens = TokenEndpoint::issuing("fresh", "refresh-2");
    let store = Arc::new(MemorySessionStore::default());
    let session = SessionId::generate();
    let user = identity("stale");
    store.put(session.clone(), Arc::clone(&user)).await.unwrap();

    let resolver = stack(&platform, &tokens, store.clone());
    let names = resolver.list_file_names(&context(user)).await.unwrap();

    assert_eq!(names, vec!["a.nc", "b.nc"]);
    assert_eq!(tokens.exchanges(), 1);
    assert_eq!(platform.requests().len(), 2);

    let saved = store.get(&session).await.unwrap().unwrap();
    assert_eq!(saved.access_token(), "fresh");
    assert_eq!(saved.refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn persistent_rejection_is_auth_error_after_one_exchange() {
    let platform = Platform::new("never-issued", listing());
    let tokens = TokenEndpoint::issuing("fresh", "refresh-2");
    let resolver = stack(&platform, &tokens, Arc::new(MemorySessionStore::default()));

    let err = resolver
        .list_file_names(&context(identity("stale")))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Auth(_)), "{err:?}");
    assert_eq!(tokens.exchanges(), 1);
    assert_eq!(platform.requests().len(), 2);
}

#[tokio::test]
async fn rejected_refresh_is_auth_error() {
    let platform = Platform::new("fresh", listing());
    let tokens = TokenEndpoint::rejecting();
    let resolver = stack(&platform, &tokens, Arc::new(MemorySessionStore::default()));

    let err = resolver
        .get_file_contents(&context(identity("stale")), "a.nc")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Auth(_)), "{err:?}");
    assert_eq!(platform.requests().len(), 1);
}

#[tokio::test]
async fn request_targets_element_and_omits_placeholder_configuration() {
    let platform = Platform::new("fresh", listing());
    let tokens = TokenEndpoint::issuing("fresh", "refresh-2");
    let resolver = stack(&platform, &tokens, Arc::new(MemorySessionStore::default()));

    resolver
        .list_file_names(&context(identity("fresh")))
        .await
        .unwrap();

    let sent = platform.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].path, "/v5/partstudios/d/doc1/w/ws1/e/el1/featurescript");
    assert!(sent[0].query.is_empty());
    let script = sent[0].body["script"].as_str().unwrap();
    assert!(script.starts_with("function (context is Context, queries is map) {"));
    assert_eq!(tokens.exchanges(), 0);
}

#[tokio::test]
async fn wrong_payload_tag_is_schema_error() {
    let platform = Platform::new("fresh", TypedValue::from("not a list"));
    let tokens = TokenEndpoint::issuing("fresh", "refresh-2");
    let resolver = stack(&platform, &tokens, Arc::new(MemorySessionStore::default()));

    let err = resolver
        .list_file_names(&context(identity("fresh")))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Schema(_)), "{err:?}");
}
