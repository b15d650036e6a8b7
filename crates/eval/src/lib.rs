//! Authenticated remote evaluation for the camel gateway.
//!
//! The gateway reads files that the CAM feature stores as variables inside
//! a Part Studio. Reading them means evaluating small FeatureScript
//! functions through the platform API on behalf of the signed-in user:
//!
//! - [`script`] builds injection-safe scripts
//! - [`client`] sends one authenticated evaluation and decodes the
//!   [`TypedValue`] result
//! - [`refresh`] wraps a client so a rejected access token is refreshed
//!   once and the call replayed
//! - [`resolver`] turns results into file names and contents across both
//!   storage-schema generations
//!
//! Errors from every layer leave [`FileResolver`] as a [`GatewayError`].

pub mod client;
pub mod context;
pub mod error;
pub mod oauth;
pub mod refresh;
pub mod resolver;
pub mod script;
pub mod value;

#[cfg(test)]
mod testing;

pub use client::http::{HttpTransport, DEFAULT_API_TIMEOUT};
pub use client::pipeline::Pipeline;
pub use client::{ApiRequest, ApiResponse, EvaluationClient, Evaluator, Transport};
pub use context::{DocumentContext, WorkspaceOrVersion, NO_CONFIGURATION_SENTINEL};
pub use error::{EvalError, GatewayError, OAuthError};
pub use oauth::{OAuthClient, OAuthConfig, TokenProvider};
pub use refresh::RefreshingEvaluator;
pub use resolver::FileResolver;
pub use value::TypedValue;

/// The production evaluation stack: HTTPS transport, standard pipeline,
/// and token refresh.
pub type PlatformEvaluator<P> = RefreshingEvaluator<EvaluationClient<HttpTransport>, P>;
