use std::future::Future;

use axum::http::HeaderMap;
use axum::response::Response;

use crate::types::{AuthResult, QueryParams};

/// Inbound `/login` request handed to the provider.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoginRequest {
    /// Query of the `/login` request.
    pub query: QueryParams,
    pub headers: HeaderMap,
    /// Extra authorize parameters from [`Config::provider_params`](crate::Config::provider_params).
    pub provider_params: Vec<(String, String)>,
}

impl LoginRequest {
    #[must_use]
    pub fn new(query: QueryParams, headers: HeaderMap, provider_params: Vec<(String, String)>) -> Self {
        Self {
            query,
            headers,
            provider_params,
        }
    }
}

/// What the provider did with a `/login` request.
#[derive(Debug)]
pub enum ProviderOutcome {
    /// Handshake leg in progress; the provider owns the response (for
    /// example a redirect to the authorize endpoint with a state cookie).
    Takeover(Response),
    /// Callback processed.
    Completed(AuthResult),
}

/// Consumer-provided OAuth2/OIDC handshake against the identity provider.
///
/// `/login` authenticates in "try" mode: a failed handshake must be reported
/// as [`AuthResult::Rejected`] inside [`ProviderOutcome::Completed`] so the
/// login handler can decide between retry and rejection.
///
/// # Example
///
/// ```rust,ignore
/// impl OAuthProvider for Auth0 {
///     async fn authenticate(&self, request: LoginRequest) -> ProviderOutcome {
///         match request.query.last("code") {
///             None => ProviderOutcome::Takeover(self.redirect_to_authorize(&request)),
///             Some(code) => ProviderOutcome::Completed(self.exchange(code, &request).await),
///         }
///     }
/// }
/// ```
pub trait OAuthProvider: Send + Sync + 'static {
    fn authenticate(&self, request: LoginRequest) -> impl Future<Output = ProviderOutcome> + Send;
}
