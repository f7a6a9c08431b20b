use std::sync::Arc;

use axum::Router;
use axum::extract::{OriginalUri, RawQuery, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;

use super::cookies::{JarSession, cookie_key};
use super::error::AuthError;
use super::state::AuthState;
use super::traits::{LoginRequest, OAuthProvider, ProviderOutcome};
use crate::config::Config;
use crate::controller::{LOGIN_PATH, SessionController};
use crate::types::QueryParams;

/// Create the authentication router with `GET /login` and `GET /logout`.
pub fn auth_routes<P: OAuthProvider>(config: Config, provider: P) -> Router {
    let config = Arc::new(config);

    let state = AuthState {
        provider: Arc::new(provider),
        controller: SessionController::new(config.clone()),
        cookie_key: cookie_key(&config),
        config,
    };

    Router::new()
        .route(LOGIN_PATH, get(login::<P>))
        .route("/logout", get(logout::<P>))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<P: OAuthProvider>(
    State(state): State<AuthState<P>>,
    jar: PrivateCookieJar,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let query = QueryParams::parse(raw.as_deref().unwrap_or_default());
    let provider_params = state.config.provider_params(&query);
    let request = LoginRequest::new(query, headers, provider_params);

    let auth = match state.provider.authenticate(request).await {
        ProviderOutcome::Takeover(response) => return Ok(response),
        ProviderOutcome::Completed(auth) => auth,
    };

    let mut session = JarSession::new(jar, &state.config);
    let redirect = state.controller.handle_login(auth, &mut session)?;

    Ok((session.into_jar(), Redirect::to(&redirect.location)).into_response())
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<P: OAuthProvider>(
    State(state): State<AuthState<P>>,
    jar: PrivateCookieJar,
    RawQuery(raw): RawQuery,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    // HTTP/2 clients send `:authority` instead of a Host header.
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .ok_or_else(|| AuthError::BadRequest("Missing request host".into()))?;

    let query = QueryParams::parse(raw.as_deref().unwrap_or_default());
    let mut session = JarSession::new(jar, &state.config);
    let redirect = state.controller.handle_logout(&query, host, &mut session)?;

    Ok((session.into_jar(), Redirect::to(&redirect.location)))
}
