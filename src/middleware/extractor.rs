use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts, OriginalUri};
use axum::http::HeaderMap;
use axum::http::header::ACCEPT;
use axum::http::request::Parts;
use axum_extra::extract::{CookieJar, PrivateCookieJar};

use super::cookies::SESSION_COOKIE_NAME;
use super::error::AuthError;
use super::state::SessionGuard;
use crate::controller::LOGIN_PATH;
use crate::types::Session;

/// Signed-in user read from the encrypted session cookie.
///
/// Rejects browsers (clients preferring `text/html`) with a redirect to
/// `/login?next=<requested path>`, and everything else with `401`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(SessionUser(session): SessionUser) -> impl IntoResponse {
///     format!("Hello, {:?}", session.user.get("name"))
/// }
///
/// // Optional: accessible to both authenticated and anonymous users
/// async fn public(user: Option<SessionUser>) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone)]
pub struct SessionUser(pub Session);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    SessionGuard: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = SessionGuard::from_ref(state);
        read_session(parts, &guard).map(Self).map_err(|present| {
            if present {
                tracing::debug!("Invalid session cookie");
            }
            AuthError::LoginRequired {
                login_redirect: prefers_html(&parts.headers).then(|| login_url(parts)),
                clear_cookie: present,
            }
        })
    }
}

impl<S> OptionalFromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    SessionGuard: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let guard = SessionGuard::from_ref(state);
        Ok(read_session(parts, &guard).ok().map(Self))
    }
}

/// Decrypt and validate the session cookie.
///
/// On failure, reports whether a `sid` cookie was sent at all.
fn read_session(parts: &Parts, guard: &SessionGuard) -> Result<Session, bool> {
    let present = CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE_NAME)
        .is_some();
    let jar = PrivateCookieJar::from_headers(&parts.headers, guard.cookie_key.clone());

    jar.get(SESSION_COOKIE_NAME)
        .and_then(|c| serde_json::from_str::<Session>(c.value()).ok())
        .filter(|session| guard.config.validate_session(session))
        .ok_or(present)
}

/// `/login?next=...` for the request being rejected.
fn login_url(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0);
    let next = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{LOGIN_PATH}?next={}", urlencoding::encode(next))
}

/// Whether the client's most preferred media type is `text/html` or `text/*`.
fn prefers_html(headers: &HeaderMap) -> bool {
    matches!(
        preferred_media_type(headers).as_deref(),
        Some("text/html" | "text/*")
    )
}

/// Highest `q` wins; ties go to the more specific range, then to the first listed.
fn preferred_media_type(headers: &HeaderMap) -> Option<String> {
    let accept = headers.get(ACCEPT)?.to_str().ok()?;
    let mut best: Option<(f32, u8, &str)> = None;
    for entry in accept.split(',') {
        let mut params = entry.split(';');
        let media = params.next().unwrap_or_default().trim();
        let q = params
            .find_map(|p| p.trim().strip_prefix("q="))
            .and_then(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if media.is_empty() || q <= 0.0 {
            continue;
        }
        let rank = specificity(media);
        let better = |(best_q, best_rank, _): (f32, u8, &str)| {
            q > best_q || (q == best_q && rank > best_rank)
        };
        if best.is_none_or(better) {
            best = Some((q, rank, media));
        }
    }
    best.map(|(_, _, media)| media.to_ascii_lowercase())
}

fn specificity(media: &str) -> u8 {
    match media.split_once('/') {
        Some(("*", "*")) => 0,
        Some((_, "*")) => 1,
        _ => 2,
    }
}

#[cfg(feature = "jwt")]
pub use bearer::{BearerAuth, BearerClaims, TokenValidator};

#[cfg(feature = "jwt")]
mod bearer {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    use axum::extract::{FromRef, FromRequestParts};
    use axum::http::header::AUTHORIZATION;
    use axum::http::request::Parts;
    use serde_json::Value as JsonValue;

    use super::AuthError;
    use crate::authority::KeySetClient;
    use crate::verify::{TokenValidation, TokenVerifier};

    /// Object-safe bearer token validation (needed for Arc<dyn>).
    pub trait TokenValidator: Send + Sync {
        fn validate<'a>(
            &'a self,
            token: &'a str,
        ) -> Pin<Box<dyn Future<Output = TokenValidation> + Send + 'a>>;
    }

    impl<C: KeySetClient> TokenValidator for TokenVerifier<C> {
        fn validate<'a>(
            &'a self,
            token: &'a str,
        ) -> Pin<Box<dyn Future<Output = TokenValidation> + Send + 'a>> {
            Box::pin(TokenVerifier::validate(self, token))
        }
    }

    /// Bearer verification handle for [`BearerClaims`].
    #[derive(Clone)]
    pub struct BearerAuth(Arc<dyn TokenValidator>);

    impl BearerAuth {
        pub fn new(validator: impl TokenValidator + 'static) -> Self {
            Self(Arc::new(validator))
        }
    }

    /// Claims of a verified `Authorization: Bearer` token.
    #[derive(Debug, Clone)]
    pub struct BearerClaims(pub JsonValue);

    impl<S> FromRequestParts<S> for BearerClaims
    where
        S: Send + Sync,
        BearerAuth: FromRef<S>,
    {
        type Rejection = AuthError;

        async fn from_request_parts(
            parts: &mut Parts,
            state: &S,
        ) -> Result<Self, Self::Rejection> {
            let BearerAuth(validator) = BearerAuth::from_ref(state);

            let token = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split_once(' '))
                .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
                .map(|(_, token)| token.trim())
                .filter(|token| !token.is_empty())
                .ok_or_else(|| AuthError::Unauthorized("Missing authentication".into()))?;

            match validator.validate(token).await {
                TokenValidation {
                    valid: true,
                    claims: Some(claims),
                } => Ok(Self(claims)),
                _ => Err(AuthError::Unauthorized("Invalid token".into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum_extra::extract::cookie::Cookie;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::config::tests::test_config;

    async fn me(SessionUser(session): SessionUser) -> String {
        session.user.get("sub").map(ToString::to_string).unwrap_or_default()
    }

    async fn whoami(user: Option<SessionUser>) -> &'static str {
        if user.is_some() { "user" } else { "anonymous" }
    }

    fn app(config: Config) -> (Router, SessionGuard) {
        let guard = SessionGuard::new(Arc::new(config));
        let router = Router::new()
            .route("/me", get(me))
            .route("/whoami", get(whoami))
            .with_state(guard.clone());
        (router, guard)
    }

    fn encrypted_cookie(guard: &SessionGuard, value: String) -> String {
        let jar = PrivateCookieJar::new(guard.cookie_key.clone())
            .add(Cookie::new(SESSION_COOKIE_NAME, value));
        let response = jar.into_response();
        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn session_json() -> String {
        json!({ "user": { "sub": "abc" } }).to_string()
    }

    #[tokio::test]
    async fn valid_cookie_is_accepted() {
        let (router, guard) = app(test_config());
        let cookie = encrypted_cookie(&guard, session_json());

        let response = router
            .oneshot(
                Request::get("/me")
                    .header(COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"\"abc\"");
    }

    #[tokio::test]
    async fn browser_without_session_is_sent_to_login_with_next() {
        let (router, _) = app(test_config());

        let response = router
            .oneshot(
                Request::get("/me?tab=1")
                    .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login?next=%2Fme%3Ftab%3D1");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn api_client_without_session_gets_401() {
        let (router, _) = app(test_config());

        let response = router
            .oneshot(
                Request::get("/me")
                    .header(ACCEPT, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tampered_cookie_is_cleared() {
        let (router, _) = app(test_config());

        let response = router
            .oneshot(
                Request::get("/me")
                    .header(COOKIE, "sid=not-encrypted")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("sid=;"));
    }

    #[tokio::test]
    async fn validate_func_rejection_clears_cookie() {
        let (router, guard) = app(test_config().with_validate_func(|_| false));
        let cookie = encrypted_cookie(&guard, session_json());

        let response = router
            .oneshot(
                Request::get("/me")
                    .header(COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_some());
    }

    #[tokio::test]
    async fn optional_session_user_allows_anonymous() {
        let (router, guard) = app(test_config());
        let cookie = encrypted_cookie(&guard, session_json());

        for (cookie, expected) in [(None, "anonymous"), (Some(cookie), "user")] {
            let mut request = Request::get("/whoami");
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }
            let response = router
                .clone()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], expected.as_bytes());
        }
    }

    #[test]
    fn media_type_preference() {
        let accept = |value: &'static str| {
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, value.parse().unwrap());
            headers
        };

        assert!(prefers_html(&accept("text/html")));
        assert!(prefers_html(&accept("text/*;q=0.9, application/json;q=0.5")));
        assert!(prefers_html(&accept("application/json;q=0.2, text/html")));
        assert!(!prefers_html(&accept("application/json")));
        assert!(!prefers_html(&accept("*/*")));
        assert!(prefers_html(&accept("*/*, text/html")));
        assert!(prefers_html(&accept("*/*, text/*")));
        assert!(!prefers_html(&accept("text/*, application/json")));
        assert!(!prefers_html(&accept("*/*;q=0.9, text/html;q=0.8")));
        assert!(!prefers_html(&HeaderMap::new()));
    }

    #[cfg(feature = "jwt")]
    mod bearer {
        use super::*;
        use crate::verify::TokenValidation;

        struct AcceptOnly(&'static str);

        impl TokenValidator for AcceptOnly {
            fn validate<'a>(
                &'a self,
                token: &'a str,
            ) -> std::pin::Pin<Box<dyn std::future::Future<Output = TokenValidation> + Send + 'a>>
            {
                let valid = token == self.0;
                Box::pin(async move {
                    TokenValidation {
                        valid,
                        claims: valid.then(|| json!({ "id": "user-1" })),
                    }
                })
            }
        }

        async fn claims(BearerClaims(claims): BearerClaims) -> String {
            claims["id"].to_string()
        }

        fn app() -> Router {
            Router::new()
                .route("/api", get(claims))
                .with_state(BearerAuth::new(AcceptOnly("good-token")))
        }

        async fn call(authorization: Option<&str>) -> StatusCode {
            let mut request = Request::get("/api");
            if let Some(value) = authorization {
                request = request.header(axum::http::header::AUTHORIZATION, value);
            }
            app()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap()
                .status()
        }

        #[tokio::test]
        async fn bearer_token_is_verified() {
            assert_eq!(call(Some("Bearer good-token")).await, StatusCode::OK);
            assert_eq!(call(Some("bearer good-token")).await, StatusCode::OK);
            assert_eq!(call(Some("BEARER good-token")).await, StatusCode::OK);
            assert_eq!(call(Some("Bearer ")).await, StatusCode::UNAUTHORIZED);
            assert_eq!(call(Some("Bearer bad-token")).await, StatusCode::UNAUTHORIZED);
            assert_eq!(call(Some("Basic good-token")).await, StatusCode::UNAUTHORIZED);
            assert_eq!(call(None).await, StatusCode::UNAUTHORIZED);
        }
    }
}
