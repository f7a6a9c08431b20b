use axum::Json;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use super::cookies::clear_session_cookie;

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unsafe or malformed request input, such as an absolute `next`.
    #[error("{0}")]
    BadRequest(String),

    /// Provider rejection or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// No usable session cookie.
    ///
    /// Browsers are sent to `login_redirect` when set. `clear_cookie` removes
    /// a session cookie that failed to decrypt or validate.
    #[error("Missing authentication")]
    LoginRequired {
        login_redirect: Option<String>,
        clear_cookie: bool,
    },

    /// Anything the client cannot act on.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(ref msg) => error_body(StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(ref msg) => error_body(StatusCode::UNAUTHORIZED, msg),
            Self::LoginRequired {
                login_redirect,
                clear_cookie,
            } => {
                let mut response = match login_redirect {
                    Some(location) => Redirect::to(&location).into_response(),
                    None => error_body(StatusCode::UNAUTHORIZED, "Missing authentication"),
                };
                if clear_cookie {
                    if let Ok(value) = HeaderValue::try_from(clear_session_cookie().to_string()) {
                        response.headers_mut().append(SET_COOKIE, value);
                    }
                }
                response
            }
            Self::Internal(_) => {
                tracing::error!(error = %self, "Auth internal error");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "An internal server error occurred")
            }
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "statusCode": status.as_u16(),
        "error": status.canonical_reason().unwrap_or_default(),
        "message": message,
    });
    (status, Json(body)).into_response()
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error;
        match e {
            Error::BadRequest(msg) => Self::BadRequest(msg),
            Error::Unauthorized(msg) => Self::Unauthorized(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
