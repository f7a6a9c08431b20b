#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Settings rejected at startup.
    #[error("Invalid configuration: {0}")]
    Validation(String),
    /// Unsafe request input, such as an absolute `next` URL.
    #[error("{0}")]
    BadRequest(String),
    /// Login rejected by the provider; carries its message verbatim.
    #[error("{0}")]
    Unauthorized(String),
    #[error("Signing key not found (kid: {0:?})")]
    KeyNotFound(Option<String>),
    #[error("JWKS request rate limit exceeded")]
    RateLimited,
    #[error("JWKS error: {0}")]
    KeySet(String),
    #[cfg(feature = "jwt")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Session encoding error: {0}")]
    Session(String),
    #[error("Token error: {0}")]
    Token(String),
}
