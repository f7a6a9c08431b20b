//! Plug-and-play Auth0 session middleware for Axum.
//!
//! Mounts `/login` and `/logout`, keeps the signed-in profile in an
//! encrypted `sid` cookie and guards handlers with extractors. The OAuth
//! handshake itself is supplied by the application through
//! [`OAuthProvider`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use auth0_session::Config;
//! use auth0_session::middleware::{SessionGuard, SessionUser, auth_routes};
//!
//! // 1. Implement OAuthProvider for your Auth0 handshake
//! // 2. Configure from environment
//! let config = Config::from_env()?;
//! let guard = SessionGuard::new(Arc::new(config.clone()));
//!
//! // 3. Mount auth routes and guard your own
//! let app = axum::Router::new()
//!     .route("/me", get(|SessionUser(session): SessionUser| async move { ... }))
//!     .with_state(guard)
//!     .merge(auth_routes(config, provider));
//! ```

mod cookies;
mod error;
mod extractor;
mod routes;
mod state;
mod traits;

pub use error::AuthError;
pub use extractor::SessionUser;
#[cfg(feature = "jwt")]
pub use extractor::{BearerAuth, BearerClaims, TokenValidator};
pub use routes::auth_routes;
pub use state::SessionGuard;
pub use traits::{LoginRequest, OAuthProvider, ProviderOutcome};

/// Re-export cookie key type for applications sharing the session key.
pub use axum_extra::extract::cookie::Key as CookieKey;
