#![doc = include_str!("../README.md")]

pub mod config;
pub mod controller;
pub mod error;
pub mod redirect;
pub mod types;

#[cfg(feature = "jwt")]
pub mod authority;
#[cfg(feature = "jwt")]
pub mod jwks;
#[cfg(feature = "jwt")]
pub mod verify;

#[cfg(feature = "middleware")]
pub mod middleware;

// Re-exports for convenient access
pub use config::{Config, ProviderSettings, default_provider_params};
pub use controller::{SessionController, SessionCookie};
pub use error::Error;
pub use redirect::resolve_next;
pub use types::{
    AuthResult, Credentials, KeyId, Profile, ProviderError, QueryParams, RedirectResponse, Session,
};

#[cfg(feature = "jwt")]
pub use authority::{KeyAuthority, KeySetClient, SigningKey};
#[cfg(feature = "jwt")]
pub use jwks::{JwksClient, KeySetOptions};
#[cfg(feature = "jwt")]
pub use verify::{DecodedToken, TokenValidation, TokenVerifier};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
