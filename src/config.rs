use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::types::{QueryParams, Session};

/// Lifetime of the OAuth state cookie during the provider round trip.
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Application check run on every decoded session cookie.
pub type ValidateFunc = Arc<dyn Fn(&Session) -> bool + Send + Sync>;

/// Computes extra parameters forwarded to the provider's authorize endpoint.
pub type ProviderParamsFn = Arc<dyn Fn(&QueryParams) -> Vec<(String, String)> + Send + Sync>;

/// Forwards the last `screen` query value, if any.
#[must_use]
pub fn default_provider_params(query: &QueryParams) -> Vec<(String, String)> {
    match query.last("screen") {
        Some(screen) if !screen.is_empty() => vec![("screen".into(), screen.into())],
        _ => Vec::new(),
    }
}

/// Validated Auth0 session settings.
///
/// Required settings are constructor parameters and are checked there; a
/// `Config` value is always valid.
///
/// Use [`from_env()`](Config::from_env) for convention-based setup,
/// or [`new()`](Config::new) with `with_*` methods for full control.
#[derive(Clone)]
pub struct Config {
    pub(crate) force_https: bool,
    pub(crate) is_secure: bool,
    pub(crate) is_http_only: bool,
    pub(crate) validate_func: Option<ValidateFunc>,
    pub(crate) provider_params: ProviderParamsFn,
    pub(crate) session_secret_key: String,
    pub(crate) auth0_domain: String,
    pub(crate) auth0_public_key: String,
    pub(crate) auth0_secret_key: String,
}

impl Config {
    /// Create config from the required settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if:
    /// - `session_secret_key` is shorter than 32 characters
    /// - `auth0_domain` is not a hostname of at least 3 characters
    /// - `auth0_public_key` is not a word-character token of at least 10 characters
    /// - `auth0_secret_key` is shorter than 30 characters or contains
    ///   characters outside `[A-Za-z0-9_-]`
    pub fn new(
        session_secret_key: impl Into<String>,
        auth0_domain: impl Into<String>,
        auth0_public_key: impl Into<String>,
        auth0_secret_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            force_https: false,
            is_secure: false,
            is_http_only: true,
            validate_func: None,
            provider_params: Arc::new(default_provider_params),
            session_secret_key: session_secret_key.into(),
            auth0_domain: auth0_domain.into(),
            auth0_public_key: auth0_public_key.into(),
            auth0_secret_key: auth0_secret_key.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `SESSION_SECRET_KEY`: cookie encryption password (32+ chars)
    /// - `AUTH0_DOMAIN`: tenant hostname, e.g. `acme.eu.auth0.com`
    /// - `AUTH0_CLIENT_ID`: application client id
    /// - `AUTH0_CLIENT_SECRET`: application client secret
    ///
    /// # Optional env vars
    /// Boolean flags accept `1`/`true`/`yes`/`on` and `0`/`false`/`no`/`off`,
    /// case-insensitive. Unset or empty keeps the default.
    /// - `FORCE_HTTPS`, `COOKIE_SECURE`: default off
    /// - `COOKIE_HTTP_ONLY`: default on
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if required env vars are missing or
    /// invalid, or a flag holds an unrecognised value.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required =
            |name: &str| var(name).ok_or_else(|| Error::Validation(format!("{name} is required")));
        let flag = |name: &str, default: bool| match var(name) {
            Some(value) if !value.trim().is_empty() => parse_flag(name, &value),
            _ => Ok(default),
        };

        let config = Self::new(
            required("SESSION_SECRET_KEY")?,
            required("AUTH0_DOMAIN")?,
            required("AUTH0_CLIENT_ID")?,
            required("AUTH0_CLIENT_SECRET")?,
        )?;

        Ok(config
            .with_force_https(flag("FORCE_HTTPS", false)?)
            .with_secure_cookies(flag("COOKIE_SECURE", false)?)
            .with_http_only(flag("COOKIE_HTTP_ONLY", true)?))
    }

    fn validate(&self) -> Result<(), Error> {
        if self.session_secret_key.chars().count() < 32 {
            return Err(Error::Validation(
                "sessionSecretKey must be at least 32 characters".into(),
            ));
        }
        if self.auth0_domain.len() < 3 || !is_hostname(&self.auth0_domain) {
            return Err(Error::Validation(
                "auth0Domain must be a valid hostname".into(),
            ));
        }
        if self.auth0_public_key.len() < 10
            || !self
                .auth0_public_key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(Error::Validation(
                "auth0PublicKey must be a token of at least 10 characters".into(),
            ));
        }
        if self.auth0_secret_key.len() < 30
            || !self
                .auth0_secret_key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(Error::Validation(
                "auth0SecretKey must be at least 30 characters of [A-Za-z0-9_-]".into(),
            ));
        }
        Ok(())
    }

    /// Redirect plain HTTP callback URLs to HTTPS in the provider handshake.
    #[must_use]
    pub fn with_force_https(mut self, force: bool) -> Self {
        self.force_https = force;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.is_secure = secure;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.is_http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_validate_func<F>(mut self, f: F) -> Self
    where
        F: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.validate_func = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_provider_params<F>(mut self, f: F) -> Self
    where
        F: Fn(&QueryParams) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.provider_params = Arc::new(f);
        self
    }

    #[must_use]
    pub fn auth0_domain(&self) -> &str {
        &self.auth0_domain
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.is_secure
    }

    #[must_use]
    pub fn is_http_only(&self) -> bool {
        self.is_http_only
    }

    #[must_use]
    pub fn force_https(&self) -> bool {
        self.force_https
    }

    /// Extra authorize parameters for a `/login` request.
    #[must_use]
    pub fn provider_params(&self, query: &QueryParams) -> Vec<(String, String)> {
        (self.provider_params)(query)
    }

    /// Run the application's session check; sessions pass when none is set.
    #[must_use]
    pub fn validate_session(&self, session: &Session) -> bool {
        self.validate_func.as_ref().is_none_or(|f| f(session))
    }

    /// Settings the host's OAuth provider needs for the handshake.
    #[must_use]
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            domain: self.auth0_domain.clone(),
            client_id: self.auth0_public_key.clone(),
            client_secret: self.auth0_secret_key.clone(),
            password: self.session_secret_key.clone(),
            ttl: OAUTH_STATE_TTL,
            is_secure: self.is_secure,
            is_http_only: self.is_http_only,
            force_https: self.force_https,
        }
    }

    /// Key-set client options for this tenant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the JWKS URL cannot be formed.
    #[cfg(feature = "jwt")]
    pub fn key_set_options(&self) -> Result<crate::jwks::KeySetOptions, Error> {
        crate::jwks::KeySetOptions::for_domain(&self.auth0_domain)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("force_https", &self.force_https)
            .field("is_secure", &self.is_secure)
            .field("is_http_only", &self.is_http_only)
            .field("auth0_domain", &self.auth0_domain)
            .field("auth0_public_key", &self.auth0_public_key)
            .finish_non_exhaustive()
    }
}

/// OAuth handshake settings handed to the host's provider implementation.
#[derive(Clone)]
#[non_exhaustive]
pub struct ProviderSettings {
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    /// Password for the provider's own state cookie.
    pub password: String,
    pub ttl: Duration,
    pub is_secure: bool,
    pub is_http_only: bool,
    pub force_https: bool,
}

impl ProviderSettings {
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!("https://{}/authorize", self.domain)
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        format!("https://{}/oauth/token", self.domain)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Validation(format!(
            "{name} must be a boolean, got {value:?}"
        ))),
    }
}

fn is_hostname(s: &str) -> bool {
    if s.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    let name = s.strip_suffix('.').unwrap_or(s);
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}
