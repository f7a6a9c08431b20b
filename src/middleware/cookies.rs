use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use time::Duration;

use crate::config::Config;
use crate::controller::SessionCookie;
use crate::error::Error;
use crate::types::Session;

pub(super) const SESSION_COOKIE_NAME: &str = "sid";

/// Browsers commonly drop cookies above this size.
const MAX_COOKIE_BYTES: usize = 4096;

/// Derive the cookie encryption key from the session secret.
///
/// `Config` guarantees the secret is at least 32 bytes, which key
/// derivation requires.
pub(super) fn cookie_key(config: &Config) -> Key {
    Key::derive_from(config.session_secret_key.as_bytes())
}

/// Create session cookie.
pub(super) fn session_cookie(value: String, secure: bool, http_only: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, value))
        .http_only(http_only)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Create removal cookie for session.
pub(super) fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// Session-cookie capability backed by an encrypted cookie jar.
pub(super) struct JarSession {
    jar: PrivateCookieJar,
    secure: bool,
    http_only: bool,
}

impl JarSession {
    pub(super) fn new(jar: PrivateCookieJar, config: &Config) -> Self {
        Self {
            jar,
            secure: config.is_secure,
            http_only: config.is_http_only,
        }
    }

    pub(super) fn into_jar(self) -> PrivateCookieJar {
        self.jar
    }
}

impl SessionCookie for JarSession {
    fn set(&mut self, session: &Session) -> Result<(), Error> {
        let value = serde_json::to_string(session).map_err(|e| Error::Session(e.to_string()))?;
        if value.len() > MAX_COOKIE_BYTES {
            tracing::warn!(
                bytes = value.len(),
                "Session cookie exceeds {MAX_COOKIE_BYTES} bytes, browsers may ignore it"
            );
        }
        let cookie = session_cookie(value, self.secure, self.http_only);
        self.jar = self.jar.clone().add(cookie);
        Ok(())
    }

    fn clear(&mut self) {
        self.jar = self.jar.clone().remove(clear_session_cookie());
    }
}
