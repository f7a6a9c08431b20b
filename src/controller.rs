//! Login callback and logout orchestration.
//!
//! ```text
//! Anonymous -> PendingCallback -> Authenticated   (cookie set, redirect to next)
//!                              -> RejectedRetry   (redirect to /login)
//!                              -> Unauthorized    (no cookie, error)
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::redirect::resolve_next;
use crate::types::{AuthResult, QueryParams, RedirectResponse, Session};

/// Prefix of the provider error raised when the user declines consent.
pub const RETRYABLE_REJECTION_PREFIX: &str = "App rejected";

/// Login entry point.
pub const LOGIN_PATH: &str = "/login";

/// Session-cookie capability supplied by the host.
pub trait SessionCookie {
    /// Persist `session` in the client's cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be encoded.
    fn set(&mut self, session: &Session) -> Result<(), Error>;

    /// Remove the session cookie. Clearing an absent cookie is not an error.
    fn clear(&mut self);
}

/// Handles the two session transitions: provider callback and logout.
#[derive(Clone)]
pub struct SessionController {
    config: Arc<Config>,
}

impl SessionController {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Turn the provider's result into a session and a redirect.
    ///
    /// Only the profile is persisted; tokens and expiry stay server-side.
    ///
    /// # Errors
    ///
    /// - [`Error::BadRequest`] if the carried `next` is an absolute URL
    /// - [`Error::Unauthorized`] with the provider's message for any
    ///   rejection other than declined consent
    pub fn handle_login(
        &self,
        auth: AuthResult,
        cookie: &mut impl SessionCookie,
    ) -> Result<RedirectResponse, Error> {
        match auth {
            AuthResult::Authenticated { credentials } => {
                let next = resolve_next(&credentials.query.get_all("next"))?;
                cookie.set(&Session {
                    user: credentials.profile,
                })?;
                info!(next = %next, "Login successful");
                Ok(RedirectResponse::to(next))
            }
            AuthResult::Rejected { error }
                if error.message.starts_with(RETRYABLE_REJECTION_PREFIX) =>
            {
                warn!(message = %error.message, "Consent declined, restarting login");
                Ok(RedirectResponse::to(LOGIN_PATH))
            }
            AuthResult::Rejected { error } => {
                warn!(message = %error.message, "Provider rejected login");
                Err(Error::Unauthorized(error.message))
            }
        }
    }

    /// Clear the session and send the user through the provider's logout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if `next` is an absolute URL.
    pub fn handle_logout(
        &self,
        query: &QueryParams,
        host: &str,
        cookie: &mut impl SessionCookie,
    ) -> Result<RedirectResponse, Error> {
        cookie.clear();

        let next = resolve_next(&query.get_all("next"))?;
        let return_to = urlencoding::encode(&format!("https://{host}{next}")).into_owned();
        info!(return_to = %return_to, "Logout");

        Ok(RedirectResponse::to(format!(
            "https://{}/v2/logout?returnTo={return_to}",
            self.config.auth0_domain
        )))
    }
}
