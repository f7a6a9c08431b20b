use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::cookies::cookie_key;
use super::traits::OAuthProvider;
use crate::config::Config;
use crate::controller::SessionController;

/// Shared state for auth route handlers.
pub(super) struct AuthState<P> {
    pub(super) provider: Arc<P>,
    pub(super) controller: SessionController,
    pub(super) config: Arc<Config>,
    pub(super) cookie_key: Key,
}

// Manual Clone: avoid derive adding a `P: Clone` bound.
impl<P> Clone for AuthState<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            controller: self.controller.clone(),
            config: self.config.clone(),
            cookie_key: self.cookie_key.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<P: OAuthProvider> FromRef<AuthState<P>> for Key {
    fn from_ref(state: &AuthState<P>) -> Self {
        state.cookie_key.clone()
    }
}

/// Session cookie settings for [`SessionUser`](super::SessionUser).
///
/// Put it in the application state and implement `FromRef` for it.
#[derive(Clone)]
pub struct SessionGuard {
    pub(super) config: Arc<Config>,
    pub(super) cookie_key: Key,
}

impl SessionGuard {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            cookie_key: cookie_key(&config),
            config,
        }
    }
}
