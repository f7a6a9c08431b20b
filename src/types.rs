use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Claims returned by the identity provider for the signed-in user.
///
/// Opaque to this crate: it is stored in the session cookie as-is and handed
/// back to the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct Profile(pub JsonValue);

impl Profile {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }
}

/// Client-held session state, persisted in the encrypted `sid` cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Profile,
}

/// Key identifier of a signing key in the provider's key set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct KeyId(pub String);

/// Query parameters in request order, repeated keys preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse a raw `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(
            url::form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// Every value supplied for `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The last value supplied for `key`.
    #[must_use]
    pub fn last(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

/// Tokens and profile from a completed provider handshake.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Credentials {
    pub profile: Profile,
    /// Query of the original `/login` request, carried across the round trip.
    pub query: QueryParams,
    pub token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl Credentials {
    #[must_use]
    pub fn new(profile: Profile, token: impl Into<String>) -> Self {
        Self {
            profile,
            query: QueryParams::default(),
            token: token.into(),
            refresh_token: None,
            expires_in: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}

/// Error reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of the provider handshake for one request.
#[derive(Debug, Clone)]
pub enum AuthResult {
    Authenticated { credentials: Credentials },
    Rejected { error: ProviderError },
}

/// Redirect decided by a controller operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    pub location: String,
}

impl RedirectResponse {
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}
