//! Signing key resolution for bearer tokens.

use std::future::Future;

use jsonwebtoken::DecodingKey;

use crate::error::Error;
use crate::types::KeyId;
use crate::verify::DecodedToken;

/// Public key from the provider's key set.
#[derive(Clone)]
pub struct SigningKey {
    kid: KeyId,
    decoding_key: DecodingKey,
}

impl SigningKey {
    #[must_use]
    pub fn new(kid: impl Into<String>, decoding_key: DecodingKey) -> Self {
        Self {
            kid: KeyId(kid.into()),
            decoding_key,
        }
    }

    #[must_use]
    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Key-set client capability.
///
/// Implementations own caching and rate limiting, and must be safe for
/// concurrent lookups.
pub trait KeySetClient: Send + Sync + 'static {
    /// Look up the signing key for `kid`.
    fn signing_key(
        &self,
        kid: Option<&str>,
    ) -> impl Future<Output = Result<SigningKey, Error>> + Send;
}

/// Resolves the signing key a decoded token declares in its header.
///
/// Holds no cache of its own; every lookup is forwarded to the client built
/// at construction time.
///
/// ```rust,ignore
/// use auth0_session::{JwksClient, KeyAuthority, KeySetOptions};
///
/// let authority = KeyAuthority::new(JwksClient::new, KeySetOptions::for_domain("acme.eu.auth0.com")?);
/// let key = authority.get_key(&decoded).await?;
/// ```
pub struct KeyAuthority<C> {
    client: C,
}

impl<C: KeySetClient> KeyAuthority<C> {
    /// Build the client eagerly by calling `factory(options)` once.
    pub fn new<F, O>(factory: F, options: O) -> Self
    where
        F: FnOnce(O) -> C,
    {
        Self {
            client: factory(options),
        }
    }

    /// Resolve the key for `decoded.header.kid`.
    ///
    /// # Errors
    ///
    /// Propagates the client's failure unchanged (unknown `kid`, key set
    /// fetch failure, rate limit).
    pub async fn get_key(&self, decoded: &DecodedToken) -> Result<SigningKey, Error> {
        let kid = decoded.header.kid.as_deref();
        tracing::debug!(kid = ?kid, "Resolving signing key");
        self.client.signing_key(kid).await
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }
}
