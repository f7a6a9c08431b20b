//! Bearer JWT verification against the provider's rotating key set.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header};
use serde_json::Value as JsonValue;

use crate::authority::{KeyAuthority, KeySetClient};
use crate::error::Error;

/// A JWT split into its parts, signature not yet verified.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: Header,
    pub payload: JsonValue,
    pub signature: String,
}

impl DecodedToken {
    /// Decodes header and payload without verifying the signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the token is not three base64url segments
    /// with a JSON header and payload.
    pub fn parse(token: &str) -> Result<Self, Error> {
        let mut parts = token.split('.');
        let (Some(_), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Token("invalid token format".into()));
        };

        let header = decode_header(token).map_err(|e| Error::Token(e.to_string()))?;
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| Error::Token("invalid payload encoding".into()))?;
        let payload: JsonValue = serde_json::from_slice(&payload_bytes)
            .map_err(|_| Error::Token("invalid payload".into()))?;

        Ok(Self {
            header,
            payload,
            signature: signature.to_owned(),
        })
    }
}

/// Result of validating a bearer token. Failures never surface as errors.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenValidation {
    pub valid: bool,
    pub claims: Option<JsonValue>,
}

impl TokenValidation {
    fn invalid() -> Self {
        Self {
            valid: false,
            claims: None,
        }
    }
}

/// Verifies RS256 bearer tokens issued by an Auth0 tenant.
///
/// Checks, in order: signature against the key for the header `kid`,
/// `aud == domain`, `iss == "https://{domain}/"`, expiry, and presence of
/// an `id` claim.
pub struct TokenVerifier<C> {
    authority: KeyAuthority<C>,
    audience: String,
    issuer: String,
}

impl<C: KeySetClient> TokenVerifier<C> {
    #[must_use]
    pub fn new(authority: KeyAuthority<C>, auth0_domain: &str) -> Self {
        Self {
            authority,
            audience: auth0_domain.to_owned(),
            issuer: format!("https://{auth0_domain}/"),
        }
    }

    /// Validate a raw bearer token.
    pub async fn validate(&self, token: &str) -> TokenValidation {
        match self.verify(token).await {
            Ok(claims) => TokenValidation {
                valid: true,
                claims: Some(claims),
            },
            Err(e @ (Error::KeyNotFound(_) | Error::RateLimited | Error::KeySet(_))) => {
                tracing::warn!(error = %e, "Signing key resolution failed");
                TokenValidation::invalid()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
                TokenValidation::invalid()
            }
        }
    }

    async fn verify(&self, token: &str) -> Result<JsonValue, Error> {
        let decoded = DecodedToken::parse(token)?;
        let key = self.authority.get_key(&decoded).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<JsonValue>(token, key.decoding_key(), &validation)
            .map_err(|e| Error::Token(e.to_string()))?;

        if data.claims.get("id").is_none() {
            return Err(Error::Token("missing claim: id".into()));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::jwk::JwkSet;
    use jsonwebtoken::{DecodingKey, EncodingKey, encode};
    use serde_json::json;

    use super::*;
    use crate::authority::SigningKey;

    const DOMAIN: &str = "test.eu.auth0.com";
    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/rsa_private.pem");
    const JWKS: &str = include_str!("../tests/fixtures/jwks.json");
    const FAR_FUTURE: u64 = 4_102_444_800;

    struct StaticKeys(Vec<SigningKey>);

    impl StaticKeys {
        fn from_fixture(_: ()) -> Self {
            let set: JwkSet = serde_json::from_str(JWKS).unwrap();
            Self(
                set.keys
                    .iter()
                    .map(|jwk| {
                        SigningKey::new(
                            jwk.common.key_id.clone().unwrap(),
                            DecodingKey::from_jwk(jwk).unwrap(),
                        )
                    })
                    .collect(),
            )
        }
    }

    impl KeySetClient for StaticKeys {
        async fn signing_key(&self, kid: Option<&str>) -> Result<SigningKey, Error> {
            self.0
                .iter()
                .find(|key| Some(key.kid().0.as_str()) == kid)
                .cloned()
                .ok_or_else(|| Error::KeyNotFound(kid.map(str::to_owned)))
        }
    }

    fn verifier() -> TokenVerifier<StaticKeys> {
        TokenVerifier::new(KeyAuthority::new(StaticKeys::from_fixture, ()), DOMAIN)
    }

    fn sign(kid: &str, claims: &JsonValue) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.into());
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    fn claims() -> JsonValue {
        json!({
            "id": "user-1",
            "sub": "auth0|user-1",
            "aud": DOMAIN,
            "iss": format!("https://{DOMAIN}/"),
            "exp": FAR_FUTURE,
        })
    }

    #[test]
    fn parse_splits_header_payload_signature() {
        let token = sign("test-key-1", &claims());
        let decoded = DecodedToken::parse(&token).unwrap();

        assert_eq!(decoded.header.kid.as_deref(), Some("test-key-1"));
        assert_eq!(decoded.header.alg, Algorithm::RS256);
        assert_eq!(decoded.payload["id"], "user-1");
        assert_eq!(Some(decoded.signature.as_str()), token.rsplit('.').next());
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        assert!(DecodedToken::parse("not-a-jwt").is_err());
        assert!(DecodedToken::parse("a.b").is_err());
        assert!(DecodedToken::parse("a.b.c.d").is_err());
    }

    #[tokio::test]
    async fn valid_token_is_accepted() {
        let result = verifier().validate(&sign("test-key-1", &claims())).await;

        assert!(result.valid);
        assert_eq!(result.claims.unwrap()["id"], "user-1");
    }

    #[tokio::test]
    async fn missing_id_claim_fails_closed() {
        let mut claims = claims();
        claims.as_object_mut().unwrap().remove("id");

        let result = verifier().validate(&sign("test-key-1", &claims)).await;
        assert_eq!(result, TokenValidation::invalid());
    }

    #[tokio::test]
    async fn wrong_audience_or_issuer_is_rejected() {
        let mut wrong_aud = claims();
        wrong_aud["aud"] = json!("other.auth0.com");
        assert!(!verifier().validate(&sign("test-key-1", &wrong_aud)).await.valid);

        let mut wrong_iss = claims();
        wrong_iss["iss"] = json!("https://evil.test/");
        assert!(!verifier().validate(&sign("test-key-1", &wrong_iss)).await.valid);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut expired = claims();
        expired["exp"] = json!(1_570_375_533);
        assert!(!verifier().validate(&sign("test-key-1", &expired)).await.valid);
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected() {
        let result = verifier().validate(&sign("unknown", &claims())).await;
        assert!(!result.valid);
    }

    #[tokio::test]
    async fn hmac_token_is_rejected() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-key-1".into());
        let token = encode(&header, &claims(), &EncodingKey::from_secret(b"secret")).unwrap();

        assert!(!verifier().validate(&token).await.valid);
    }
}
