use std::str::FromStr;
use std::sync::RwLock;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::oauth::ensure_success;

/// Claims read from a validated ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdTokenClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Object id of the user in the directory.
    #[serde(default)]
    pub oid: Option<String>,
    /// Tenant id.
    #[serde(default)]
    pub tid: Option<String>,
}

/// Validates ID tokens against the identity provider's signing keys.
///
/// Checks signature, audience (`aud == client_id`), expiry and nonce. The
/// issuer is not checked, so tokens from any tenant of a multi-tenant
/// authority are accepted.
pub struct IdTokenValidator {
    client_id: String,
    jwks_url: Url,
    http: reqwest::Client,
    keys: RwLock<Option<JwkSet>>,
}

impl IdTokenValidator {
    /// Keys are fetched from `jwks_url` on first use.
    #[must_use]
    pub fn new(client_id: impl Into<String>, jwks_url: Url) -> Self {
        Self {
            client_id: client_id.into(),
            jwks_url,
            http: reqwest::Client::new(),
            keys: RwLock::new(None),
        }
    }

    /// Seed the key cache (static keys or tests).
    #[must_use]
    pub fn with_keys(self, keys: JwkSet) -> Self {
        Self {
            keys: RwLock::new(Some(keys)),
            ..self
        }
    }

    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Point key refreshes at another JWKS endpoint. Cached keys are kept.
    #[must_use]
    pub fn with_jwks_url(mut self, jwks_url: Url) -> Self {
        self.jwks_url = jwks_url;
        self
    }

    #[must_use]
    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }

    /// Validate `id_token`; `expected_nonce` is the nonce sent with the
    /// authorization request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] when the token is malformed, signed by an
    /// unknown key, expired, issued for another client or carries the wrong
    /// nonce. Key retrieval failures surface as [`Error::Http`] / [`Error::OAuth`].
    pub async fn validate(
        &self,
        id_token: &str,
        expected_nonce: Option<&str>,
    ) -> Result<IdTokenClaims, Error> {
        let header = decode_header(id_token)?;
        let kid = header
            .kid
            .ok_or_else(|| Error::Token("token header has no kid".into()))?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk)?;

        let mut validation = Validation::new(key_algorithm(&jwk)?);
        validation.set_audience(&[&self.client_id]);

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)?.claims;

        if let Some(expected) = expected_nonce {
            if claims.nonce.as_deref() != Some(expected) {
                return Err(Error::Token("nonce mismatch".into()));
            }
        }

        Ok(claims)
    }

    /// Cached key lookup; refreshes the key set once when `kid` is unknown
    /// (signing key rollover).
    async fn signing_key(&self, kid: &str) -> Result<Jwk, Error> {
        if let Some(jwk) = self.cached_key(kid)? {
            return Ok(jwk);
        }

        tracing::debug!(kid = %kid, jwks_url = %self.jwks_url, "Refreshing signing keys");
        let response = self.http.get(self.jwks_url.clone()).send().await?;
        let response = ensure_success(response, "signing key retrieval").await?;
        let keys = response.json::<JwkSet>().await?;

        let jwk = keys.find(kid).cloned();
        *self
            .keys
            .write()
            .map_err(|_| Error::Token("key cache poisoned".into()))? = Some(keys);

        jwk.ok_or_else(|| Error::Token(format!("unknown signing key: {kid}")))
    }

    fn cached_key(&self, kid: &str) -> Result<Option<Jwk>, Error> {
        let keys = self
            .keys
            .read()
            .map_err(|_| Error::Token("key cache poisoned".into()))?;
        Ok(keys.as_ref().and_then(|set| set.find(kid)).cloned())
    }
}

/// The only algorithm a key verifies: its published `alg`, or RS256.
fn key_algorithm(jwk: &Jwk) -> Result<Algorithm, Error> {
    match &jwk.common.key_algorithm {
        None => Ok(Algorithm::RS256),
        Some(alg) => Algorithm::from_str(&alg.to_string())
            .map_err(|_| Error::Token(format!("unsupported key algorithm: {alg}"))),
    }
}
