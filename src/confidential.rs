//! Confidential-client token acquisition.
//!
//! The server redeems the authorization code itself, authenticating with its
//! client secret, and may ask the identity provider for an additional
//! authorization code that a browser application redeems later.

use std::future::Future;

use url::Url;

use crate::error::Error;
use crate::oauth::{BASIC_SIGN_IN_SCOPES, OidcConfig, TokenResponse, ensure_success};
use crate::types::{ClientSecret, SpaAuthCode};

/// Authorization-code redemption request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeRequest {
    scopes: Vec<String>,
    code: String,
    spa_authorization_code: bool,
    code_verifier: Option<String>,
}

impl AuthorizationCodeRequest {
    #[must_use]
    pub fn new(scopes: Vec<String>, code: impl Into<String>) -> Self {
        Self {
            scopes,
            code: code.into(),
            spa_authorization_code: false,
            code_verifier: None,
        }
    }

    /// Also request an authorization code for a front-end client.
    #[must_use]
    pub fn with_spa_authorization_code(mut self) -> Self {
        self.spa_authorization_code = true;
        self
    }

    /// PKCE verifier of the original authorization request, if any.
    #[must_use]
    pub fn with_pkce_code_verifier(mut self, verifier: Option<String>) -> Self {
        self.code_verifier = verifier;
        self
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn spa_authorization_code(&self) -> bool {
        self.spa_authorization_code
    }

    #[must_use]
    pub fn code_verifier(&self) -> Option<&str> {
        self.code_verifier.as_deref()
    }

    /// Requested scopes merged with the sign-in scopes, first occurrence wins.
    fn scope_parameter(&self) -> String {
        let mut scopes: Vec<&str> = Vec::new();
        for scope in self
            .scopes
            .iter()
            .flat_map(|s| s.split_whitespace())
            .chain(BASIC_SIGN_IN_SCOPES)
        {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes.join(" ")
    }
}

/// Tokens obtained by redeeming an authorization code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthenticationResult {
    pub access_token: String,
    pub id_token: String,
    pub spa_auth_code: Option<SpaAuthCode>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
}

impl AuthenticationResult {
    #[must_use]
    pub fn new(access_token: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: id_token.into(),
            spa_auth_code: None,
            expires_in: None,
            refresh_token: None,
        }
    }

    #[must_use]
    pub fn with_spa_auth_code(mut self, code: impl Into<String>) -> Self {
        self.spa_auth_code = Some(SpaAuthCode(code.into()));
        self
    }
}

/// Redeems authorization codes on behalf of a confidential client.
///
/// Implemented by [`ConfidentialClient`]; tests and alternative identity
/// SDKs provide their own.
pub trait TokenAcquirer: Send + Sync + 'static {
    fn acquire_token_by_authorization_code(
        &self,
        request: AuthorizationCodeRequest,
    ) -> impl Future<Output = Result<AuthenticationResult, Error>> + Send;
}

/// Token endpoint client authenticating with a client secret.
pub struct ConfidentialClient {
    client_id: String,
    client_secret: ClientSecret,
    redirect_uri: Url,
    token_url: Url,
    http: reqwest::Client,
}

impl ConfidentialClient {
    #[must_use]
    pub fn new(config: &OidcConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_url: config.token_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

impl TokenAcquirer for ConfidentialClient {
    async fn acquire_token_by_authorization_code(
        &self,
        request: AuthorizationCodeRequest,
    ) -> Result<AuthenticationResult, Error> {
        let scope = request.scope_parameter();
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
            ("code", request.code()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];
        if let Some(verifier) = request.code_verifier() {
            params.push(("code_verifier", verifier));
        }
        if request.spa_authorization_code() {
            params.push(("return_spa_code", "1"));
        }

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let response = ensure_success(response, "authorization code redemption").await?;
        let tokens = response.json::<TokenResponse>().await?;

        let id_token = tokens.id_token.ok_or_else(|| Error::OAuth {
            operation: "authorization code redemption",
            status: None,
            detail: "token response has no id_token".into(),
        })?;

        Ok(AuthenticationResult {
            access_token: tokens.access_token,
            id_token,
            spa_auth_code: tokens.spa_code.map(SpaAuthCode),
            expires_in: tokens.expires_in,
            refresh_token: tokens.refresh_token,
        })
    }
}
