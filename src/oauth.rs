use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::pkce;
use crate::types::ClientSecret;
use crate::well_known::OpenIdConfiguration;

/// Scopes every sign-in requests, in addition to the application scopes.
pub const BASIC_SIGN_IN_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// OpenID Connect client configuration.
///
/// Required fields are constructor parameters — no runtime "missing field" errors.
/// Endpoints are derived from the authority using the v2.0 layout
/// (`<tenant>/oauth2/v2.0/authorize`, ...) until overridden or replaced by
/// [`with_discovery`](Self::with_discovery).
///
/// ```rust,ignore
/// use hybrid_spa_auth::{ClientSecret, OidcConfig};
///
/// let config = OidcConfig::new(
///     "my-client-id",
///     ClientSecret::new("s3cret"),
///     "https://login.microsoftonline.com/common/v2.0".parse()?,
///     "https://my-app.com/signin-oidc".parse()?,
/// );
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: ClientSecret,
    pub(crate) authority: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) post_logout_redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) end_session_url: Option<Url>,
    pub(crate) jwks_url: Url,
}

impl OidcConfig {
    /// Create a new OIDC configuration.
    ///
    /// Scopes default to `openid profile offline_access Mail.Read User.Read`.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: ClientSecret,
        authority: Url,
        redirect_uri: Url,
    ) -> Self {
        let scopes = BASIC_SIGN_IN_SCOPES
            .iter()
            .chain(["Mail.Read", "User.Read"].iter())
            .map(|s| (*s).to_string())
            .collect();

        Self {
            client_id: client_id.into(),
            client_secret,
            auth_url: authority_endpoint(&authority, "oauth2/v2.0/authorize"),
            token_url: authority_endpoint(&authority, "oauth2/v2.0/token"),
            end_session_url: Some(authority_endpoint(&authority, "oauth2/v2.0/logout")),
            jwks_url: authority_endpoint(&authority, "discovery/v2.0/keys"),
            post_logout_redirect_uri: redirect_uri.clone(),
            authority,
            redirect_uri,
            scopes,
        }
    }

    /// Replace the derived endpoints with the provider's published metadata.
    #[must_use]
    pub fn with_discovery(mut self, doc: OpenIdConfiguration) -> Self {
        self.auth_url = doc.authorization_endpoint;
        self.token_url = doc.token_endpoint;
        self.jwks_url = doc.jwks_uri;
        self.end_session_url = doc.end_session_endpoint;
        self
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_jwks_url(mut self, url: Url) -> Self {
        self.jwks_url = url;
        self
    }

    /// Override (or remove, with `None`) the end-session endpoint.
    #[must_use]
    pub fn with_end_session_url(mut self, url: Option<Url>) -> Self {
        self.end_session_url = url;
        self
    }

    /// Where the identity provider sends the browser after sign-out
    /// (default: the redirect URI).
    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, url: Url) -> Self {
        self.post_logout_redirect_uri = url;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    #[must_use]
    pub fn authority(&self) -> &Url {
        &self.authority
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> &Url {
        &self.post_logout_redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn end_session_url(&self) -> Option<&Url> {
        self.end_session_url.as_ref()
    }

    #[must_use]
    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }
}

/// `https://host/<tenant>/v2.0` + `oauth2/v2.0/token` -> `https://host/<tenant>/oauth2/v2.0/token`
fn authority_endpoint(authority: &Url, endpoint: &str) -> Url {
    let tenant = authority
        .path()
        .trim_end_matches('/')
        .trim_end_matches("/v2.0");
    let mut url = authority.clone();
    url.set_path(&format!("{tenant}/{endpoint}"));
    url.set_query(None);
    url
}

/// Outgoing authorization request sent to the identity provider.
///
/// Parameters keep insertion order; [`set_parameter`](Self::set_parameter)
/// replaces an existing value in place.
#[derive(Debug, Clone)]
pub struct AuthorizationMessage {
    issuer_address: Url,
    parameters: Vec<(String, String)>,
}

impl AuthorizationMessage {
    #[must_use]
    pub fn new(issuer_address: Url) -> Self {
        Self {
            issuer_address,
            parameters: Vec::new(),
        }
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.parameters.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.parameters.push((key, value)),
        }
    }

    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Full redirect URL: issuer address with every parameter in the query.
    #[must_use]
    pub fn to_url(&self) -> Url {
        let mut url = self.issuer_address.clone();
        url.query_pairs_mut().extend_pairs(
            self.parameters
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        url
    }
}

/// Authorization request plus the values the caller must persist for the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub message: AuthorizationMessage,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
}

/// Parameters of a token endpoint request (`grant_type=authorization_code`).
#[derive(Debug, Clone, Default)]
pub struct TokenEndpointRequest {
    parameters: BTreeMap<String, String>,
}

impl TokenEndpointRequest {
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

/// Token response from the identity provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub spa_code: Option<String>,
}

/// OpenID Connect client used by the sign-in routes.
pub struct AuthClient {
    config: OidcConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build an authorization-code request with PKCE (S256), `state` and `nonce`.
    #[must_use]
    pub fn authorization_request(&self) -> AuthorizationRequest {
        let state = pkce::generate_state();
        let nonce = pkce::generate_nonce();
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);

        let mut message = AuthorizationMessage::new(self.config.auth_url.clone());
        message.set_parameter("client_id", &self.config.client_id);
        message.set_parameter("redirect_uri", self.config.redirect_uri.as_str());
        message.set_parameter("response_type", "code");
        message.set_parameter("scope", self.config.scopes.join(" "));
        message.set_parameter("state", &state);
        message.set_parameter("nonce", &nonce);
        message.set_parameter("code_challenge", code_challenge);
        message.set_parameter("code_challenge_method", "S256");

        AuthorizationRequest {
            message,
            state,
            nonce,
            code_verifier,
        }
    }

    /// Token endpoint parameters for redeeming `code`.
    ///
    /// `code_verifier` is only present when the authorization request used PKCE.
    #[must_use]
    pub fn token_endpoint_request(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> TokenEndpointRequest {
        let mut request = TokenEndpointRequest::default();
        request.set_parameter("grant_type", "authorization_code");
        request.set_parameter("code", code);
        request.set_parameter("redirect_uri", self.config.redirect_uri.as_str());
        request.set_parameter("client_id", &self.config.client_id);
        if let Some(verifier) = code_verifier {
            request.set_parameter("code_verifier", verifier);
        }
        request
    }

    /// Redeem an authorization code with the given token endpoint parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the token endpoint returns an error.
    pub async fn exchange_code(
        &self,
        request: &TokenEndpointRequest,
    ) -> Result<TokenResponse, Error> {
        let mut params = request.parameters().clone();
        params
            .entry("client_secret".into())
            .or_insert_with(|| self.config.client_secret.expose().to_string());

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        let response = ensure_success(response, "token exchange").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// End-session URL, or `None` when the provider has no end-session endpoint.
    #[must_use]
    pub fn end_session_url(&self) -> Option<Url> {
        let mut url = self.config.end_session_url.clone()?;
        url.query_pairs_mut().append_pair(
            "post_logout_redirect_uri",
            self.config.post_logout_redirect_uri.as_str(),
        );
        Some(url)
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::OAuth {
        operation,
        status: Some(status),
        detail: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> OidcConfig {
        OidcConfig::new(
            "test-client",
            ClientSecret::new("test-secret"),
            "https://login.example.com/common/v2.0".parse().unwrap(),
            "https://example.com/signin-oidc".parse().unwrap(),
        )
    }

    #[test]
    fn test_endpoints_derived_from_authority() {
        let config = test_config();

        assert_eq!(
            config.auth_url().as_str(),
            "https://login.example.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(
            config.token_url().as_str(),
            "https://login.example.com/common/oauth2/v2.0/token"
        );
        assert_eq!(
            config.jwks_url().as_str(),
            "https://login.example.com/common/discovery/v2.0/keys"
        );
        assert_eq!(
            config.post_logout_redirect_uri().as_str(),
            "https://example.com/signin-oidc"
        );
    }

    #[test]
    fn test_default_scopes_include_sign_in_and_graph() {
        let config = test_config();
        assert_eq!(
            config.scopes().join(" "),
            "openid profile offline_access Mail.Read User.Read"
        );
    }

    #[test]
    fn test_authorization_request_contains_pkce_and_nonce() {
        let client = AuthClient::new(test_config());
        let req = client.authorization_request();
        let url = req.message.to_url().to_string();

        assert!(url.starts_with("https://login.example.com/common/oauth2/v2.0/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("code_challenge_method=S256"));
        assert_eq!(req.message.parameter("state"), Some(req.state.as_str()));
        assert_eq!(req.message.parameter("nonce"), Some(req.nonce.as_str()));
        assert_eq!(
            req.message.parameter("code_challenge"),
            Some(pkce::generate_code_challenge(&req.code_verifier).as_str())
        );
    }

    #[test]
    fn test_authorization_request_unique_per_call() {
        let client = AuthClient::new(test_config());
        let req1 = client.authorization_request();
        let req2 = client.authorization_request();

        assert_ne!(req1.state, req2.state);
        assert_ne!(req1.nonce, req2.nonce);
        assert_ne!(req1.code_verifier, req2.code_verifier);
    }

    #[test]
    fn test_set_parameter_replaces_in_place() {
        let mut message = AuthorizationMessage::new("https://idp.example.com/authorize".parse().unwrap());
        message.set_parameter("a", "1");
        message.set_parameter("b", "2");
        message.set_parameter("a", "3");

        assert_eq!(message.parameters().len(), 2);
        assert_eq!(message.parameter("a"), Some("3"));
        assert_eq!(
            message.to_url().as_str(),
            "https://idp.example.com/authorize?a=3&b=2"
        );
    }

    #[test]
    fn test_token_endpoint_request_without_verifier() {
        let client = AuthClient::new(test_config());
        let request = client.token_endpoint_request("the-code", None);

        assert_eq!(request.parameter("code"), Some("the-code"));
        assert_eq!(request.parameter("grant_type"), Some("authorization_code"));
        assert_eq!(request.parameter("code_verifier"), None);
    }

    #[test]
    fn test_end_session_url() {
        let client = AuthClient::new(test_config());
        let url = client.end_session_url().unwrap();
        assert_eq!(url.path(), "/common/oauth2/v2.0/logout");
        assert!(
            url.as_str()
                .contains("post_logout_redirect_uri=https%3A%2F%2Fexample.com%2Fsignin-oidc")
        );

        let client = AuthClient::new(test_config().with_end_session_url(None));
        assert!(client.end_session_url().is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("code_verifier=ver"))
            .and(body_string_contains("client_secret=test-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "Bearer",
                "id_token": "idt",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config =
            test_config().with_token_url(format!("{}/token", server.uri()).parse().unwrap());
        let client = AuthClient::new(config);
        let request = client.token_endpoint_request("abc", Some("ver"));
        let tokens = client.exchange_code(&request).await.unwrap();

        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.id_token.as_deref(), Some("idt"));
    }

    #[tokio::test]
    async fn test_exchange_code_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":\"invalid_grant\"}"))
            .mount(&server)
            .await;

        let config =
            test_config().with_token_url(format!("{}/token", server.uri()).parse().unwrap());
        let client = AuthClient::new(config);
        let err = client
            .exchange_code(&client.token_endpoint_request("abc", None))
            .await
            .unwrap_err();

        match err {
            Error::OAuth { status, detail, .. } => {
                assert_eq!(status, Some(400));
                assert!(detail.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
