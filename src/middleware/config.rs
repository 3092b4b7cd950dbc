use axum_extra::extract::cookie::Key;
use url::Url;

use super::coordinator::REDEMPTION_SCOPES;
use super::error::AuthError;
use crate::oauth::{AuthClient, BASIC_SIGN_IN_SCOPES, OidcConfig};
use crate::token::IdTokenValidator;
use crate::types::ClientSecret;
use crate::well_known::OpenIdConfiguration;

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) callback_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
}

impl AuthSettings {
    fn defaults(redirect_uri: &Url) -> Self {
        Self {
            cookie_key: Key::generate(),
            session_ttl_days: 14,
            secure_cookies: true,
            auth_path: "/account".into(),
            callback_path: redirect_uri.path().to_string(),
            login_redirect: "/".into(),
            logout_redirect: "/".into(),
        }
    }
}

/// Sign-in middleware configuration.
///
/// Use [`from_env()`](HybridAuthConfig::from_env) for convention-based setup,
/// or [`new()`](HybridAuthConfig::new) with `with_*` methods for full control.
/// The callback route listens on the path of the configured redirect URI.
pub struct HybridAuthConfig {
    pub(super) client: AuthClient,
    pub(super) validator: IdTokenValidator,
    pub(super) settings: AuthSettings,
}

impl HybridAuthConfig {
    /// Create config from an [`OidcConfig`].
    ///
    /// ID tokens are validated against the configuration's JWKS endpoint.
    #[must_use]
    pub fn new(oidc: OidcConfig) -> Self {
        let settings = AuthSettings::defaults(oidc.redirect_uri());
        let validator = IdTokenValidator::new(oidc.client_id(), oidc.jwks_url().clone());
        Self {
            client: AuthClient::new(oidc),
            validator,
            settings,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OIDC_CLIENT_ID`: application (client) ID
    /// - `OIDC_CLIENT_SECRET`: client secret used to redeem codes
    /// - `OIDC_AUTHORITY`: authority, e.g. `https://login.microsoftonline.com/common/v2.0`
    /// - `OIDC_REDIRECT_URI`: callback URI registered with the identity provider
    ///
    /// # Optional env vars
    /// - `OIDC_POST_LOGOUT_REDIRECT_URI`: defaults to the redirect URI
    /// - `OIDC_BASIC_SCOPES`: space-separated sign-in scopes
    ///   (default `openid profile offline_access`); `Mail.Read User.Read` is always appended
    /// - `DEV_AUTH`: `"1"` or `"true"` disables the `Secure` cookie attribute
    /// - `COOKIE_KEY`: cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let required =
            |name: &str| var(name).ok_or_else(|| AuthError::Config(format!("{name} is required")));

        let client_id = required("OIDC_CLIENT_ID")?;
        let client_secret = ClientSecret::new(required("OIDC_CLIENT_SECRET")?);
        let authority = parse_url("OIDC_AUTHORITY", &required("OIDC_AUTHORITY")?)?;
        let redirect_uri = parse_url("OIDC_REDIRECT_URI", &required("OIDC_REDIRECT_URI")?)?;

        let mut oidc = OidcConfig::new(client_id, client_secret, authority, redirect_uri);

        if let Some(url_str) = var("OIDC_POST_LOGOUT_REDIRECT_URI") {
            oidc = oidc
                .with_post_logout_redirect_uri(parse_url("OIDC_POST_LOGOUT_REDIRECT_URI", &url_str)?);
        }

        let basic_scopes =
            var("OIDC_BASIC_SCOPES").unwrap_or_else(|| BASIC_SIGN_IN_SCOPES.join(" "));
        let mut scopes: Vec<String> = Vec::new();
        for scope in basic_scopes.split_whitespace().chain(REDEMPTION_SCOPES) {
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }
        oidc = oidc.with_scopes(scopes);

        let dev_auth = matches!(var("DEV_AUTH").as_deref(), Some("1") | Some("true"));

        let cookie_key = match var("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => Key::generate(),
        };

        Ok(Self::new(oidc)
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth))
    }

    /// Replace the derived endpoints with the provider's published metadata.
    ///
    /// The HTTP client is kept. A custom ID token validator is kept too; only
    /// one still pointing at the derived JWKS endpoint is moved to the
    /// published `jwks_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the metadata document cannot be fetched.
    pub async fn discover(self) -> Result<Self, AuthError> {
        let doc = OpenIdConfiguration::fetch(self.client.http(), self.client.config().authority())
            .await
            .map_err(|e| AuthError::Config(format!("OIDC discovery: {e}")))?;
        tracing::info!(issuer = %doc.issuer, "Loaded OpenID provider metadata");

        let derived_jwks_url = self.client.config().jwks_url().clone();
        let http = self.client.http().clone();
        let oidc = self.client.config().clone().with_discovery(doc);

        let validator = if *self.validator.jwks_url() == derived_jwks_url {
            self.validator.with_jwks_url(oidc.jwks_url().clone())
        } else {
            self.validator
        };

        Ok(Self {
            validator,
            client: AuthClient::new(oidc).with_http_client(http),
            settings: self.settings,
        })
    }

    #[must_use]
    pub fn oidc(&self) -> &OidcConfig {
        self.client.config()
    }

    #[must_use]
    pub fn cookie_key(&self) -> &Key {
        &self.settings.cookie_key
    }

    /// Whether cookies carry the `Secure` attribute (off with `DEV_AUTH`).
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.settings.secure_cookies
    }

    #[must_use]
    pub fn with_id_token_validator(mut self, validator: IdTokenValidator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Prefix of the sign-in and sign-out routes (default `/account`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, AuthError> {
    value
        .parse()
        .map_err(|e| AuthError::Config(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::token::tests::{mint_id_token, test_key_set};

    const REQUIRED: [(&str, &str); 4] = [
        ("OIDC_CLIENT_ID", "client-1"),
        ("OIDC_CLIENT_SECRET", "secret"),
        ("OIDC_AUTHORITY", "https://login.example.com/common/v2.0"),
        ("OIDC_REDIRECT_URI", "https://app.example.com/signin-oidc"),
    ];

    fn env(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = REQUIRED
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        vars.extend(extra.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        vars
    }

    fn load(vars: &HashMap<String, String>) -> Result<HybridAuthConfig, AuthError> {
        HybridAuthConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn config_error(vars: &HashMap<String, String>) -> String {
        match load(vars) {
            Err(AuthError::Config(msg)) => msg,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("configuration should have been rejected"),
        }
    }

    fn oidc() -> OidcConfig {
        OidcConfig::new(
            "client-1",
            ClientSecret::new("secret"),
            "https://login.example.com/common/v2.0".parse().unwrap(),
            "https://app.example.com/signin-oidc".parse().unwrap(),
        )
    }

    #[test]
    fn callback_path_follows_redirect_uri() {
        let config = HybridAuthConfig::new(oidc());
        assert_eq!(config.settings.callback_path, "/signin-oidc");
        assert_eq!(config.settings.auth_path, "/account");
        assert!(config.settings.secure_cookies);
    }

    #[test]
    fn builder_overrides() {
        let config = HybridAuthConfig::new(oidc())
            .with_auth_path("/auth")
            .with_secure_cookies(false)
            .with_login_redirect("/home")
            .with_session_ttl_days(1);

        assert_eq!(config.settings.auth_path, "/auth");
        assert!(!config.settings.secure_cookies);
        assert_eq!(config.settings.login_redirect, "/home");
        assert_eq!(config.settings.session_ttl_days, 1);
    }

    #[test]
    fn env_defaults() {
        let config = load(&env(&[])).unwrap();

        assert_eq!(config.oidc().client_id(), "client-1");
        assert_eq!(
            config.oidc().scopes(),
            ["openid", "profile", "offline_access", "Mail.Read", "User.Read"]
        );
        assert_eq!(
            config.oidc().post_logout_redirect_uri().as_str(),
            "https://app.example.com/signin-oidc"
        );
        assert!(config.secure_cookies());
    }

    #[test]
    fn each_required_variable_is_reported() {
        for (name, _) in REQUIRED {
            let mut vars = env(&[]);
            vars.remove(name);
            assert_eq!(config_error(&vars), format!("{name} is required"));
        }
    }

    #[test]
    fn invalid_authority_is_rejected() {
        let mut vars = env(&[]);
        vars.insert("OIDC_AUTHORITY".into(), "not a url".into());
        assert!(config_error(&vars).starts_with("OIDC_AUTHORITY:"));
    }

    #[test]
    fn short_cookie_key_is_rejected() {
        let msg = config_error(&env(&[("COOKIE_KEY", "too-short")]));
        assert!(msg.contains("COOKIE_KEY"));
    }

    #[test]
    fn cookie_key_from_env_is_used() {
        let raw = "k".repeat(64);
        let config = load(&env(&[("COOKIE_KEY", &raw)])).unwrap();
        assert_eq!(
            config.cookie_key().master(),
            Key::try_from(raw.as_bytes()).unwrap().master()
        );
    }

    #[test]
    fn dev_auth_disables_secure_cookies() {
        for value in ["1", "true"] {
            let config = load(&env(&[("DEV_AUTH", value)])).unwrap();
            assert!(!config.secure_cookies(), "DEV_AUTH={value}");
        }
        let config = load(&env(&[("DEV_AUTH", "0")])).unwrap();
        assert!(config.secure_cookies());
    }

    #[test]
    fn basic_scopes_are_extended_without_duplicates() {
        let config = load(&env(&[("OIDC_BASIC_SCOPES", "openid profile User.Read")])).unwrap();
        assert_eq!(
            config.oidc().scopes(),
            ["openid", "profile", "User.Read", "Mail.Read"]
        );
    }

    #[test]
    fn post_logout_redirect_uri_is_parsed() {
        let config = load(&env(&[(
            "OIDC_POST_LOGOUT_REDIRECT_URI",
            "https://app.example.com/bye",
        )]))
        .unwrap();
        assert_eq!(
            config.oidc().post_logout_redirect_uri().as_str(),
            "https://app.example.com/bye"
        );

        let msg = config_error(&env(&[("OIDC_POST_LOGOUT_REDIRECT_URI", "nope")]));
        assert!(msg.starts_with("OIDC_POST_LOGOUT_REDIRECT_URI:"));
    }

    async fn metadata_server() -> MockServer {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/tenant/v2.0/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": format!("{base}/tenant/v2.0"),
                "authorization_endpoint": format!("{base}/tenant/oauth2/v2.0/authorize"),
                "token_endpoint": format!("{base}/tenant/oauth2/v2.0/token"),
                "jwks_uri": format!("{base}/tenant/discovery/v2.0/published-keys")
            })))
            .mount(&server)
            .await;
        server
    }

    fn tenant_oidc(server: &MockServer) -> OidcConfig {
        OidcConfig::new(
            "client-1",
            ClientSecret::new("secret"),
            format!("{}/tenant/v2.0", server.uri()).parse().unwrap(),
            "https://app.example.com/signin-oidc".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn discover_keeps_custom_validator() {
        let server = metadata_server().await;
        let custom_jwks: Url = "https://keys.example.com/custom".parse().unwrap();
        let validator =
            IdTokenValidator::new("client-1", custom_jwks.clone()).with_keys(test_key_set());

        let config = HybridAuthConfig::new(tenant_oidc(&server))
            .with_id_token_validator(validator)
            .discover()
            .await
            .unwrap();

        assert_eq!(config.validator.jwks_url(), &custom_jwks);
        config
            .validator
            .validate(&mint_id_token("client-1", None, 600), None)
            .await
            .unwrap();
        assert_eq!(
            config.oidc().token_url().as_str(),
            format!("{}/tenant/oauth2/v2.0/token", server.uri())
        );
    }

    #[tokio::test]
    async fn discover_moves_derived_jwks_url_and_keeps_seeded_keys() {
        let server = metadata_server().await;
        let oidc = tenant_oidc(&server);
        let validator =
            IdTokenValidator::new("client-1", oidc.jwks_url().clone()).with_keys(test_key_set());

        let config = HybridAuthConfig::new(oidc)
            .with_id_token_validator(validator)
            .discover()
            .await
            .unwrap();

        assert_eq!(
            config.validator.jwks_url().as_str(),
            format!("{}/tenant/discovery/v2.0/published-keys", server.uri())
        );
        config
            .validator
            .validate(&mint_id_token("client-1", None, 600), None)
            .await
            .unwrap();
    }

    #[test]
    fn parse_url_reports_variable_name() {
        let err = parse_url("OIDC_AUTHORITY", "not a url").unwrap_err();
        assert!(err.to_string().contains("OIDC_AUTHORITY"));
    }
}
