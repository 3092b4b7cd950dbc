use super::notifications::{AuthFailedContext, CodeReceivedContext, RedirectContext};
use super::traits::{AuthEvents, SessionState};
use crate::confidential::{AuthorizationCodeRequest, TokenAcquirer};
use crate::error::Error;

/// Session key holding the SPA authorization code after sign-in.
pub const SPA_AUTH_CODE_KEY: &str = "Spa_Auth_Code";

const EXTRA_PARAMETER: (&str, &str) = ("myNewParameter", "its Value");
pub(super) const REDEMPTION_SCOPES: [&str; 2] = ["Mail.Read", "User.Read"];
const ERROR_PATH: &str = "/Error";

/// Sign-in coordinator for a web app that hands a second authorization code
/// to its browser front-end.
///
/// - tags every authorization request with an extension parameter;
/// - redeems the authorization code through a confidential client, asking for
///   a SPA code, and stores that code in the user's session under
///   [`SPA_AUTH_CODE_KEY`];
/// - sends failed sign-ins to `/Error?message=...`.
pub struct AuthFlowCoordinator<T> {
    client: T,
    scopes: Vec<String>,
    error_path: String,
}

impl<T: TokenAcquirer> AuthFlowCoordinator<T> {
    #[must_use]
    pub fn new(client: T) -> Self {
        Self {
            client,
            scopes: REDEMPTION_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            error_path: ERROR_PATH.into(),
        }
    }

    /// Override the error page path (default: `/Error`).
    #[must_use]
    pub fn with_error_path(mut self, path: impl Into<String>) -> Self {
        self.error_path = path.into();
        self
    }

    #[must_use]
    pub fn client(&self) -> &T {
        &self.client
    }
}

impl<T: TokenAcquirer> AuthEvents for AuthFlowCoordinator<T> {
    fn on_redirect(&self, ctx: &mut RedirectContext) {
        let (key, value) = EXTRA_PARAMETER;
        ctx.message.set_parameter(key, value);
    }

    async fn on_code_received<S: SessionState>(
        &self,
        ctx: &mut CodeReceivedContext,
        session: &S,
    ) -> Result<(), Error> {
        let code_verifier = ctx
            .token_endpoint_request()
            .parameter("code_verifier")
            .map(str::to_owned);
        if code_verifier.is_none() {
            tracing::debug!("Token endpoint request has no PKCE code verifier");
        }

        let request = AuthorizationCodeRequest::new(self.scopes.clone(), ctx.code())
            .with_spa_authorization_code()
            .with_pkce_code_verifier(code_verifier);

        let result = self.client.acquire_token_by_authorization_code(request).await?;

        match result.spa_auth_code {
            Some(spa_code) => session
                .insert_value(SPA_AUTH_CODE_KEY, spa_code.into())
                .await
                .map_err(|e| Error::Session(e.to_string()))?,
            None => tracing::warn!("Identity provider returned no SPA auth code"),
        }

        ctx.handle_code_redemption(result.access_token, result.id_token);
        Ok(())
    }

    fn on_auth_failed(&self, ctx: &mut AuthFailedContext) {
        ctx.handle_response();
        let message = ctx.error().to_string();
        let encoded = urlencoding::encode(&message);
        ctx.redirect(&format!("{}?message={encoded}", self.error_path));
    }
}
