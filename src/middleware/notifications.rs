//! Per-request contexts handed to [`AuthEvents`](super::AuthEvents).

use axum::response::{IntoResponse, Redirect, Response};

use super::error::AuthError;
use crate::oauth::{AuthorizationMessage, TokenEndpointRequest};

/// Outgoing redirect to the identity provider.
#[derive(Debug)]
pub struct RedirectContext {
    pub message: AuthorizationMessage,
}

impl RedirectContext {
    #[must_use]
    pub fn new(message: AuthorizationMessage) -> Self {
        Self { message }
    }
}

/// Tokens supplied by whoever redeemed the authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRedemption {
    pub access_token: String,
    pub id_token: String,
}

/// Authorization code callback.
///
/// Once [`handle_code_redemption`](Self::handle_code_redemption) has been
/// called the middleware will not redeem the code again.
#[derive(Debug)]
pub struct CodeReceivedContext {
    code: String,
    token_endpoint_request: TokenEndpointRequest,
    redemption: Option<CodeRedemption>,
}

impl CodeReceivedContext {
    #[must_use]
    pub fn new(code: impl Into<String>, token_endpoint_request: TokenEndpointRequest) -> Self {
        Self {
            code: code.into(),
            token_endpoint_request,
            redemption: None,
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn token_endpoint_request(&self) -> &TokenEndpointRequest {
        &self.token_endpoint_request
    }

    /// Record tokens obtained out-of-band.
    pub fn handle_code_redemption(
        &mut self,
        access_token: impl Into<String>,
        id_token: impl Into<String>,
    ) {
        self.redemption = Some(CodeRedemption {
            access_token: access_token.into(),
            id_token: id_token.into(),
        });
    }

    #[must_use]
    pub fn is_code_redemption_handled(&self) -> bool {
        self.redemption.is_some()
    }

    #[must_use]
    pub fn redemption(&self) -> Option<&CodeRedemption> {
        self.redemption.as_ref()
    }

    pub(super) fn into_redemption(self) -> (TokenEndpointRequest, Option<CodeRedemption>) {
        (self.token_endpoint_request, self.redemption)
    }
}

/// Authentication failure.
///
/// A handler that produces its own response calls
/// [`handle_response`](Self::handle_response); otherwise the error's default
/// response is used.
#[derive(Debug)]
pub struct AuthFailedContext {
    error: AuthError,
    handled: bool,
    response: Option<Response>,
}

impl AuthFailedContext {
    #[must_use]
    pub fn new(error: AuthError) -> Self {
        Self {
            error,
            handled: false,
            response: None,
        }
    }

    #[must_use]
    pub fn error(&self) -> &AuthError {
        &self.error
    }

    /// Mark the response as produced; no further processing of the request.
    pub fn handle_response(&mut self) {
        self.handled = true;
    }

    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn redirect(&mut self, location: &str) {
        self.response = Some(Redirect::to(location).into_response());
    }

    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

impl IntoResponse for AuthFailedContext {
    fn into_response(self) -> Response {
        match (self.handled, self.response) {
            (true, Some(response)) => response,
            _ => self.error.into_response(),
        }
    }
}
