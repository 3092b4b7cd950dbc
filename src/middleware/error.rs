use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Authentication errors for the middleware layer.
///
/// Everything except [`Redemption`](Self::Redemption), [`Session`](Self::Session)
/// and [`Config`](Self::Config) is an authentication failure and is routed to
/// [`AuthEvents::on_auth_failed`](super::AuthEvents::on_auth_failed).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No valid sign-in cookie.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The identity provider returned `error` to the callback.
    #[error("{description}")]
    IdentityProvider { error: String, description: String },

    /// Callback `state` does not match the value issued with the redirect.
    #[error("OIDC message state is invalid")]
    StateMismatch,

    /// Callback carries neither `code` nor `error`.
    #[error("Authorization code is missing")]
    MissingCode,

    /// Redemption performed by the middleware itself failed.
    #[error("Token endpoint error: {0}")]
    TokenEndpoint(String),

    /// The ID token could not be validated.
    #[error("ID token validation failed: {0}")]
    IdToken(String),

    /// Code redemption in `on_code_received` failed. Never routed to the
    /// failure handler.
    #[error("Authorization code redemption failed: {0}")]
    Redemption(#[source] crate::error::Error),

    /// Server-side session operation failed.
    #[error("Session store error: {0}")]
    Session(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::IdentityProvider { .. }
            | Self::StateMismatch
            | Self::MissingCode
            | Self::TokenEndpoint(_)
            | Self::IdToken(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::Redemption(_) | Self::Session(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
