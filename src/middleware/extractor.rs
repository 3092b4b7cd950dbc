use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use serde::{Deserialize, Serialize};

use super::cookies;
use super::error::AuthError;
use crate::token::IdTokenClaims;
use crate::types::Subject;

/// Signed-in user, read from the encrypted sign-in cookie.
///
/// Use as an Axum extractor in route handlers. Returns `401 Unauthorized`
/// if the request carries no valid sign-in cookie. The application state
/// must provide the cookie [`Key`] through [`FromRef`].
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(user: AuthUser) -> impl IntoResponse {
///     format!("Hello, {}", user.display_name())
/// }
///
/// // Optional: accessible to both authenticated and anonymous users
/// async fn public(user: Option<AuthUser>) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}", u.display_name()),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// `sub` claim of the ID token.
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl AuthUser {
    /// Name for display: `name`, then `preferred_username`, then `sub`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .unwrap_or(&self.subject.0)
    }
}

impl From<IdTokenClaims> for AuthUser {
    fn from(claims: IdTokenClaims) -> Self {
        Self {
            subject: Subject(claims.sub),
            name: claims.name,
            preferred_username: claims.preferred_username.or(claims.email),
            object_id: claims.oid,
            tenant_id: claims.tid,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::Unauthenticated)?;

        cookies::get_principal(&jar).ok_or(AuthError::Unauthenticated)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(<Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            subject: Subject("sub-1".into()),
            name: None,
            preferred_username: Some("ada@example.com".into()),
            object_id: None,
            tenant_id: None,
        }
    }

    #[test]
    fn display_name_falls_back() {
        let mut u = user();
        assert_eq!(u.display_name(), "ada@example.com");
        u.name = Some("Ada".into());
        assert_eq!(u.display_name(), "Ada");
        u.name = None;
        u.preferred_username = None;
        assert_eq!(u.display_name(), "sub-1");
    }

    #[test]
    fn serialized_form_skips_missing_claims() {
        let json = serde_json::to_value(user()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"subject": "sub-1", "preferred_username": "ada@example.com"})
        );
    }
}
