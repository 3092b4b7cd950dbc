use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use super::extractor::AuthUser;

const PKCE_COOKIE_NAME: &str = "__hybrid_pkce";
const STATE_COOKIE_NAME: &str = "__hybrid_state";
const NONCE_COOKIE_NAME: &str = "__hybrid_nonce";
pub(super) const PRINCIPAL_COOKIE_NAME: &str = "__hybrid_auth";

/// Values issued with the authorization redirect and checked on the callback.
pub(super) struct FlowCookies {
    pub(super) code_verifier: Option<String>,
    pub(super) state: Option<String>,
    pub(super) nonce: Option<String>,
}

/// Create PKCE verifier, state and nonce cookies for the authorization request.
///
/// Path is `/` because the callback path is taken from the redirect URI and
/// need not share a prefix with the sign-in route.
pub(super) fn flow_cookies(
    code_verifier: &str,
    state: &str,
    nonce: &str,
    secure: bool,
) -> [Cookie<'static>; 3] {
    [
        (PKCE_COOKIE_NAME, code_verifier),
        (STATE_COOKIE_NAME, state),
        (NONCE_COOKIE_NAME, nonce),
    ]
    .map(|(name, value)| {
        Cookie::build((name.to_string(), value.to_string()))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::minutes(5))
            .build()
    })
}

/// Removal cookies for the flow cookies.
pub(super) fn clear_flow_cookies() -> [Cookie<'static>; 3] {
    [PKCE_COOKIE_NAME, STATE_COOKIE_NAME, NONCE_COOKIE_NAME].map(|name| {
        Cookie::build((name, ""))
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    })
}

pub(super) fn get_flow_cookies(jar: &PrivateCookieJar) -> FlowCookies {
    let value = |name: &str| jar.get(name).map(|c| c.value().to_string());
    FlowCookies {
        code_verifier: value(PKCE_COOKIE_NAME),
        state: value(STATE_COOKIE_NAME),
        nonce: value(NONCE_COOKIE_NAME),
    }
}

/// Create the sign-in cookie carrying the serialized principal.
pub(super) fn principal_cookie(
    user: &AuthUser,
    ttl_days: i64,
    secure: bool,
) -> Result<Cookie<'static>, serde_json::Error> {
    let value = serde_json::to_string(user)?;
    Ok(Cookie::build((PRINCIPAL_COOKIE_NAME, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(ttl_days))
        .build())
}

/// Removal cookie for the sign-in cookie.
pub(super) fn clear_principal_cookie() -> Cookie<'static> {
    Cookie::build((PRINCIPAL_COOKIE_NAME, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

pub(super) fn get_principal(jar: &PrivateCookieJar) -> Option<AuthUser> {
    jar.get(PRINCIPAL_COOKIE_NAME)
        .and_then(|c| serde_json::from_str(c.value()).ok())
}
