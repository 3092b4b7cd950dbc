use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Cookie;
use serde::Deserialize;
use tower_sessions::Session;

use super::config::HybridAuthConfig;
use super::cookies;
use super::error::AuthError;
use super::extractor::AuthUser;
use super::notifications::{AuthFailedContext, CodeReceivedContext, RedirectContext};
use super::state::AuthState;
use super::traits::AuthEvents;

/// Create the sign-in router.
///
/// - `GET {auth_path}/signin`: redirect to the identity provider
/// - `GET {callback_path}`: authorization code callback (path of the redirect URI)
/// - `GET|POST {auth_path}/signout`
///
/// The router must be wrapped in a [`tower_sessions::SessionManagerLayer`].
pub fn auth_routes<E: AuthEvents>(config: HybridAuthConfig, events: E) -> Router {
    let auth_path = config.settings.auth_path.clone();
    let callback_path = config.settings.callback_path.clone();

    let state = AuthState {
        client: Arc::new(config.client),
        validator: Arc::new(config.validator),
        events: Arc::new(events),
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/signin"), get(signin::<E>))
        .route(&callback_path, get(callback::<E>))
        .route(
            &format!("{auth_path}/signout"),
            get(signout::<E>).post(signout::<E>),
        )
        .with_state(state)
}

// ── Sign-in ────────────────────────────────────────────────────────

async fn signin<E: AuthEvents>(
    State(state): State<AuthState<E>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let request = state.client.authorization_request();

    let mut ctx = RedirectContext::new(request.message);
    state.events.on_redirect(&mut ctx);

    let [verifier, csrf, nonce] = cookies::flow_cookies(
        &request.code_verifier,
        &request.state,
        &request.nonce,
        state.settings.secure_cookies,
    );
    let jar = jar.add(verifier).add(csrf).add(nonce);

    (jar, Redirect::to(ctx.message.to_url().as_str()))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<E: AuthEvents>(
    State(state): State<AuthState<E>>,
    jar: PrivateCookieJar,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Response {
    let flow = cookies::get_flow_cookies(&jar);

    let [clear_verifier, clear_csrf, clear_nonce] = cookies::clear_flow_cookies();
    let jar = jar
        .remove(clear_verifier)
        .remove(clear_csrf)
        .remove(clear_nonce);

    match complete_sign_in(&state, &session, params, flow).await {
        Ok(principal) => (
            jar.add(principal),
            Redirect::to(&state.settings.login_redirect),
        )
            .into_response(),
        Err(response) => (jar, response).into_response(),
    }
}

/// Runs the callback up to the sign-in cookie. Flow cookies are single-use
/// and cleared by the caller whatever the outcome.
async fn complete_sign_in<E: AuthEvents>(
    state: &AuthState<E>,
    session: &Session,
    params: CallbackParams,
    flow: cookies::FlowCookies,
) -> Result<Cookie<'static>, Response> {
    let code = check_callback(params, flow.state.as_deref())
        .map_err(|error| authentication_failed(state, error))?;

    let token_request = state
        .client
        .token_endpoint_request(&code, flow.code_verifier.as_deref());
    let mut ctx = CodeReceivedContext::new(code, token_request);

    state
        .events
        .on_code_received(&mut ctx, session)
        .await
        .map_err(|e| AuthError::Redemption(e).into_response())?;

    let id_token = match ctx.into_redemption() {
        (_, Some(redemption)) => redemption.id_token,
        (token_request, None) => {
            let tokens = state
                .client
                .exchange_code(&token_request)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Token exchange failed");
                    authentication_failed(state, AuthError::TokenEndpoint(e.to_string()))
                })?;
            tokens.id_token.ok_or_else(|| {
                authentication_failed(
                    state,
                    AuthError::TokenEndpoint("token response has no id_token".into()),
                )
            })?
        }
    };

    let claims = state
        .validator
        .validate(&id_token, flow.nonce.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "ID token rejected");
            authentication_failed(state, AuthError::IdToken(e.to_string()))
        })?;

    let user = AuthUser::from(claims);
    let principal = cookies::principal_cookie(
        &user,
        state.settings.session_ttl_days,
        state.settings.secure_cookies,
    )
    .map_err(|e| AuthError::Session(e.to_string()).into_response())?;

    tracing::info!(subject = %user.subject, "OIDC sign-in successful");

    Ok(principal)
}

/// Returns the authorization code, or the failure to report.
fn check_callback(params: CallbackParams, expected_state: Option<&str>) -> Result<String, AuthError> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_else(|| error.clone());
        tracing::warn!(error = %error, description = %description, "OIDC error from identity provider");
        return Err(AuthError::IdentityProvider { error, description });
    }

    match (params.state.as_deref(), expected_state) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => {
            tracing::warn!("OIDC state mismatch");
            return Err(AuthError::StateMismatch);
        }
    }

    params.code.ok_or(AuthError::MissingCode)
}

fn authentication_failed<E: AuthEvents>(state: &AuthState<E>, error: AuthError) -> Response {
    let mut ctx = AuthFailedContext::new(error);
    state.events.on_auth_failed(&mut ctx);
    ctx.into_response()
}

// ── Sign-out ───────────────────────────────────────────────────────

async fn signout<E: AuthEvents>(
    State(state): State<AuthState<E>>,
    jar: PrivateCookieJar,
    session: Session,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    if let Some(user) = cookies::get_principal(&jar) {
        tracing::info!(subject = %user.subject, "Signing out");
    }

    session
        .flush()
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;

    let target = state
        .client
        .end_session_url()
        .map(String::from)
        .unwrap_or_else(|| state.settings.logout_redirect.clone());

    Ok((
        jar.remove(cookies::clear_principal_cookie()),
        Redirect::to(&target),
    ))
}
