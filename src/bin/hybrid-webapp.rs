//! Demo web app: OIDC sign-in with a SPA auth code handed to the browser.

use axum::extract::{FromRef, Query};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use hybrid_spa_auth::ConfidentialClient;
use hybrid_spa_auth::middleware::{
    AuthFlowCoordinator, AuthUser, CookieKey, HybridAuthConfig, SPA_AUTH_CODE_KEY, auth_routes,
};
use serde::Deserialize;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    cookie_key: CookieKey,
}

impl FromRef<AppState> for CookieKey {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hybrid_spa_auth=debug"));
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = HybridAuthConfig::from_env()?;
    let config = if std::env::var("OIDC_DISCOVERY").is_ok_and(|v| v == "1" || v == "true") {
        config.discover().await?
    } else {
        config
    };
    let secure_cookies = config.secure_cookies();

    let state = AppState {
        cookie_key: config.cookie_key().clone(),
    };
    let coordinator = AuthFlowCoordinator::new(ConfidentialClient::new(config.oidc()));

    let app = Router::new()
        .route("/", get(home))
        .route("/Error", get(error_page))
        .route("/spa-code", get(spa_code))
        .with_state(state)
        .merge(auth_routes(config, coordinator))
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(secure_cookies));

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn home(user: Option<AuthUser>) -> Html<String> {
    match user {
        Some(user) => Html(format!(
            "<p>Signed in as {}.</p>\
             <p><a href=\"/spa-code\">SPA auth code</a> | <a href=\"/account/signout\">Sign out</a></p>",
            html_escape(user.display_name())
        )),
        None => Html("<p><a href=\"/account/signin\">Sign in</a></p>".into()),
    }
}

#[derive(Deserialize)]
struct ErrorParams {
    message: Option<String>,
}

async fn error_page(Query(params): Query<ErrorParams>) -> impl IntoResponse {
    let message = params.message.unwrap_or_else(|| "Unknown error".into());
    Html(format!(
        "<h1>Sign-in failed</h1><p>{}</p><p><a href=\"/\">Home</a></p>",
        html_escape(&message)
    ))
}

/// Hands the SPA auth code to the front-end once; it is single-use.
async fn spa_code(_user: AuthUser, session: Session) -> Result<Json<serde_json::Value>, StatusCode> {
    let code = session
        .remove::<String>(SPA_AUTH_CODE_KEY)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session read failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(serde_json::json!({ "spa_auth_code": code })))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
