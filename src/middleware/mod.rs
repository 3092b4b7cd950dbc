//! Plug-and-play OpenID Connect sign-in middleware for Axum.
//!
//! Runs the authorization-code flow with PKCE, lets an [`AuthEvents`]
//! implementation take part at three points (redirect, code received,
//! failure) and signs the user in with an encrypted cookie.
//! [`AuthFlowCoordinator`] is the stock implementation: it redeems the code
//! through a confidential client and keeps the SPA auth code in the user's
//! server-side session.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hybrid_spa_auth::ConfidentialClient;
//! use hybrid_spa_auth::middleware::{AuthFlowCoordinator, HybridAuthConfig, auth_routes};
//! use tower_sessions::{MemoryStore, SessionManagerLayer};
//!
//! // 1. Configure from environment
//! let config = HybridAuthConfig::from_env()?;
//!
//! // 2. Build the coordinator around a confidential client
//! let coordinator = AuthFlowCoordinator::new(ConfidentialClient::new(config.oidc()));
//!
//! // 3. Mount auth routes inside a session layer
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, coordinator))
//!     .layer(SessionManagerLayer::new(MemoryStore::default()));
//! ```

mod config;
mod cookies;
mod coordinator;
mod error;
mod extractor;
mod notifications;
mod routes;
mod state;
mod traits;

pub use config::HybridAuthConfig;
pub use coordinator::{AuthFlowCoordinator, SPA_AUTH_CODE_KEY};
pub use error::AuthError;
pub use extractor::AuthUser;
pub use notifications::{AuthFailedContext, CodeReceivedContext, CodeRedemption, RedirectContext};
pub use routes::auth_routes;
pub use traits::{AuthEvents, SessionState};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
