use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use super::traits::AuthEvents;
use crate::oauth::AuthClient;
use crate::token::IdTokenValidator;

/// Shared state for auth route handlers.
pub(super) struct AuthState<E> {
    pub(super) client: Arc<AuthClient>,
    pub(super) validator: Arc<IdTokenValidator>,
    pub(super) events: Arc<E>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding an `E: Clone` bound.
impl<E> Clone for AuthState<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            validator: self.validator.clone(),
            events: self.events.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<E: AuthEvents> FromRef<AuthState<E>> for Key {
    fn from_ref(state: &AuthState<E>) -> Self {
        state.settings.cookie_key.clone()
    }
}
