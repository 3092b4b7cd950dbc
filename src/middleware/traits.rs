use std::future::Future;

use super::notifications::{AuthFailedContext, CodeReceivedContext, RedirectContext};
use crate::error::Error;

/// Hooks into the sign-in flow, one per event.
///
/// The routes dispatch exactly one of these per request. Implemented by
/// [`AuthFlowCoordinator`](super::AuthFlowCoordinator).
///
/// # Example
///
/// ```rust,ignore
/// struct Tagging;
///
/// impl AuthEvents for Tagging {
///     fn on_redirect(&self, ctx: &mut RedirectContext) {
///         ctx.message.set_parameter("prompt", "select_account");
///     }
///
///     async fn on_code_received<S: SessionState>(
///         &self,
///         _ctx: &mut CodeReceivedContext,
///         _session: &S,
///     ) -> Result<(), Error> {
///         Ok(()) // let the middleware redeem the code
///     }
///
///     fn on_auth_failed(&self, ctx: &mut AuthFailedContext) {
///         ctx.handle_response();
///         ctx.redirect("/oops");
///     }
/// }
/// ```
pub trait AuthEvents: Send + Sync + 'static {
    /// Called before redirecting the browser to the identity provider.
    fn on_redirect(&self, ctx: &mut RedirectContext);

    /// Called with the authorization code, before the middleware redeems it.
    ///
    /// Errors are not routed to [`on_auth_failed`](Self::on_auth_failed).
    fn on_code_received<S: SessionState>(
        &self,
        ctx: &mut CodeReceivedContext,
        session: &S,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Called when sign-in fails.
    fn on_auth_failed(&self, ctx: &mut AuthFailedContext);
}

/// Per-user server-side session state for the current request.
///
/// Implemented for [`tower_sessions::Session`].
pub trait SessionState: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn insert_value(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;
}

impl SessionState for tower_sessions::Session {
    async fn insert_value(
        &self,
        key: &str,
        value: String,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.insert(key, value).await.map_err(Into::into)
    }
}
