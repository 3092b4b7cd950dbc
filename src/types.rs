use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Confidential client secret.
///
/// `Debug` is redacted so configuration can be logged safely.
#[derive(Clone, PartialEq, Eq, From)]
pub struct ClientSecret(String);

impl ClientSecret {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret(***)")
    }
}

/// Secondary authorization code issued for a front-end (SPA) client.
///
/// Redeemed by the browser application, never by this server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SpaAuthCode(pub String);

/// OIDC subject identifier (`sub` claim of the ID token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Subject(pub String);
