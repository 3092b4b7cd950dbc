use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Subset of the OpenID Provider metadata document
/// (`/.well-known/openid-configuration`) used by the sign-in flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub jwks_uri: Url,
    #[serde(default)]
    pub end_session_endpoint: Option<Url>,
    #[serde(default)]
    pub userinfo_endpoint: Option<Url>,
}

impl OpenIdConfiguration {
    /// Location of the metadata document for `authority`.
    #[must_use]
    pub fn document_url(authority: &Url) -> Url {
        let mut url = authority.clone();
        let path = format!(
            "{}/.well-known/openid-configuration",
            authority.path().trim_end_matches('/')
        );
        url.set_path(&path);
        url
    }

    /// Fetch the provider metadata for `authority`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::OAuth`] if the
    /// provider does not serve the document.
    pub async fn fetch(http: &reqwest::Client, authority: &Url) -> Result<Self, Error> {
        let response = http.get(Self::document_url(authority)).send().await?;
        let response = crate::oauth::ensure_success(response, "discovery").await?;
        response.json::<Self>().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn document_url_keeps_tenant_path() {
        let authority: Url = "https://login.microsoftonline.com/common/v2.0/"
            .parse()
            .unwrap();
        assert_eq!(
            OpenIdConfiguration::document_url(&authority).as_str(),
            "https://login.microsoftonline.com/common/v2.0/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn fetch_parses_metadata() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/tenant/v2.0/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": format!("{base}/tenant/v2.0"),
                "authorization_endpoint": format!("{base}/tenant/oauth2/v2.0/authorize"),
                "token_endpoint": format!("{base}/tenant/oauth2/v2.0/token"),
                "jwks_uri": format!("{base}/tenant/discovery/v2.0/keys"),
                "end_session_endpoint": format!("{base}/tenant/oauth2/v2.0/logout"),
                "response_types_supported": ["code", "id_token"]
            })))
            .mount(&server)
            .await;

        let authority: Url = format!("{base}/tenant/v2.0").parse().unwrap();
        let doc = OpenIdConfiguration::fetch(&reqwest::Client::new(), &authority)
            .await
            .unwrap();

        assert_eq!(doc.token_endpoint.path(), "/tenant/oauth2/v2.0/token");
        assert!(doc.end_session_endpoint.is_some());
        assert!(doc.userinfo_endpoint.is_none());
    }

    #[tokio::test]
    async fn fetch_reports_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let authority: Url = server.uri().parse().unwrap();
        let err = OpenIdConfiguration::fetch(&reqwest::Client::new(), &authority)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::OAuth {
                operation: "discovery",
                status: Some(404),
                ..
            }
        ));
    }
}
