// Client-credential authentication against the Microsoft identity platform.
// The application proves its identity with a client secret and receives an
// access token scoped to itself; no user is involved.

use crate::error::{GraphUploadError, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default-scope claim for Microsoft Graph.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tenant, client id and secret for the client-credential grant.
#[derive(Clone)]
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

/// Bearer token returned by the identity endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "access_token")]
    secret: String,
    #[serde(default)]
    pub expires_in: u64,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_in: u64) -> Self {
        AccessToken {
            secret: secret.into(),
            expires_in,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Error body of the token endpoint (`error`, `error_description`).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        ClientSecretCredential {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token`
    pub fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", AUTHORITY_HOST, self.tenant_id)
    }

    /// Request a token for `scopes` (space separated in the form body).
    pub fn get_token(&self, http: &Client, scopes: &[&str]) -> Result<AccessToken> {
        let url = self.token_url();
        let scope = scopes.join(" ");
        debug!(%url, %scope, "requesting client-credential token");

        let res = http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", scope.as_str()),
            ])
            .send()?;

        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            return Err(GraphUploadError::Authentication {
                status,
                message: describe_token_error(&txt),
            });
        }

        let token: AccessToken = res.json()?;
        info!(expires_in = token.expires_in, "access token acquired");
        Ok(token)
    }
}

fn describe_token_error(body: &str) -> String {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(e) => match e.error_description {
            Some(desc) => format!("{}: {}", e.error, desc),
            None => e.error,
        },
        Err(_) if body.trim().is_empty() => "empty response from identity endpoint".into(),
        Err(_) => body.trim().to_string(),
    }
}
