// Graph client module: a small blocking HTTP client for the three document
// graph calls this tool makes (site, default drive, content upload).
// `DocumentGraph` is the seam `app::run` talks through, so the workflow can
// be exercised without a network.

use crate::auth::{AccessToken, ClientSecretCredential, GRAPH_DEFAULT_SCOPE};
use crate::error::{GraphUploadError, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use tracing::{debug, info};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Fields requested when looking up a site.
pub const SITE_FIELDS: &str = "id,name,displayName,webUrl";

/// Site metadata, reduced to the selected fields.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub web_url: Option<String>,
}

/// The site's default document library.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Drive {
    pub id: Option<String>,
}

/// Item returned by a content upload.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub web_url: Option<String>,
    pub size: Option<u64>,
}

/// Graph error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Remote operations the upload workflow needs.
pub trait DocumentGraph {
    /// Obtain credentials for the calls that follow.
    fn authenticate(&mut self) -> Result<()>;

    /// Fetch a site by id with [`SITE_FIELDS`] selected.
    fn site(&self, site_id: &str) -> Result<Option<Site>>;

    /// Fetch the default drive of a site.
    fn default_drive(&self, site_id: &str) -> Result<Option<Drive>>;

    /// Stream `file` to `root:/{remote_name}` in `drive_id`. The file is
    /// consumed and closed when the call returns.
    fn upload_content(
        &self,
        drive_id: &str,
        remote_name: &str,
        file: File,
    ) -> Result<Option<DriveItem>>;
}

/// Graph client holding a reqwest blocking client, the API base URL, the
/// credential and the token once authenticated.
pub struct GraphClient {
    client: Client,
    base_url: Url,
    credential: ClientSecretCredential,
    token: Option<AccessToken>,
}

impl GraphClient {
    /// Create a client for the public Graph endpoint.
    pub fn new(credential: ClientSecretCredential) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("graph-upload/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(GRAPH_BASE_URL)
            .map_err(|e| GraphUploadError::InvalidUrl(e.to_string()))?;
        Ok(GraphClient {
            client,
            base_url,
            credential,
            token: None,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Use `token` for subsequent calls instead of requesting one.
    pub fn set_token(&mut self, token: AccessToken) {
        self.token = Some(token);
    }

    /// `{base}/sites/{id}`. The id goes in unescaped so both the
    /// `host,site-guid,web-guid` and `host:/sites/path:` forms work.
    pub fn site_url(&self, site_id: &str) -> String {
        format!("{}/sites/{}", self.base(), site_id)
    }

    pub fn drive_url(&self, site_id: &str) -> String {
        format!("{}/drive", self.site_url(site_id))
    }

    /// `{base}/drives/{drive}/items/root:/{name}:/content` with the name
    /// percent-encoded as a single path segment.
    pub fn upload_url(&self, drive_id: &str, remote_name: &str) -> Url {
        let mut url = self.base_url.clone();
        let item = format!("{remote_name}:");
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["drives", drive_id, "items", "root:", item.as_str(), "content"]);
        }
        url
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn site_request(&self, site_id: &str) -> Result<RequestBuilder> {
        let url = self.site_url(site_id);
        debug!(%url, "GET site");
        self.authorized(self.client.get(&url).query(&[("$select", SITE_FIELDS)]))
    }

    fn drive_request(&self, site_id: &str) -> Result<RequestBuilder> {
        let url = self.drive_url(site_id);
        debug!(%url, "GET drive");
        self.authorized(self.client.get(&url))
    }

    fn upload_request(
        &self,
        drive_id: &str,
        remote_name: &str,
        file: File,
    ) -> Result<RequestBuilder> {
        let url = self.upload_url(drive_id, remote_name);
        let size = file.metadata().map(|m| m.len()).unwrap_or_default();
        info!(%url, size, "uploading content");
        self.authorized(
            self.client
                .put(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(file),
        )
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.token {
            Some(t) => Ok(req.bearer_auth(t.secret())),
            None => Err(GraphUploadError::Authentication {
                status: StatusCode::UNAUTHORIZED,
                message: "the client has not authenticated yet".into(),
            }),
        }
    }
}

impl DocumentGraph for GraphClient {
    fn authenticate(&mut self) -> Result<()> {
        let token = self
            .credential
            .get_token(&self.client, &[GRAPH_DEFAULT_SCOPE])?;
        self.token = Some(token);
        Ok(())
    }

    fn site(&self, site_id: &str) -> Result<Option<Site>> {
        read_optional(self.site_request(site_id)?.send()?)
    }

    fn default_drive(&self, site_id: &str) -> Result<Option<Drive>> {
        read_optional(self.drive_request(site_id)?.send()?)
    }

    fn upload_content(
        &self,
        drive_id: &str,
        remote_name: &str,
        file: File,
    ) -> Result<Option<DriveItem>> {
        read_optional(self.upload_request(drive_id, remote_name, file)?.send()?)
    }
}

fn read_optional<T: DeserializeOwned>(res: Response) -> Result<Option<T>> {
    let status = res.status();
    let txt = res.text()?;
    parse_optional(status, &txt)
}

/// `Ok(None)` for an empty body, the parsed value for a JSON body, or a
/// service error for a non-success status.
fn parse_optional<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<Option<T>> {
    if !status.is_success() {
        return Err(service_error(status, body));
    }
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

fn service_error(status: StatusCode, body: &str) -> GraphUploadError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let code = detail.as_ref().and_then(|d| d.code.clone());
    let message = detail
        .and_then(|d| d.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "Graph returned {}",
                status.canonical_reason().unwrap_or("an error status")
            )
        });
    debug!(%status, ?code, "graph call failed");
    GraphUploadError::Service {
        status,
        code,
        message,
    }
}
