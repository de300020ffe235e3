//! GitHub fetch with a two-tier fallback.
//!
//! Tier 1 asks the raw-content host for the file. Any non-200 answer there
//! falls through to tier 2, the repository contents API, whose failures are
//! classified with a hint. Transport failures on either tier abort the fetch.
//!
//! Endpoints are built segment by segment on parsed base URLs, so every part of
//! a reference is percent-encoded and cannot leave `/<owner>/<repo>`.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use url::Url;

use crate::config::GitHubSettings;
use crate::contract::{CanonicalReference, DownloadRequest, Downloader};
use crate::error::FetchError;
use crate::reference::check_reference;

const ACCEPT_RAW_THEN_JSON: &str = "application/vnd.github.v3.raw, application/json";
const USER_AGENT: &str = concat!("md-publish/", env!("CARGO_PKG_VERSION"));

/// Body of `GET /repos/{owner}/{repo}/contents/{path}` for a single entry.
#[derive(Debug, Deserialize)]
struct ContentsEntry {
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
    encoding: Option<String>,
}

/// Fetches files from repositories of one fixed GitHub organization.
#[derive(Debug, Clone)]
pub struct GitHubDownloader {
    client: Client,
    owner: String,
    raw_base_url: Url,
    api_base_url: Url,
}

fn base_url(raw: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::BaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".to_string()));
    }
    Ok(url)
}

/// `base` with `segments` appended, each one percent-encoded.
fn endpoint<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

impl GitHubDownloader {
    pub fn new(settings: &GitHubSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            owner: settings.organization.clone(),
            raw_base_url: base_url(&settings.raw_base_url)?,
            api_base_url: base_url(&settings.api_base_url)?,
        })
    }

    fn raw_url(&self, r: &CanonicalReference) -> Url {
        let segments = [self.owner.as_str(), r.repo.as_str()]
            .into_iter()
            .chain(r.revision.split('/'))
            .chain(r.path.split('/'));
        endpoint(&self.raw_base_url, segments)
    }

    fn contents_url(&self, r: &CanonicalReference) -> Url {
        let segments = ["repos", self.owner.as_str(), r.repo.as_str(), "contents"]
            .into_iter()
            .chain(r.path.split('/'));
        endpoint(&self.api_base_url, segments)
    }

    fn get(&self, url: Url, token: Option<&str>) -> reqwest::RequestBuilder {
        let builder = self.client.get(url).header(ACCEPT, ACCEPT_RAW_THEN_JSON);
        match token {
            Some(t) if !t.is_empty() => builder.bearer_auth(t),
            _ => builder,
        }
    }

    /// Tier 1. `Ok(None)` means "try the API".
    async fn fetch_raw(
        &self,
        r: &CanonicalReference,
        token: Option<&str>,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        let url = self.raw_url(r);
        debug!(url = %url, "Fetching raw content");
        let resp = self
            .get(url.clone(), token)
            .send()
            .await
            .map_err(|source| transport(&url, source))?;
        if resp.status() != StatusCode::OK {
            info!(
                status = %resp.status(),
                url = %url,
                "Raw content not available, falling back to contents API"
            );
            return Ok(None);
        }
        let body = resp
            .bytes()
            .await
            .map_err(|source| transport(&url, source))?;
        Ok(Some(body.to_vec()))
    }

    /// Tier 2.
    async fn fetch_contents(
        &self,
        r: &CanonicalReference,
        token: Option<&str>,
    ) -> Result<Vec<u8>, FetchError> {
        let url = self.contents_url(r);
        debug!(url = %url, revision = %r.revision, "Fetching from contents API");
        let resp = self
            .get(url.clone(), token)
            .query(&[("ref", r.revision.as_str())])
            .send()
            .await
            .map_err(|source| transport(&url, source))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let hint = status_hint(status, resp.headers());
            error!(status = %status, url = %url, hint = ?hint, "GitHub contents API returned error");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                hint,
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let body = resp
            .bytes()
            .await
            .map_err(|source| transport(&url, source))?;
        if !is_json {
            return Ok(body.to_vec());
        }
        decode_contents(&r.path, &body)
    }
}

fn transport(url: &Url, source: reqwest::Error) -> FetchError {
    error!(error = ?source, url = %url, "Transport failure talking to GitHub");
    FetchError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Turns a contents API JSON body into file bytes.
fn decode_contents(path: &str, body: &[u8]) -> Result<Vec<u8>, FetchError> {
    let decode_err = |reason: String| FetchError::Decode {
        path: path.to_string(),
        reason,
    };
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| decode_err(e.to_string()))?;
    if value.is_array() {
        return Err(FetchError::NotAFile {
            path: path.to_string(),
            kind: "dir".to_string(),
        });
    }
    let entry: ContentsEntry =
        serde_json::from_value(value).map_err(|e| decode_err(e.to_string()))?;
    if entry.kind != "file" {
        return Err(FetchError::NotAFile {
            path: path.to_string(),
            kind: entry.kind,
        });
    }
    match entry.encoding.as_deref() {
        Some("base64") => {}
        other => return Err(decode_err(format!("unsupported encoding {other:?}"))),
    }
    let content: String = entry
        .content
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(content)
        .map_err(|e| decode_err(e.to_string()))
}

/// Diagnostic hint for a failed contents API call.
pub fn status_hint(status: StatusCode, headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    match status {
        StatusCode::UNAUTHORIZED => {
            Some("authentication failed; check that the GitHub token is valid".to_string())
        }
        StatusCode::FORBIDDEN if header("x-ratelimit-remaining") == Some("0") => Some(format!(
            "rate limit exceeded; resets at {}",
            header("x-ratelimit-reset").unwrap_or("unknown")
        )),
        StatusCode::FORBIDDEN => {
            Some("access forbidden; check the token's repository permissions".to_string())
        }
        StatusCode::NOT_FOUND => Some("not found; verify repo/path/ref".to_string()),
        _ => None,
    }
}

#[async_trait]
impl Downloader for GitHubDownloader {
    async fn download(
        &self,
        request: DownloadRequest,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let r = &request.reference;
        let file_name = match r.path.rsplit('/').find(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => {
                return Err(FetchError::EmptyPath {
                    repo: r.repo.clone(),
                })
            }
        };
        check_reference(&r.path, r)?;
        let token = request.token.as_deref();

        let content = match self.fetch_raw(r, token).await? {
            Some(content) => content,
            None => self.fetch_contents(r, token).await?,
        };

        let dest = dest_dir.join(file_name);
        tokio::fs::write(&dest, &content)
            .await
            .map_err(|source| FetchError::Io {
                path: dest.display().to_string(),
                source,
            })?;
        info!(
            repo = %r.repo,
            path = %r.path,
            revision = %r.revision,
            bytes = content.len(),
            dest = %dest.display(),
            "Fetched markdown from GitHub"
        );
        Ok(dest)
    }
}
