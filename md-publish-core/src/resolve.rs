//! Parameter resolution: request value, then configured default, then absent.
//!
//! Remote document references are fetched before the required-field check, so
//! a successful resolution always carries a local document path.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Settings;
use crate::contract::{DownloadRequest, Downloader, PublishRequest};
use crate::error::{FetchError, PublishError};
use crate::reference::{
    check_reference, is_remote_url, DocumentSource, ReferenceParser, DEFAULT_REVISION,
};
use crate::scratch::ScratchDir;

/// Fully merged parameters for one md2conf run.
///
/// Only [`ResolvedParameters::new`] builds one, so every required field is
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameters {
    domain: String,
    username: String,
    api_key: String,
    space: String,
    root_page: Option<String>,
    markdown_path: PathBuf,
}

impl ResolvedParameters {
    /// Fails with [`PublishError::MissingParameters`] naming every blank
    /// required field, in the order domain, username, api_key, space,
    /// markdown_path. A blank `root_page` is treated as absent.
    pub fn new(
        domain: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
        space: impl Into<String>,
        root_page: Option<String>,
        markdown_path: impl Into<PathBuf>,
    ) -> Result<Self, PublishError> {
        let params = Self {
            domain: domain.into().trim().to_string(),
            username: username.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            space: space.into().trim().to_string(),
            root_page: root_page
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            markdown_path: markdown_path.into(),
        };
        let missing: Vec<&'static str> = [
            ("domain", params.domain.is_empty()),
            ("username", params.username.is_empty()),
            ("api_key", params.api_key.is_empty()),
            ("space", params.space.is_empty()),
            ("markdown_path", params.markdown_path.as_os_str().is_empty()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect();
        if missing.is_empty() {
            Ok(params)
        } else {
            Err(PublishError::MissingParameters(missing))
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn root_page(&self) -> Option<&str> {
        self.root_page.as_deref()
    }

    pub fn markdown_path(&self) -> &Path {
        &self.markdown_path
    }

    pub fn into_markdown_path(self) -> PathBuf {
        self.markdown_path
    }

    pub fn trace_resolved(&self) {
        info!(
            domain = %self.domain,
            username = "SET",
            api_key = "SET",
            space = %self.space,
            markdown_path = %self.markdown_path.display(),
            root_page = self.root_page.as_deref().unwrap_or("NOT SET"),
            "Parameters validated successfully"
        );
    }
}

fn pick(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct ParameterResolver<'a, D: ?Sized> {
    settings: &'a Settings,
    parser: ReferenceParser,
    downloader: &'a D,
}

impl<'a, D> ParameterResolver<'a, D>
where
    D: Downloader + ?Sized,
{
    pub fn new(settings: &'a Settings, downloader: &'a D) -> Self {
        Self {
            settings,
            parser: ReferenceParser::new(settings.github.organization.clone()),
            downloader,
        }
    }

    pub async fn resolve(
        &self,
        request: &PublishRequest,
        scratch: &mut ScratchDir,
    ) -> Result<ResolvedParameters, PublishError> {
        let defaults = &self.settings.confluence;
        let domain = pick(&request.domain, &defaults.domain);
        let username = pick(&request.username, &defaults.username);
        let api_key = pick(&request.api_key, &defaults.api_key);
        let space = pick(&request.space, &defaults.space);
        let root_page = pick(&request.root_page, &defaults.root_page);
        let reference = pick(&request.markdown_path, &self.settings.default_markdown_path);
        let repository = pick(&request.repository, &None);

        let markdown_path = match reference {
            Some(reference) if is_remote_url(&reference) || repository.is_some() => Some(
                self.resolve_remote(&reference, repository.as_deref(), request, scratch)
                    .await
                    .map_err(PublishError::resolution)?,
            ),
            Some(reference) => Some(PathBuf::from(reference)),
            None => None,
        };

        ResolvedParameters::new(
            domain.unwrap_or_default(),
            username.unwrap_or_default(),
            api_key.unwrap_or_default(),
            space.unwrap_or_default(),
            root_page,
            markdown_path.unwrap_or_default(),
        )
    }

    async fn resolve_remote(
        &self,
        reference: &str,
        repository: Option<&str>,
        request: &PublishRequest,
        scratch: &mut ScratchDir,
    ) -> Result<PathBuf, PublishError> {
        let explicit_revision = pick(&request.revision, &None);
        let source = match repository {
            Some(_) if Path::new(reference.trim()).exists() => {
                DocumentSource::Local(PathBuf::from(reference.trim()))
            }
            Some(repository) if !is_remote_url(reference) => {
                let repo = self.parser.repository_name(repository)?;
                let pair = format!("{}/{}", repo, reference.trim().trim_start_matches('/'));
                match self.parser.parse(&pair)? {
                    DocumentSource::Remote(mut canonical) => {
                        canonical.revision = explicit_revision
                            .clone()
                            .unwrap_or_else(|| DEFAULT_REVISION.to_string());
                        check_reference(&pair, &canonical)?;
                        DocumentSource::Remote(canonical)
                    }
                    local => local,
                }
            }
            _ => {
                let source = self.parser.parse(reference)?;
                if let (DocumentSource::Remote(canonical), Some(explicit)) =
                    (&source, &explicit_revision)
                {
                    if canonical.revision != *explicit {
                        debug!(
                            url_revision = %canonical.revision,
                            requested_revision = %explicit,
                            "URL revision takes precedence over requested ref"
                        );
                    }
                }
                source
            }
        };

        let canonical = match source {
            DocumentSource::Local(path) => return Ok(path),
            DocumentSource::Remote(canonical) => canonical,
        };
        let dest_dir = scratch.get_or_create().map_err(|source| FetchError::Io {
            path: "scratch directory".to_string(),
            source,
        })?;
        let token = pick(&request.github_token, &self.settings.github.token);
        let path = self
            .downloader
            .download(
                DownloadRequest {
                    reference: canonical,
                    token,
                },
                dest_dir,
            )
            .await?;
        Ok(path)
    }
}
