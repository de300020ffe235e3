//! Classification of caller-supplied document references.
//!
//! A reference is tried against the recognised shapes in a fixed order:
//!
//! 1. an existing local path (returned untouched, no network),
//! 2. a raw-content URL: `https://raw.<host>/<owner>/<repo>/<revision>/<path>`,
//! 3. a web UI URL: `https://<host>/<owner>/<repo>/(blob|tree)/<revision>/<path>`,
//! 4. a bare repository URL: `https://<host>/<owner>/<repo>`,
//! 5. a plain `<repo>/<path...>` string.
//!
//! The owner is never taken from the reference. An embedded owner that differs
//! from the configured organization is logged and ignored.
//!
//! Every canonical reference is checked segment by segment: empty, `.` and
//! `..` segments are rejected in the repository, revision and path, so a
//! reference can never address anything outside the fixed owner. Segments taken
//! from a URL are percent-decoded; the fetcher re-encodes them.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::contract::CanonicalReference;
use crate::error::ReferenceError;

pub const DEFAULT_REVISION: &str = "main";

/// Where a document lives once its reference has been classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Local(PathBuf),
    Remote(CanonicalReference),
}

struct UrlParts {
    host: String,
    segments: Vec<String>,
}

struct Extracted {
    owner: String,
    reference: CanonicalReference,
}

struct UrlShape {
    name: &'static str,
    matches: fn(&UrlParts) -> bool,
    extract: fn(&UrlParts) -> Extracted,
}

/// URL shapes in precedence order.
const URL_SHAPES: &[UrlShape] = &[
    UrlShape {
        name: "raw",
        matches: is_raw_url,
        extract: extract_raw,
    },
    UrlShape {
        name: "web",
        matches: is_web_url,
        extract: extract_web,
    },
    UrlShape {
        name: "repository",
        matches: is_repository_url,
        extract: extract_repository,
    },
];

fn is_raw_url(u: &UrlParts) -> bool {
    u.host.starts_with("raw.") && u.segments.len() >= 4
}

fn extract_raw(u: &UrlParts) -> Extracted {
    Extracted {
        owner: u.segments[0].clone(),
        reference: CanonicalReference {
            repo: u.segments[1].clone(),
            revision: u.segments[2].clone(),
            path: u.segments[3..].join("/"),
        },
    }
}

fn is_web_url(u: &UrlParts) -> bool {
    u.segments.len() >= 5 && matches!(u.segments[2].as_str(), "blob" | "tree")
}

fn extract_web(u: &UrlParts) -> Extracted {
    Extracted {
        owner: u.segments[0].clone(),
        reference: CanonicalReference {
            repo: u.segments[1].clone(),
            revision: u.segments[3].clone(),
            path: u.segments[4..].join("/"),
        },
    }
}

fn is_repository_url(u: &UrlParts) -> bool {
    u.segments.len() == 2
}

fn extract_repository(u: &UrlParts) -> Extracted {
    Extracted {
        owner: u.segments[0].clone(),
        reference: CanonicalReference {
            repo: u.segments[1].trim_end_matches(".git").to_string(),
            revision: DEFAULT_REVISION.to_string(),
            path: String::new(),
        },
    }
}

/// Parses document references on behalf of one fixed owner.
#[derive(Debug, Clone)]
pub struct ReferenceParser {
    owner: String,
}

impl ReferenceParser {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn parse(&self, reference: &str) -> Result<DocumentSource, ReferenceError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(ReferenceError::invalid(reference, "reference is empty"));
        }
        if Path::new(trimmed).exists() {
            debug!(reference = trimmed, "Reference is an existing local path");
            return Ok(DocumentSource::Local(PathBuf::from(trimmed)));
        }
        if let Some(url) = parse_http_url(trimmed) {
            return self.parse_url(trimmed, &url).map(DocumentSource::Remote);
        }
        self.parse_plain(trimmed).map(DocumentSource::Remote)
    }

    fn parse_url(&self, raw: &str, url: &Url) -> Result<CanonicalReference, ReferenceError> {
        let segments = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .map(|seg| {
                percent_decode_str(seg)
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
                    .map_err(|_| ReferenceError::invalid(raw, "URL path is not valid UTF-8"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parts = UrlParts {
            host: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            segments,
        };
        let shape = URL_SHAPES
            .iter()
            .find(|shape| (shape.matches)(&parts))
            .ok_or_else(|| {
                ReferenceError::invalid(raw, "URL does not point at a repository file")
            })?;
        let extracted = (shape.extract)(&parts);
        check_reference(raw, &extracted.reference)?;
        self.check_owner(&extracted.owner);
        debug!(
            shape = shape.name,
            repo = %extracted.reference.repo,
            path = %extracted.reference.path,
            revision = %extracted.reference.revision,
            "Parsed URL reference"
        );
        Ok(extracted.reference)
    }

    fn parse_plain(&self, raw: &str) -> Result<CanonicalReference, ReferenceError> {
        let segments: Vec<&str> = raw.trim_matches('/').split('/').collect();
        if segments.len() < 2 {
            return Err(ReferenceError::invalid(
                raw,
                "expected <repo>/<path> or a GitHub URL",
            ));
        }
        let reference = CanonicalReference {
            repo: segments[0].to_string(),
            path: segments[1..].join("/"),
            revision: DEFAULT_REVISION.to_string(),
        };
        check_reference(raw, &reference)?;
        Ok(reference)
    }

    /// Splits `repo` or `owner/repo` into the repository name, checking the owner.
    pub fn repository_name(&self, repository: &str) -> Result<String, ReferenceError> {
        let segments: Vec<&str> = repository.trim().trim_matches('/').split('/').collect();
        if let Some(bad) = segments.iter().find(|s| !is_plain_segment(s)) {
            return Err(ReferenceError::invalid(
                repository,
                format!("repository contains illegal segment {bad:?}"),
            ));
        }
        match segments.as_slice() {
            [repo] => Ok(repo.to_string()),
            [owner, repo] => {
                self.check_owner(owner);
                Ok(repo.to_string())
            }
            _ => Err(ReferenceError::invalid(
                repository,
                "repository must be <repo> or <owner>/<repo>",
            )),
        }
    }

    fn check_owner(&self, supplied: &str) {
        if !supplied.eq_ignore_ascii_case(&self.owner) {
            warn!(
                supplied_owner = supplied,
                fixed_owner = %self.owner,
                "Reference names a different owner; using the configured organization"
            );
        }
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !matches!(segment, "" | "." | "..")
}

/// Rejects empty, `.` and `..` segments in every part of `reference`.
///
/// An empty `path` is allowed: it names the repository itself and is refused
/// later by the fetcher.
pub fn check_reference(raw: &str, reference: &CanonicalReference) -> Result<(), ReferenceError> {
    let repo_ok = is_plain_segment(&reference.repo) && !reference.repo.contains('/');
    if !repo_ok {
        return Err(ReferenceError::invalid(
            raw,
            format!("illegal repository name {:?}", reference.repo),
        ));
    }
    if !reference.revision.split('/').all(is_plain_segment) {
        return Err(ReferenceError::invalid(
            raw,
            format!("illegal revision {:?}", reference.revision),
        ));
    }
    if !reference.path.is_empty() && !reference.path.split('/').all(is_plain_segment) {
        return Err(ReferenceError::invalid(
            raw,
            format!("illegal path {:?}", reference.path),
        ));
    }
    Ok(())
}

fn parse_http_url(s: &str) -> Option<Url> {
    let url = Url::parse(s).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// True when the reference is an http(s) URL.
pub fn is_remote_url(reference: &str) -> bool {
    parse_http_url(reference.trim()).is_some()
}
