//! # contract: records and seams of the publish pipeline
//!
//! Plain request/response records plus the two traits the orchestration is
//! generic over:
//! - [`Downloader`]: materialises a remote Markdown file into a local directory.
//! - [`ToolRunner`]: runs the external converter and reports its output.
//!
//! Both traits are annotated for `mockall`, so tests can drive the publish flow
//! without network access or a Python installation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{ExecError, FetchError};

/// One inbound publish call. Every field is optional on the wire; empty strings
/// count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    /// Local path, GitHub URL, or in-repository path when `repository` is set.
    pub markdown_path: Option<String>,
    /// Job kind; absent means the default md2conf job.
    pub job: Option<String>,
    pub domain: Option<String>,
    pub space: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub root_page: Option<String>,
    pub github_token: Option<String>,
    /// `repo` or `owner/repo`.
    pub repository: Option<String>,
    /// Branch, tag or commit. Defaults to `main`.
    #[serde(rename = "ref")]
    pub revision: Option<String>,
}

/// Terminal result of a publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

/// Normalised address of a file in a repository owned by the fixed organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalReference {
    pub repo: String,
    pub path: String,
    pub revision: String,
}

/// What a [`Downloader`] needs for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub reference: CanonicalReference,
    pub token: Option<String>,
}

/// Captured result of a converter run that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Retrieves a single remote file into `dest_dir` and returns its local path.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        request: DownloadRequest,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError>;
}

/// Runs the external converter. `argv[0]` is the program.
///
/// Implementations classify a non-zero exit as [`ExecError::NonZeroExit`] and
/// never retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, argv: Vec<String>) -> Result<ToolOutput, ExecError>;
}
