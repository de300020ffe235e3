//! Error taxonomy for the publish pipeline.
//!
//! Each stage has its own narrow error type ([`ReferenceError`], [`FetchError`],
//! [`ExecError`]). [`PublishError`] is the orchestration-level taxonomy; it is
//! never handed to callers raw, see [`crate::outcome`].

use std::time::Duration;

/// A document reference that matches none of the recognised shapes.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("invalid document reference '{reference}': {reason}")]
    Invalid { reference: String, reason: String },
}

impl ReferenceError {
    pub(crate) fn invalid(reference: &str, reason: impl Into<String>) -> Self {
        ReferenceError::Invalid {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Remote retrieval failed on both tiers, or could not be attempted.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GitHub API returned HTTP {status} for {url}{}", hint_suffix(.hint))]
    Status {
        status: u16,
        url: String,
        hint: Option<String>,
    },
    #[error("{path} is not a file (GitHub reported type '{kind}')")]
    NotAFile { path: String, kind: String },
    #[error("reference names repository '{repo}', not a file")]
    EmptyPath { repo: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GitHub API response for {path} could not be decoded: {reason}")]
    Decode { path: String, reason: String },
    #[error("failed to write fetched file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("invalid GitHub base URL {url}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(" ({h})"),
        None => String::new(),
    }
}

impl FetchError {
    /// HTTP status carried by the error, if the failure was a response status.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures of the external converter process.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("exit {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("md2conf did not finish within {0:?}")]
    Timeout(Duration),
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("empty command line")]
    EmptyCommand,
}

/// Everything that can go wrong between receiving a request and the tool exiting.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),
    #[error(transparent)]
    FetchFailed(#[from] FetchError),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    #[error("failed to resolve remote markdown: {0}")]
    ResolutionFailed(#[source] Box<PublishError>),
    #[error("Unsupported job type: '{0}'")]
    UnsupportedJobKind(String),
    #[error("exit {code}: {stderr}")]
    ToolExecutionFailed { code: i32, stderr: String },
    #[error("md2conf execution error: {0}")]
    ExecutionError(#[source] ExecError),
    #[error("{0}")]
    Unexpected(String),
}

impl From<ExecError> for PublishError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::NonZeroExit { code, stderr } => {
                PublishError::ToolExecutionFailed { code, stderr }
            }
            other => PublishError::ExecutionError(other),
        }
    }
}

impl PublishError {
    /// Wraps a failure raised while resolving a remote reference.
    pub fn resolution(cause: impl Into<PublishError>) -> Self {
        PublishError::ResolutionFailed(Box::new(cause.into()))
    }
}
