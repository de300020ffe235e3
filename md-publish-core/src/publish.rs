//! Publish orchestration: request → resolve → build → execute → outcome.
//!
//! [`Publisher::publish`] is the only entry point. For every request it:
//!   - selects a job kind (only md2conf exists; anything else is reported, not run),
//!   - resolves parameters, fetching remote Markdown into a per-request [`ScratchDir`],
//!   - builds the md2conf command line and runs it through a [`ToolRunner`],
//!   - maps the result, whatever it is, to a [`PublishOutcome`].
//!
//! # Resource discipline
//! The scratch directory belongs to one request. It is released once the flow
//! finishes on every path, including a panic inside the flow. A request future
//! that is dropped mid-flight drops its `ScratchDir`, which removes it as well.
//!
//! # Concurrency
//! A `Publisher` holds only read-only state, so one instance can serve
//! concurrent requests; nothing fetched is shared between them.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::command;
use crate::config::Settings;
use crate::contract::{Downloader, PublishOutcome, PublishRequest, ToolRunner};
use crate::download::GitHubDownloader;
use crate::error::{FetchError, PublishError};
use crate::execute::ProcessRunner;
use crate::outcome::map_result;
use crate::resolve::ParameterResolver;
use crate::scratch::ScratchDir;

/// Publishing strategies the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Convert and upload with md2conf.
    Md2Conf,
}

/// Result of reading the `job` field of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedJob {
    Known(JobKind),
    Unsupported(String),
}

impl JobKind {
    pub const ALL: [JobKind; 1] = [JobKind::Md2Conf];

    pub fn name(self) -> &'static str {
        match self {
            JobKind::Md2Conf => "md2conf",
        }
    }

    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.name()).collect()
    }

    /// Absent or blank selects md2conf; `default` is an alias for it.
    pub fn select(job: Option<&str>) -> RequestedJob {
        let Some(raw) = job.map(str::trim).filter(|j| !j.is_empty()) else {
            return RequestedJob::Known(JobKind::Md2Conf);
        };
        match raw.to_ascii_lowercase().as_str() {
            "md2conf" | "default" => RequestedJob::Known(JobKind::Md2Conf),
            _ => RequestedJob::Unsupported(raw.to_string()),
        }
    }
}

pub struct Publisher<D, R> {
    settings: Arc<Settings>,
    downloader: D,
    runner: R,
}

impl Publisher<GitHubDownloader, ProcessRunner> {
    /// Production wiring: GitHub over HTTPS and a real md2conf child process.
    pub fn from_settings(settings: Arc<Settings>) -> Result<Self, FetchError> {
        let downloader = GitHubDownloader::new(&settings.github)?;
        let runner = ProcessRunner::from_settings(&settings.converter);
        Ok(Self::new(settings, downloader, runner))
    }
}

impl<D, R> Publisher<D, R>
where
    D: Downloader,
    R: ToolRunner,
{
    pub fn new(settings: Arc<Settings>, downloader: D, runner: R) -> Self {
        Self {
            settings,
            downloader,
            runner,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one publish request. Never fails: every error becomes an outcome.
    pub async fn publish(&self, request: PublishRequest) -> PublishOutcome {
        info!(job = request.job.as_deref().unwrap_or("md2conf"), "Publish request received");
        match JobKind::select(request.job.as_deref()) {
            RequestedJob::Known(JobKind::Md2Conf) => self.publish_md2conf(&request).await,
            RequestedJob::Unsupported(job) => {
                warn!(job = %job, supported = ?JobKind::supported(), "Unsupported job type");
                PublishError::UnsupportedJobKind(job).into()
            }
        }
    }

    async fn publish_md2conf(&self, request: &PublishRequest) -> PublishOutcome {
        let mut scratch = ScratchDir::new();
        let flow = AssertUnwindSafe(self.run_md2conf(request, &mut scratch))
            .catch_unwind()
            .await;
        scratch.release();

        let result = flow.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(panic = %message, "Publish flow panicked");
            Err(PublishError::Unexpected(message))
        });
        match &result {
            Ok(path) => info!(markdown_path = %path.display(), "Published markdown to Confluence"),
            Err(e) => error!(error = %e, "Publishing failed"),
        }
        map_result(result)
    }

    async fn run_md2conf(
        &self,
        request: &PublishRequest,
        scratch: &mut ScratchDir,
    ) -> Result<PathBuf, PublishError> {
        let resolver = ParameterResolver::new(&self.settings, &self.downloader);
        let params = resolver.resolve(request, scratch).await?;
        params.trace_resolved();

        let argv = command::build(&params, &self.settings.converter.command);
        let output = self.runner.run(argv).await?;
        debug!(stdout = %output.stdout, stderr = %output.stderr, "md2conf output");
        Ok(params.into_markdown_path())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
