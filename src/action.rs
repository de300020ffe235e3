//! GitHub Action entry mode.
//!
//! Inputs arrive as `INPUT_*` variables; the document path is relative to
//! `GITHUB_WORKSPACE`. The result is reported through `GITHUB_OUTPUT`.

use anyhow::{bail, Context, Result};
use md_publish_core::config::Settings;
use md_publish_core::contract::{PublishOutcome, PublishRequest};
use md_publish_core::Publisher;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_WORKSPACE: &str = "/github/workspace";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionInputs {
    pub markdown_path: Option<String>,
    pub domain: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub space: Option<String>,
    pub root_page: Option<String>,
    pub github_token: Option<String>,
    pub workspace: PathBuf,
}

impl ActionInputs {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = |name: &str| {
            lookup(&format!("INPUT_{name}")).filter(|v| !v.trim().is_empty())
        };
        Self {
            markdown_path: input("MARKDOWN_PATH"),
            domain: input("CONFLUENCE_DOMAIN"),
            username: input("CONFLUENCE_USERNAME"),
            api_key: input("CONFLUENCE_API_KEY"),
            space: input("CONFLUENCE_SPACE"),
            root_page: input("CONFLUENCE_ROOT_PAGE"),
            github_token: input("GITHUB_TOKEN"),
            workspace: lookup("GITHUB_WORKSPACE")
                .filter(|w| !w.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE)),
        }
    }

    /// Validates the inputs and builds the publish request.
    ///
    /// Fails when a required input is absent or the document does not exist
    /// under the workspace.
    pub fn into_request(self) -> Result<PublishRequest> {
        let missing: Vec<&str> = [
            ("markdown_path", self.markdown_path.is_none()),
            ("confluence_domain", self.domain.is_none()),
            ("confluence_username", self.username.is_none()),
            ("confluence_api_key", self.api_key.is_none()),
            ("confluence_space", self.space.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            bail!("Missing required inputs: {}", missing.join(", "));
        }

        let relative = self.markdown_path.unwrap_or_default();
        let full_path = self.workspace.join(&relative);
        if !full_path.exists() {
            bail!("Markdown file not found at {}", full_path.display());
        }

        Ok(PublishRequest {
            markdown_path: Some(full_path.to_string_lossy().into_owned()),
            domain: self.domain,
            username: self.username,
            api_key: self.api_key,
            space: self.space,
            root_page: self.root_page,
            github_token: self.github_token,
            ..PublishRequest::default()
        })
    }
}

/// Appends `status=` and `message=` lines to the Action output file.
pub fn write_outputs(output_file: &Path, status: &str, message: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_file)
        .with_context(|| format!("Failed to open GITHUB_OUTPUT {}", output_file.display()))?;
    let message = message.replace(['\r', '\n'], " ");
    writeln!(file, "status={status}")?;
    writeln!(file, "message={message}")?;
    Ok(())
}

/// Records a failure that happened before publishing could start.
pub fn record_error(output_file: &Path, err: &anyhow::Error) -> Result<()> {
    write_outputs(output_file, "error", &format!("Unexpected error: {err:#}"))
}

/// Publishes the document named by the Action inputs.
///
/// A failed publish is still `Ok`: the caller reads `outcome.success`.
pub async fn run(settings: Settings) -> Result<PublishOutcome> {
    let inputs = ActionInputs::from_env();
    info!(
        workspace = %inputs.workspace.display(),
        markdown_path = inputs.markdown_path.as_deref().unwrap_or("NOT SET"),
        domain = inputs.domain.as_deref().unwrap_or("NOT SET"),
        space = inputs.space.as_deref().unwrap_or("NOT SET"),
        "Starting Markdown to Confluence publishing"
    );
    let output_file = std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from);

    let prepared = inputs.into_request().and_then(|request| {
        let publisher = Publisher::from_settings(Arc::new(settings))
            .context("Failed to build GitHub HTTP client")?;
        Ok((request, publisher))
    });
    let (request, publisher) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            error!(error = %e, "Action could not start publishing");
            if let Some(path) = &output_file {
                record_error(path, &e)?;
            }
            return Err(e);
        }
    };
    let outcome = publisher.publish(request).await;

    if let Some(path) = &output_file {
        let status = if outcome.success { "success" } else { "failed" };
        write_outputs(path, status, &outcome.message)?;
    }
    Ok(outcome)
}
