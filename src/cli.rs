//! Command-line surface of md-publish.
//!
//! Three entry modes share one settings object:
//! - `publish`: run one request given as flags and print the outcome as JSON,
//! - `serve`: expose the pipeline over HTTP,
//! - `action`: run as a GitHub Action step (`INPUT_*` variables).
//!
//! Everything beyond argument handling lives in `md-publish-core`.
use crate::load_config::load_config;
use crate::{action, server};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use md_publish_core::contract::{PublishOutcome, PublishRequest};
use md_publish_core::Publisher;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// CLI for md-publish: publish Markdown documents to Confluence with md2conf.
#[derive(Parser)]
#[clap(
    name = "md-publish",
    version,
    about = "Resolve Markdown from local paths or GitHub and publish it to Confluence via md2conf"
)]
pub struct Cli {
    /// Path to an optional YAML settings file
    #[clap(long, global = true, env = "MD_PUBLISH_CONFIG")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a single document and print the outcome as JSON
    Publish(PublishArgs),
    /// Serve the publish API over HTTP
    Serve,
    /// Run as a GitHub Action step, reading INPUT_* variables
    Action,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// Local path, GitHub URL, or in-repository path when --repository is given
    #[clap(long)]
    pub markdown_path: Option<String>,
    /// Publishing job kind (default: md2conf)
    #[clap(long)]
    pub job: Option<String>,
    #[clap(long)]
    pub domain: Option<String>,
    #[clap(long)]
    pub space: Option<String>,
    #[clap(long)]
    pub username: Option<String>,
    #[clap(long)]
    pub api_key: Option<String>,
    /// Parent page id for the published page
    #[clap(long)]
    pub root_page: Option<String>,
    #[clap(long)]
    pub github_token: Option<String>,
    /// `repo` or `owner/repo`
    #[clap(long)]
    pub repository: Option<String>,
    /// Branch, tag or commit used with --repository
    #[clap(long = "ref")]
    pub revision: Option<String>,
}

impl From<PublishArgs> for PublishRequest {
    fn from(args: PublishArgs) -> Self {
        PublishRequest {
            markdown_path: args.markdown_path,
            job: args.job,
            domain: args.domain,
            space: args.space,
            username: args.username,
            api_key: args.api_key,
            root_page: args.root_page,
            github_token: args.github_token,
            repository: args.repository,
            revision: args.revision,
        }
    }
}

fn exit_code(outcome: &PublishOutcome) -> ExitCode {
    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<ExitCode> {
    tracing::info!("trace_initialised");

    let settings = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Publish(args) => {
            tracing::info!(command = "publish", "Publishing single document");
            let publisher = Publisher::from_settings(Arc::new(settings))
                .context("Failed to build GitHub HTTP client")?;
            let outcome = publisher.publish(args.into()).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_code(&outcome))
        }
        Commands::Serve => {
            tracing::info!(command = "serve", "Starting HTTP service");
            server::serve(settings).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Action => {
            tracing::info!(command = "action", "Running as GitHub Action");
            let outcome = action::run(settings).await?;
            if outcome.success {
                tracing::info!(message = %outcome.message, "Action publish succeeded");
            } else {
                tracing::error!(
                    message = %outcome.message,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "Action publish failed"
                );
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_code(&outcome))
        }
    }
}
