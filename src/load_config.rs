use anyhow::{Context, Result};
use md_publish_core::config::Settings;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Loads settings from an optional YAML file, then overlays the environment.
///
/// The file carries static defaults (no secrets needed); credentials usually
/// arrive through `CONFLUENCE_*` / `GITHUB_TOKEN` variables or a `.env` file.
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            info!("No config file given; starting from built-in defaults");
            Settings::default()
        }
    };

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    if settings.converter.home_dir.is_none() {
        settings.converter.home_dir = dirs::home_dir();
    }

    settings.trace_loaded();
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    match serde_yaml::from_str(&content) {
        Ok(settings) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Overlays environment values onto `settings`. Empty values are ignored.
///
/// `lookup` abstracts `std::env::var` so the overlay can be exercised without
/// touching the process environment.
pub fn apply_env<F>(settings: &mut Settings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let confluence = &mut settings.confluence;
    for (key, slot) in [
        ("CONFLUENCE_DOMAIN", &mut confluence.domain),
        ("CONFLUENCE_USERNAME", &mut confluence.username),
        ("CONFLUENCE_API_KEY", &mut confluence.api_key),
        ("CONFLUENCE_SPACE", &mut confluence.space),
        ("CONFLUENCE_ROOT_PAGE", &mut confluence.root_page),
    ] {
        if let Some(value) = get(key) {
            *slot = Some(value);
        }
    }

    if let Some(token) = get("GITHUB_TOKEN").or_else(|| get("gh_token")) {
        settings.github.token = Some(token);
    }
    if let Some(organization) = get("GITHUB_ORGANIZATION") {
        settings.github.organization = organization;
    }
    if let Some(markdown) = get("GITHUB_MARKDOWN_FILE") {
        settings.default_markdown_path = Some(markdown);
    }
    if let Some(host) = get("MD_PUBLISH_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = get("MD_PUBLISH_PORT") {
        settings.server.port = port.trim().parse().with_context(|| {
            error!(value = %port, "MD_PUBLISH_PORT must be a valid port number");
            format!("MD_PUBLISH_PORT must be a valid port number, got {port:?}")
        })?;
    }
    Ok(())
}
