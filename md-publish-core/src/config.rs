use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_ORGANIZATION: &str = "vertexinc";
pub const DEFAULT_RAW_BASE_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// Process-wide settings, built once at start-up and read-only afterwards.
///
/// Request fields fall back to these values; nothing in the pipeline reads the
/// environment on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub confluence: ConfluenceDefaults,
    pub github: GitHubSettings,
    pub converter: ConverterSettings,
    pub server: ServerSettings,
    /// Document used when a request carries no `markdown_path`.
    pub default_markdown_path: Option<String>,
}

/// Fallback values for the wiki side of a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceDefaults {
    pub domain: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub space: Option<String>,
    pub root_page: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub token: Option<String>,
    /// The only owner the fetcher will ever address.
    pub organization: String,
    pub raw_base_url: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            organization: DEFAULT_ORGANIZATION.to_string(),
            raw_base_url: DEFAULT_RAW_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl GitHubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the external converter is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    /// Program followed by its leading arguments, e.g. `python3 -m md2conf`.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Base directory for the headless browser's temp and cache folders.
    pub cache_root: PathBuf,
    /// Home directory used to locate per-user Node.js/npm installs.
    pub home_dir: Option<PathBuf>,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            command: vec!["python3".into(), "-m".into(), "md2conf".into()],
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            cache_root: std::env::temp_dir(),
            home_dir: None,
        }
    }
}

impl ConverterSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

fn set_or_unset(value: &Option<String>) -> &'static str {
    if value.as_deref().is_some_and(|v| !v.is_empty()) {
        "SET"
    } else {
        "NOT SET"
    }
}

impl Settings {
    pub fn trace_loaded(&self) {
        info!(
            domain = self.confluence.domain.as_deref().unwrap_or("NOT SET"),
            space = self.confluence.space.as_deref().unwrap_or("NOT SET"),
            username = set_or_unset(&self.confluence.username),
            api_key = set_or_unset(&self.confluence.api_key),
            github_token = set_or_unset(&self.github.token),
            organization = %self.github.organization,
            converter = %self.converter.command.join(" "),
            "Loaded Settings"
        );
        debug!(
            raw_base_url = %self.github.raw_base_url,
            api_base_url = %self.github.api_base_url,
            tool_timeout_secs = self.converter.timeout_secs,
            fetch_timeout_secs = self.github.timeout_secs,
            "Settings loaded (endpoints and timeouts)"
        );
    }
}
