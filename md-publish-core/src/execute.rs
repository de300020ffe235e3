//! Runs md2conf as a child process.
//!
//! The child inherits the service's environment with two adjustments: the
//! Node.js/npm directories mermaid-cli needs are appended to `PATH` when they
//! exist and are missing, and the headless browser used for diagram rendering
//! is told to run unsandboxed, keep its temp/cache files under one root and
//! never download a browser build.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::command::redacted;
use crate::config::ConverterSettings;
use crate::contract::{ToolOutput, ToolRunner};
use crate::error::ExecError;

/// Where a Node.js runtime and npm-installed binaries may live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDirs {
    /// Checked in order; the first existing directory is used.
    pub node_candidates: Vec<PathBuf>,
    pub npm_bin: Option<PathBuf>,
}

impl RuntimeDirs {
    pub fn for_platform(home: Option<&Path>) -> Self {
        if cfg!(windows) {
            Self {
                node_candidates: vec![PathBuf::from(r"C:\Program Files\nodejs")],
                npm_bin: home.map(|h| h.join("AppData").join("Roaming").join("npm")),
            }
        } else {
            let mut node_candidates = vec![PathBuf::from("/usr/local/bin")];
            if let Some(h) = home {
                node_candidates.push(h.join("node_modules").join(".bin"));
                node_candidates.push(h.join(".local").join("bin"));
            }
            node_candidates.push(PathBuf::from("/opt/nodejs/bin"));
            node_candidates.push(PathBuf::from("/usr/bin"));
            Self {
                node_candidates,
                npm_bin: home.map(|h| h.join(".npm-global").join("bin")),
            }
        }
    }

    fn existing(&self) -> Vec<&Path> {
        let node = self.node_candidates.iter().find(|p| p.is_dir());
        let npm = self.npm_bin.as_ref().filter(|p| p.is_dir());
        node.into_iter().chain(npm).map(PathBuf::as_path).collect()
    }
}

/// Browser sandbox and cache variables, relative to `cache_root`.
pub fn browser_env(cache_root: &Path) -> Vec<(String, OsString)> {
    let under = |sub: &str| cache_root.join(sub).into_os_string();
    vec![
        (
            "CHROMIUM_FLAGS".into(),
            "--no-sandbox --disable-setuid-sandbox".into(),
        ),
        ("PUPPETEER_SKIP_DOWNLOAD".into(), "true".into()),
        ("PUPPETEER_SKIP_CHROMIUM_DOWNLOAD".into(), "true".into()),
        ("PUPPETEER_CACHE_DIR".into(), under("puppeteer")),
        ("XDG_CACHE_HOME".into(), under(".cache")),
        ("XDG_CONFIG_HOME".into(), under(".config")),
        ("TMPDIR".into(), cache_root.as_os_str().to_os_string()),
    ]
}

/// Environment overrides for the child: an augmented `PATH` plus [`browser_env`].
pub fn shape_environment(
    inherited_path: Option<&OsStr>,
    dirs: &RuntimeDirs,
    cache_root: &Path,
) -> Vec<(String, OsString)> {
    let mut entries: Vec<PathBuf> = inherited_path
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();
    for dir in dirs.existing() {
        if !entries.iter().any(|e| e == dir) {
            debug!(dir = %dir.display(), "Appending runtime directory to PATH");
            entries.push(dir.to_path_buf());
        }
    }

    let mut env = Vec::new();
    match std::env::join_paths(&entries) {
        Ok(path) => env.push(("PATH".to_string(), path)),
        Err(e) => error!(error = ?e, "Could not rebuild PATH; child keeps the inherited one"),
    }
    env.extend(browser_env(cache_root));
    env
}

/// [`ToolRunner`] backed by a real child process with a hard timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    env: Vec<(String, OsString)>,
}

impl ProcessRunner {
    pub fn new(timeout: Duration, env: Vec<(String, OsString)>) -> Self {
        Self { timeout, env }
    }

    pub fn from_settings(settings: &ConverterSettings) -> Self {
        let dirs = RuntimeDirs::for_platform(settings.home_dir.as_deref());
        let inherited = std::env::var_os("PATH");
        let env = shape_environment(inherited.as_deref(), &dirs, &settings.cache_root);
        Self::new(settings.timeout(), env)
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, argv: Vec<String>) -> Result<ToolOutput, ExecError> {
        let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
        info!(command = %redacted(&argv), timeout = ?self.timeout, "Executing md2conf command");

        let child = Command::new(program)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_os_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                error!(error = ?source, program = %program, "Failed to launch md2conf");
                ExecError::Launch {
                    program: program.clone(),
                    source,
                }
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                error!(error = ?source, program = %program, "Failed waiting for md2conf");
                return Err(ExecError::Launch {
                    program: program.clone(),
                    source,
                });
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "md2conf timed out and was killed");
                return Err(ExecError::Timeout(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            error!(exit_code = code, stderr = %stderr.trim(), "md2conf command failed");
            return Err(ExecError::NonZeroExit {
                code,
                stderr: stderr.trim().to_string(),
            });
        }
        info!(stdout = %stdout.trim(), "md2conf command completed");
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "md2conf wrote to stderr");
        }
        Ok(ToolOutput { stdout, stderr })
    }
}
