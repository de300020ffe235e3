use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

fn md_publish() -> Command {
    let mut cmd = Command::cargo_bin("md-publish").expect("Binary exists");
    for key in [
        "CONFLUENCE_DOMAIN",
        "CONFLUENCE_USERNAME",
        "CONFLUENCE_API_KEY",
        "CONFLUENCE_SPACE",
        "CONFLUENCE_ROOT_PAGE",
        "GITHUB_MARKDOWN_FILE",
        "MD_PUBLISH_CONFIG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn help_lists_subcommands() {
    md_publish()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("publish")
                .and(predicate::str::contains("serve"))
                .and(predicate::str::contains("action")),
        );
}

#[test]
fn publish_with_missing_parameters_prints_outcome_and_fails() {
    md_publish()
        .args([
            "publish",
            "--markdown-path",
            "/path/to/file.md",
            "--domain",
            "example.atlassian.net",
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(
            predicate::str::contains("\"success\": false")
                .and(predicate::str::contains("missing/invalid parameters"))
                .and(predicate::str::contains("username, api_key, space")),
        );
}

#[test]
fn publish_unknown_job_fails() {
    md_publish()
        .args(["publish", "--job", "pandoc", "--markdown-path", "a.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("INVALID_JOB_TYPE"));
}

#[cfg(unix)]
#[test]
fn publish_runs_configured_converter() {
    let doc = NamedTempFile::new().unwrap();
    let config = NamedTempFile::new().unwrap();
    // `true` ignores its arguments and exits 0, standing in for md2conf.
    write(config.path(), "converter:\n  command: [\"true\"]\n").unwrap();

    md_publish()
        .arg("--config")
        .arg(config.path())
        .args([
            "publish",
            "--domain",
            "example.atlassian.net",
            "--username",
            "user@example.com",
            "--api-key",
            "api_key_123",
            "--space",
            "TEST",
            "--markdown-path",
        ])
        .arg(doc.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"));
}

#[test]
fn unreadable_config_is_an_error() {
    md_publish()
        .args(["--config", "/no/such/md-publish.yaml", "publish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use md_publish::cli::{run, Cli, Commands};

    // A missing config file stops run() right after start-up.
    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        command: Commands::Serve,
    };
    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
