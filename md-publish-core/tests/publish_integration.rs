// End-to-end tests of the publish flow: mocked seams where the behaviour under
// test is orchestration, real HTTP/process where it is the fallback or timeout.

use async_trait::async_trait;
use md_publish_core::config::{GitHubSettings, Settings};
use md_publish_core::contract::{
    DownloadRequest, MockDownloader, MockToolRunner, PublishRequest, ToolOutput, ToolRunner,
};
use md_publish_core::error::ExecError;
use md_publish_core::download::GitHubDownloader;
use md_publish_core::execute::ProcessRunner;
use md_publish_core::outcome::{MSG_INVALID_PARAMETERS, MSG_TOOL_FAILED, MSG_UNEXPECTED};
use md_publish_core::Publisher;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.github.organization = "org".into();
    settings
}

fn request(markdown_path: &str) -> PublishRequest {
    PublishRequest {
        markdown_path: Some(markdown_path.into()),
        domain: Some("example.atlassian.net".into()),
        username: Some("user@example.com".into()),
        api_key: Some("api_key_123".into()),
        space: Some("TEST".into()),
        ..PublishRequest::default()
    }
}

/// Downloader that writes a file into the scratch dir and remembers where.
fn recording_downloader(seen_dir: Arc<Mutex<Option<PathBuf>>>) -> MockDownloader {
    let mut downloader = MockDownloader::new();
    downloader
        .expect_download()
        .times(1)
        .returning(move |req: DownloadRequest, dir: &Path| {
            *seen_dir.lock().unwrap() = Some(dir.to_path_buf());
            let file = dir.join(req.reference.path.rsplit('/').next().unwrap());
            std::fs::write(&file, "# Fetched\n").unwrap();
            Ok(file)
        });
    downloader
}

#[tokio::test]
async fn local_document_publishes() {
    let doc = tempfile::NamedTempFile::new().unwrap();
    let doc_path = doc.path().to_str().unwrap().to_string();

    let mut runner = MockToolRunner::new();
    let expected_last = doc_path.clone();
    runner
        .expect_run()
        .withf(move |argv: &Vec<String>| {
            argv[..3] == ["python3", "-m", "md2conf"] && argv.last() == Some(&expected_last)
        })
        .times(1)
        .returning(|_| Ok(ToolOutput::default()));

    let publisher = Publisher::new(Arc::new(settings()), MockDownloader::new(), runner);
    let outcome = publisher.publish(request(&doc_path)).await;

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.message, format!("published {doc_path}"));
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn missing_api_key_is_reported_without_running_the_tool() {
    let publisher = Publisher::new(
        Arc::new(settings()),
        MockDownloader::new(),
        MockToolRunner::new(),
    );
    let mut req = request("/path/to/file.md");
    req.api_key = None;

    let outcome = publisher.publish(req).await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, MSG_INVALID_PARAMETERS);
    assert!(outcome.error.unwrap().contains("api_key"));
}

#[tokio::test]
async fn unsupported_job_kind_touches_nothing() {
    let publisher = Publisher::new(
        Arc::new(settings()),
        MockDownloader::new(),
        MockToolRunner::new(),
    );
    let mut req = request("https://github.com/org/repo/blob/main/a.md");
    req.job = Some("pandoc".into());

    let outcome = publisher.publish(req).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("INVALID_JOB_TYPE"));
    assert!(outcome.message.contains("'pandoc'"));
}

#[tokio::test]
async fn blob_url_is_fetched_through_api_fallback_and_published() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/repo/main/docs/guide.md"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/org/repo/contents/docs/guide.md"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "file",
            "encoding": "base64",
            "content": "IyBHdWlkZQo="
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = settings();
    settings.github = GitHubSettings {
        raw_base_url: server.uri(),
        api_base_url: server.uri(),
        timeout_secs: 5,
        ..settings.github
    };
    let downloader = GitHubDownloader::new(&settings.github).unwrap();

    let published = Arc::new(Mutex::new(None));
    let published_in_runner = published.clone();
    let mut runner = MockToolRunner::new();
    runner.expect_run().times(1).returning(move |argv: Vec<String>| {
        let file = PathBuf::from(argv.last().unwrap());
        let content = std::fs::read_to_string(&file).unwrap();
        *published_in_runner.lock().unwrap() = Some((file, content));
        Ok(ToolOutput::default())
    });

    let publisher = Publisher::new(Arc::new(settings), downloader, runner);
    let outcome = publisher
        .publish(request("https://github.com/org/repo/blob/main/docs/guide.md"))
        .await;

    assert!(outcome.success, "{outcome:?}");
    let (file, content) = published.lock().unwrap().clone().unwrap();
    assert_eq!(content, "# Guide\n");
    assert_eq!(file.file_name().unwrap(), "guide.md");
    assert!(!file.exists(), "fetched file removed with its scratch dir");
    assert!(!file.parent().unwrap().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn timeout_reports_execution_error_and_cleans_up() {
    let seen_dir = Arc::new(Mutex::new(None));
    let mut settings = settings();
    settings.converter.command = vec![
        "sh".into(),
        "-c".into(),
        "sleep 5".into(),
        "md2conf".into(),
    ];
    let runner = ProcessRunner::new(Duration::from_millis(300), vec![]);
    let publisher = Publisher::new(
        Arc::new(settings),
        recording_downloader(seen_dir.clone()),
        runner,
    );

    let mut req = request("docs/slow.md");
    req.repository = Some("org/repo".into());
    let outcome = publisher.publish(req).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, MSG_UNEXPECTED);
    assert!(outcome.error.unwrap().contains("did not finish"));
    let dir = seen_dir.lock().unwrap().clone().expect("download ran");
    assert!(!dir.exists(), "scratch dir {dir:?} leaked");
}

#[cfg(unix)]
#[tokio::test]
async fn tool_failure_keeps_exit_code_and_stderr() {
    let mut settings = settings();
    settings.converter.command = vec![
        "sh".into(),
        "-c".into(),
        "echo 'invalid credentials' >&2; exit 2".into(),
        "md2conf".into(),
    ];
    let doc = tempfile::NamedTempFile::new().unwrap();
    let publisher = Publisher::new(
        Arc::new(settings),
        MockDownloader::new(),
        ProcessRunner::new(Duration::from_secs(10), vec![]),
    );

    let outcome = publisher
        .publish(request(doc.path().to_str().unwrap()))
        .await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, MSG_TOOL_FAILED);
    assert_eq!(outcome.error.as_deref(), Some("exit 2: invalid credentials"));
}

struct PanickingRunner;

#[async_trait]
impl ToolRunner for PanickingRunner {
    async fn run(&self, _argv: Vec<String>) -> Result<ToolOutput, ExecError> {
        panic!("runner exploded")
    }
}

#[tokio::test]
async fn panic_in_flow_becomes_outcome_and_cleans_up() {
    let seen_dir = Arc::new(Mutex::new(None));
    let publisher = Publisher::new(
        Arc::new(settings()),
        recording_downloader(seen_dir.clone()),
        PanickingRunner,
    );

    let outcome = publisher
        .publish(request("https://github.com/org/repo/blob/main/a.md"))
        .await;
    assert!(!outcome.success);
    assert_eq!(outcome.message, MSG_UNEXPECTED);
    assert!(outcome.error.unwrap().contains("runner exploded"));
    let dir = seen_dir.lock().unwrap().clone().unwrap();
    assert!(!dir.exists());
}

fn downloader_for(server: &MockServer) -> GitHubDownloader {
    GitHubDownloader::new(&GitHubSettings {
        organization: "org".into(),
        raw_base_url: server.uri(),
        api_base_url: server.uri(),
        timeout_secs: 5,
        ..GitHubSettings::default()
    })
    .unwrap()
}

/// Runner that records the document path md2conf was given.
fn path_recording_runner(seen: Arc<Mutex<Option<PathBuf>>>) -> MockToolRunner {
    let mut runner = MockToolRunner::new();
    runner.expect_run().times(1).returning(move |argv: Vec<String>| {
        *seen.lock().unwrap() = argv.last().map(PathBuf::from);
        Ok(ToolOutput::default())
    });
    runner
}

#[tokio::test]
async fn escaping_repository_path_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# from evil-org\n"))
        .expect(0)
        .mount(&server)
        .await;
    let mut settings = settings();
    settings.github.token = Some("ghp_configured".into());
    let publisher = Publisher::new(
        Arc::new(settings),
        downloader_for(&server),
        MockToolRunner::new(),
    );

    let mut req = request("../../../evil-org/secrets/main/leak.md");
    req.repository = Some("repo".into());
    let outcome = publisher.publish(req).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, MSG_INVALID_PARAMETERS);
    assert!(outcome.error.unwrap().contains("illegal"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn hash_in_repository_path_reaches_the_right_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/repo/main/docs/C%23-guide.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# C sharp\n"))
        .expect(1)
        .mount(&server)
        .await;
    let seen = Arc::new(Mutex::new(None));
    let publisher = Publisher::new(
        Arc::new(settings()),
        downloader_for(&server),
        path_recording_runner(seen.clone()),
    );

    let mut req = request("docs/C#-guide.md");
    req.repository = Some("repo".into());
    let outcome = publisher.publish(req).await;

    assert!(outcome.success, "{outcome:?}");
    let published = seen.lock().unwrap().clone().unwrap();
    assert_eq!(published.file_name().unwrap(), "C#-guide.md");
}

#[tokio::test]
async fn encoded_url_reference_is_decoded_for_md2conf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/org/repo/main/docs/My%20Doc.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Mine\n"))
        .expect(1)
        .mount(&server)
        .await;
    let seen = Arc::new(Mutex::new(None));
    let publisher = Publisher::new(
        Arc::new(settings()),
        downloader_for(&server),
        path_recording_runner(seen.clone()),
    );

    let outcome = publisher
        .publish(request("https://github.com/org/repo/blob/main/docs/My%20Doc.md"))
        .await;

    assert!(outcome.success, "{outcome:?}");
    let published = seen.lock().unwrap().clone().unwrap();
    assert_eq!(published.file_name().unwrap(), "My Doc.md");
}
