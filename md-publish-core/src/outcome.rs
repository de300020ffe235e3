use std::path::Path;

use crate::contract::PublishOutcome;
use crate::error::PublishError;
use crate::publish::JobKind;

pub const MSG_INVALID_PARAMETERS: &str = "missing/invalid parameters";
pub const MSG_TOOL_FAILED: &str = "tool failed";
pub const MSG_UNEXPECTED: &str = "unexpected error";
pub const INVALID_JOB_TYPE: &str = "INVALID_JOB_TYPE";

impl PublishOutcome {
    pub fn published(path: &Path) -> Self {
        PublishOutcome {
            success: true,
            message: format!("published {}", path.display()),
            error: None,
        }
    }

    fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        PublishOutcome {
            success: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

impl From<PublishError> for PublishOutcome {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::MissingParameters(_)
            | PublishError::ResolutionFailed(_)
            | PublishError::InvalidReference(_) => {
                PublishOutcome::failed(MSG_INVALID_PARAMETERS, err.to_string())
            }
            PublishError::UnsupportedJobKind(job) => PublishOutcome::failed(
                format!(
                    "Unsupported job type: '{}'. Supported types: {}",
                    job,
                    JobKind::supported().join(", ")
                ),
                INVALID_JOB_TYPE,
            ),
            PublishError::ToolExecutionFailed { code, stderr } => {
                PublishOutcome::failed(MSG_TOOL_FAILED, format!("exit {code}: {stderr}"))
            }
            other => PublishOutcome::failed(MSG_UNEXPECTED, other.to_string()),
        }
    }
}

/// Collapses a publish result into the caller-facing outcome.
pub fn map_result<P: AsRef<Path>>(result: Result<P, PublishError>) -> PublishOutcome {
    match result {
        Ok(path) => PublishOutcome::published(path.as_ref()),
        Err(e) => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecError, FetchError};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn success_names_the_document() {
        let outcome = map_result(Ok(PathBuf::from("/docs/a.md")));
        assert!(outcome.success);
        assert_eq!(outcome.message, "published /docs/a.md");
        assert_eq!(outcome.error, None);
    }

    #[test]
    fn missing_parameters_detail_names_fields() {
        let outcome = map_result::<PathBuf>(Err(PublishError::MissingParameters(vec!["api_key"])));
        assert!(!outcome.success);
        assert_eq!(outcome.message, MSG_INVALID_PARAMETERS);
        assert!(outcome.error.unwrap().contains("api_key"));
    }

    #[test]
    fn resolution_failure_keeps_http_status() {
        let err = PublishError::resolution(FetchError::Status {
            status: 403,
            url: "https://api.github.com/repos/o/r/contents/a.md".into(),
            hint: None,
        });
        let outcome = PublishOutcome::from(err);
        assert_eq!(outcome.message, MSG_INVALID_PARAMETERS);
        assert!(outcome.error.unwrap().contains("403"));
    }

    #[test]
    fn tool_failure_reports_exit_and_stderr() {
        let outcome = PublishOutcome::from(PublishError::ToolExecutionFailed {
            code: 1,
            stderr: "page not found".into(),
        });
        assert_eq!(outcome.message, MSG_TOOL_FAILED);
        assert_eq!(outcome.error.as_deref(), Some("exit 1: page not found"));
    }

    #[test]
    fn timeout_is_unexpected() {
        let outcome = PublishOutcome::from(PublishError::ExecutionError(ExecError::Timeout(
            Duration::from_secs(60),
        )));
        assert_eq!(outcome.message, MSG_UNEXPECTED);
        assert!(outcome.error.unwrap().contains("60s"));
    }

    #[test]
    fn unsupported_job_kind_is_distinct() {
        let outcome = PublishOutcome::from(PublishError::UnsupportedJobKind("pandoc".into()));
        assert!(!outcome.success);
        assert_eq!(
            outcome.message,
            "Unsupported job type: 'pandoc'. Supported types: md2conf"
        );
        assert_eq!(outcome.error.as_deref(), Some(INVALID_JOB_TYPE));
    }
}
