//! Tests for the command-based request executor
//!
//! A stub auth provider replaces `curl` with a small `sh` script so the
//! executor's process handling can be exercised without a Gerrit server.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gerrit_core::{
    AuthCommandProvider, CommandExecutor, ConfigLocation, DiagnosticLog, Error, GerritConfig,
    Result, Transport,
};
use tempfile::TempDir;

/// Runs `script` with `sh -c`; request arguments land in `$1`, `$2`, ...
struct ShellStub {
    script: String,
}

impl AuthCommandProvider for ShellStub {
    fn command_for(&self, _base_url: &str, _config: &GerritConfig) -> Result<Vec<String>> {
        Ok(vec![
            "sh".to_string(),
            "-c".to_string(),
            self.script.clone(),
            "stub".to_string(),
        ])
    }
}

struct EmptyProvider;

impl AuthCommandProvider for EmptyProvider {
    fn command_for(&self, _base_url: &str, _config: &GerritConfig) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

struct Fixture {
    temp: TempDir,
    config_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("gerrit_config.json");
        fs::write(&config_path, "{}").unwrap();
        Self { temp, config_path }
    }

    fn log_path(&self) -> PathBuf {
        self.temp.path().join("server.log")
    }

    fn executor(&self, provider: impl AuthCommandProvider + 'static) -> CommandExecutor {
        CommandExecutor::new(
            ConfigLocation::new(Some(self.config_path.clone())),
            Arc::new(provider),
            Arc::new(DiagnosticLog::new(self.log_path())),
        )
    }

    fn stub(&self, script: &str) -> CommandExecutor {
        self.executor(ShellStub {
            script: script.to_string(),
        })
    }

    fn log(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_marker_is_stripped() {
    let fx = Fixture::new();
    let executor = fx.stub(r##"printf '%s\n' ")]}'" '{"_number": 1}'"##);

    let body = executor
        .execute(&args(&["https://r.example.com/changes/1"]), "https://r.example.com")
        .await
        .unwrap();

    assert_eq!(body, r#"{"_number": 1}"#);
}

#[tokio::test]
async fn test_unmarked_body_only_loses_trailing_whitespace() {
    let fx = Fixture::new();
    let executor = fx.stub(r#"printf '["a"]\n\n'"#);

    let body = executor.execute(&[], "https://r.example.com").await.unwrap();
    assert_eq!(body, r#"["a"]"#);
}

#[tokio::test]
async fn test_request_args_are_appended_to_prefix() {
    let fx = Fixture::new();
    let executor = fx.stub(r#"printf '%s|' "$@""#);

    let body = executor
        .execute(
            &args(&["-X", "POST", "https://r.example.com/changes/1/ready"]),
            "https://r.example.com",
        )
        .await
        .unwrap();

    assert_eq!(body, "-X|POST|https://r.example.com/changes/1/ready|");
}

#[tokio::test]
async fn test_non_zero_exit_is_transport_error() {
    let fx = Fixture::new();
    let executor = fx.stub("echo '404 Not Found' >&2; exit 22");

    let err = executor
        .execute(&args(&["https://r.example.com/x"]), "https://r.example.com")
        .await
        .unwrap_err();

    match &err {
        Error::Transport { exit_code, stderr } => {
            assert_eq!(*exit_code, Some(22));
            assert!(stderr.contains("404 Not Found"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }

    let log = fx.log();
    assert!(log.contains("curl command failed with exit code 22"));
    assert!(log.contains("404 Not Found"));
}

#[tokio::test]
async fn test_log_records_command_and_raw_output() {
    let fx = Fixture::new();
    let executor = fx.stub("echo out; echo err >&2");

    executor
        .execute(&args(&["https://r.example.com/y"]), "https://r.example.com")
        .await
        .unwrap();

    let log = fx.log();
    assert!(log.contains("[gerrit-mcp-server] Executing: sh -c"));
    assert!(log.contains("https://r.example.com/y"));
    assert!(log.contains("[gerrit-mcp-server] curl command finished."));
    assert!(log.contains("[gerrit-mcp-server] stdout:\nout\n"));
    assert!(log.contains("[gerrit-mcp-server] stderr:\nerr\n"));
}

#[tokio::test]
async fn test_missing_config_fails_before_running() {
    let fx = Fixture::new();
    let marker = fx.temp.path().join("ran");
    let executor = CommandExecutor::new(
        ConfigLocation::new(Some(fx.temp.path().join("absent.json"))),
        Arc::new(ShellStub {
            script: format!("touch {}", marker.display()),
        }),
        Arc::new(DiagnosticLog::disabled()),
    );

    let err = executor.execute(&[], "https://r.example.com").await.unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_empty_command_is_rejected() {
    let fx = Fixture::new();
    let executor = fx.executor(EmptyProvider);

    let err = executor
        .execute(&args(&["https://r.example.com"]), "https://r.example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyCommand { .. }));
}

#[tokio::test]
async fn test_missing_program_is_spawn_error() {
    let fx = Fixture::new();
    struct Missing;
    impl AuthCommandProvider for Missing {
        fn command_for(&self, _: &str, _: &GerritConfig) -> Result<Vec<String>> {
            Ok(vec!["/nonexistent/curl-binary".to_string()])
        }
    }

    let err = fx.executor(Missing).execute(&[], "https://r.example.com").await.unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
}

fn wait_for_absence(path: &Path, within: Duration) -> bool {
    std::thread::sleep(within);
    !path.exists()
}

#[tokio::test]
async fn test_timeout_kills_child() {
    let fx = Fixture::new();
    let marker = fx.temp.path().join("survived");
    let executor = fx
        .stub(&format!("sleep 1; touch {}", marker.display()))
        .with_timeout(Some(Duration::from_millis(100)));

    let started = Instant::now();
    let err = executor.execute(&[], "https://r.example.com").await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(err, Error::Transport { exit_code: None, .. }));
    assert!(err.to_string().contains("request timed out after 100ms"));
    assert!(wait_for_absence(&marker, Duration::from_millis(1500)));
}
