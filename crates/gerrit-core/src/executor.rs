//! Request execution
//!
//! Requests are not made in-process. Each call is turned into a command line
//! (an authenticated prefix from an [`AuthCommandProvider`] followed by the
//! request arguments) and run as a child process. The child's stdout is the
//! response body.
//!
//! # Flow
//!
//! 1. Reload the host registry and ask the auth provider for a prefix
//! 2. Append `-X METHOD`, headers, body and target URL
//! 3. Spawn, await completion (other calls keep running meanwhile)
//! 4. Log stdout/stderr, map a non-zero exit to [`Error::Transport`]
//! 5. Strip the `)]}'` marker and surrounding whitespace
//!
//! Dropping the future returned by [`Transport::execute`] kills the child.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::config::{ConfigLocation, GerritConfig};
use crate::log::DiagnosticLog;
use crate::{Error, Result};

/// Prefix Gerrit puts in front of JSON responses to defeat XSSI.
pub const XSSI_MARKER: &str = ")]}'";

/// Builds the authenticated command prefix for a server.
///
/// Implementations decide how credentials are attached; the gateway only
/// appends request arguments to whatever is returned.
pub trait AuthCommandProvider: Send + Sync {
    /// Return the program and leading arguments used to reach `base_url`.
    fn command_for(&self, base_url: &str, config: &GerritConfig) -> Result<Vec<String>>;
}

/// Anything that can perform a request and hand back the unwrapped body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, args: &[String], base_url: &str) -> Result<String>;
}

/// `curl`-based provider driven by each host's `authentication` descriptor.
///
/// Supported descriptors:
/// - `{"type": "http_basic", "username": "...", "auth_token": "..."}`
/// - `{"type": "git_cookies", "gitcookies_path": "~/.gitcookies"}`
///
/// Hosts without a descriptor (or not in the registry) get an
/// unauthenticated `curl`.
#[derive(Debug, Clone)]
pub struct CurlAuthProvider {
    program: String,
}

impl Default for CurlAuthProvider {
    fn default() -> Self {
        Self {
            program: "curl".to_string(),
        }
    }
}

impl CurlAuthProvider {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn base_command(&self) -> Vec<String> {
        ["-sS", "-L", "--fail-with-body"]
            .into_iter()
            .fold(vec![self.program.clone()], |mut cmd, flag| {
                cmd.push(flag.to_string());
                cmd
            })
    }
}

impl AuthCommandProvider for CurlAuthProvider {
    fn command_for(&self, base_url: &str, config: &GerritConfig) -> Result<Vec<String>> {
        let mut command = self.base_command();

        let Some(host) = config.host_for(base_url) else {
            tracing::debug!(base_url, "No configured host, sending unauthenticated request");
            return Ok(command);
        };

        let auth = &host.authentication;
        match auth.get("type").and_then(Value::as_str) {
            Some("http_basic") => {
                let username = required_field(auth, "username", &host.name)?;
                let token = required_field(auth, "auth_token", &host.name)?;
                command.push("-u".to_string());
                command.push(format!("{username}:{token}"));
            }
            Some("git_cookies") => {
                let cookies = required_field(auth, "gitcookies_path", &host.name)?;
                command.push("-b".to_string());
                command.push(expand_home(cookies).display().to_string());
            }
            Some(other) => {
                tracing::warn!(host = %host.name, auth_type = other, "Unknown authentication type");
            }
            None => {}
        }
        Ok(command)
    }
}

fn required_field<'a>(auth: &'a Value, field: &str, host: &str) -> Result<&'a str> {
    auth.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ConfigConsistency {
            message: format!("Authentication for Gerrit host '{host}' is missing '{field}'."),
        })
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// The production [`Transport`]: runs the request as a child process.
pub struct CommandExecutor {
    location: ConfigLocation,
    auth: Arc<dyn AuthCommandProvider>,
    log: Arc<DiagnosticLog>,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new(
        location: ConfigLocation,
        auth: Arc<dyn AuthCommandProvider>,
        log: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            location,
            auth,
            log,
            timeout: None,
        }
    }

    /// Bound each request; on expiry the child is killed and the call fails
    /// with [`Error::Transport`].
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, program: &str, rest: &[String]) -> Result<std::process::Output> {
        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;

        let Some(limit) = self.timeout else {
            return Ok(child.wait_with_output().await?);
        };

        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            // The timed-out future owned the child; dropping it killed the process.
            Err(_) => Err(Error::Transport {
                exit_code: None,
                stderr: format!("request timed out after {limit:?}"),
            }),
        }
    }
}

#[async_trait]
impl Transport for CommandExecutor {
    async fn execute(&self, args: &[String], base_url: &str) -> Result<String> {
        let config = self.location.load()?;
        let prefix = self.auth.command_for(base_url, &config)?;
        let Some((program, prefix_args)) = prefix.split_first() else {
            return Err(Error::EmptyCommand {
                base_url: base_url.to_string(),
            });
        };
        let rest: Vec<String> = prefix_args.iter().chain(args).cloned().collect();

        self.log
            .record(&format!("Executing: {program} {}", rest.join(" ")));
        tracing::debug!(base_url, args = ?args, "Running Gerrit request");

        let output = match self.run(program, &rest).await {
            Ok(output) => output,
            Err(e) => {
                self.log.record(&e.to_string());
                return Err(e);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        self.log.record("curl command finished.");
        self.log.record_block("stdout", &stdout);
        self.log.record_block("stderr", &stderr);

        if !output.status.success() {
            let err = Error::Transport {
                exit_code: output.status.code(),
                stderr: stderr.into_owned(),
            };
            self.log.record(&err.to_string());
            tracing::warn!(base_url, code = ?output.status.code(), "Gerrit request failed");
            return Err(err);
        }

        let body = strip_xssi(&stdout);
        self.log.record_block("JSON to parse", body);
        Ok(body.to_string())
    }
}

/// Remove the anti-XSSI marker when it is the very first thing in `body`.
///
/// A marked body is trimmed on both sides (the marker is followed by a
/// newline); an unmarked body only loses trailing whitespace.
pub fn strip_xssi(body: &str) -> &str {
    match body.strip_prefix(XSSI_MARKER) {
        Some(rest) => rest.trim(),
        None => body.trim_end(),
    }
}

/// Arguments for a plain GET of `url`.
pub fn get_args(url: &str) -> Vec<String> {
    vec![url.to_string()]
}

/// Arguments for a POST of `url`, with an optional JSON body.
pub fn post_args(url: &str, payload: Option<&Value>) -> Vec<String> {
    method_args("POST", url, payload)
}

/// Arguments for a PUT of `url`, with an optional JSON body.
pub fn put_args(url: &str, payload: Option<&Value>) -> Vec<String> {
    method_args("PUT", url, payload)
}

fn method_args(method: &str, url: &str, payload: Option<&Value>) -> Vec<String> {
    let mut args = vec!["-X".to_string(), method.to_string()];
    if let Some(payload) = payload {
        args.push("-H".to_string());
        args.push("Content-Type: application/json".to_string());
        args.push("--data".to_string());
        args.push(payload.to_string());
    }
    args.push(url.to_string());
    args
}
