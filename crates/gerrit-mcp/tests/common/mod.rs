#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gerrit_core::{ConfigLocation, DiagnosticLog, Error as CoreError, Transport};
use gerrit_mcp::{Context, Operation};
use serde_json::Value;
use tempfile::TempDir;

pub const BASE_URL: &str = "https://my-gerrit.com";

pub const TEST_CONFIG: &str = r#"{
    "default_gerrit_base_url": "https://my-gerrit.com",
    "gerrit_hosts": [
        {
            "name": "Test",
            "internal_url": "https://my-gerrit.corp.example.com",
            "external_url": "https://my-gerrit.com",
            "authentication": {"type": "http_basic", "username": "u", "auth_token": "t"}
        }
    ]
}"#;

/// One scripted answer from the transport.
pub enum Reply {
    Body(String),
    Fail(i32, String),
}

pub fn body(text: impl Into<String>) -> Reply {
    Reply::Body(text.into())
}

pub fn json_body(value: Value) -> Reply {
    Reply::Body(value.to_string())
}

pub fn fail(code: i32, stderr: &str) -> Reply {
    Reply::Fail(code, stderr.to_string())
}

/// Transport that replays queued replies and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Request arguments of every call, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| args.clone())
            .collect()
    }

    /// Base URLs passed alongside each call.
    pub fn base_urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, base)| base.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, args: &[String], base_url: &str) -> gerrit_core::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((args.to_vec(), base_url.to_string()));

        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Fail(code, stderr)) => Err(CoreError::Transport {
                exit_code: Some(code),
                stderr,
            }),
            None => Err(CoreError::Transport {
                exit_code: Some(99),
                stderr: "no scripted reply left".to_string(),
            }),
        }
    }
}

/// A context wired to a temp config, a temp diagnostic log and a scripted
/// transport.
pub struct Harness {
    pub temp: TempDir,
    pub transport: Arc<ScriptedTransport>,
    pub context: Context,
}

impl Harness {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self::with_config(TEST_CONFIG, replies)
    }

    pub fn with_config(config: &str, replies: Vec<Reply>) -> Self {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("gerrit_config.json");
        fs::write(&config_path, config).unwrap();

        let transport = Arc::new(ScriptedTransport::new(replies));
        let context = Context::new(
            ConfigLocation::new(Some(config_path)),
            transport.clone(),
            Arc::new(DiagnosticLog::new(temp.path().join("server.log"))),
        )
        .with_base_url_override(None);

        Self {
            temp,
            transport,
            context,
        }
    }

    pub async fn call(&self, tool: &str, args: Value) -> gerrit_mcp::Result<String> {
        Operation::parse(tool, args)?.run(&self.context).await
    }

    /// Like [`Harness::call`] but the call must produce text.
    pub async fn text(&self, tool: &str, args: Value) -> String {
        match self.call(tool, args).await {
            Ok(text) => text,
            Err(e) => panic!("{tool} failed: {e}"),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.transport.calls()
    }

    /// The URL (last argument) of the n-th call.
    pub fn url(&self, n: usize) -> String {
        self.calls()[n].last().cloned().unwrap()
    }

    pub fn log(&self) -> String {
        fs::read_to_string(self.temp.path().join("server.log")).unwrap_or_default()
    }
}
