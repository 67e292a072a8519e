//! Stdio JSON-RPC server routing MCP requests to the Gerrit tools
//!
//! Each incoming line is handled on its own task, so a slow Gerrit request
//! never holds up other calls. Responses are funneled through a single
//! writer task and therefore never interleave, but they can leave in a
//! different order than the requests arrived; clients match them by id.
//!
//! A `notifications/cancelled` for a running request aborts its task, which
//! drops the pending Gerrit call and kills its child process. Once input
//! closes, requests still running after the shutdown grace are aborted the
//! same way.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};

use crate::context::Context;
use crate::operations::Operation;
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse, ServerCapabilities,
    ServerInfo, ToolCallParams, ToolsCapability,
};
use crate::tools::{ToolDefinition, ToolResult, get_tool_definitions};
use crate::{Error, Result};

/// How long in-flight requests may keep running after input closes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const CANCELLED: &str = "notifications/cancelled";

/// MCP Server for Gerrit
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use gerrit_core::{CommandExecutor, ConfigLocation, CurlAuthProvider, DiagnosticLog};
/// use gerrit_mcp::{Context, GerritMcpServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let location = ConfigLocation::default();
///     let log = Arc::new(DiagnosticLog::new("server.log"));
///     let executor = CommandExecutor::new(
///         location.clone(),
///         Arc::new(CurlAuthProvider::default()),
///         log.clone(),
///     );
///     let context = Context::new(location, Arc::new(executor), log);
///     GerritMcpServer::new(context).run().await?;
///     Ok(())
/// }
/// ```
pub struct GerritMcpServer {
    context: Arc<Context>,

    initialized: bool,

    /// Filled by [`GerritMcpServer::initialize`]
    tools: Vec<ToolDefinition>,

    shutdown_grace: Duration,
}

impl GerritMcpServer {
    pub fn new(context: Context) -> Self {
        Self {
            context: Arc::new(context),
            initialized: false,
            tools: Vec::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Initialize the server
    ///
    /// Loads the tool definitions and checks the host registry once so a
    /// broken configuration shows up in the logs at startup. A bad
    /// configuration is not fatal here: it is re-read on every call and
    /// reported to the caller then.
    pub async fn initialize(&mut self) -> Result<()> {
        let config_path = self.context.location().resolve();
        tracing::info!(config = ?config_path, "Initializing MCP server");

        match self.context.config() {
            Ok(config) => tracing::info!(
                hosts = config.gerrit_hosts.len(),
                default = ?config.default_gerrit_base_url,
                "Loaded Gerrit configuration"
            ),
            Err(e) => tracing::warn!(error = %e, "Gerrit configuration is not usable yet"),
        }

        self.tools = get_tool_definitions();
        self.initialized = true;
        Ok(())
    }

    /// Run the MCP server over stdin/stdout.
    pub async fn run(self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing responses to
    /// `writer`. Returns once the input is exhausted and every in-flight
    /// call has either answered or been aborted after the shutdown grace.
    pub async fn serve<R, W>(mut self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if !self.initialized {
            self.initialize().await?;
        }
        let server = Arc::new(self);

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        tracing::info!("MCP server ready, listening on stdio");

        let grace = server.shutdown_grace;
        let mut in_flight = JoinSet::new();
        let mut pending = Pending::default();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            tracing::debug!(request = %line, "Received message");

            let request = serde_json::from_str::<JsonRpcRequest>(&line).ok();
            if let Some(request) = &request
                && request.method == CANCELLED
            {
                let request_id = &request.params["requestId"];
                if pending.cancel(&request.params) {
                    tracing::info!(%request_id, "Cancelled in-flight request");
                } else {
                    tracing::debug!(%request_id, "Cancellation for a request that is not running");
                }
                continue;
            }

            let server = Arc::clone(&server);
            let tx = tx.clone();
            let handle = in_flight.spawn(async move {
                if let Some(response) = server.respond(&line).await {
                    // The receiver only goes away after every task finished.
                    let _ = tx.send(response);
                }
            });
            if let Some(id) = request.and_then(|r| r.id) {
                pending.track(&id, handle);
            }

            while let Some(done) = in_flight.try_join_next() {
                log_join_failure(done);
            }
            pending.prune();
        }

        if tokio::time::timeout(grace, drain(&mut in_flight)).await.is_err() {
            tracing::warn!(
                remaining = in_flight.len(),
                grace = ?grace,
                "Requests still running after input closed, aborting them"
            );
            in_flight.abort_all();
            drain(&mut in_flight).await;
        }
        drop(tx);

        writer_task.await.map_err(std::io::Error::other)??;
        tracing::info!("Input closed, MCP server stopping");
        Ok(())
    }

    /// Handle a line and produce the response to write, if any.
    async fn respond(&self, line: &str) -> Option<String> {
        let response = match self.handle_message(line).await {
            Ok(response) if response.is_empty() => return None,
            Ok(response) => return Some(response),
            Err(Error::Json(e)) => JsonRpcResponse::parse_error(e),
            Err(e) => JsonRpcResponse::internal_error(e),
        };
        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize error response");
                None
            }
        }
    }

    /// Answer one JSON-RPC line. Notifications yield an empty string; a
    /// line that is not a request is returned as [`Error::Json`].
    pub async fn handle_message(&self, message: &str) -> Result<String> {
        let request: JsonRpcRequest = serde_json::from_str(message)?;

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params)?,
            "initialized" | "notifications/initialized" => return Ok(String::new()),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await?,
            _ if request.is_notification() => {
                tracing::debug!(method = %request.method, "Ignoring notification");
                return Ok(String::new());
            }
            _ => JsonRpcResponse::method_not_found(request.id, &request.method),
        };

        serde_json::to_string(&response).map_err(Error::from)
    }

    fn handle_initialize(&self, id: Option<Value>, params: Value) -> Result<JsonRpcResponse> {
        // A handshake we cannot read still gets the newest revision.
        let params: InitializeParams = serde_json::from_value(params).unwrap_or_default();
        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = %client.version, "Client connected");
        }

        let result = InitializeResult {
            protocol_version: params.negotiated_version().to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: "gerrit".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = if self.tools.is_empty() {
            get_tool_definitions()
        } else {
            self.tools.clone()
        };
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    /// Run a tool. Tool failures are successful JSON-RPC responses whose
    /// result carries `isError: true`.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> Result<JsonRpcResponse> {
        let call: ToolCallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(e) => return Ok(JsonRpcResponse::invalid_params(id, e)),
        };

        let result = match Operation::parse(&call.name, call.arguments) {
            Ok(operation) => {
                let name = operation.name();
                tracing::info!(tool = name, "Running tool");
                match operation.run(&self.context).await {
                    Ok(text) => ToolResult::text(text),
                    Err(e) => {
                        tracing::warn!(tool = name, error = %e, "Tool call failed");
                        ToolResult::error(e.to_string())
                    }
                }
            }
            Err(e) => ToolResult::error(e.to_string()),
        };

        Ok(JsonRpcResponse::success(id, serde_json::to_value(result)?))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }
}

/// Abort handles of running requests, keyed by their serialized JSON-RPC id.
#[derive(Default)]
struct Pending(HashMap<String, AbortHandle>);

impl Pending {
    fn track(&mut self, id: &Value, handle: AbortHandle) {
        self.0.insert(id.to_string(), handle);
    }

    /// Abort the request named by `requestId` in a cancellation payload.
    /// Returns false when no such request is running.
    fn cancel(&mut self, params: &Value) -> bool {
        let Some(id) = params.get("requestId") else {
            return false;
        };
        match self.0.remove(&id.to_string()) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn prune(&mut self) {
        self.0.retain(|_, handle| !handle.is_finished());
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(done) = tasks.join_next().await {
        log_join_failure(done);
    }
}

fn log_join_failure(result: std::result::Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => tracing::debug!("Request task aborted"),
        Err(e) => tracing::error!(error = %e, "Request task failed"),
    }
}
