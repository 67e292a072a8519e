//! Errors surfaced by the MCP layer
//!
//! Tool failures never become JSON-RPC errors: the server renders them as a
//! tool result with `isError` set. Only a line that is not JSON at all maps to
//! a protocol-level error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration, transport or response failure from the gateway
    #[error(transparent)]
    Gerrit(#[from] gerrit_core::Error),

    /// Inbound line or outbound payload was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arguments did not decode into the tool's argument struct
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Reading stdin or writing stdout failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
