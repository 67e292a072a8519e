//! MCP Server for Gerrit code review
//!
//! This crate exposes Gerrit's REST API to agents through the Model Context
//! Protocol. Tools are thin: the gateway work (host registry, URL
//! normalization, authenticated request execution) lives in `gerrit-core`.
//!
//! # Architecture
//!
//! ```text
//! [ MCP Client (agent/IDE) ]
//!        | (JSON-RPC over stdio)
//!        v
//! [ server ] --> [ operations::Operation ] --> [ handlers::* ]
//!                                                   |
//!                                                   v
//!                                [ gerrit-core: Context -> Transport ]
//!                                                   |
//!                                                   v
//!                                         [ curl -> Gerrit REST ]
//! ```
//!
//! # Tools
//!
//! The server exposes tools for:
//! - Searching changes (free query, date ranges, a user's latest change)
//! - Inspecting changes (details, commit message, files, diffs, comments,
//!   bugs, submission groups, reviewer suggestions, CircleCI status)
//! - Updating changes (reviewers, WIP/ready, reverts, topics, abandon,
//!   new changes, inline comments)

pub mod context;
pub mod error;
pub mod handlers;
pub mod operations;
pub mod protocol;
pub mod server;
pub mod tools;

pub use context::Context;
pub use error::{Error, Result};
pub use operations::Operation;
pub use server::GerritMcpServer;
pub use tools::{ToolContent, ToolDefinition, ToolResult, get_tool_definitions};
