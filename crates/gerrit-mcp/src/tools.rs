//! MCP tool definitions
//!
//! The JSON schemas advertised through `tools/list`. Argument decoding lives
//! in [`crate::operations`]; the names here and there must agree.
//!
//! # Tool Categories
//!
//! ## Queries
//! - `query_changes`, `query_changes_by_date_and_filters`, `get_most_recent_cl`
//!
//! ## Change inspection
//! - `get_change_details`, `get_commit_message`, `list_change_files`,
//!   `get_file_diff`, `list_change_comments`, `get_bugs_from_cl`,
//!   `changes_submitted_together`, `suggest_reviewers`, `get_circleci_status`
//!
//! ## Change updates
//! - `add_reviewer`, `set_ready_for_review`, `set_work_in_progress`,
//!   `revert_change`, `revert_submission`, `create_change`, `set_topic`,
//!   `abandon_change`, `post_review_comment`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Tool definition for MCP protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result from a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Content types for tool results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolResult {
    /// Create a successful text result
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: content.into(),
            }],
            is_error: None,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: Some(true),
        }
    }
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn integer(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

fn boolean(description: &str, default: bool) -> Value {
    json!({ "type": "boolean", "description": description, "default": default })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

fn change_id() -> Value {
    json!({
        "type": ["string", "integer"],
        "description": "Change number or Change-Id (e.g. 12345 or project~branch~I8473b95934b5732ac55d26311a706c9c2bde9940)"
    })
}

fn gerrit_base_url() -> Value {
    string(
        "Base URL of the Gerrit instance. Defaults to GERRIT_BASE_URL or the configured default host.",
    )
}

/// Build a definition. `gerrit_base_url` is added to every tool.
fn tool(name: &str, description: &str, properties: &[(&str, Value)], required: &[&str]) -> ToolDefinition {
    let mut props: Map<String, Value> = properties
        .iter()
        .map(|(key, schema)| (key.to_string(), schema.clone()))
        .collect();
    props.insert("gerrit_base_url".to_string(), gerrit_base_url());

    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": props,
            "required": required,
        }),
    }
}

/// Get all available tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        // Queries
        tool(
            "query_changes",
            "Searches for CLs matching a given query string. Results are sorted by last update, most recent first.",
            &[
                ("query", string("Gerrit search query (e.g. 'status:open owner:self')")),
                ("limit", integer("Maximum number of changes to return")),
                ("options", string_list("Extra Gerrit query options (o= parameters)")),
            ],
            &["query"],
        ),
        tool(
            "query_changes_by_date_and_filters",
            "Searches for changes within a date range, optionally filtered by project, a commit message substring and change status.",
            &[
                ("start_date", string("Start date, YYYY-MM-DD")),
                ("end_date", string("End date (inclusive), YYYY-MM-DD")),
                ("limit", integer("Maximum number of changes to return")),
                ("project", string("Project name to filter by")),
                ("message_substring", string("Substring to search for in the commit message")),
                ("status", json!({
                    "type": "string",
                    "description": "Change status (e.g. merged, open, abandoned)",
                    "default": "merged"
                })),
            ],
            &["start_date", "end_date"],
        ),
        tool(
            "get_change_details",
            "Retrieves a comprehensive summary of a single CL: owner, status, bugs, reviewer votes and recent messages.",
            &[
                ("change_id", change_id()),
                ("options", string_list("Extra Gerrit query options added to the defaults")),
            ],
            &["change_id"],
        ),
        tool(
            "get_commit_message",
            "Gets the commit message of a change from the current patch set.",
            &[("change_id", change_id())],
            &["change_id"],
        ),
        tool(
            "list_change_files",
            "Lists all files modified in the most recent patch set of a CL.",
            &[("change_id", change_id())],
            &["change_id"],
        ),
        tool(
            "get_file_diff",
            "Retrieves the diff for a single, specified file within a CL.",
            &[
                ("change_id", change_id()),
                ("file_path", string("Path of the file within the change")),
            ],
            &["change_id", "file_path"],
        ),
        tool(
            "list_change_comments",
            "Lists the comments on a change, with their ids, reply links and resolution state. Useful for reviewing and responding to feedback.",
            &[("change_id", change_id())],
            &["change_id"],
        ),
        // Change updates
        tool(
            "add_reviewer",
            "Adds a user or a group to a CL as either a reviewer or a CC.",
            &[
                ("change_id", change_id()),
                ("reviewer", string("Account or group to add")),
                ("state", json!({
                    "type": "string",
                    "enum": ["REVIEWER", "CC"],
                    "default": "REVIEWER",
                    "description": "Whether to add as reviewer or CC"
                })),
            ],
            &["change_id", "reviewer"],
        ),
        tool(
            "set_ready_for_review",
            "Sets a CL as ready for review.",
            &[("change_id", change_id())],
            &["change_id"],
        ),
        tool(
            "set_work_in_progress",
            "Sets a CL as work-in-progress.",
            &[
                ("change_id", change_id()),
                ("message", string("Optional message to post with the state change")),
            ],
            &["change_id"],
        ),
        tool(
            "revert_change",
            "Reverts a single change, creating a new CL.",
            &[
                ("change_id", change_id()),
                ("message", string("Optional commit message for the revert")),
            ],
            &["change_id"],
        ),
        tool(
            "revert_submission",
            "Reverts an entire submission, creating one or more new CLs.",
            &[
                ("change_id", change_id()),
                ("message", string("Optional commit message for the reverts")),
            ],
            &["change_id"],
        ),
        tool(
            "create_change",
            "Creates a new change in Gerrit.",
            &[
                ("project", string("Project to create the change in")),
                ("subject", string("Subject (first line of the commit message)")),
                ("branch", string("Target branch")),
                ("topic", string("Optional topic")),
                ("status", string("Optional initial status (e.g. NEW)")),
            ],
            &["project", "subject", "branch"],
        ),
        tool(
            "set_topic",
            "Sets the topic of a change. An empty string deletes the topic.",
            &[
                ("change_id", change_id()),
                ("topic", string("New topic, or empty to delete")),
            ],
            &["change_id", "topic"],
        ),
        tool(
            "changes_submitted_together",
            "Computes and lists all changes that would be submitted together with a given CL.",
            &[
                ("change_id", change_id()),
                ("options", string_list("Gerrit options, e.g. NON_VISIBLE_CHANGES")),
            ],
            &["change_id"],
        ),
        tool(
            "suggest_reviewers",
            "Suggests reviewers for a change based on a query.",
            &[
                ("change_id", change_id()),
                ("query", string("Partial name, email or group to match")),
                ("limit", integer("Maximum number of suggestions")),
                ("exclude_groups", boolean("Only suggest accounts", false)),
                ("reviewer_state", string("REVIEWER or CC")),
            ],
            &["change_id", "query"],
        ),
        tool(
            "abandon_change",
            "Abandons a change.",
            &[
                ("change_id", change_id()),
                ("message", string("Optional message explaining the abandon")),
            ],
            &["change_id"],
        ),
        tool(
            "get_most_recent_cl",
            "Gets the most recent CL for a user.",
            &[("user", string("Account (email or username) owning the change"))],
            &["user"],
        ),
        tool(
            "get_bugs_from_cl",
            "Extracts bug IDs from the commit message of a CL.",
            &[("change_id", change_id())],
            &["change_id"],
        ),
        tool(
            "post_review_comment",
            "Posts a review comment on a specific line of a file in a CL, optionally voting on labels or replying to an existing comment.",
            &[
                ("change_id", change_id()),
                ("file_path", string("File to comment on")),
                ("line_number", integer("Line to comment on")),
                ("message", string("Comment text")),
                ("unresolved", boolean("Whether the comment needs attention", true)),
                ("labels", json!({
                    "type": "object",
                    "additionalProperties": { "type": "integer" },
                    "description": "Votes to apply, e.g. {\"Code-Review\": 1}"
                })),
                ("in_reply_to", string("Id of the comment being replied to")),
            ],
            &["change_id", "file_path", "line_number", "message"],
        ),
        tool(
            "get_circleci_status",
            "Retrieves CircleCI workflow and job statuses for a CL from the Gerrit CircleCI plugin. Failed jobs include a link to the CircleCI UI.",
            &[("change_id", change_id())],
            &["change_id"],
        ),
    ]
}
