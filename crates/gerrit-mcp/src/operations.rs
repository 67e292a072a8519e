//! Static tool registry
//!
//! Every tool is a variant of [`Operation`] carrying its typed arguments.
//! A call is parsed once (name + JSON arguments) and then run against a
//! [`Context`]; argument errors surface before any request is made.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::context::Context;
use crate::handlers::{changes, ci, review};
use crate::{Error, Result};

/// Names of all registered tools, in registry order.
pub const NAMES: &[&str] = &[
    "query_changes",
    "query_changes_by_date_and_filters",
    "get_change_details",
    "get_commit_message",
    "list_change_files",
    "get_file_diff",
    "list_change_comments",
    "add_reviewer",
    "set_ready_for_review",
    "set_work_in_progress",
    "revert_change",
    "revert_submission",
    "create_change",
    "set_topic",
    "changes_submitted_together",
    "suggest_reviewers",
    "abandon_change",
    "get_most_recent_cl",
    "get_bugs_from_cl",
    "post_review_comment",
    "get_circleci_status",
];

/// Accept change ids given either as strings or as bare numbers.
fn change_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

fn default_status() -> String {
    "merged".to_string()
}

fn default_reviewer_state() -> String {
    "REVIEWER".to_string()
}

fn default_true() -> bool {
    true
}

/// Arguments for tools that only need a change
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

/// A change plus extra `o=` options
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeOptionsArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// A change plus an optional message (WIP, revert, abandon)
#[derive(Debug, Clone, Deserialize)]
pub struct MessageArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryChangesArgs {
    pub query: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateQueryArgs {
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`, inclusive
    pub end_date: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub message_substring: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDiffArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    pub file_path: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddReviewerArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    pub reviewer: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
    #[serde(default = "default_reviewer_state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChangeArgs {
    pub project: String,
    pub subject: String,
    pub branch: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetTopicArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    /// Empty string deletes the topic
    pub topic: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestReviewersArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    pub query: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub exclude_groups: bool,
    #[serde(default)]
    pub reviewer_state: Option<String>,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentClArgs {
    pub user: String,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCommentArgs {
    #[serde(deserialize_with = "change_id")]
    pub change_id: String,
    pub file_path: String,
    pub line_number: u32,
    pub message: String,
    #[serde(default = "default_true")]
    pub unresolved: bool,
    #[serde(default)]
    pub gerrit_base_url: Option<String>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, i32>>,
    /// Id of the comment this one replies to
    #[serde(default)]
    pub in_reply_to: Option<String>,
}

/// A parsed tool call
#[derive(Debug, Clone)]
pub enum Operation {
    QueryChanges(QueryChangesArgs),
    QueryChangesByDateAndFilters(DateQueryArgs),
    GetChangeDetails(ChangeOptionsArgs),
    GetCommitMessage(ChangeArgs),
    ListChangeFiles(ChangeArgs),
    GetFileDiff(FileDiffArgs),
    ListChangeComments(ChangeArgs),
    AddReviewer(AddReviewerArgs),
    SetReadyForReview(ChangeArgs),
    SetWorkInProgress(MessageArgs),
    RevertChange(MessageArgs),
    RevertSubmission(MessageArgs),
    CreateChange(CreateChangeArgs),
    SetTopic(SetTopicArgs),
    ChangesSubmittedTogether(ChangeOptionsArgs),
    SuggestReviewers(SuggestReviewersArgs),
    AbandonChange(MessageArgs),
    GetMostRecentCl(RecentClArgs),
    GetBugsFromCl(ChangeArgs),
    PostReviewComment(ReviewCommentArgs),
    GetCircleciStatus(ChangeArgs),
}

fn arguments<T: DeserializeOwned>(tool: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

impl Operation {
    /// Look up `name` and decode its arguments. Missing arguments count as `{}`.
    pub fn parse(name: &str, args: Value) -> Result<Self> {
        let args = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let operation = match name {
            "query_changes" => Self::QueryChanges(arguments(name, args)?),
            "query_changes_by_date_and_filters" => {
                Self::QueryChangesByDateAndFilters(arguments(name, args)?)
            }
            "get_change_details" => Self::GetChangeDetails(arguments(name, args)?),
            "get_commit_message" => Self::GetCommitMessage(arguments(name, args)?),
            "list_change_files" => Self::ListChangeFiles(arguments(name, args)?),
            "get_file_diff" => Self::GetFileDiff(arguments(name, args)?),
            "list_change_comments" => Self::ListChangeComments(arguments(name, args)?),
            "add_reviewer" => Self::AddReviewer(arguments(name, args)?),
            "set_ready_for_review" => Self::SetReadyForReview(arguments(name, args)?),
            "set_work_in_progress" => Self::SetWorkInProgress(arguments(name, args)?),
            "revert_change" => Self::RevertChange(arguments(name, args)?),
            "revert_submission" => Self::RevertSubmission(arguments(name, args)?),
            "create_change" => Self::CreateChange(arguments(name, args)?),
            "set_topic" => Self::SetTopic(arguments(name, args)?),
            "changes_submitted_together" => {
                Self::ChangesSubmittedTogether(arguments(name, args)?)
            }
            "suggest_reviewers" => Self::SuggestReviewers(arguments(name, args)?),
            "abandon_change" => Self::AbandonChange(arguments(name, args)?),
            "get_most_recent_cl" => Self::GetMostRecentCl(arguments(name, args)?),
            "get_bugs_from_cl" => Self::GetBugsFromCl(arguments(name, args)?),
            "post_review_comment" => Self::PostReviewComment(arguments(name, args)?),
            "get_circleci_status" => Self::GetCircleciStatus(arguments(name, args)?),
            _ => return Err(Error::UnknownTool(name.to_string())),
        };
        Ok(operation)
    }

    /// The tool name this operation was registered under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryChanges(_) => "query_changes",
            Self::QueryChangesByDateAndFilters(_) => "query_changes_by_date_and_filters",
            Self::GetChangeDetails(_) => "get_change_details",
            Self::GetCommitMessage(_) => "get_commit_message",
            Self::ListChangeFiles(_) => "list_change_files",
            Self::GetFileDiff(_) => "get_file_diff",
            Self::ListChangeComments(_) => "list_change_comments",
            Self::AddReviewer(_) => "add_reviewer",
            Self::SetReadyForReview(_) => "set_ready_for_review",
            Self::SetWorkInProgress(_) => "set_work_in_progress",
            Self::RevertChange(_) => "revert_change",
            Self::RevertSubmission(_) => "revert_submission",
            Self::CreateChange(_) => "create_change",
            Self::SetTopic(_) => "set_topic",
            Self::ChangesSubmittedTogether(_) => "changes_submitted_together",
            Self::SuggestReviewers(_) => "suggest_reviewers",
            Self::AbandonChange(_) => "abandon_change",
            Self::GetMostRecentCl(_) => "get_most_recent_cl",
            Self::GetBugsFromCl(_) => "get_bugs_from_cl",
            Self::PostReviewComment(_) => "post_review_comment",
            Self::GetCircleciStatus(_) => "get_circleci_status",
        }
    }

    /// Execute against Gerrit and return the text shown to the caller.
    pub async fn run(self, ctx: &Context) -> Result<String> {
        match self {
            Self::QueryChanges(args) => changes::query_changes(ctx, args).await,
            Self::QueryChangesByDateAndFilters(args) => {
                changes::query_changes_by_date_and_filters(ctx, args).await
            }
            Self::GetChangeDetails(args) => changes::get_change_details(ctx, args).await,
            Self::GetCommitMessage(args) => changes::get_commit_message(ctx, args).await,
            Self::ListChangeFiles(args) => changes::list_change_files(ctx, args).await,
            Self::GetFileDiff(args) => changes::get_file_diff(ctx, args).await,
            Self::ListChangeComments(args) => changes::list_change_comments(ctx, args).await,
            Self::AddReviewer(args) => review::add_reviewer(ctx, args).await,
            Self::SetReadyForReview(args) => review::set_ready_for_review(ctx, args).await,
            Self::SetWorkInProgress(args) => review::set_work_in_progress(ctx, args).await,
            Self::RevertChange(args) => review::revert_change(ctx, args).await,
            Self::RevertSubmission(args) => review::revert_submission(ctx, args).await,
            Self::CreateChange(args) => review::create_change(ctx, args).await,
            Self::SetTopic(args) => review::set_topic(ctx, args).await,
            Self::ChangesSubmittedTogether(args) => {
                changes::changes_submitted_together(ctx, args).await
            }
            Self::SuggestReviewers(args) => changes::suggest_reviewers(ctx, args).await,
            Self::AbandonChange(args) => review::abandon_change(ctx, args).await,
            Self::GetMostRecentCl(args) => changes::get_most_recent_cl(ctx, args).await,
            Self::GetBugsFromCl(args) => changes::get_bugs_from_cl(ctx, args).await,
            Self::PostReviewComment(args) => review::post_review_comment(ctx, args).await,
            Self::GetCircleciStatus(args) => ci::get_circleci_status(ctx, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn every_name_parses_back_to_itself() {
        let minimal = json!({
            "change_id": "1",
            "query": "q",
            "start_date": "2025-01-01",
            "end_date": "2025-01-02",
            "file_path": "a.rs",
            "reviewer": "r@example.com",
            "project": "p",
            "subject": "s",
            "branch": "main",
            "topic": "t",
            "user": "u",
            "line_number": 1,
            "message": "m"
        });
        for name in NAMES {
            let op = Operation::parse(name, minimal.clone()).unwrap();
            assert_eq!(op.name(), *name);
        }
    }

    #[test]
    fn numeric_change_id_is_accepted() {
        let op = Operation::parse("get_commit_message", json!({"change_id": 12345})).unwrap();
        match op {
            Operation::GetCommitMessage(args) => assert_eq!(args.change_id, "12345"),
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let op = Operation::parse(
            "query_changes_by_date_and_filters",
            json!({"start_date": "2025-01-01", "end_date": "2025-01-02"}),
        )
        .unwrap();
        let Operation::QueryChangesByDateAndFilters(args) = op else {
            panic!("wrong variant");
        };
        assert_eq!(args.status, "merged");

        let op = Operation::parse("add_reviewer", json!({"change_id": "1", "reviewer": "x"})).unwrap();
        let Operation::AddReviewer(args) = op else {
            panic!("wrong variant");
        };
        assert_eq!(args.state, "REVIEWER");

        let op = Operation::parse(
            "post_review_comment",
            json!({"change_id": "1", "file_path": "f", "line_number": 3, "message": "m"}),
        )
        .unwrap();
        let Operation::PostReviewComment(args) = op else {
            panic!("wrong variant");
        };
        assert!(args.unresolved);
        assert!(args.labels.is_none());
    }

    #[rstest]
    #[case("query_changes", json!({}))]
    #[case("get_file_diff", json!({"change_id": "1"}))]
    #[case("post_review_comment", json!({"change_id": "1", "file_path": "f", "line_number": "x", "message": "m"}))]
    #[case("get_change_details", Value::Null)]
    fn missing_or_bad_arguments_are_rejected(#[case] name: &str, #[case] args: Value) {
        let err = Operation::parse(name, args).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }), "{err:?}");
        assert!(err.to_string().contains(name));
    }

    #[test]
    fn unknown_tool() {
        let err = Operation::parse("submit_change", json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownTool(ref n) if n == "submit_change"));
    }
}
