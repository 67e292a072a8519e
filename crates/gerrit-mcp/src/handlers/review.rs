//! Mutating tools: reviewers, WIP/ready, reverts, topics, abandon, comments
//!
//! Each of these has three outcomes:
//!
//! - the request failed: the failure is written to the diagnostic log and
//!   returned as an error
//! - the request went through but Gerrit's answer does not confirm the
//!   change: a `Failed to ...` text carrying the raw response
//! - the answer has the shape of a success: a `Successfully ...` text

use gerrit_core::Error as CoreError;
use gerrit_core::executor::{post_args, put_args};
use gerrit_core::extract::display_value;
use serde_json::{Map, Value, json};

use super::{change_url, parse_json, parse_object};
use crate::Result;
use crate::context::Context;
use crate::operations::{
    AddReviewerArgs, ChangeArgs, CreateChangeArgs, MessageArgs, ReviewCommentArgs, SetTopicArgs,
};

/// Run a mutating request. Transport failures are logged as
/// `Error <action>: <error>` before being returned.
async fn submit(
    ctx: &Context,
    args: &[String],
    base_url: &str,
    action: impl FnOnce() -> String,
) -> Result<String> {
    match ctx.fetch(args, base_url).await {
        Ok(body) => Ok(body),
        Err(err) if err.is_config() => Err(err.into()),
        Err(err) => {
            ctx.note(&format!("Error {}: {err}", action()));
            Err(err.into())
        }
    }
}

/// `<what>. Response: <body>` for an answer that does not confirm the change.
fn rejected(what: String, body: &str) -> String {
    let err = CoreError::semantic_failure(body);
    tracing::warn!(error = %err, "{what}");
    format!("{what}. {err}")
}

fn message_payload(message: Option<&str>) -> Option<Value> {
    message
        .filter(|m| !m.is_empty())
        .map(|m| json!({ "message": m }))
}

fn has_keys(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().all(|key| object.contains_key(*key))
}

pub async fn add_reviewer(ctx: &Context, args: AddReviewerArgs) -> Result<String> {
    let AddReviewerArgs {
        change_id: id,
        reviewer,
        gerrit_base_url,
        state,
    } = args;

    if !matches!(state.to_uppercase().as_str(), "REVIEWER" | "CC") {
        return Ok(format!(
            "Failed to add {reviewer}: Invalid state '{state}'. State must be either 'REVIEWER' or 'CC'."
        ));
    }

    let base_url = ctx.base_url(gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, &id, "/reviewers");
    let payload = json!({ "reviewer": reviewer, "state": state });

    let body = submit(ctx, &post_args(&url, Some(&payload)), &base_url, || {
        format!("adding reviewer to CL {id}")
    })
    .await?;

    let failed = |response: &str| {
        rejected(format!("Failed to add {reviewer} as a {state} to CL {id}"), response)
    };
    match parse_json(&body) {
        Ok(Value::Object(result)) if result.contains_key("error") => {
            Ok(failed(&display_value(result.get("error"))))
        }
        Ok(_) => Ok(format!(
            "Successfully added {reviewer} as a {state} to CL {id}."
        )),
        Err(_) => Ok(failed(&body)),
    }
}

pub async fn set_ready_for_review(ctx: &Context, args: ChangeArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/ready");

    let body = submit(ctx, &post_args(&url, None), &base_url, || {
        format!("setting CL {id} as ready for review")
    })
    .await?;

    // Gerrit answers with an empty body on success.
    if body.is_empty() {
        Ok(format!("CL {id} is now ready for review."))
    } else {
        Ok(rejected(format!("Failed to set CL {id} as ready for review"), &body))
    }
}

pub async fn set_work_in_progress(ctx: &Context, args: MessageArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/wip");
    let payload = message_payload(args.message.as_deref());

    let body = submit(ctx, &post_args(&url, payload.as_ref()), &base_url, || {
        format!("setting CL {id} as work-in-progress")
    })
    .await?;

    if body.is_empty() {
        Ok(format!("CL {id} is now a work-in-progress."))
    } else {
        Ok(rejected(format!("Failed to set CL {id} as work-in-progress"), &body))
    }
}

pub async fn revert_change(ctx: &Context, args: MessageArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/revert");
    let payload = message_payload(args.message.as_deref());

    let body = submit(ctx, &post_args(&url, payload.as_ref()), &base_url, || {
        format!("reverting CL {id}")
    })
    .await?;

    match parse_object(&body) {
        Ok(revert) if has_keys(&revert, &["id", "_number"]) => Ok(format!(
            "Successfully reverted CL {id}.\nNew revert CL created: {}\nSubject: {}",
            display_value(revert.get("_number")),
            display_value(revert.get("subject"))
        )),
        _ => Ok(rejected(format!("Failed to revert CL {id}"), &body)),
    }
}

pub async fn revert_submission(ctx: &Context, args: MessageArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/revert_submission");
    let payload = message_payload(args.message.as_deref());

    let body = submit(ctx, &post_args(&url, payload.as_ref()), &base_url, || {
        format!("reverting submission for CL {id}")
    })
    .await?;

    let submission = parse_object(&body).ok();
    let Some(reverts) = submission.as_ref().and_then(|s| s.get("revert_changes")) else {
        return Ok(rejected(
            format!("Failed to revert submission for CL {id}"),
            &body,
        ));
    };

    let mut output = format!("Successfully reverted submission for CL {id}.\n");
    output.push_str("Created revert changes:\n");
    for change in reverts.as_array().into_iter().flatten() {
        output.push_str(&format!(
            "- {}: {}\n",
            display_value(change.get("_number")),
            display_value(change.get("subject"))
        ));
    }
    Ok(output)
}

pub async fn create_change(ctx: &Context, args: CreateChangeArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = format!("{base_url}/changes/");

    let mut payload = json!({
        "project": args.project,
        "subject": args.subject,
        "branch": args.branch,
    });
    if let Some(topic) = args.topic.as_deref().filter(|t| !t.is_empty()) {
        payload["topic"] = json!(topic);
    }
    if let Some(status) = args.status.as_deref().filter(|s| !s.is_empty()) {
        payload["status"] = json!(status);
    }

    let body = submit(ctx, &post_args(&url, Some(&payload)), &base_url, || {
        format!("creating change in {}", args.project)
    })
    .await?;

    match parse_object(&body) {
        Ok(change) if has_keys(&change, &["id", "_number"]) => Ok(format!(
            "Successfully created new change {}.\nSubject: {}\nProject: {}, Branch: {}",
            display_value(change.get("_number")),
            display_value(change.get("subject")),
            display_value(change.get("project")),
            display_value(change.get("branch"))
        )),
        _ => Ok(rejected("Failed to create change".to_string(), &body)),
    }
}

pub async fn set_topic(ctx: &Context, args: SetTopicArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/topic");
    let payload = json!({ "topic": args.topic });

    let body = submit(ctx, &put_args(&url, Some(&payload)), &base_url, || {
        format!("setting topic for CL {id}")
    })
    .await?;

    // An empty answer means the topic is gone; otherwise Gerrit echoes the
    // new topic as a JSON string.
    if body.is_empty() {
        return Ok(format!("Topic successfully deleted from CL {id}."));
    }
    match parse_json(&body) {
        Ok(topic) => Ok(format!(
            "Successfully set topic for CL {id} to: {}",
            display_value(Some(&topic))
        )),
        Err(_) => Ok(rejected(format!("Failed to set topic for CL {id}"), &body)),
    }
}

pub async fn abandon_change(ctx: &Context, args: MessageArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/abandon");
    let payload = message_payload(args.message.as_deref());

    let body = submit(ctx, &post_args(&url, payload.as_ref()), &base_url, || {
        format!("abandoning CL {id}")
    })
    .await?;

    match parse_object(&body) {
        Ok(change)
            if change.contains_key("id")
                && change.get("status").and_then(Value::as_str) == Some("ABANDONED") =>
        {
            Ok(format!("Successfully abandoned CL {id}.\nStatus: ABANDONED"))
        }
        _ => Ok(rejected(format!("Failed to abandon CL {id}"), &body)),
    }
}

/// Request body for a single inline comment, with optional votes.
pub(crate) fn review_payload(args: &ReviewCommentArgs) -> Value {
    let mut comment = json!({
        "line": args.line_number,
        "message": args.message,
        "unresolved": args.unresolved,
    });
    if let Some(parent) = args.in_reply_to.as_deref().filter(|p| !p.is_empty()) {
        comment["in_reply_to"] = json!(parent);
    }

    let mut comments = Map::new();
    comments.insert(args.file_path.clone(), json!([comment]));

    let mut payload = json!({ "comments": comments });
    if let Some(labels) = args.labels.as_ref().filter(|l| !l.is_empty()) {
        payload["labels"] = json!(labels);
    }
    payload
}

/// A review answer confirms the post when it is done or echoes back labels
/// or comments.
fn review_accepted(body: &str) -> bool {
    match parse_object(body) {
        Ok(review) => {
            review.get("done") == Some(&Value::Bool(true))
                || review.contains_key("labels")
                || review.contains_key("comments")
        }
        Err(_) => false,
    }
}

pub async fn post_review_comment(ctx: &Context, args: ReviewCommentArgs) -> Result<String> {
    let id = &args.change_id;
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, id, "/revisions/current/review");
    let payload = review_payload(&args);

    let body = submit(ctx, &post_args(&url, Some(&payload)), &base_url, || {
        format!("posting comment to CL {id}")
    })
    .await?;

    if review_accepted(&body) {
        Ok(format!(
            "Successfully posted comment to CL {id} on file {} at line {}.",
            args.file_path, args.line_number
        ))
    } else {
        Ok(rejected("Failed to post comment".to_string(), &body))
    }
}
