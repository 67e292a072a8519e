//! Read-only change tools: queries, details, files, diffs, comments

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use gerrit_core::executor::get_args;
use gerrit_core::extract::{display_value, extract_bugs, sort_changes_by_date};
use serde_json::Value;

use super::{
    change_url, encode, option_params, parse_array, parse_json, parse_object, recover,
    recover_with, str_or,
};
use crate::Result;
use crate::context::Context;
use crate::operations::{
    ChangeArgs, ChangeOptionsArgs, DateQueryArgs, FileDiffArgs, QueryChangesArgs, RecentClArgs,
    SuggestReviewersArgs,
};

/// Options always requested by `get_change_details`.
const DETAIL_OPTIONS: &[&str] = &["CURRENT_REVISION", "CURRENT_COMMIT", "DETAILED_LABELS"];

const DATE_FORMAT: &str = "%Y-%m-%d";

const INVALID_DATE: &str = "Invalid date format. Please use YYYY-MM-DD for start_date and end_date.";

const MESSAGE_RULE: &str = "--------------------------------------------------------";

/// `- 12345: [WIP] Subject`
fn change_line(change: &Value) -> String {
    let wip = if change.get("work_in_progress").and_then(Value::as_bool) == Some(true) {
        "[WIP] "
    } else {
        ""
    };
    format!(
        "- {}: {wip}{}\n",
        display_value(change.get("_number")),
        display_value(change.get("subject"))
    )
}

pub async fn query_changes(ctx: &Context, args: QueryChangesArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;

    let mut url = format!("{base_url}/changes/?q={}", encode(&args.query));
    if let Some(limit) = args.limit.filter(|n| *n > 0) {
        url.push_str(&format!("&n={limit}"));
    }
    if let Some(options) = args.options.as_deref().filter(|o| !o.is_empty()) {
        url.push('&');
        url.push_str(&option_params(options));
    }

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    let changes = match parse_array(&body) {
        Ok(changes) => sort_changes_by_date(changes),
        Err(err) => return recover(err),
    };

    if changes.is_empty() {
        return Ok(format!("No changes found for query: {}", args.query));
    }

    let mut output = format!(
        "Found {} changes for query \"{}\":\n",
        changes.len(),
        args.query
    );
    for change in &changes {
        output.push_str(&change_line(change));
    }
    Ok(output)
}

/// Build the Gerrit query for a date range. `before:` is exclusive, so the
/// end date is moved one day forward to include it.
pub(crate) fn date_range_query(args: &DateQueryArgs) -> Option<String> {
    let start = NaiveDate::parse_from_str(&args.start_date, DATE_FORMAT).ok()?;
    let end = NaiveDate::parse_from_str(&args.end_date, DATE_FORMAT).ok()?;
    let before = end.succ_opt()?;

    let mut parts = vec![
        format!("status:{}", args.status),
        format!("after:{}", start.format(DATE_FORMAT)),
        format!("before:{}", before.format(DATE_FORMAT)),
    ];
    if let Some(project) = args.project.as_deref().filter(|p| !p.is_empty()) {
        parts.push(format!("project:{project}"));
    }
    if let Some(substring) = args.message_substring.as_deref().filter(|m| !m.is_empty()) {
        parts.push(format!("message:\"{substring}\""));
    }
    Some(parts.join(" "))
}

pub async fn query_changes_by_date_and_filters(
    ctx: &Context,
    args: DateQueryArgs,
) -> Result<String> {
    let Some(query) = date_range_query(&args) else {
        return Ok(INVALID_DATE.to_string());
    };
    tracing::debug!(%query, "Built date range query");

    query_changes(
        ctx,
        QueryChangesArgs {
            query,
            gerrit_base_url: args.gerrit_base_url,
            limit: args.limit,
            options: None,
        },
    )
    .await
}

pub async fn get_change_details(ctx: &Context, args: ChangeOptionsArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;

    let mut options: Vec<String> = DETAIL_OPTIONS.iter().map(ToString::to_string).collect();
    for option in args.options.unwrap_or_default() {
        if !options.contains(&option) {
            options.push(option);
        }
    }
    let url = format!(
        "{}?{}",
        change_url(&base_url, &args.change_id, "/detail"),
        option_params(&options)
    );

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    match parse_json(&body) {
        Ok(details) => Ok(render_change_details(&details)),
        Err(err) => recover(err),
    }
}

fn format_vote(value: i64) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn reviewer_votes(details: &Value, reviewer: &Value) -> Vec<String> {
    let account = reviewer.get("_account_id");
    let Some(labels) = details.get("labels").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut votes = Vec::new();
    for (label, info) in labels {
        let all = info.get("all").and_then(Value::as_array);
        for vote in all.into_iter().flatten() {
            if vote.get("_account_id") == account {
                let value = vote.get("value").and_then(Value::as_i64).unwrap_or(0);
                votes.push(format!("{label}: {}", format_vote(value)));
            }
        }
    }
    votes
}

fn current_commit_message(details: &Value) -> Option<&str> {
    let current = details.get("current_revision")?.as_str()?;
    details
        .get("revisions")?
        .get(current)?
        .get("commit")?
        .get("message")?
        .as_str()
}

pub(crate) fn render_change_details(details: &Value) -> String {
    let mut output = format!(
        "Summary for CL {}:\n",
        display_value(details.get("_number"))
    );
    output.push_str(&format!("Subject: {}\n", display_value(details.get("subject"))));
    output.push_str(&format!(
        "Owner: {}\n",
        display_value(details.pointer("/owner/email"))
    ));
    output.push_str(&format!("Status: {}\n", display_value(details.get("status"))));

    if let Some(message) = current_commit_message(details) {
        let bugs = extract_bugs(message);
        if !bugs.is_empty() {
            let bugs: Vec<&str> = bugs.iter().map(String::as_str).collect();
            output.push_str(&format!("Bugs: {}\n", bugs.join(", ")));
        }
    }

    if let Some(reviewers) = details.pointer("/reviewers/REVIEWER").and_then(Value::as_array) {
        output.push_str("Reviewers:\n");
        for reviewer in reviewers {
            output.push_str(&format!(
                "- {} ({})\n",
                str_or(reviewer, "email", "N/A"),
                reviewer_votes(details, reviewer).join(", ")
            ));
        }
    }

    let messages = details.get("messages").and_then(Value::as_array);
    if let Some(messages) = messages.filter(|m| !m.is_empty()) {
        output.push_str("Recent Messages:\n");
        for message in &messages[messages.len().saturating_sub(3)..] {
            let author = message
                .pointer("/author/name")
                .and_then(Value::as_str)
                .unwrap_or("Gerrit");
            let summary = message
                .get("message")
                .and_then(Value::as_str)
                .and_then(|text| text.lines().next())
                .unwrap_or("");
            output.push_str(&format!(
                "- (Patch Set {}) [{}] ({author}): {summary}\n",
                display_value(message.get("_revision_number")),
                str_or(message, "date", "No date"),
            ));
        }
    }

    output
}

pub async fn get_commit_message(ctx: &Context, args: ChangeArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, &args.change_id, "/message");
    let id = &args.change_id;

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => {
            return recover_with(err, |e| {
                ctx.note(&format!("Error getting commit message for CL {id}: {e}"));
                format!("An error occurred while getting the commit message for CL {id}: {e}")
            });
        }
    };
    let Ok(commit) = parse_json(&body) else {
        return Ok(format!(
            "Failed to get commit message for CL {id}. Invalid JSON response."
        ));
    };

    let mut output = format!("Commit message for CL {id}:\n");
    output.push_str(&format!("Subject: {}\n\n", str_or(&commit, "subject", "N/A")));
    output.push_str("Full Message:\n");
    output.push_str(MESSAGE_RULE);
    output.push('\n');
    output.push_str(str_or(&commit, "full_message", "Message not found."));
    output.push('\n');
    output.push_str(MESSAGE_RULE);
    output.push('\n');

    if let Some(footers) = commit.get("footers").and_then(Value::as_object)
        && !footers.is_empty()
    {
        output.push_str("\nFooters:\n");
        for (key, value) in footers {
            output.push_str(&format!("- {key}: {}\n", display_value(Some(value))));
        }
    }
    Ok(output)
}

/// One-letter status shown in file listings. Gerrit sends single letters;
/// spelled-out statuses are accepted too. Anything else counts as modified.
fn file_status(info: &Value) -> char {
    match info.get("status").and_then(Value::as_str) {
        Some("A" | "ADDED") => 'A',
        Some("D" | "DELETED") => 'D',
        Some("R" | "RENAMED") => 'R',
        _ => 'M',
    }
}

pub async fn list_change_files(ctx: &Context, args: ChangeArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let files_url = change_url(&base_url, &args.change_id, "/revisions/current/files/");

    let body = match ctx.fetch(&get_args(&files_url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    let files = match parse_object(&body) {
        Ok(files) => files,
        Err(err) => return recover(err),
    };

    // The file list does not carry the patch set number.
    let detail_url = change_url(&base_url, &args.change_id, "/detail");
    let detail_body = match ctx.fetch(&get_args(&detail_url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    let details = match parse_json(&detail_body) {
        Ok(details) => details,
        Err(err) => return recover(err),
    };
    let patch_set = match details.get("current_revision_number") {
        Some(number) if !number.is_null() => display_value(Some(number)),
        _ => "current".to_string(),
    };

    let mut output = format!("Files in CL {} (Patch Set {patch_set}):\n", args.change_id);
    for (path, info) in files.iter().filter(|(path, _)| *path != "/COMMIT_MSG") {
        let inserted = info.get("lines_inserted").and_then(Value::as_i64).unwrap_or(0);
        let deleted = info.get("lines_deleted").and_then(Value::as_i64).unwrap_or(0);
        output.push_str(&format!(
            "[{}] {path} (+{inserted}, -{deleted})\n",
            file_status(info)
        ));
    }
    Ok(output)
}

pub async fn get_file_diff(ctx: &Context, args: FileDiffArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = format!(
        "{}?path={}",
        change_url(&base_url, &args.change_id, "/revisions/current/patch"),
        encode(&args.file_path)
    );

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };

    // The patch endpoint answers with base64 text, not JSON.
    let compact: String = body.split_whitespace().collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::warn!(error = %err, "Patch response is not base64");
            Ok(format!(
                "Failed to decode diff for {} in CL {}. Raw response: '{body}'",
                args.file_path, args.change_id
            ))
        }
    }
}

pub async fn list_change_comments(ctx: &Context, args: ChangeArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, &args.change_id, "/comments");

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    let Ok(comments_by_file) = parse_object(&body) else {
        return Ok(format!(
            "Failed to parse JSON response from Gerrit. Raw response:\n{body}"
        ));
    };

    if comments_by_file.is_empty() {
        return Ok(format!("No comments found for CL {}.", args.change_id));
    }

    let mut output = format!("Comments for CL {}:\n", args.change_id);
    for (path, comments) in &comments_by_file {
        output.push_str(&format!("---\nFile: {path}\n"));
        for comment in comments.as_array().into_iter().flatten() {
            output.push_str(&render_comment(comment));
        }
    }
    Ok(output)
}

/// `L10 [id: abc] (in_reply_to: xyz): [author] (timestamp) - UNRESOLVED`
/// followed by the indented message. File-level comments have no line.
fn render_comment(comment: &Value) -> String {
    let line = match comment.get("line") {
        Some(line) if !line.is_null() => display_value(Some(line)),
        _ => "File".to_string(),
    };
    let reply = comment
        .get("in_reply_to")
        .and_then(Value::as_str)
        .map(|parent| format!(" (in_reply_to: {parent})"))
        .unwrap_or_default();
    let author = comment
        .pointer("/author/name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let status = if comment.get("unresolved").and_then(Value::as_bool) == Some(true) {
        "UNRESOLVED"
    } else {
        "RESOLVED"
    };

    format!(
        "L{line} [id: {}]{reply}: [{author}] ({}) - {status}\n  {}\n",
        display_value(comment.get("id")),
        str_or(comment, "updated", "No date"),
        display_value(comment.get("message")),
    )
}

pub async fn changes_submitted_together(
    ctx: &Context,
    args: ChangeOptionsArgs,
) -> Result<String> {
    const BY_ITSELF: &str = "This change would be submitted by itself.";

    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let id = &args.change_id;
    let mut url = change_url(&base_url, id, "/submitted_together");
    if let Some(options) = args.options.as_deref().filter(|o| !o.is_empty()) {
        url.push('?');
        url.push_str(&option_params(options));
    }

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => {
            return recover_with(err, |e| {
                format!("An error occurred while getting submitted together info for CL {id}: {e}")
            });
        }
    };
    if body.is_empty() {
        return Ok(BY_ITSELF.to_string());
    }
    let Ok(data) = parse_json(&body) else {
        return Ok(format!(
            "Failed to get submitted together info for CL {id}. Response: {body}"
        ));
    };

    // Either a bare list, or {"changes": [...], "non_visible_changes": N}
    // when NON_VISIBLE_CHANGES was requested.
    let (changes, hidden) = match &data {
        Value::Array(changes) => (changes.as_slice(), 0),
        Value::Object(map) => (
            map.get("changes")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            map.get("non_visible_changes")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        ),
        _ => (&[][..], 0),
    };

    if changes.is_empty() {
        return Ok(BY_ITSELF.to_string());
    }

    let mut output = format!(
        "The following {} changes would be submitted together:\n",
        changes.len()
    );
    for change in changes {
        output.push_str(&format!(
            "- {}: {}\n",
            display_value(change.get("_number")),
            display_value(change.get("subject"))
        ));
    }
    if hidden > 0 {
        output.push_str(&format!(
            "Plus {hidden} other changes that are not visible to you.\n"
        ));
    }
    Ok(output)
}

pub async fn suggest_reviewers(ctx: &Context, args: SuggestReviewersArgs) -> Result<String> {
    const NONE_FOUND: &str = "No reviewers found for the given query.";

    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let id = &args.change_id;
    let mut url = format!(
        "{}?q={}",
        change_url(&base_url, id, "/suggest_reviewers"),
        encode(&args.query)
    );
    if let Some(limit) = args.limit.filter(|n| *n > 0) {
        url.push_str(&format!("&n={limit}"));
    }
    if args.exclude_groups {
        url.push_str("&exclude-groups");
    }
    if let Some(state) = args.reviewer_state.as_deref().filter(|s| !s.is_empty()) {
        url.push_str(&format!("&reviewer-state={state}"));
    }

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => {
            return recover_with(err, |e| {
                format!("An error occurred while suggesting reviewers for CL {id}: {e}")
            });
        }
    };
    if body.is_empty() {
        return Ok(NONE_FOUND.to_string());
    }
    let Ok(suggestions) = parse_array(&body) else {
        return Ok(format!(
            "Failed to get reviewer suggestions for CL {id}. Response: {body}"
        ));
    };
    if suggestions.is_empty() {
        return Ok(NONE_FOUND.to_string());
    }

    let mut output = String::from("Suggested reviewers:\n");
    for suggestion in &suggestions {
        if let Some(account) = suggestion.get("account") {
            output.push_str(&format!(
                "- Account: {} ({})\n",
                str_or(account, "name", ""),
                str_or(account, "email", "No email")
            ));
        } else if let Some(group) = suggestion.get("group") {
            output.push_str(&format!(
                "- Group: {}\n",
                str_or(group, "name", "Unnamed Group")
            ));
        }
    }
    Ok(output)
}

pub async fn get_most_recent_cl(ctx: &Context, args: RecentClArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let query = format!("owner:{}", args.user);
    let url = format!("{base_url}/changes/?q={}&n=1", encode(&query));

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    let changes = match parse_array(&body) {
        Ok(changes) => changes,
        Err(err) => return recover(err),
    };

    let Some(change) = changes.first() else {
        return Ok(format!("No changes found for user: {}", args.user));
    };
    Ok(format!(
        "Most recent CL for {}:\n{}",
        args.user,
        change_line(change)
    ))
}

pub async fn get_bugs_from_cl(ctx: &Context, args: ChangeArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let url = change_url(&base_url, &args.change_id, "/revisions/current/commit");
    let no_message = || format!("No commit message found for CL {}.", args.change_id);

    let body = match ctx.fetch(&get_args(&url), &base_url).await {
        Ok(body) => body,
        Err(err) => return recover(err),
    };
    if body.is_empty() {
        return Ok(no_message());
    }
    let commit = match parse_json(&body) {
        Ok(commit) => commit,
        Err(err) => return recover(err),
    };

    let Some(message) = commit
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    else {
        return Ok(no_message());
    };

    let bugs = extract_bugs(message);
    if bugs.is_empty() {
        return Ok(format!(
            "No bug IDs found in the commit message for CL {}.",
            args.change_id
        ));
    }
    let bugs: Vec<&str> = bugs.iter().map(String::as_str).collect();
    Ok(format!("Found bug(s): {}.", bugs.join(", ")))
}
