//! CircleCI status rendering
//!
//! The Gerrit CircleCI plugin returns a list of workflows, each with its
//! jobs. This module turns that list into the text report shown to agents:
//!
//! ```text
//! CircleCI Status for CL 11286:
//!
//! [FAILED] build-windows-app (pipeline #36754)
//!   [success] cargo fmt check (28s)
//!   [failed] build-windows-amd64 (11m41s)
//!     URL: https://app.circleci.com/pipelines/gh/org/repo/36754/workflows/<id>/jobs/737632
//!
//! Summary: 1 failed, 1 success (2 workflows)
//! ```

use std::collections::BTreeMap;

use chrono::DateTime;
use serde_json::Value;

use super::display_value;

/// Job statuses that get a deep link to the CircleCI UI.
pub const FAILED_JOB_STATUSES: &[&str] = &["failed", "infrastructure_fail", "timedout"];

const UNKNOWN: &str = "unknown";

/// Duration of a job from `started_at` to `stopped_at`, in whole seconds.
///
/// Rendered as `28s` below one minute and `11m41s` above. Returns `None`
/// when either timestamp is missing or unparseable.
pub fn format_job_duration(job: &Value) -> Option<String> {
    let started = job.get("started_at").and_then(Value::as_str)?;
    let stopped = job.get("stopped_at").and_then(Value::as_str)?;

    let start = DateTime::parse_from_rfc3339(started).ok()?;
    let stop = DateTime::parse_from_rfc3339(stopped).ok()?;
    let seconds = (stop - start).num_seconds();

    if seconds < 60 {
        Some(format!("{seconds}s"))
    } else {
        Some(format!("{}m{:02}s", seconds / 60, seconds % 60))
    }
}

/// Link to a job page, built from the workflow's project slug, pipeline
/// number and id plus the job number.
pub fn build_job_url(workflow: &Value, job: &Value) -> String {
    format!(
        "https://app.circleci.com/pipelines/{}/{}/workflows/{}/jobs/{}",
        display_value(workflow.get("project_slug")),
        display_value(workflow.get("pipeline_number")),
        display_value(workflow.get("id")),
        display_value(job.get("job_number")),
    )
}

/// Count workflows per status.
pub fn count_workflow_statuses(workflows: &[Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for workflow in workflows {
        *counts.entry(status_of(workflow).to_string()).or_insert(0) += 1;
    }
    counts
}

/// The trailing summary line: counts per status in lexicographic status
/// order, followed by the total.
pub fn summarize_workflow_statuses(workflows: &[Value]) -> String {
    let parts: Vec<String> = count_workflow_statuses(workflows)
        .into_iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect();
    format!("Summary: {} ({} workflows)", parts.join(", "), workflows.len())
}

/// Full report for the workflows of a change.
pub fn render_ci_status(cl_number: &str, workflows: &[Value]) -> String {
    if workflows.is_empty() {
        return format!("No CircleCI workflows found for CL {cl_number}.");
    }

    let mut output = format!("CircleCI Status for CL {cl_number}:\n\n");
    for workflow in workflows {
        output.push_str(&format!(
            "[{}] {} (pipeline #{})\n",
            status_of(workflow).to_uppercase(),
            str_or_unknown(workflow, "name"),
            display_value(workflow.get("pipeline_number")),
        ));

        let jobs = workflow.get("jobs").and_then(Value::as_array);
        for job in jobs.into_iter().flatten() {
            let status = status_of(job);
            let duration = format_job_duration(job)
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            output.push_str(&format!(
                "  [{status}] {}{duration}\n",
                str_or_unknown(job, "name")
            ));
            if FAILED_JOB_STATUSES.contains(&status) {
                output.push_str(&format!("    URL: {}\n", build_job_url(workflow, job)));
            }
        }
        output.push('\n');
    }

    output.push_str(&summarize_workflow_statuses(workflows));
    output
}

fn status_of(record: &Value) -> &str {
    str_or_unknown(record, "status")
}

fn str_or_unknown<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or(UNKNOWN)
}
