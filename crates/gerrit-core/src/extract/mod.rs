//! Derived data extracted from Gerrit responses
//!
//! Pure functions over parsed JSON or text; nothing in here performs I/O.
//!
//! - [`bugs`] - bug references found in commit messages
//! - [`sort`] - ordering change lists by last update
//! - [`ci`] - CircleCI workflow/job status rendering

pub mod bugs;
pub mod ci;
pub mod sort;

pub use bugs::extract_bugs;
pub use ci::{build_job_url, format_job_duration, render_ci_status, summarize_workflow_statuses};
pub use sort::sort_changes_by_date;

use serde_json::Value;

/// Render a scalar JSON value the way it would be shown to a user:
/// strings without quotes, null and missing as empty.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
