//! Change list ordering

use std::cmp::Ordering;

use serde_json::Value;

/// Order changes by their `updated` timestamp, most recent first.
///
/// Gerrit timestamps (`2025-07-15 10:00:00.000000000`) compare correctly as
/// strings. Changes without a timestamp go last. The sort is stable, so ties
/// keep their original relative order; callers only show a prefix of the
/// result, which makes that order observable.
pub fn sort_changes_by_date(mut changes: Vec<Value>) -> Vec<Value> {
    changes.sort_by(|a, b| match (updated(a), updated(b)) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    changes
}

fn updated(change: &Value) -> Option<&str> {
    change.get("updated").and_then(Value::as_str)
}
