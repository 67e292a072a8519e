//! Bug reference extraction from commit messages
//!
//! Two shapes are recognized:
//!
//! - footer lines such as `Bug: 12345`, `Fixed: b/12345, 67890` or
//!   `Closes: #42` (key is case-insensitive)
//! - inline links such as `b/12345`, `fxbug.dev/12345`, `crbug.com/12345`
//!   or `issuetracker.google.com/issues/12345`
//!
//! Only the numeric identifier is kept.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static FOOTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(?:bug|bugs|fixed|fixes|closes)\s*[:=]\s*(.+?)\s*$").unwrap()
});

static FOOTER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z][\w.-]*[:/])?#?(\d+)$").unwrap());

static INLINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bb/(\d+)\b",
        r"\bfxbug\.dev/(\d+)\b",
        r"\bcrbug\.com/(?:[\w-]+/)?(\d+)\b",
        r"\bbugs\.chromium\.org/\S*?[?&]id=(\d+)\b",
        r"\bissues\.chromium\.org/issues/(\d+)\b",
        r"\bissuetracker\.google\.com/(?:issues/)?(\d+)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Collect the distinct bug identifiers referenced in `message`.
///
/// A message without references yields an empty set. Iterating the set gives
/// identifiers in ascending (lexicographic) order.
pub fn extract_bugs(message: &str) -> BTreeSet<String> {
    let mut bugs = BTreeSet::new();

    for caps in FOOTER_PATTERN.captures_iter(message) {
        let value = &caps[1];
        for token in value.split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim().trim_end_matches(['.', ';', ':', ')']);
            if let Some(id) = FOOTER_TOKEN.captures(token) {
                bugs.insert(id[1].to_string());
            }
        }
    }

    for pattern in INLINE_PATTERNS.iter() {
        for caps in pattern.captures_iter(message) {
            bugs.insert(caps[1].to_string());
        }
    }

    bugs
}
