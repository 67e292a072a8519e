//! Gerrit URL normalization
//!
//! A host may be reachable under an internal and an external address. Both
//! addresses identify the same server, so every URL that enters the gateway
//! is funnelled through [`normalize`] before it is compared, logged or used
//! to pick credentials.
//!
//! The canonical form is `https://<host>[/<path>]` with no trailing slash.
//! When an address matches a configured host entry, the entry's external URL
//! wins over the internal one, whichever of the two the caller supplied.

use crate::config::{GerritConfig, HostEntry};

/// Address used when neither the caller, the environment, nor the
/// configuration names a server.
pub const FALLBACK_BASE_URL: &str = "https://fuchsia-review.googlesource.com";

/// Environment variable overriding the configured default server.
pub const BASE_URL_ENV: &str = "GERRIT_BASE_URL";

/// Remove the scheme and any trailing slashes.
///
/// This is the comparison key for "same host": two URLs name the same server
/// iff their stripped forms are equal.
pub fn strip_scheme(url: &str) -> &str {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without_scheme.trim_end_matches('/')
}

/// Canonicalize `url` against the configured hosts.
///
/// The first entry (in configuration order) whose internal or external
/// address strips to the same key is the match; its external URL is returned
/// if present, otherwise its internal URL. Without a match the input itself
/// is used. The result is always upgraded to `https://` and carries no
/// trailing slash.
pub fn normalize(url: &str, hosts: &[HostEntry]) -> String {
    let key = strip_scheme(url);

    let matched = hosts
        .iter()
        .find(|host| host.addresses().any(|addr| strip_scheme(addr) == key))
        .and_then(HostEntry::canonical_url)
        .unwrap_or(url);

    force_https(matched).trim_end_matches('/').to_string()
}

fn force_https(url: &str) -> String {
    if url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        format!("https://{url}")
    }
}

/// Pick the base URL for a call and canonicalize it.
///
/// Precedence: `explicit` argument, then `env_override` (the value of
/// `GERRIT_BASE_URL`), then the configured default, then
/// [`FALLBACK_BASE_URL`]. Empty strings are treated as absent.
pub fn resolve_base_url(
    explicit: Option<&str>,
    env_override: Option<&str>,
    config: &GerritConfig,
) -> String {
    let chosen = [
        explicit,
        env_override,
        config.default_gerrit_base_url.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| !candidate.trim().is_empty())
    .unwrap_or(FALLBACK_BASE_URL);

    tracing::debug!(chosen, "Resolved Gerrit base URL");
    normalize(chosen, &config.gerrit_hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn host(internal: Option<&str>, external: Option<&str>) -> HostEntry {
        HostEntry {
            name: "test".to_string(),
            internal_url: internal.map(str::to_string),
            external_url: external.map(str::to_string),
            authentication: serde_json::Value::Null,
        }
    }

    #[rstest]
    #[case("https://review.example.com/", "review.example.com")]
    #[case("http://review.example.com", "review.example.com")]
    #[case("review.example.com//", "review.example.com")]
    #[case("https://review.example.com/gerrit/", "review.example.com/gerrit")]
    fn test_strip_scheme(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_scheme(input), expected);
    }

    #[rstest]
    #[case("internal.example.com")]
    #[case("https://internal.example.com/")]
    #[case("http://internal.example.com")]
    #[case("review.example.com")]
    #[case("http://review.example.com/")]
    fn test_either_alias_resolves_to_external(#[case] input: &str) {
        let hosts = vec![host(
            Some("https://internal.example.com"),
            Some("https://review.example.com"),
        )];
        assert_eq!(normalize(input, &hosts), "https://review.example.com");
    }

    #[test]
    fn test_internal_used_when_no_external() {
        let hosts = vec![host(Some("http://only-internal.corp/"), None)];
        assert_eq!(
            normalize("only-internal.corp", &hosts),
            "https://only-internal.corp"
        );
    }

    #[test]
    fn test_unknown_host_is_upgraded_and_trimmed() {
        assert_eq!(
            normalize("http://unknown.example.org/", &[]),
            "https://unknown.example.org"
        );
        assert_eq!(
            normalize("unknown.example.org", &[]),
            "https://unknown.example.org"
        );
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let hosts = vec![
            host(Some("https://shared.example.com"), Some("https://first.example.com")),
            host(Some("https://shared.example.com"), Some("https://second.example.com")),
        ];
        assert_eq!(
            normalize("shared.example.com", &hosts),
            "https://first.example.com"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let hosts = vec![host(
            Some("https://internal.example.com"),
            Some("https://review.example.com"),
        )];
        let once = normalize("internal.example.com/", &hosts);
        assert_eq!(normalize(&once, &hosts), once);
    }

    #[test]
    fn test_resolve_precedence() {
        let config = GerritConfig {
            default_gerrit_base_url: Some("default.example.com".to_string()),
            gerrit_hosts: vec![],
        };

        assert_eq!(
            resolve_base_url(Some("explicit.example.com"), Some("env.example.com"), &config),
            "https://explicit.example.com"
        );
        assert_eq!(
            resolve_base_url(None, Some("env.example.com"), &config),
            "https://env.example.com"
        );
        assert_eq!(
            resolve_base_url(None, None, &config),
            "https://default.example.com"
        );
        assert_eq!(
            resolve_base_url(Some(""), None, &GerritConfig::default()),
            FALLBACK_BASE_URL
        );
    }

    #[test]
    fn test_resolve_default_internal_alias_to_external() {
        let config = GerritConfig {
            default_gerrit_base_url: Some("internal.example.com".to_string()),
            gerrit_hosts: vec![host(
                Some("https://internal.example.com"),
                Some("https://review.example.com"),
            )],
        };
        assert_eq!(
            resolve_base_url(None, None, &config),
            "https://review.example.com"
        );
    }
}
