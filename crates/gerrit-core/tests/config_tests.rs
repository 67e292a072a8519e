//! Tests for loading the host registry from disk and resolving base URLs

use std::fs;
use std::path::PathBuf;

use gerrit_core::config::{ConfigLocation, GerritConfig};
use gerrit_core::url::{FALLBACK_BASE_URL, resolve_base_url};
use gerrit_core::Error;
use tempfile::TempDir;

fn write_config(temp: &TempDir, content: &str) -> PathBuf {
    let path = temp.path().join("gerrit_config.json");
    fs::write(&path, content).unwrap();
    path
}

const TWO_ALIAS_CONFIG: &str = r#"{
    "default_gerrit_base_url": "internal.example.com",
    "gerrit_hosts": [
        {
            "name": "Example",
            "internal_url": "https://internal.example.com",
            "external_url": "https://review.example.com",
            "authentication": {"type": "http_basic", "username": "u", "auth_token": "t"}
        }
    ]
}"#;

#[test]
fn test_missing_file_names_path_and_sample() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nope.json");

    let err = GerritConfig::load(&path).unwrap_err();

    assert!(matches!(err, Error::ConfigNotFound { .. }));
    let msg = err.to_string();
    assert!(msg.contains(&path.display().to_string()));
    assert!(msg.contains("gerrit_config.sample.json"));
    assert!(msg.contains("GERRIT_CONFIG_PATH"));
}

#[test]
fn test_malformed_file_is_parse_error_with_path() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, r#"{"gerrit_hosts": [}"#);

    let err = GerritConfig::load(&path).unwrap_err();

    match &err {
        Error::ConfigParse { path: reported, .. } => assert_eq!(reported, &path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_inconsistent_default_fails_at_load() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        r#"{
            "default_gerrit_base_url": "https://nowhere.example.com",
            "gerrit_hosts": [
                {"name": "a", "internal_url": "https://a.corp", "external_url": "https://a.example.com"}
            ]
        }"#,
    );

    let err = GerritConfig::load(&path).unwrap_err();

    assert!(matches!(err, Error::ConfigConsistency { .. }));
    let msg = err.to_string();
    assert!(msg.contains("https://nowhere.example.com"));
    assert!(msg.contains(&path.display().to_string()));
}

#[test]
fn test_default_via_internal_alias_resolves_to_external() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, TWO_ALIAS_CONFIG);

    let config = ConfigLocation::new(Some(path)).load().unwrap();

    assert_eq!(
        resolve_base_url(None, None, &config),
        "https://review.example.com"
    );
}

#[test]
fn test_env_override_is_normalized_against_hosts() {
    let config = GerritConfig::parse(TWO_ALIAS_CONFIG).unwrap();

    assert_eq!(
        resolve_base_url(None, Some("http://internal.example.com/"), &config),
        "https://review.example.com"
    );
    assert_eq!(
        resolve_base_url(Some("https://other.example.com/"), Some("internal.example.com"), &config),
        "https://other.example.com"
    );
}

#[test]
fn test_fallback_without_default() {
    let config = GerritConfig::parse(r#"{"gerrit_hosts": []}"#).unwrap();
    assert_eq!(resolve_base_url(None, None, &config), FALLBACK_BASE_URL);
}

#[test]
fn test_config_is_reread_after_edit() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, r#"{"gerrit_hosts": []}"#);
    let location = ConfigLocation::new(Some(path.clone()));

    assert!(location.load().unwrap().gerrit_hosts.is_empty());

    fs::write(&path, TWO_ALIAS_CONFIG).unwrap();
    assert_eq!(location.load().unwrap().gerrit_hosts.len(), 1);
}

#[test]
fn test_sample_config_is_valid() {
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("gerrit_config.sample.json");
    let config = GerritConfig::load(&sample).unwrap();
    assert!(!config.gerrit_hosts.is_empty());
}
