//! Host registry
//!
//! The registry is a JSON file listing the Gerrit instances the server may
//! talk to:
//!
//! ```json
//! {
//!   "default_gerrit_base_url": "https://review.example.com",
//!   "gerrit_hosts": [
//!     {
//!       "name": "Example",
//!       "internal_url": "https://review.corp.example.com",
//!       "external_url": "https://review.example.com",
//!       "authentication": { "type": "http_basic", "username": "me", "auth_token": "..." }
//!     }
//!   ]
//! }
//! ```
//!
//! The file is re-read on every call. Nothing is cached, so edits made while
//! the server is running take effect on the next request.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::url::{normalize, strip_scheme};
use crate::{Error, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "GERRIT_CONFIG_PATH";

/// File name of the configuration, both for the default location and the
/// shipped sample.
pub const CONFIG_FILE_NAME: &str = "gerrit_config.json";

/// One configured Gerrit instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Display label
    #[serde(default)]
    pub name: String,

    /// Address reachable from inside the corporate network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<String>,

    /// Publicly visible address; the canonical identity when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,

    /// Opaque descriptor interpreted by the auth command provider
    #[serde(default)]
    pub authentication: serde_json::Value,
}

impl HostEntry {
    /// Iterate over the addresses this entry is known by.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.internal_url
            .as_deref()
            .into_iter()
            .chain(self.external_url.as_deref())
    }

    /// The address used as this host's identity: external if present,
    /// otherwise internal.
    pub fn canonical_url(&self) -> Option<&str> {
        self.external_url
            .as_deref()
            .or(self.internal_url.as_deref())
    }
}

/// Process-wide configuration, loaded fresh for each call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GerritConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gerrit_base_url: Option<String>,

    #[serde(default)]
    pub gerrit_hosts: Vec<HostEntry>,
}

impl GerritConfig {
    /// Load and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content).map_err(|e| match e {
            Error::ConfigParse { source, .. } => Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            Error::ConfigConsistency { message } => Error::ConfigConsistency {
                message: format!("{message} Please check your configuration file at {}.", path.display()),
            },
            other => other,
        })?;

        tracing::debug!(
            path = %path.display(),
            hosts = config.gerrit_hosts.len(),
            "Loaded Gerrit configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|source| Error::ConfigParse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the registry invariants:
    /// every host has at least one address, and the default URL (if any)
    /// names one of the configured hosts.
    pub fn validate(&self) -> Result<()> {
        if let Some(host) = self.gerrit_hosts.iter().find(|h| h.addresses().next().is_none()) {
            return Err(Error::ConfigConsistency {
                message: format!(
                    "Gerrit host '{}' must define at least one of 'internal_url' or 'external_url'.",
                    host.name
                ),
            });
        }

        let Some(default_url) = self.default_gerrit_base_url.as_deref() else {
            return Ok(());
        };

        let normalized_default = normalize(default_url, &self.gerrit_hosts);
        let found = self
            .gerrit_hosts
            .iter()
            .flat_map(HostEntry::addresses)
            .any(|addr| normalize(addr, &self.gerrit_hosts) == normalized_default);

        if !found {
            return Err(Error::ConfigConsistency {
                message: format!(
                    "The default_gerrit_base_url '{default_url}' (normalized to '{normalized_default}') \
                     does not match any 'external_url' or 'internal_url' in the 'gerrit_hosts' array."
                ),
            });
        }
        Ok(())
    }

    /// Find the host entry that `url` refers to, by either of its addresses.
    pub fn host_for(&self, url: &str) -> Option<&HostEntry> {
        let key = strip_scheme(url);
        self.gerrit_hosts
            .iter()
            .find(|host| host.addresses().any(|addr| strip_scheme(addr) == key))
    }
}

/// Where the configuration file lives.
///
/// Resolution order: an explicit path (from the command line), then
/// `GERRIT_CONFIG_PATH`, then `gerrit_config.json` next to this crate's
/// manifest.
#[derive(Debug, Clone, Default)]
pub struct ConfigLocation {
    explicit: Option<PathBuf>,
}

impl ConfigLocation {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// The package-relative default location.
    ///
    /// This is the crate's source directory at build time, so it only exists
    /// when running from a checkout. Installed binaries should be given
    /// `--config` or `GERRIT_CONFIG_PATH`.
    pub fn default_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_FILE_NAME)
    }

    /// Resolve the path using the given value of `GERRIT_CONFIG_PATH`.
    pub fn resolve_with(&self, env_value: Option<&str>) -> PathBuf {
        if let Some(path) = &self.explicit {
            return path.clone();
        }
        match env_value {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => Self::default_path(),
        }
    }

    /// Resolve the path using the current process environment.
    pub fn resolve(&self) -> PathBuf {
        let env_value = std::env::var(CONFIG_PATH_ENV).ok();
        self.resolve_with(env_value.as_deref())
    }

    /// Resolve and load in one step.
    pub fn load(&self) -> Result<GerritConfig> {
        GerritConfig::load(&self.resolve())
    }
}
