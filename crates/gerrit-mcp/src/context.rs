//! Per-server handler context
//!
//! Everything a tool handler needs to reach Gerrit: where the host registry
//! lives, the transport that performs requests, and the diagnostic log that
//! mutating operations report failures to.

use std::sync::Arc;

use gerrit_core::url::BASE_URL_ENV;
use gerrit_core::{ConfigLocation, DiagnosticLog, GerritConfig, Transport, resolve_base_url};

use crate::Result;

/// Where the `GERRIT_BASE_URL` override comes from.
#[derive(Debug, Clone)]
enum BaseUrlOverride {
    /// Read the process environment on every call
    Process,
    /// A fixed value, used by embedders and tests
    Fixed(Option<String>),
}

/// Shared state handed to every operation
#[derive(Clone)]
pub struct Context {
    location: ConfigLocation,
    transport: Arc<dyn Transport>,
    log: Arc<DiagnosticLog>,
    base_url_override: BaseUrlOverride,
}

impl Context {
    pub fn new(
        location: ConfigLocation,
        transport: Arc<dyn Transport>,
        log: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            location,
            transport,
            log,
            base_url_override: BaseUrlOverride::Process,
        }
    }

    /// Pin the `GERRIT_BASE_URL` override instead of reading the environment.
    pub fn with_base_url_override(mut self, value: Option<String>) -> Self {
        self.base_url_override = BaseUrlOverride::Fixed(value);
        self
    }

    pub fn location(&self) -> &ConfigLocation {
        &self.location
    }

    /// Load the host registry. Never cached: edits apply to the next call.
    pub fn config(&self) -> Result<GerritConfig> {
        Ok(self.location.load()?)
    }

    /// Resolve the base URL for a call, normalized against the registry.
    pub fn base_url(&self, explicit: Option<&str>) -> Result<String> {
        let config = self.config()?;
        let env_value = match &self.base_url_override {
            BaseUrlOverride::Process => std::env::var(BASE_URL_ENV).ok(),
            BaseUrlOverride::Fixed(value) => value.clone(),
        };
        Ok(resolve_base_url(explicit, env_value.as_deref(), &config))
    }

    /// Run one request and return the unwrapped body.
    pub async fn fetch(&self, args: &[String], base_url: &str) -> gerrit_core::Result<String> {
        tracing::debug!(url = ?args.last(), "Fetching from Gerrit");
        self.transport.execute(args, base_url).await
    }

    /// Record a handler-level failure in the diagnostic log.
    pub fn note(&self, message: &str) {
        tracing::error!("{message}");
        self.log.record(message);
    }
}
