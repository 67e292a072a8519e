//! Error types for gerrit-core

use std::path::PathBuf;

/// Result type for gerrit-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a Gerrit server
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error(
        "Configuration file not found at {path}. Please create this file to proceed. \
         You can copy 'gerrit_config.sample.json' to 'gerrit_config.json' as a starting point. \
         To use a file elsewhere, pass --config <path> or set GERRIT_CONFIG_PATH."
    )]
    ConfigNotFound { path: PathBuf },

    /// Configuration file exists but is not valid JSON
    #[error("Could not parse {path}: {source}. Please check the file for syntax errors.")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration parsed but is internally inconsistent
    #[error("{message}")]
    ConfigConsistency { message: String },

    /// The request command ran but exited unsuccessfully (or was killed)
    #[error("curl command failed with exit code {}.\nSTDERR:\n{stderr}", display_code(.exit_code))]
    Transport {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The request command could not be started at all
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The auth provider returned an empty command
    #[error("No request command configured for {base_url}")]
    EmptyCommand { base_url: String },

    /// Response body was not the structured data we expected
    #[error("Failed to parse JSON response from Gerrit. Raw response: '{body}'")]
    ResponseParse { body: String },

    /// The request went through but the answer does not confirm the change
    #[error("Response: {body}")]
    SemanticFailure { body: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl Error {
    /// True for the configuration family of errors, which abort a call
    /// instead of being rendered as a tool response.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigParse { .. } | Self::ConfigConsistency { .. }
        )
    }

    /// Build a `ResponseParse` error from a raw body.
    pub fn response_parse(body: impl Into<String>) -> Self {
        Self::ResponseParse { body: body.into() }
    }

    /// Build a `SemanticFailure` error from a raw body.
    pub fn semantic_failure(body: impl Into<String>) -> Self {
        Self::SemanticFailure { body: body.into() }
    }
}
