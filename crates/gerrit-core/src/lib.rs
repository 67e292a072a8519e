//! Gerrit gateway layer
//!
//! Everything that sits between a tool handler and the Gerrit REST API:
//!
//! ```text
//! [ handler ]
//!     | resolve_base_url / normalize      (url)
//!     v
//! [ GerritConfig ]  <- gerrit_config.json (config)
//!     |
//!     v
//! [ Transport ] --AuthCommandProvider--> curl ... (executor)
//!     |                \
//!     |                 +--> DiagnosticLog (log)
//!     v
//! [ JSON ] --> bugs / sort / ci (extract)
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod log;
pub mod url;

pub use config::{ConfigLocation, GerritConfig, HostEntry};
pub use error::{Error, Result};
pub use executor::{AuthCommandProvider, CommandExecutor, CurlAuthProvider, Transport};
pub use log::DiagnosticLog;
pub use url::{normalize, resolve_base_url};
