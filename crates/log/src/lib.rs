//! # elasticache-rbac-log
//!
//! Logging setup for processes that embed the ElastiCache RBAC core.
//!
//! The core itself only emits `tracing` events; a host binary picks an output
//! format once at startup and keeps the returned guard alive.
//!
//! ```no_run
//! use elasticache_rbac_log::prelude::*;
//!
//! fn main() -> Result<(), LogError> {
//!     let _guard = elasticache_rbac_log::auto_init()?;
//!
//!     info!(region = "us-east-1", "plugin starting");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

#[macro_use]
mod format;
mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format, WriterConfig};
pub use error::{LogError, LogResult};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{LogError, LogResult, auto_init, init, init_with};
    pub use tracing::{Span, debug, error, field, info, instrument, trace, warn};
}

pub use tracing::{debug, error, info, instrument, trace, warn};

/// Environment variable holding the filter directive
pub const LOG_ENV: &str = "ELASTICACHE_LOG";

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "ELASTICACHE_LOG_FORMAT";

/// Pick a configuration from the environment and build type.
///
/// An explicit `ELASTICACHE_LOG` or `RUST_LOG` wins; otherwise debug builds
/// get [`Config::development`] and release builds [`Config::production`].
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var(LOG_ENV).is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with the default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with a custom configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
