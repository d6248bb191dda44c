//! Errors raised while installing the global subscriber

use thiserror::Error;

/// Result alias for logger setup
pub type LogResult<T> = Result<T, LogError>;

/// Logger setup errors
#[derive(Debug, Error)]
pub enum LogError {
    /// The filter directive could not be parsed
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// Directive as supplied
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}
