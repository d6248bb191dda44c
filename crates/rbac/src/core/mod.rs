//! Core types shared by every layer: errors, identifiers and secrets

pub mod error;
pub mod id;
pub mod secret;

pub use error::{
    ConfigError, ElastiCacheError, ErrorCode, GrammarError, Operation, RemoteError,
    ResourceKind, Result,
};
pub use id::{DEFAULT_USER_ID, MAX_ID_LEN, ResourceId, normalize};
pub use secret::SecretString;
