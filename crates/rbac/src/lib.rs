//! # elasticache-rbac
//!
//! Issue, rotate and revoke short-lived Redis users on AWS ElastiCache
//! through role-based access control.
//!
//! # Features
//!
//! - **Lifecycle plugin** - [`RedisElastiCache`] implements the host
//!   [`Database`] contract: initialize, create, update, delete, close
//! - **Eventual consistency** - every mutation is followed by bounded,
//!   cancellable polling until the resource is `active`
//! - **Single user group** - users are merged into the one user group attached
//!   to the replication group, creating and attaching it when needed
//! - **Rollback** - a user that cannot be associated is deleted again
//! - **Secrets** - passwords and keys are zeroized and never logged
//!
//! ```no_run
//! use elasticache_rbac::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<()> {
//! let plugin = RedisElastiCache::new();
//! let cancel = CancellationToken::new();
//!
//! let config = json!({
//!     "access_key_id": "AKIA...",
//!     "secret_access_key": "...",
//!     "url": "master.my-cluster.abc123.use1.cache.amazonaws.com:6379",
//!     "region": "us-east-1",
//! });
//! let serde_json::Value::Object(config) = config else { unreachable!() };
//! plugin
//!     .initialize(InitializeRequest { config, verify_connection: true }, &cancel)
//!     .await?;
//!
//! let created = plugin
//!     .new_user(
//!         NewUserRequest {
//!             username_config: UsernameMetadata {
//!                 display_name: "token".into(),
//!                 role_name: "reader".into(),
//!             },
//!             statements: Statements { commands: vec![r#"["~cache:*", "+@read"]"#.into()] },
//!             password: SecretString::new("a-long-random-password"),
//!             expiration: None,
//!         },
//!         &cancel,
//!     )
//!     .await?;
//! plugin.delete_user(DeleteUserRequest::new(created.username), &cancel).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Access-string grammar
pub mod access;
/// Remote control-plane seam and its AWS implementation
pub mod client;
/// Plugin configuration
pub mod config;
/// Core types, errors, and primitives
pub mod core;
/// Host lifecycle contract
pub mod database;
/// User and user group orchestration
pub mod orchestrator;
/// The database plugin
pub mod plugin;
/// Bounded polling
pub mod poll;
/// In-memory directory for tests (feature `test-util`)
#[cfg(feature = "test-util")]
pub mod testing;
/// Username generation
pub mod username;

pub use crate::plugin::{RedisElastiCache, TYPE_NAME};
pub use crate::core::{ElastiCacheError, Result};
pub use crate::database::Database;

/// Commonly used types and traits
pub mod prelude {
    pub use crate::access::{AccessString, parse_access_string};
    pub use crate::client::{Connector, ElastiCacheApi};
    pub use crate::config::{ElastiCacheConfig, ProviderConfig};
    pub use crate::core::{
        ConfigError, ElastiCacheError, ErrorCode, GrammarError, Operation, RemoteError,
        ResourceId, Result, SecretString, normalize,
    };
    pub use crate::database::{
        Database, DeleteUserRequest, InitializeRequest, NewUserRequest, Statements,
        UpdateUserRequest, UsernameMetadata,
    };
    pub use crate::plugin::RedisElastiCache;
    pub use crate::poll::{PollPolicy, StatePoller};
    pub use tokio_util::sync::CancellationToken;
}
