//! Host lifecycle contract
//!
//! A secrets-management host drives the plugin through [`Database`]:
//! `initialize` once (or again to rebind configuration), then any number of
//! `new_user` / `update_user` / `delete_user` calls, and finally `close`.
//! Every call takes a [`CancellationToken`]; waits on the directory stop as
//! soon as it fires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::core::{Result, SecretString};

/// `initialize` input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Loosely typed configuration map
    pub config: Map<String, Value>,
    /// Issue one read-only call to prove the credentials work
    #[serde(default)]
    pub verify_connection: bool,
}

/// `initialize` output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// Configuration the host should persist
    pub config: Map<String, Value>,
}

/// Names the host wants reflected in the generated username
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameMetadata {
    /// Display name of the requesting token or entity
    #[serde(default)]
    pub display_name: String,
    /// Role the credentials are issued for
    #[serde(default)]
    pub role_name: String,
}

/// Role statements, each a JSON array of access-string rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    /// Raw statements
    #[serde(default)]
    pub commands: Vec<String>,
}

/// `new_user` input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserRequest {
    /// Username hints
    pub username_config: UsernameMetadata,
    /// Creation statements
    #[serde(default)]
    pub statements: Statements,
    /// Initial password
    pub password: SecretString,
    /// Requested expiry; ElastiCache users do not expire, so this is ignored
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

/// `new_user` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserResponse {
    /// Username the host hands out
    pub username: String,
}

/// Password rotation part of an `update_user` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    /// Replacement password
    pub new_password: SecretString,
    /// Rotation statements (unused by ElastiCache)
    #[serde(default)]
    pub statements: Statements,
}

/// Expiry part of an `update_user` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeExpiration {
    /// New expiry
    pub new_expiration: DateTime<Utc>,
    /// Renewal statements (unused by ElastiCache)
    #[serde(default)]
    pub statements: Statements,
}

/// `update_user` input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    /// Username returned by `new_user`
    pub username: String,
    /// Password rotation, if requested
    #[serde(default)]
    pub password: Option<ChangePassword>,
    /// Expiry change, if requested
    #[serde(default)]
    pub expiration: Option<ChangeExpiration>,
}

/// `update_user` output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserResponse {}

/// `delete_user` input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    /// Username returned by `new_user`
    pub username: String,
    /// Revocation statements (unused by ElastiCache)
    #[serde(default)]
    pub statements: Statements,
}

impl DeleteUserRequest {
    /// Delete request without statements
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            statements: Statements::default(),
        }
    }
}

/// `delete_user` output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserResponse {}

/// Lifecycle interface a secrets-management host calls
#[async_trait]
pub trait Database: Send + Sync {
    /// Bind configuration and build the remote session
    async fn initialize(
        &self,
        request: InitializeRequest,
        cancel: &CancellationToken,
    ) -> Result<InitializeResponse>;

    /// Create a user and return its username
    async fn new_user(
        &self,
        request: NewUserRequest,
        cancel: &CancellationToken,
    ) -> Result<NewUserResponse>;

    /// Rotate a user's password
    async fn update_user(
        &self,
        request: UpdateUserRequest,
        cancel: &CancellationToken,
    ) -> Result<UpdateUserResponse>;

    /// Delete a user; absent users count as deleted
    async fn delete_user(
        &self,
        request: DeleteUserRequest,
        cancel: &CancellationToken,
    ) -> Result<DeleteUserResponse>;

    /// Identity string for the host's plugin registry
    fn type_name(&self) -> &'static str;

    /// Release the remote session
    async fn close(&self) -> Result<()>;
}
