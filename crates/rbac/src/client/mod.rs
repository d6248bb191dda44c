//! Remote control-plane seam
//!
//! [`ElastiCacheApi`] is the narrow set of ElastiCache calls the orchestrators
//! need. Every call returns either a typed payload or a [`RemoteError`] whose
//! code was decoded once at the client boundary.
//!
//! Implementations:
//! - `AwsElastiCacheClient` (feature `aws`): the AWS SDK
//! - `testing::InMemoryElastiCache` (feature `test-util`): an eventually
//!   consistent fake for tests

#[cfg(feature = "aws")]
mod aws;

#[cfg(feature = "aws")]
pub use aws::{AwsConnector, AwsElastiCacheClient};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::access::AccessString;
use crate::config::ElastiCacheConfig;
use crate::core::{ConfigError, RemoteError, ResourceId, SecretString};

/// Engine every user and user group is created for
pub const ENGINE: &str = "redis";

/// Result of a single control-plane call
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Lifecycle status reported for users, user groups and replication groups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    /// `creating`
    Creating,
    /// `active`
    Active,
    /// `modifying`
    Modifying,
    /// `deleting`
    Deleting,
    /// Any other status string
    Other(String),
}

impl ResourceStatus {
    /// Decode a status string as the service reports it
    pub fn parse(status: &str) -> Self {
        match status {
            "creating" => Self::Creating,
            "active" | "available" => Self::Active,
            "modifying" => Self::Modifying,
            "deleting" => Self::Deleting,
            other => Self::Other(other.to_string()),
        }
    }

    /// Status string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Modifying => "modifying",
            Self::Deleting => "deleting",
            Self::Other(status) => status,
        }
    }

    /// Usable and mutable
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// On its way out
    pub fn is_deleting(&self) -> bool {
        matches!(self, Self::Deleting)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user as reported by `DescribeUsers`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDescription {
    /// Directory identifier
    pub user_id: String,
    /// Host-visible username
    pub user_name: String,
    /// Lifecycle status
    pub status: ResourceStatus,
    /// Access string in effect
    pub access_string: String,
    /// User groups the user belongs to
    pub user_group_ids: Vec<String>,
}

/// A user group as reported by `DescribeUserGroups`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroupDescription {
    /// Directory identifier
    pub user_group_id: String,
    /// Lifecycle status
    pub status: ResourceStatus,
    /// Member user identifiers
    pub user_ids: Vec<String>,
    /// Replication groups the group is attached to
    pub replication_groups: Vec<String>,
}

impl UserGroupDescription {
    /// Whether `user_id` is a member
    pub fn has_member(&self, user_id: &ResourceId) -> bool {
        self.user_ids.iter().any(|member| member == user_id.as_str())
    }
}

/// A replication group as reported by `DescribeReplicationGroups`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationGroupDescription {
    /// Directory identifier
    pub replication_group_id: String,
    /// Lifecycle status
    pub status: ResourceStatus,
    /// User groups attached to the replication group
    pub user_group_ids: Vec<String>,
}

/// `CreateUser` input. Engine is [`ENGINE`], a password is always required
/// and the tag set is empty.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    /// Directory identifier
    pub user_id: ResourceId,
    /// Host-visible username
    pub user_name: String,
    /// Validated access string
    pub access_string: AccessString,
    /// Initial passwords
    pub passwords: Vec<SecretString>,
}

/// `ModifyUser` input: replace the user's passwords
#[derive(Debug, Clone)]
pub struct ModifyUserRequest {
    /// Directory identifier
    pub user_id: ResourceId,
    /// Replacement passwords
    pub passwords: Vec<SecretString>,
}

/// `CreateUserGroup` input
#[derive(Debug, Clone)]
pub struct CreateUserGroupRequest {
    /// Directory identifier
    pub user_group_id: ResourceId,
    /// Initial members, always including `default`
    pub user_ids: Vec<ResourceId>,
}

/// `ModifyUserGroup` input: add members
#[derive(Debug, Clone)]
pub struct ModifyUserGroupRequest {
    /// Directory identifier
    pub user_group_id: ResourceId,
    /// Members to add
    pub user_ids_to_add: Vec<ResourceId>,
}

/// `ModifyReplicationGroup` input: attach user groups, applied immediately
#[derive(Debug, Clone)]
pub struct ModifyReplicationGroupRequest {
    /// Directory identifier
    pub replication_group_id: ResourceId,
    /// User groups to attach
    pub user_group_ids_to_add: Vec<ResourceId>,
}

/// ElastiCache control-plane operations used by the orchestrators
#[async_trait]
pub trait ElastiCacheApi: Send + Sync {
    /// `DescribeUsers`, for one user or all of them
    async fn describe_users(&self, user_id: Option<&ResourceId>)
    -> RemoteResult<Vec<UserDescription>>;

    /// `CreateUser`
    async fn create_user(&self, request: CreateUserRequest) -> RemoteResult<UserDescription>;

    /// `ModifyUser`
    async fn modify_user(&self, request: ModifyUserRequest) -> RemoteResult<UserDescription>;

    /// `DeleteUser`
    async fn delete_user(&self, user_id: &ResourceId) -> RemoteResult<UserDescription>;

    /// `DescribeUserGroups`, for one group or all of them
    async fn describe_user_groups(
        &self,
        user_group_id: Option<&ResourceId>,
    ) -> RemoteResult<Vec<UserGroupDescription>>;

    /// `CreateUserGroup`
    async fn create_user_group(
        &self,
        request: CreateUserGroupRequest,
    ) -> RemoteResult<UserGroupDescription>;

    /// `ModifyUserGroup`
    async fn modify_user_group(
        &self,
        request: ModifyUserGroupRequest,
    ) -> RemoteResult<UserGroupDescription>;

    /// `DescribeReplicationGroups` for a single replication group
    async fn describe_replication_group(
        &self,
        replication_group_id: &ResourceId,
    ) -> RemoteResult<ReplicationGroupDescription>;

    /// `ModifyReplicationGroup`
    async fn modify_replication_group(
        &self,
        request: ModifyReplicationGroupRequest,
    ) -> RemoteResult<ReplicationGroupDescription>;
}

/// Builds a control-plane client from validated configuration
#[async_trait]
pub trait Connector: Send + Sync {
    /// Construct a client bound to the configured region and credentials
    async fn connect(
        &self,
        config: &ElastiCacheConfig,
    ) -> Result<Arc<dyn ElastiCacheApi>, ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("creating", ResourceStatus::Creating)]
    #[case("active", ResourceStatus::Active)]
    #[case("available", ResourceStatus::Active)]
    #[case("modifying", ResourceStatus::Modifying)]
    #[case("deleting", ResourceStatus::Deleting)]
    #[case("create-failed", ResourceStatus::Other("create-failed".into()))]
    fn test_status_parse(#[case] raw: &str, #[case] expected: ResourceStatus) {
        assert_eq!(ResourceStatus::parse(raw), expected);
    }

    #[test]
    fn test_status_predicates() {
        assert!(ResourceStatus::Active.is_active());
        assert!(!ResourceStatus::Modifying.is_active());
        assert!(ResourceStatus::Deleting.is_deleting());
        assert_eq!(ResourceStatus::Other("snapshotting".into()).to_string(), "snapshotting");
    }

    #[test]
    fn test_group_membership() {
        let group = UserGroupDescription {
            user_group_id: "cluster".into(),
            status: ResourceStatus::Active,
            user_ids: vec!["default".into(), "vdisplrole".into()],
            replication_groups: vec!["cluster".into()],
        };
        assert!(group.has_member(&ResourceId::default_user()));
        assert!(group.has_member(&ResourceId::normalize("vdisplrole")));
        assert!(!group.has_member(&ResourceId::normalize("other")));
    }
}
