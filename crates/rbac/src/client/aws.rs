//! AWS SDK implementation of [`ElastiCacheApi`]
//!
//! Built from the static access key pair and region in [`ElastiCacheConfig`].
//! SDK failures are decoded into [`RemoteError`] through the service error
//! code, so nothing above this module inspects SDK types.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_elasticache::Client;
use aws_sdk_elasticache::config::Credentials;
use aws_sdk_elasticache::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use super::{
    Connector, CreateUserGroupRequest, CreateUserRequest, ENGINE, ElastiCacheApi,
    ModifyReplicationGroupRequest, ModifyUserGroupRequest, ModifyUserRequest,
    ReplicationGroupDescription, RemoteResult, ResourceStatus, UserDescription,
    UserGroupDescription,
};
use crate::config::ElastiCacheConfig;
use crate::core::{ConfigError, ErrorCode, RemoteError, ResourceId, SecretString};

const CREDENTIALS_PROVIDER: &str = "elasticache-rbac";

macro_rules! user_description {
    ($user:expr) => {{
        let user = $user;
        UserDescription {
            user_id: user.user_id().unwrap_or_default().to_string(),
            user_name: user.user_name().unwrap_or_default().to_string(),
            status: ResourceStatus::parse(user.status().unwrap_or_default()),
            access_string: user.access_string().unwrap_or_default().to_string(),
            user_group_ids: user.user_group_ids().to_vec(),
        }
    }};
}

macro_rules! user_group_description {
    ($group:expr) => {{
        let group = $group;
        UserGroupDescription {
            user_group_id: group.user_group_id().unwrap_or_default().to_string(),
            status: ResourceStatus::parse(group.status().unwrap_or_default()),
            user_ids: group.user_ids().to_vec(),
            replication_groups: group.replication_groups().to_vec(),
        }
    }};
}

macro_rules! replication_group_description {
    ($group:expr) => {{
        let group = $group;
        ReplicationGroupDescription {
            replication_group_id: group.replication_group_id().unwrap_or_default().to_string(),
            status: ResourceStatus::parse(group.status().unwrap_or_default()),
            user_group_ids: group.user_group_ids().to_vec(),
        }
    }};
}

/// Decode an SDK failure into a [`RemoteError`].
fn decode<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let code = err
        .code()
        .map_or_else(|| ErrorCode::Other("Transport".to_string()), ErrorCode::from_code);
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(&err).to_string(), str::to_string);
    RemoteError::new(code, message)
}

fn plain(secrets: &[SecretString]) -> Vec<String> {
    secrets
        .iter()
        .map(|secret| secret.expose_secret(str::to_string))
        .collect()
}

fn ids(ids: &[ResourceId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

/// ElastiCache client backed by `aws-sdk-elasticache`
#[derive(Clone)]
pub struct AwsElastiCacheClient {
    client: Client,
}

impl fmt::Debug for AwsElastiCacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsElastiCacheClient").finish_non_exhaustive()
    }
}

impl AwsElastiCacheClient {
    /// Wrap an SDK config
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Load an SDK config from static credentials and the configured region
    pub async fn from_config(config: &ElastiCacheConfig) -> Self {
        let credentials = config.access_key_id.expose_secret(|access_key_id| {
            config.secret_access_key.expose_secret(|secret_access_key| {
                Credentials::new(
                    access_key_id,
                    secret_access_key,
                    None,
                    None,
                    CREDENTIALS_PROVIDER,
                )
            })
        });

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        tracing::debug!(region = %config.region, "initialized AWS ElastiCache client");

        Self::new(&sdk_config)
    }
}

#[async_trait]
impl ElastiCacheApi for AwsElastiCacheClient {
    async fn describe_users(
        &self,
        user_id: Option<&ResourceId>,
    ) -> RemoteResult<Vec<UserDescription>> {
        let output = self
            .client
            .describe_users()
            .set_user_id(user_id.map(ToString::to_string))
            .send()
            .await
            .map_err(decode)?;
        Ok(output.users().iter().map(|user| user_description!(user)).collect())
    }

    async fn create_user(&self, request: CreateUserRequest) -> RemoteResult<UserDescription> {
        let output = self
            .client
            .create_user()
            .user_id(request.user_id.as_str())
            .user_name(request.user_name)
            .engine(ENGINE)
            .access_string(request.access_string.as_str())
            .no_password_required(false)
            .set_passwords(Some(plain(&request.passwords)))
            .set_tags(Some(Vec::new()))
            .send()
            .await
            .map_err(decode)?;
        Ok(user_description!(&output))
    }

    async fn modify_user(&self, request: ModifyUserRequest) -> RemoteResult<UserDescription> {
        let output = self
            .client
            .modify_user()
            .user_id(request.user_id.as_str())
            .set_passwords(Some(plain(&request.passwords)))
            .send()
            .await
            .map_err(decode)?;
        Ok(user_description!(&output))
    }

    async fn delete_user(&self, user_id: &ResourceId) -> RemoteResult<UserDescription> {
        let output = self
            .client
            .delete_user()
            .user_id(user_id.as_str())
            .send()
            .await
            .map_err(decode)?;
        Ok(user_description!(&output))
    }

    async fn describe_user_groups(
        &self,
        user_group_id: Option<&ResourceId>,
    ) -> RemoteResult<Vec<UserGroupDescription>> {
        let output = self
            .client
            .describe_user_groups()
            .set_user_group_id(user_group_id.map(ToString::to_string))
            .send()
            .await
            .map_err(decode)?;
        Ok(output
            .user_groups()
            .iter()
            .map(|group| user_group_description!(group))
            .collect())
    }

    async fn create_user_group(
        &self,
        request: CreateUserGroupRequest,
    ) -> RemoteResult<UserGroupDescription> {
        let output = self
            .client
            .create_user_group()
            .user_group_id(request.user_group_id.as_str())
            .engine(ENGINE)
            .set_user_ids(Some(ids(&request.user_ids)))
            .set_tags(Some(Vec::new()))
            .send()
            .await
            .map_err(decode)?;
        Ok(user_group_description!(&output))
    }

    async fn modify_user_group(
        &self,
        request: ModifyUserGroupRequest,
    ) -> RemoteResult<UserGroupDescription> {
        let output = self
            .client
            .modify_user_group()
            .user_group_id(request.user_group_id.as_str())
            .set_user_ids_to_add(Some(ids(&request.user_ids_to_add)))
            .send()
            .await
            .map_err(decode)?;
        Ok(user_group_description!(&output))
    }

    async fn describe_replication_group(
        &self,
        replication_group_id: &ResourceId,
    ) -> RemoteResult<ReplicationGroupDescription> {
        let output = self
            .client
            .describe_replication_groups()
            .replication_group_id(replication_group_id.as_str())
            .send()
            .await
            .map_err(decode)?;
        output
            .replication_groups()
            .first()
            .map(|group| replication_group_description!(group))
            .ok_or_else(|| {
                RemoteError::new(
                    ErrorCode::ReplicationGroupNotFound,
                    format!("replication group {replication_group_id} not found"),
                )
            })
    }

    async fn modify_replication_group(
        &self,
        request: ModifyReplicationGroupRequest,
    ) -> RemoteResult<ReplicationGroupDescription> {
        let output = self
            .client
            .modify_replication_group()
            .replication_group_id(request.replication_group_id.as_str())
            .set_user_group_ids_to_add(Some(ids(&request.user_group_ids_to_add)))
            .apply_immediately(true)
            .send()
            .await
            .map_err(decode)?;
        Ok(output.replication_group().map_or_else(
            || ReplicationGroupDescription {
                replication_group_id: request.replication_group_id.to_string(),
                status: ResourceStatus::Modifying,
                user_group_ids: Vec::new(),
            },
            |group| replication_group_description!(group),
        ))
    }
}

/// Production [`Connector`]: an SDK client per configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsConnector;

#[async_trait]
impl Connector for AwsConnector {
    async fn connect(
        &self,
        config: &ElastiCacheConfig,
    ) -> Result<Arc<dyn ElastiCacheApi>, ConfigError> {
        Ok(Arc::new(AwsElastiCacheClient::from_config(config).await))
    }
}
