//! The `redisElastiCache` database plugin
//!
//! [`RedisElastiCache`] implements the host lifecycle in [`Database`]. The
//! remote session is built by `initialize` and swapped in atomically, so a
//! re-initialization never tears a lifecycle call that is already running.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::client::Connector;
use crate::config::{ElastiCacheConfig, ProviderConfig};
use crate::core::{ConfigError, ElastiCacheError, Result};
use crate::database::{
    Database, DeleteUserRequest, DeleteUserResponse, InitializeRequest, InitializeResponse,
    NewUserRequest, NewUserResponse, UpdateUserRequest, UpdateUserResponse,
};
use crate::orchestrator::{GroupOrchestrator, Reconciler, UserOrchestrator};
use crate::poll::StatePoller;

/// Name the plugin registers under
pub const TYPE_NAME: &str = "redisElastiCache";

/// Everything `initialize` builds
#[derive(Debug)]
struct Session {
    config: ElastiCacheConfig,
    users: UserOrchestrator,
}

/// ElastiCache RBAC user lifecycle behind the host [`Database`] interface
pub struct RedisElastiCache {
    connector: Arc<dyn Connector>,
    session: ArcSwapOption<Session>,
}

impl std::fmt::Debug for RedisElastiCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisElastiCache")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "aws")]
impl Default for RedisElastiCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RedisElastiCache {
    /// Plugin talking to AWS through the SDK
    #[cfg(feature = "aws")]
    pub fn new() -> Self {
        Self::with_connector(Arc::new(crate::client::AwsConnector))
    }

    /// Plugin using a custom client factory
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            session: ArcSwapOption::empty(),
        }
    }

    /// Whether `initialize` has succeeded and `close` has not been called since
    pub fn is_initialized(&self) -> bool {
        self.session.load().is_some()
    }

    /// Configuration of the current session
    pub fn config(&self) -> Option<ElastiCacheConfig> {
        self.session
            .load_full()
            .map(|session| session.config.clone())
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.session.load_full().ok_or(ElastiCacheError::NotInitialized)
    }
}

#[async_trait]
impl Database for RedisElastiCache {
    #[instrument(skip_all, fields(verify_connection = request.verify_connection))]
    async fn initialize(
        &self,
        request: InitializeRequest,
        _cancel: &CancellationToken,
    ) -> Result<InitializeResponse> {
        let config = ElastiCacheConfig::from_map(&request.config)?;
        config.validate()?;
        let replication_group_id = config.replication_group_id()?;

        let api = self.connector.connect(&config).await?;
        if request.verify_connection {
            api.describe_users(None).await.map_err(ConfigError::Connect)?;
            debug!("verified ElastiCache connection");
        }

        let reconciler = Reconciler::new(api, StatePoller::new(config.poll_policy()));
        let groups = GroupOrchestrator::new(reconciler.clone(), replication_group_id);
        let users = UserOrchestrator::new(reconciler, groups);

        info!(
            provider = config.provider_name(),
            region = %config.region,
            replication_group = %users.groups().replication_group_id(),
            "initialized ElastiCache session"
        );
        self.session.store(Some(Arc::new(Session { config, users })));

        Ok(InitializeResponse {
            config: request.config,
        })
    }

    async fn new_user(
        &self,
        request: NewUserRequest,
        cancel: &CancellationToken,
    ) -> Result<NewUserResponse> {
        let session = self.session()?;
        let username = session
            .users
            .create(
                &request.username_config,
                &request.statements.commands,
                &request.password,
                cancel,
            )
            .await?;
        Ok(NewUserResponse { username })
    }

    async fn update_user(
        &self,
        request: UpdateUserRequest,
        cancel: &CancellationToken,
    ) -> Result<UpdateUserResponse> {
        let session = self.session()?;
        if let Some(change) = &request.password {
            session
                .users
                .update(&request.username, &change.new_password, cancel)
                .await?;
        }
        Ok(UpdateUserResponse::default())
    }

    async fn delete_user(
        &self,
        request: DeleteUserRequest,
        cancel: &CancellationToken,
    ) -> Result<DeleteUserResponse> {
        let session = self.session()?;
        session.users.delete(&request.username, cancel).await?;
        Ok(DeleteUserResponse::default())
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn close(&self) -> Result<()> {
        self.session.store(None);
        Ok(())
    }
}
