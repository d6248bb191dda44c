//! Single-user lifecycle: create with rollback, rotate, lenient delete

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{GroupOrchestrator, Reconciler};
use crate::access::parse_access_string;
use crate::client::{CreateUserRequest, ModifyUserRequest};
use crate::core::{ElastiCacheError, Operation, ResourceId, Result, SecretString, normalize};
use crate::database::UsernameMetadata;
use crate::username::UsernameGenerator;

/// Drives create, update and delete of a single user
#[derive(Debug)]
pub struct UserOrchestrator {
    reconciler: Reconciler,
    groups: GroupOrchestrator,
    usernames: UsernameGenerator,
}

impl UserOrchestrator {
    /// Orchestrator that associates new users through `groups`
    pub fn new(reconciler: Reconciler, groups: GroupOrchestrator) -> Self {
        Self {
            reconciler,
            groups,
            usernames: UsernameGenerator::default(),
        }
    }

    /// Replace the username generator
    pub fn with_usernames(mut self, usernames: UsernameGenerator) -> Self {
        self.usernames = usernames;
        self
    }

    /// Group orchestrator used on creation
    pub fn groups(&self) -> &GroupOrchestrator {
        &self.groups
    }

    /// Create a user, wait for it, and merge it into the replication group's
    /// user group.
    ///
    /// If anything after the create call fails, the user is deleted again on a
    /// best-effort basis and the original failure is returned wrapped in
    /// [`ElastiCacheError::Association`].
    #[instrument(skip_all, fields(role = %metadata.role_name))]
    pub async fn create(
        &self,
        metadata: &UsernameMetadata,
        commands: &[String],
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!("creating new AWS ElastiCache Redis user");

        let username = self.usernames.generate(metadata)?;
        let access_string = parse_access_string(commands)?;
        let user_id = normalize(&username);

        let created = self
            .reconciler
            .api()
            .create_user(CreateUserRequest {
                user_id: user_id.clone(),
                user_name: username.clone(),
                access_string,
                passwords: vec![password.clone()],
            })
            .await
            .map_err(|e| ElastiCacheError::remote(Operation::CreateUser, user_id.as_str(), e))?;

        if let Err(source) = self.configure(&user_id, cancel).await {
            debug!(user_id = %user_id, error = %source, "encountered error while configuring newly created user, attempting to clean up");
            self.rollback(&user_id).await;
            return Err(ElastiCacheError::Association {
                user_id: user_id.into_inner(),
                source: Box::new(source),
            });
        }

        if created.user_name.is_empty() {
            Ok(username)
        } else {
            Ok(created.user_name)
        }
    }

    async fn configure(&self, user_id: &ResourceId, cancel: &CancellationToken) -> Result<()> {
        self.reconciler
            .wait_for_user(user_id, Operation::CreateUser, cancel)
            .await?;
        self.groups.associate(user_id, cancel).await
    }

    /// Compensating delete. Runs under its own token so cleanup is not cut
    /// short by the caller's cancellation; failures are only logged.
    async fn rollback(&self, user_id: &ResourceId) {
        if let Err(err) = self.delete_id(user_id, &CancellationToken::new()).await {
            warn!(user_id = %user_id, error = %err, "unable to clean up newly created user");
        }
    }

    /// Replace the user's password once it is `active`.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn update(
        &self,
        username: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("updating AWS ElastiCache Redis user");
        let user_id = normalize(username);

        self.reconciler
            .wait_for_user(&user_id, Operation::ModifyUser, cancel)
            .await?;

        self.reconciler
            .api()
            .modify_user(ModifyUserRequest {
                user_id: user_id.clone(),
                passwords: vec![password.clone()],
            })
            .await
            .map_err(|e| ElastiCacheError::remote(Operation::ModifyUser, user_id.as_str(), e))?;
        Ok(())
    }

    /// Delete the user. Absent users and users already being deleted count as
    /// deleted.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn delete(&self, username: &str, cancel: &CancellationToken) -> Result<()> {
        debug!("deleting AWS ElastiCache Redis user");
        self.delete_id(&normalize(username), cancel).await
    }

    async fn delete_id(&self, user_id: &ResourceId, cancel: &CancellationToken) -> Result<()> {
        let api = self.reconciler.api();

        match api.describe_users(Some(user_id)).await {
            Err(e) if e.is_user_not_found() => {
                debug!(user_id = %user_id, "user does not exist, considering deletion successful");
                return Ok(());
            }
            Ok(users) if users.is_empty() => {
                debug!(user_id = %user_id, "user does not exist, considering deletion successful");
                return Ok(());
            }
            Ok(users) if users.iter().any(|user| user.status.is_deleting()) => {
                debug!(user_id = %user_id, "user is being deleted, considering deletion successful");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "unable to look up user before deletion"),
        }

        if !self.reconciler.wait_for_user_removal(user_id, cancel).await? {
            debug!(user_id = %user_id, "user removed while waiting, considering deletion successful");
            return Ok(());
        }

        match api.delete_user(user_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_user_not_found() => Ok(()),
            Err(e) => Err(ElastiCacheError::remote(Operation::DeleteUser, user_id.as_str(), e)),
        }
    }
}
