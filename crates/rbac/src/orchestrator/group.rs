//! User group association
//!
//! A replication group has at most one user group attached. New users are
//! merged into that group instead of getting their own:
//!
//! 1. The replication group reports one attached group: wait for it to be
//!    `active`, then add the user.
//! 2. Nothing attached, but a group named after the replication group exists
//!    (left behind by an earlier failed attach): adopt it, add the user, attach.
//! 3. Nothing attached and no such group: create it with `default` and the
//!    user as members, wait for it, attach it.
//!
//! Association is serialized per process. A concurrent creation by another
//! process surfaces as `UserGroupAlreadyExists` and triggers one rediscovery.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::Reconciler;
use crate::client::{CreateUserGroupRequest, ModifyReplicationGroupRequest, ModifyUserGroupRequest};
use crate::core::{ElastiCacheError, ErrorCode, Operation, ResourceId, Result, normalize};

/// What discovery found for the replication group
#[derive(Debug, Clone, PartialEq, Eq)]
enum Discovery {
    /// A user group is attached
    Attached(ResourceId),
    /// A user group named after the replication group exists but is not attached
    Orphaned(ResourceId),
    /// No user group at all
    Absent,
}

/// Keeps one user group per replication group and merges users into it
#[derive(Debug)]
pub struct GroupOrchestrator {
    reconciler: Reconciler,
    replication_group_id: ResourceId,
    lock: Mutex<()>,
}

impl GroupOrchestrator {
    /// Orchestrator for the given replication group
    pub fn new(reconciler: Reconciler, replication_group_id: ResourceId) -> Self {
        Self {
            reconciler,
            replication_group_id,
            lock: Mutex::new(()),
        }
    }

    /// Replication group users are associated with
    pub fn replication_group_id(&self) -> &ResourceId {
        &self.replication_group_id
    }

    /// Make `user_id` a member of the replication group's user group.
    #[instrument(
        skip(self, user_id, cancel),
        fields(user_id = %user_id, replication_group = %self.replication_group_id)
    )]
    pub async fn associate(&self, user_id: &ResourceId, cancel: &CancellationToken) -> Result<()> {
        let _serialized = self.lock.lock().await;

        match self.discover().await? {
            Discovery::Attached(group_id) => self.join(&group_id, user_id, cancel).await,
            Discovery::Orphaned(group_id) => self.adopt(&group_id, user_id, cancel).await,
            Discovery::Absent => match self.bootstrap(user_id, cancel).await {
                Err(err) if err.remote_code() == Some(&ErrorCode::UserGroupAlreadyExists) => {
                    debug!("user group created concurrently, rediscovering");
                    match self.discover().await? {
                        Discovery::Attached(group_id) => {
                            self.join(&group_id, user_id, cancel).await
                        }
                        Discovery::Orphaned(group_id) => {
                            self.adopt(&group_id, user_id, cancel).await
                        }
                        Discovery::Absent => Err(err),
                    }
                }
                other => other,
            },
        }
    }

    async fn discover(&self) -> Result<Discovery> {
        let api = self.reconciler.api();
        let rg_id = &self.replication_group_id;

        let replication_group = api
            .describe_replication_group(rg_id)
            .await
            .map_err(|e| ElastiCacheError::remote(Operation::DescribeReplicationGroups, rg_id.as_str(), e))?;

        match replication_group.user_group_ids.as_slice() {
            [] => {}
            [group_id] => return Ok(Discovery::Attached(normalize(group_id))),
            groups => {
                return Err(ElastiCacheError::AssociationConflict {
                    replication_group: rg_id.to_string(),
                    groups: groups.to_vec(),
                });
            }
        }

        match api.describe_user_groups(Some(rg_id)).await {
            Ok(groups) if groups.is_empty() => Ok(Discovery::Absent),
            Ok(_) => Ok(Discovery::Orphaned(rg_id.clone())),
            Err(e) if e.is_user_group_not_found() => Ok(Discovery::Absent),
            Err(e) => Err(ElastiCacheError::remote(
                Operation::DescribeUserGroups,
                rg_id.as_str(),
                e,
            )),
        }
    }

    /// Add the user to an existing group once it is `active`.
    async fn join(
        &self,
        group_id: &ResourceId,
        user_id: &ResourceId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.reconciler
            .wait_for_group(group_id, Operation::ModifyUserGroup, cancel)
            .await?;

        let api = self.reconciler.api();
        let groups = api
            .describe_user_groups(Some(group_id))
            .await
            .map_err(|e| ElastiCacheError::remote(Operation::DescribeUserGroups, group_id.as_str(), e))?;
        if groups.iter().any(|group| group.has_member(user_id)) {
            debug!(user_group = %group_id, "user already a member");
            return Ok(());
        }

        debug!(user_group = %group_id, "adding user to user group");
        api.modify_user_group(ModifyUserGroupRequest {
            user_group_id: group_id.clone(),
            user_ids_to_add: vec![user_id.clone()],
        })
        .await
        .map_err(|e| ElastiCacheError::remote(Operation::ModifyUserGroup, group_id.as_str(), e))?;
        Ok(())
    }

    async fn adopt(
        &self,
        group_id: &ResourceId,
        user_id: &ResourceId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(user_group = %group_id, "adopting unattached user group");
        self.join(group_id, user_id, cancel).await?;
        self.reconciler
            .wait_for_group(group_id, Operation::ModifyUserGroup, cancel)
            .await?;
        self.attach(group_id, cancel).await
    }

    /// Create the group named after the replication group and attach it.
    async fn bootstrap(&self, user_id: &ResourceId, cancel: &CancellationToken) -> Result<()> {
        let group_id = self.replication_group_id.clone();
        debug!(user_group = %group_id, "bootstrapping user group for replication group");

        self.reconciler
            .api()
            .create_user_group(CreateUserGroupRequest {
                user_group_id: group_id.clone(),
                user_ids: vec![ResourceId::default_user(), user_id.clone()],
            })
            .await
            .map_err(|e| ElastiCacheError::remote(Operation::CreateUserGroup, group_id.as_str(), e))?;

        self.reconciler
            .wait_for_group(&group_id, Operation::CreateUserGroup, cancel)
            .await?;
        self.attach(&group_id, cancel).await
    }

    /// Attach an `active` group to the replication group.
    async fn attach(&self, group_id: &ResourceId, cancel: &CancellationToken) -> Result<()> {
        let rg_id = &self.replication_group_id;
        self.reconciler
            .wait_for_replication_group(rg_id, Operation::ModifyReplicationGroup, cancel)
            .await?;

        debug!(user_group = %group_id, "attaching user group to replication group");
        self.reconciler
            .api()
            .modify_replication_group(ModifyReplicationGroupRequest {
                replication_group_id: rg_id.clone(),
                user_group_ids_to_add: vec![group_id.clone()],
            })
            .await
            .map_err(|e| {
                ElastiCacheError::remote(Operation::ModifyReplicationGroup, rg_id.as_str(), e)
            })?;
        Ok(())
    }
}
