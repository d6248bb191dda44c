//! Lifecycle orchestration against the eventually consistent directory
//!
//! - [`UserOrchestrator`]: create, rotate and delete a single user
//! - [`GroupOrchestrator`]: keep exactly one user group attached to the
//!   replication group and merge new users into it
//!
//! Both drive resources through `creating -> active -> deleting` purely by
//! re-querying status with the [`StatePoller`].

mod group;
mod user;

pub use group::GroupOrchestrator;
pub use user::UserOrchestrator;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::client::{ElastiCacheApi, RemoteResult};
use crate::core::{Operation, ResourceId, ResourceKind, Result};
use crate::poll::StatePoller;

/// Remote client plus the poller used to wait on it
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<dyn ElastiCacheApi>,
    poller: StatePoller,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Pair a client with a poller
    pub fn new(api: Arc<dyn ElastiCacheApi>, poller: StatePoller) -> Self {
        Self { api, poller }
    }

    /// Remote client
    pub fn api(&self) -> &dyn ElastiCacheApi {
        self.api.as_ref()
    }

    /// Wait until the user exists exactly once and is `active`.
    pub async fn wait_for_user(
        &self,
        user_id: &ResourceId,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let api = self.api();
        self.poller
            .await_condition(cancel, move || user_is_active(api, user_id))
            .await
            .into_result(ResourceKind::User, user_id, operation)
    }

    /// Wait until the user can be deleted or is already on its way out.
    ///
    /// Returns `false` when the user disappeared or entered `deleting` while
    /// waiting, `true` when it is `active` and still needs a delete call.
    pub async fn wait_for_user_removal(
        &self,
        user_id: &ResourceId,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let api = self.api();
        let removed = AtomicBool::new(false);
        let flag = &removed;
        self.poller
            .await_condition(cancel, move || async move {
                user_presence(api, user_id).await.map(|presence| {
                    if presence == UserPresence::Gone {
                        flag.store(true, Ordering::Relaxed);
                    }
                    presence != UserPresence::Pending
                })
            })
            .await
            .into_result(ResourceKind::User, user_id, Operation::DeleteUser)?;
        Ok(!removed.load(Ordering::Relaxed))
    }

    /// Wait until the user group exists exactly once and is `active`.
    pub async fn wait_for_group(
        &self,
        user_group_id: &ResourceId,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let api = self.api();
        self.poller
            .await_condition(cancel, move || group_is_active(api, user_group_id))
            .await
            .into_result(ResourceKind::UserGroup, user_group_id, operation)
    }

    /// Wait until the replication group accepts modifications.
    pub async fn wait_for_replication_group(
        &self,
        replication_group_id: &ResourceId,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let api = self.api();
        self.poller
            .await_condition(cancel, move || {
                replication_group_is_active(api, replication_group_id)
            })
            .await
            .into_result(ResourceKind::ReplicationGroup, replication_group_id, operation)
    }
}

async fn user_is_active(api: &dyn ElastiCacheApi, user_id: &ResourceId) -> RemoteResult<bool> {
    let users = api.describe_users(Some(user_id)).await?;
    Ok(matches!(users.as_slice(), [user] if user.status.is_active()))
}

/// Where a user stands with respect to deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserPresence {
    /// Exists once and accepts a delete call
    Active,
    /// Absent or already `deleting`
    Gone,
    /// Still settling
    Pending,
}

async fn user_presence(
    api: &dyn ElastiCacheApi,
    user_id: &ResourceId,
) -> RemoteResult<UserPresence> {
    let users = match api.describe_users(Some(user_id)).await {
        Ok(users) => users,
        Err(e) if e.is_user_not_found() => return Ok(UserPresence::Gone),
        Err(e) => return Err(e),
    };
    if users.is_empty() || users.iter().any(|user| user.status.is_deleting()) {
        return Ok(UserPresence::Gone);
    }
    Ok(match users.as_slice() {
        [user] if user.status.is_active() => UserPresence::Active,
        _ => UserPresence::Pending,
    })
}

async fn group_is_active(
    api: &dyn ElastiCacheApi,
    user_group_id: &ResourceId,
) -> RemoteResult<bool> {
    let groups = api.describe_user_groups(Some(user_group_id)).await?;
    Ok(matches!(groups.as_slice(), [group] if group.status.is_active()))
}

async fn replication_group_is_active(
    api: &dyn ElastiCacheApi,
    replication_group_id: &ResourceId,
) -> RemoteResult<bool> {
    let group = api.describe_replication_group(replication_group_id).await?;
    Ok(group.status.is_active())
}
