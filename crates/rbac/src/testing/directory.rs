use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{
    Connector, CreateUserGroupRequest, CreateUserRequest, ElastiCacheApi,
    ModifyReplicationGroupRequest, ModifyUserGroupRequest, ModifyUserRequest,
    ReplicationGroupDescription, RemoteResult, ResourceStatus, UserDescription,
    UserGroupDescription,
};
use crate::config::ElastiCacheConfig;
use crate::core::{
    ConfigError, DEFAULT_USER_ID, ErrorCode, Operation, RemoteError, ResourceId, SecretString,
};

/// Status plus the number of describes left until it settles
#[derive(Debug, Clone)]
struct Lifecycle {
    status: ResourceStatus,
    pending: u32,
}

impl Lifecycle {
    fn settled() -> Self {
        Self {
            status: ResourceStatus::Active,
            pending: 0,
        }
    }

    fn transition(status: ResourceStatus, pending: u32) -> Self {
        if pending == 0 && !status.is_deleting() {
            return Self::settled();
        }
        Self { status, pending }
    }

    /// Advance one describe. Returns `true` once a deletion has completed.
    fn tick(&mut self) -> bool {
        if self.pending > 0 {
            self.pending -= 1;
        }
        if self.pending == 0 {
            if self.status.is_deleting() {
                return true;
            }
            self.status = ResourceStatus::Active;
        }
        false
    }
}

#[derive(Debug, Clone)]
struct User {
    user_name: String,
    access_string: String,
    passwords: Vec<SecretString>,
    lifecycle: Lifecycle,
}

#[derive(Debug, Clone)]
struct UserGroup {
    user_ids: Vec<String>,
    replication_groups: Vec<String>,
    lifecycle: Lifecycle,
}

#[derive(Debug, Clone)]
struct ReplicationGroup {
    user_group_ids: Vec<String>,
    lifecycle: Lifecycle,
}

/// Next `CreateUserGroup` finds the group already created by someone else
#[derive(Debug, Clone)]
struct RacedGroup {
    user_group_id: String,
    user_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct Directory {
    settle_after: u32,
    user_group_settle_after: Option<u32>,
    users: BTreeMap<String, User>,
    user_groups: BTreeMap<String, UserGroup>,
    replication_groups: BTreeMap<String, ReplicationGroup>,
    failures: HashMap<Operation, VecDeque<ErrorCode>>,
    calls: HashMap<Operation, u32>,
    raced_group: Option<RacedGroup>,
}

fn not_found(code: ErrorCode, what: &str, id: &str) -> RemoteError {
    RemoteError::new(code, format!("{what} {id} not found."))
}

fn invalid_state(what: &str, id: &str, status: &ResourceStatus) -> RemoteError {
    RemoteError::new(
        ErrorCode::InvalidState,
        format!("{what} {id} is in state {status}, expected active."),
    )
}

impl Directory {
    fn user_group_settle(&self) -> u32 {
        self.user_group_settle_after.unwrap_or(self.settle_after)
    }

    /// Count the call and pop a scripted failure, if any.
    fn enter(&mut self, operation: Operation) -> RemoteResult<()> {
        *self.calls.entry(operation).or_default() += 1;
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(code) => Err(RemoteError::new(code, format!("injected {operation} failure"))),
            None => Ok(()),
        }
    }

    fn tick_user(&mut self, user_id: &str) {
        let deleted = self
            .users
            .get_mut(user_id)
            .is_some_and(|user| user.lifecycle.tick());
        if deleted {
            self.users.remove(user_id);
            for group in self.user_groups.values_mut() {
                group.user_ids.retain(|member| member != user_id);
            }
        }
    }

    fn user_description(&self, user_id: &str) -> Option<UserDescription> {
        self.users.get(user_id).map(|user| UserDescription {
            user_id: user_id.to_string(),
            user_name: user.user_name.clone(),
            status: user.lifecycle.status.clone(),
            access_string: user.access_string.clone(),
            user_group_ids: self
                .user_groups
                .iter()
                .filter(|(_, group)| group.user_ids.iter().any(|member| member == user_id))
                .map(|(group_id, _)| group_id.clone())
                .collect(),
        })
    }

    fn user_group_description(&self, user_group_id: &str) -> Option<UserGroupDescription> {
        self.user_groups
            .get(user_group_id)
            .map(|group| UserGroupDescription {
                user_group_id: user_group_id.to_string(),
                status: group.lifecycle.status.clone(),
                user_ids: group.user_ids.clone(),
                replication_groups: group.replication_groups.clone(),
            })
    }

    fn replication_group_description(&self, id: &str) -> Option<ReplicationGroupDescription> {
        self.replication_groups
            .get(id)
            .map(|group| ReplicationGroupDescription {
                replication_group_id: id.to_string(),
                status: group.lifecycle.status.clone(),
                user_group_ids: group.user_group_ids.clone(),
            })
    }

    fn require_active_user(&self, user_id: &str) -> RemoteResult<()> {
        match self.users.get(user_id) {
            None => Err(not_found(ErrorCode::UserNotFound, "User", user_id)),
            Some(user) if !user.lifecycle.status.is_active() => {
                Err(invalid_state("User", user_id, &user.lifecycle.status))
            }
            Some(_) => Ok(()),
        }
    }

    fn require_users(&self, user_ids: &[ResourceId]) -> RemoteResult<()> {
        match user_ids.iter().find(|id| !self.users.contains_key(id.as_str())) {
            Some(missing) => Err(not_found(ErrorCode::UserNotFound, "User", missing.as_str())),
            None => Ok(()),
        }
    }

    fn require_active_group(&self, user_group_id: &str) -> RemoteResult<()> {
        match self.user_groups.get(user_group_id) {
            None => Err(not_found(ErrorCode::UserGroupNotFound, "User group", user_group_id)),
            Some(group) if !group.lifecycle.status.is_active() => {
                Err(invalid_state("User group", user_group_id, &group.lifecycle.status))
            }
            Some(_) => Ok(()),
        }
    }
}

/// Eventually consistent in-memory ElastiCache directory
///
/// Users and user groups are created in `creating`, move to `modifying` on
/// change and to `deleting` on deletion. Every describe that reports a
/// resource advances it one step; after `settle_after` steps it becomes
/// `active` (or disappears, when deleting). Mutations on resources that are
/// not `active` are rejected with [`ErrorCode::InvalidState`].
///
/// A `default` user is always present. Clones share the same directory.
#[derive(Debug, Clone)]
pub struct InMemoryElastiCache {
    directory: Arc<Mutex<Directory>>,
}

impl Default for InMemoryElastiCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryElastiCache {
    /// Empty directory where resources settle after two describes
    pub fn new() -> Self {
        let mut directory = Directory {
            settle_after: 2,
            ..Directory::default()
        };
        directory.users.insert(
            DEFAULT_USER_ID.to_string(),
            User {
                user_name: DEFAULT_USER_ID.to_string(),
                access_string: "on ~* +@all".to_string(),
                passwords: Vec::new(),
                lifecycle: Lifecycle::settled(),
            },
        );
        Self {
            directory: Arc::new(Mutex::new(directory)),
        }
    }

    /// Number of describes before a pending resource settles
    pub fn with_settle_after(self, describes: u32) -> Self {
        self.directory.lock().settle_after = describes;
        self
    }

    /// Number of describes before a pending user group settles, overriding
    /// [`with_settle_after`](Self::with_settle_after) for user groups only
    pub fn with_user_group_settle_after(self, describes: u32) -> Self {
        self.directory.lock().user_group_settle_after = Some(describes);
        self
    }

    /// Add an available replication group without user groups
    pub fn with_replication_group(self, replication_group_id: &str) -> Self {
        self.directory.lock().replication_groups.insert(
            replication_group_id.to_string(),
            ReplicationGroup {
                user_group_ids: Vec::new(),
                lifecycle: Lifecycle::settled(),
            },
        );
        self
    }

    /// Add an active user group, optionally attached to a replication group
    pub fn with_user_group(
        self,
        user_group_id: &str,
        user_ids: &[&str],
        attached_to: Option<&str>,
    ) -> Self {
        {
            let mut directory = self.directory.lock();
            if let Some(rg_id) = attached_to
                && let Some(rg) = directory.replication_groups.get_mut(rg_id)
            {
                rg.user_group_ids.push(user_group_id.to_string());
            }
            directory.user_groups.insert(
                user_group_id.to_string(),
                UserGroup {
                    user_ids: user_ids.iter().map(|id| id.to_string()).collect(),
                    replication_groups: attached_to.into_iter().map(str::to_string).collect(),
                    lifecycle: Lifecycle::settled(),
                },
            );
        }
        self
    }

    /// Make the next call to `operation` fail with `code`
    pub fn fail_next(&self, operation: Operation, code: ErrorCode) {
        self.directory
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(code);
    }

    /// Make the next `CreateUserGroup` lose a race: the group appears, active
    /// and unattached, and the call fails with `UserGroupAlreadyExists`
    pub fn race_next_user_group_creation(&self, user_group_id: &str, user_ids: &[&str]) {
        self.directory.lock().raced_group = Some(RacedGroup {
            user_group_id: user_group_id.to_string(),
            user_ids: user_ids.iter().map(|id| id.to_string()).collect(),
        });
    }

    /// Number of calls made to `operation`
    pub fn calls(&self, operation: Operation) -> u32 {
        self.directory
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    /// Current state of a user, without advancing it
    pub fn user(&self, user_id: &str) -> Option<UserDescription> {
        self.directory.lock().user_description(user_id)
    }

    /// Passwords currently set for a user
    pub fn user_passwords(&self, user_id: &str) -> Vec<SecretString> {
        self.directory
            .lock()
            .users
            .get(user_id)
            .map(|user| user.passwords.clone())
            .unwrap_or_default()
    }

    /// Current state of a user group, without advancing it
    pub fn user_group(&self, user_group_id: &str) -> Option<UserGroupDescription> {
        self.directory.lock().user_group_description(user_group_id)
    }

    /// Identifiers of all user groups
    pub fn user_group_ids(&self) -> Vec<String> {
        self.directory.lock().user_groups.keys().cloned().collect()
    }

    /// Current state of a replication group, without advancing it
    pub fn replication_group(&self, replication_group_id: &str) -> Option<ReplicationGroupDescription> {
        self.directory
            .lock()
            .replication_group_description(replication_group_id)
    }
}

#[async_trait]
impl ElastiCacheApi for InMemoryElastiCache {
    async fn describe_users(
        &self,
        user_id: Option<&ResourceId>,
    ) -> RemoteResult<Vec<UserDescription>> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::DescribeUsers)?;

        let ids: Vec<String> = match user_id {
            Some(id) if !directory.users.contains_key(id.as_str()) => {
                return Err(not_found(ErrorCode::UserNotFound, "User", id.as_str()));
            }
            Some(id) => vec![id.to_string()],
            None => directory.users.keys().cloned().collect(),
        };

        Ok(ids
            .iter()
            .filter_map(|id| {
                directory.tick_user(id);
                directory.user_description(id)
            })
            .collect())
    }

    async fn create_user(&self, request: CreateUserRequest) -> RemoteResult<UserDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::CreateUser)?;

        let user_id = request.user_id.as_str();
        if directory.users.contains_key(user_id) {
            return Err(RemoteError::new(
                ErrorCode::UserAlreadyExists,
                format!("User {user_id} already exists."),
            ));
        }

        let lifecycle = Lifecycle::transition(ResourceStatus::Creating, directory.settle_after);
        directory.users.insert(
            user_id.to_string(),
            User {
                user_name: request.user_name,
                access_string: request.access_string.as_str().to_string(),
                passwords: request.passwords,
                lifecycle,
            },
        );
        directory
            .user_description(user_id)
            .ok_or_else(|| not_found(ErrorCode::UserNotFound, "User", user_id))
    }

    async fn modify_user(&self, request: ModifyUserRequest) -> RemoteResult<UserDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::ModifyUser)?;

        let user_id = request.user_id.as_str();
        directory.require_active_user(user_id)?;

        let lifecycle = Lifecycle::transition(ResourceStatus::Modifying, directory.settle_after);
        if let Some(user) = directory.users.get_mut(user_id) {
            user.passwords = request.passwords;
            user.lifecycle = lifecycle;
        }
        directory
            .user_description(user_id)
            .ok_or_else(|| not_found(ErrorCode::UserNotFound, "User", user_id))
    }

    async fn delete_user(&self, user_id: &ResourceId) -> RemoteResult<UserDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::DeleteUser)?;

        directory.require_active_user(user_id.as_str())?;
        let lifecycle = Lifecycle::transition(ResourceStatus::Deleting, directory.settle_after);
        if let Some(user) = directory.users.get_mut(user_id.as_str()) {
            user.lifecycle = lifecycle;
        }
        directory
            .user_description(user_id.as_str())
            .ok_or_else(|| not_found(ErrorCode::UserNotFound, "User", user_id.as_str()))
    }

    async fn describe_user_groups(
        &self,
        user_group_id: Option<&ResourceId>,
    ) -> RemoteResult<Vec<UserGroupDescription>> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::DescribeUserGroups)?;

        let ids: Vec<String> = match user_group_id {
            Some(id) if !directory.user_groups.contains_key(id.as_str()) => {
                return Err(not_found(ErrorCode::UserGroupNotFound, "User group", id.as_str()));
            }
            Some(id) => vec![id.to_string()],
            None => directory.user_groups.keys().cloned().collect(),
        };

        for id in &ids {
            if let Some(group) = directory.user_groups.get_mut(id) {
                group.lifecycle.tick();
            }
        }
        Ok(ids
            .iter()
            .filter_map(|id| directory.user_group_description(id))
            .collect())
    }

    async fn create_user_group(
        &self,
        request: CreateUserGroupRequest,
    ) -> RemoteResult<UserGroupDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::CreateUserGroup)?;

        if let Some(raced) = directory.raced_group.take() {
            directory.user_groups.insert(
                raced.user_group_id.clone(),
                UserGroup {
                    user_ids: raced.user_ids,
                    replication_groups: Vec::new(),
                    lifecycle: Lifecycle::settled(),
                },
            );
        }

        let user_group_id = request.user_group_id.as_str();
        if directory.user_groups.contains_key(user_group_id) {
            return Err(RemoteError::new(
                ErrorCode::UserGroupAlreadyExists,
                format!("User group {user_group_id} already exists."),
            ));
        }
        directory.require_users(&request.user_ids)?;

        let lifecycle = Lifecycle::transition(ResourceStatus::Creating, directory.user_group_settle());
        directory.user_groups.insert(
            user_group_id.to_string(),
            UserGroup {
                user_ids: request.user_ids.iter().map(ToString::to_string).collect(),
                replication_groups: Vec::new(),
                lifecycle,
            },
        );
        directory
            .user_group_description(user_group_id)
            .ok_or_else(|| not_found(ErrorCode::UserGroupNotFound, "User group", user_group_id))
    }

    async fn modify_user_group(
        &self,
        request: ModifyUserGroupRequest,
    ) -> RemoteResult<UserGroupDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::ModifyUserGroup)?;

        let user_group_id = request.user_group_id.as_str();
        directory.require_active_group(user_group_id)?;
        directory.require_users(&request.user_ids_to_add)?;

        let lifecycle = Lifecycle::transition(ResourceStatus::Modifying, directory.user_group_settle());
        if let Some(group) = directory.user_groups.get_mut(user_group_id) {
            for user_id in &request.user_ids_to_add {
                if !group.user_ids.iter().any(|member| member == user_id.as_str()) {
                    group.user_ids.push(user_id.to_string());
                }
            }
            group.lifecycle = lifecycle;
        }
        directory
            .user_group_description(user_group_id)
            .ok_or_else(|| not_found(ErrorCode::UserGroupNotFound, "User group", user_group_id))
    }

    async fn describe_replication_group(
        &self,
        replication_group_id: &ResourceId,
    ) -> RemoteResult<ReplicationGroupDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::DescribeReplicationGroups)?;

        let id = replication_group_id.as_str();
        match directory.replication_groups.get_mut(id) {
            Some(group) => {
                group.lifecycle.tick();
            }
            None => {
                return Err(not_found(ErrorCode::ReplicationGroupNotFound, "Replication group", id));
            }
        }
        directory
            .replication_group_description(id)
            .ok_or_else(|| not_found(ErrorCode::ReplicationGroupNotFound, "Replication group", id))
    }

    async fn modify_replication_group(
        &self,
        request: ModifyReplicationGroupRequest,
    ) -> RemoteResult<ReplicationGroupDescription> {
        let mut directory = self.directory.lock();
        directory.enter(Operation::ModifyReplicationGroup)?;

        let rg_id = request.replication_group_id.as_str();
        match directory.replication_groups.get(rg_id) {
            None => {
                return Err(not_found(ErrorCode::ReplicationGroupNotFound, "Replication group", rg_id));
            }
            Some(rg) if !rg.lifecycle.status.is_active() => {
                return Err(invalid_state("Replication group", rg_id, &rg.lifecycle.status));
            }
            Some(_) => {}
        }
        for user_group_id in &request.user_group_ids_to_add {
            directory.require_active_group(user_group_id.as_str())?;
        }

        let lifecycle = Lifecycle::transition(ResourceStatus::Modifying, directory.settle_after);
        for user_group_id in &request.user_group_ids_to_add {
            if let Some(group) = directory.user_groups.get_mut(user_group_id.as_str())
                && !group.replication_groups.iter().any(|rg| rg == rg_id)
            {
                group.replication_groups.push(rg_id.to_string());
            }
        }
        if let Some(rg) = directory.replication_groups.get_mut(rg_id) {
            for user_group_id in &request.user_group_ids_to_add {
                if !rg.user_group_ids.iter().any(|id| id == user_group_id.as_str()) {
                    rg.user_group_ids.push(user_group_id.to_string());
                }
            }
            rg.lifecycle = lifecycle;
        }
        directory
            .replication_group_description(rg_id)
            .ok_or_else(|| not_found(ErrorCode::ReplicationGroupNotFound, "Replication group", rg_id))
    }
}

#[async_trait]
impl Connector for InMemoryElastiCache {
    async fn connect(
        &self,
        _config: &ElastiCacheConfig,
    ) -> Result<Arc<dyn ElastiCacheApi>, ConfigError> {
        Ok(Arc::new(self.clone()))
    }
}
