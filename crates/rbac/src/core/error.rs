//! Error types for the ElastiCache RBAC core
//!
//! The hierarchy mirrors the layers of the crate:
//! - [`ConfigError`]: malformed configuration handed over at initialization
//! - [`GrammarError`]: malformed or forbidden access-string statements
//! - [`RemoteError`]: a control-plane call failed, with a decoded [`ErrorCode`]
//! - [`ElastiCacheError`]: top-level error returned by every lifecycle call
//!
//! Pure functions (identifier normalization, access-string parsing) never
//! produce remote errors; orchestrators wrap every remote failure with the
//! [`Operation`] and the resource identifier so failures can be diagnosed
//! without leaking secrets.
//!
//! ```
//! use elasticache_rbac::core::{ErrorCode, RemoteError};
//!
//! let err = RemoteError::new(ErrorCode::from_code("UserNotFound"), "User not found");
//! assert!(err.is_user_not_found());
//! ```

use std::fmt;

use thiserror::Error;

/// Top-level error for lifecycle operations
#[derive(Debug, Error)]
pub enum ElastiCacheError {
    /// Configuration could not be decoded or failed validation
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Access-string statements were malformed or forbidden
    #[error("unable to parse access string: {0}")]
    Grammar(#[from] GrammarError),

    /// Username could not be generated from the host-supplied metadata
    #[error("unable to generate username: {reason}")]
    UsernameGeneration {
        /// Why generation failed
        reason: String,
    },

    /// A control-plane call was rejected
    #[error("{operation} failed for '{id}': {source}")]
    Remote {
        /// Remote operation that failed
        operation: Operation,
        /// Identifier the operation targeted
        id: String,
        /// Decoded remote failure
        #[source]
        source: RemoteError,
    },

    /// A resource never reached `active` within the poll budget
    #[error("{kind} '{id}' never turned active after {attempts} attempts")]
    NeverActive {
        /// Kind of resource that was being awaited
        kind: ResourceKind,
        /// Identifier of the resource
        id: String,
        /// Number of status checks performed
        attempts: u32,
    },

    /// The caller cancelled the operation while it was waiting on the directory
    #[error("{operation} cancelled while waiting on '{id}'")]
    Cancelled {
        /// Operation that was in progress
        operation: Operation,
        /// Identifier being awaited
        id: String,
    },

    /// The replication group is attached to more than one user group
    #[error("replication group '{replication_group}' has {} associated user groups, expected at most one", .groups.len())]
    AssociationConflict {
        /// Replication group identifier
        replication_group: String,
        /// User groups reported as associated
        groups: Vec<String>,
    },

    /// A freshly created user could not be attached to the replication group
    #[error("unable to configure newly created user {user_id}: {source}")]
    Association {
        /// Identifier of the user that was rolled back
        user_id: String,
        /// Failure that triggered the rollback
        #[source]
        source: Box<ElastiCacheError>,
    },

    /// A user operation was issued before `initialize`
    #[error("plugin has not been initialized")]
    NotInitialized,
}

impl ElastiCacheError {
    /// Wrap a remote failure with the operation and identifier it concerned.
    pub fn remote(operation: Operation, id: impl Into<String>, source: RemoteError) -> Self {
        Self::Remote {
            operation,
            id: id.into(),
            source,
        }
    }

    /// Remote error code, if this error came from the control plane.
    pub fn remote_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Remote { source, .. } => Some(&source.code),
            Self::Association { source, .. } => source.remote_code(),
            _ => None,
        }
    }

    /// Whether the directory never converged, as opposed to rejecting a call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NeverActive { .. })
    }
}

/// Configuration errors raised by `initialize`
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was missing or empty
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// Field name as the host spells it
        field: &'static str,
    },

    /// A field had an unusable value
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Field name as the host spells it
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The host configuration map could not be decoded
    #[error("unable to decode configuration: {0}")]
    Decode(#[from] serde_json::Error),

    /// The remote session could not be established
    #[error("unable to connect to ElastiCache Redis endpoint: {0}")]
    Connect(#[source] RemoteError),
}

/// Access-string statement errors
#[derive(Debug, Error)]
pub enum GrammarError {
    /// A statement was not a JSON array of strings
    #[error("statement {index} is not a JSON array of rules: {source}")]
    Malformed {
        /// Zero-based position of the offending statement
        index: usize,
        /// Decoder failure
        #[source]
        source: serde_json::Error,
    },

    /// The statements would create a disabled user
    #[error("creation of disabled or 'off' users is forbidden")]
    Forbidden,
}

/// A failed control-plane call, decoded at the client boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable message from the service
    pub message: String,
}

impl RemoteError {
    /// Create a remote error from a decoded code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The user does not exist
    pub fn is_user_not_found(&self) -> bool {
        self.code == ErrorCode::UserNotFound
    }

    /// The user group does not exist
    pub fn is_user_group_not_found(&self) -> bool {
        self.code == ErrorCode::UserGroupNotFound
    }
}

/// Normalized control-plane error codes
///
/// Only the codes that drive branching are distinguished; everything else is
/// kept verbatim in [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `UserNotFound`
    UserNotFound,
    /// `UserGroupNotFound`
    UserGroupNotFound,
    /// `ReplicationGroupNotFoundFault`
    ReplicationGroupNotFound,
    /// `UserAlreadyExists`
    UserAlreadyExists,
    /// `UserGroupAlreadyExists`
    UserGroupAlreadyExists,
    /// `InvalidUserState`, `InvalidUserGroupState`, `InvalidReplicationGroupState`
    InvalidState,
    /// `InvalidParameterValue`, `InvalidParameterCombination`
    InvalidParameter,
    /// `Throttling`
    Throttling,
    /// Anything else, including transport failures without a service code
    Other(String),
}

impl ErrorCode {
    /// Decode a service error code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "UserNotFound" | "UserNotFoundFault" => Self::UserNotFound,
            "UserGroupNotFound" | "UserGroupNotFoundFault" => Self::UserGroupNotFound,
            "ReplicationGroupNotFoundFault" | "ReplicationGroupNotFound" => {
                Self::ReplicationGroupNotFound
            }
            "UserAlreadyExists" | "UserAlreadyExistsFault" => Self::UserAlreadyExists,
            "UserGroupAlreadyExists" | "UserGroupAlreadyExistsFault" => {
                Self::UserGroupAlreadyExists
            }
            "InvalidUserState" | "InvalidUserStateFault" | "InvalidUserGroupState"
            | "InvalidUserGroupStateFault" | "InvalidReplicationGroupState"
            | "InvalidReplicationGroupStateFault" => Self::InvalidState,
            "InvalidParameterValue" | "InvalidParameterCombination" => Self::InvalidParameter,
            "Throttling" | "ThrottlingException" => Self::Throttling,
            other => Self::Other(other.to_string()),
        }
    }

    /// Service spelling of the code
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserNotFound => "UserNotFound",
            Self::UserGroupNotFound => "UserGroupNotFound",
            Self::ReplicationGroupNotFound => "ReplicationGroupNotFoundFault",
            Self::UserAlreadyExists => "UserAlreadyExists",
            Self::UserGroupAlreadyExists => "UserGroupAlreadyExists",
            Self::InvalidState => "InvalidState",
            Self::InvalidParameter => "InvalidParameterValue",
            Self::Throttling => "Throttling",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control-plane operations, used to label remote failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `CreateUser`
    CreateUser,
    /// `ModifyUser`
    ModifyUser,
    /// `DeleteUser`
    DeleteUser,
    /// `DescribeUsers`
    DescribeUsers,
    /// `CreateUserGroup`
    CreateUserGroup,
    /// `ModifyUserGroup`
    ModifyUserGroup,
    /// `DescribeUserGroups`
    DescribeUserGroups,
    /// `DescribeReplicationGroups`
    DescribeReplicationGroups,
    /// `ModifyReplicationGroup`
    ModifyReplicationGroup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateUser => "create-user",
            Self::ModifyUser => "modify-user",
            Self::DeleteUser => "delete-user",
            Self::DescribeUsers => "describe-users",
            Self::CreateUserGroup => "create-user-group",
            Self::ModifyUserGroup => "modify-user-group",
            Self::DescribeUserGroups => "describe-user-groups",
            Self::DescribeReplicationGroups => "describe-replication-groups",
            Self::ModifyReplicationGroup => "modify-replication-group",
        };
        f.write_str(name)
    }
}

/// Kinds of remote resources the orchestrators wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// An RBAC user
    User,
    /// A user group
    UserGroup,
    /// A replication group
    ReplicationGroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::UserGroup => "user group",
            Self::ReplicationGroup => "replication group",
        };
        f.write_str(name)
    }
}

/// Result alias for lifecycle operations
pub type Result<T> = std::result::Result<T, ElastiCacheError>;
