//! Create, rotate and delete against the in-memory directory

mod common;

use std::time::Duration;

use common::*;
use elasticache_rbac::client::{CreateUserRequest, ResourceStatus};
use elasticache_rbac::core::ResourceKind;
use elasticache_rbac::prelude::*;
use elasticache_rbac::database::ChangePassword;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_first_user_bootstraps_user_group() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    let created = plugin
        .new_user(
            new_user_request("reader", &[r#"["~cache:*", "+@read"]"#]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(created.username.starts_with("v_token_reader_"));
    let user_id = normalize(&created.username);

    let user = directory.user(user_id.as_str()).unwrap();
    assert_eq!(user.user_name, created.username);
    assert_eq!(user.access_string, "on ~cache:* +@read");

    let group = directory.user_group(REPLICATION_GROUP).unwrap();
    assert_eq!(group.user_ids, vec!["default".to_string(), user_id.to_string()]);
    assert_eq!(group.replication_groups, vec![REPLICATION_GROUP.to_string()]);

    let rg = directory.replication_group(REPLICATION_GROUP).unwrap();
    assert_eq!(rg.user_group_ids, vec![REPLICATION_GROUP.to_string()]);
    assert_eq!(directory.calls(Operation::CreateUserGroup), 1);
}

#[tokio::test(start_paused = true)]
async fn test_later_users_join_the_same_group() {
    let directory = directory();
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let mut ids = Vec::new();
    for role in ["first", "second", "third"] {
        let created = plugin
            .new_user(new_user_request(role, &[]), &cancel)
            .await
            .unwrap();
        ids.push(normalize(&created.username));
    }

    assert_eq!(directory.user_group_ids(), vec![REPLICATION_GROUP.to_string()]);
    assert_eq!(directory.calls(Operation::CreateUserGroup), 1);
    assert_eq!(directory.calls(Operation::ModifyUserGroup), 2);
    assert_eq!(directory.calls(Operation::ModifyReplicationGroup), 1);

    let group = directory.user_group(REPLICATION_GROUP).unwrap();
    assert!(group.user_ids.iter().any(|id| id == "default"));
    for id in &ids {
        assert!(group.has_member(id), "{id} missing from {:?}", group.user_ids);
    }
}

#[tokio::test(start_paused = true)]
async fn test_default_access_string() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    let created = plugin
        .new_user(new_user_request("reader", &[]), &CancellationToken::new())
        .await
        .unwrap();

    let user = directory.user(normalize(&created.username).as_str()).unwrap();
    assert_eq!(user.access_string, "on ~* +@read");
}

#[tokio::test(start_paused = true)]
async fn test_forbidden_statement_creates_nothing() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    let err = plugin
        .new_user(
            new_user_request("reader", &[r#"["off", "+@all"]"#]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ElastiCacheError::Grammar(GrammarError::Forbidden)));
    assert_eq!(directory.calls(Operation::CreateUser), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_waits_until_user_is_active() {
    let directory = directory();
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let created = plugin
        .new_user(new_user_request("rotate", &[]), &cancel)
        .await
        .unwrap();
    let user_id = normalize(&created.username);

    let rotate = |password: &str| UpdateUserRequest {
        username: created.username.clone(),
        password: Some(ChangePassword {
            new_password: SecretString::new(password),
            statements: Statements::default(),
        }),
        expiration: None,
    };

    plugin.update_user(rotate("second-password"), &cancel).await.unwrap();
    assert_eq!(
        directory.user(user_id.as_str()).unwrap().status,
        ResourceStatus::Modifying
    );

    let started = Instant::now();
    plugin.update_user(rotate("third-password"), &cancel).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(3));

    let passwords = directory.user_passwords(user_id.as_str());
    assert_eq!(passwords.len(), 1);
    passwords[0].expose_secret(|p| assert_eq!(p, "third-password"));
    assert_eq!(directory.calls(Operation::ModifyUser), 2);
}

#[tokio::test(start_paused = true)]
async fn test_update_without_password_is_a_no_op() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    plugin
        .update_user(
            UpdateUserRequest {
                username: "v_token_reader_whatever_1".to_string(),
                password: None,
                expiration: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(directory.calls(Operation::ModifyUser), 0);
    assert_eq!(directory.calls(Operation::DescribeUsers), 1);
}

#[tokio::test(start_paused = true)]
async fn test_update_missing_user_fails() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    let err = plugin
        .update_user(
            UpdateUserRequest {
                username: "v_token_gone_1".to_string(),
                password: Some(ChangePassword {
                    new_password: SecretString::new("password"),
                    statements: Statements::default(),
                }),
                expiration: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.remote_code(), Some(&ErrorCode::UserNotFound));
    assert_eq!(directory.calls(Operation::ModifyUser), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_of_unsettled_user_times_out() {
    let directory = directory().with_settle_after(1_000);
    directory
        .create_user(CreateUserRequest {
            user_id: normalize("v_token_pending_1"),
            user_name: "v_token_pending_1".to_string(),
            access_string: AccessString::read_only(),
            passwords: vec![SecretString::new("initial-password-0123456789")],
        })
        .await
        .unwrap();
    let mut config = config();
    config.insert("poll_max_attempts".into(), serde_json::json!(3));
    let plugin = initialized_with(&directory, config).await;

    let err = plugin
        .update_user(
            UpdateUserRequest {
                username: "v_token_pending_1".to_string(),
                password: Some(ChangePassword {
                    new_password: SecretString::new("rotated-password"),
                    statements: Statements::default(),
                }),
                expiration: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ElastiCacheError::NeverActive {
            kind: ResourceKind::User,
            attempts: 3,
            ..
        }
    ));
    assert_eq!(directory.calls(Operation::ModifyUser), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_user() {
    let directory = directory();
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let created = plugin
        .new_user(new_user_request("short-lived", &[]), &cancel)
        .await
        .unwrap();
    let user_id = normalize(&created.username);

    plugin
        .delete_user(DeleteUserRequest::new(created.username.clone()), &cancel)
        .await
        .unwrap();
    assert_eq!(
        directory.user(user_id.as_str()).unwrap().status,
        ResourceStatus::Deleting
    );

    // Already on its way out: nothing left to do.
    plugin
        .delete_user(DeleteUserRequest::new(created.username), &cancel)
        .await
        .unwrap();
    assert_eq!(directory.calls(Operation::DeleteUser), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_missing_user_succeeds() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    plugin
        .delete_user(
            DeleteUserRequest::new("v_token_never-existed_1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(directory.calls(Operation::DeleteUser), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_tolerates_concurrent_removal() {
    let directory = directory();
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let created = plugin
        .new_user(new_user_request("raced", &[]), &cancel)
        .await
        .unwrap();
    directory.fail_next(Operation::DeleteUser, ErrorCode::UserNotFound);

    plugin
        .delete_user(DeleteUserRequest::new(created.username), &cancel)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delete_stops_waiting_once_user_is_gone() {
    let directory = directory();
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let created = plugin
        .new_user(new_user_request("vanishing", &[]), &cancel)
        .await
        .unwrap();
    // The first lookup fails outright, the user is gone by the next one.
    directory.fail_next(Operation::DescribeUsers, ErrorCode::Throttling);
    directory.fail_next(Operation::DescribeUsers, ErrorCode::UserNotFound);

    let started = Instant::now();
    plugin
        .delete_user(DeleteUserRequest::new(created.username), &cancel)
        .await
        .unwrap();

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(directory.calls(Operation::DeleteUser), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_reports_other_failures() {
    let directory = directory();
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let created = plugin
        .new_user(new_user_request("stuck", &[]), &cancel)
        .await
        .unwrap();
    directory.fail_next(Operation::DeleteUser, ErrorCode::Throttling);

    let err = plugin
        .delete_user(DeleteUserRequest::new(created.username), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ElastiCacheError::Remote {
            operation: Operation::DeleteUser,
            ..
        }
    ));
    assert_eq!(err.remote_code(), Some(&ErrorCode::Throttling));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_delete_stops_waiting() {
    let directory = directory().with_settle_after(5);
    let plugin = initialized(&directory).await;
    let cancel = CancellationToken::new();

    let created = plugin
        .new_user(new_user_request("busy", &[]), &cancel)
        .await
        .unwrap();
    plugin
        .update_user(
            UpdateUserRequest {
                username: created.username.clone(),
                password: Some(ChangePassword {
                    new_password: SecretString::new("rotated-password"),
                    statements: Statements::default(),
                }),
                expiration: None,
            },
            &cancel,
        )
        .await
        .unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = plugin
        .delete_user(DeleteUserRequest::new(created.username), &cancelled)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ElastiCacheError::Cancelled {
            operation: Operation::DeleteUser,
            ..
        }
    ));
    assert_eq!(directory.calls(Operation::DeleteUser), 0);
}
