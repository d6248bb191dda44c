//! Plugin initialization and session handling

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use elasticache_rbac::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_operations_before_initialize() {
    let plugin = RedisElastiCache::with_connector(Arc::new(directory()));
    let cancel = CancellationToken::new();

    assert!(!plugin.is_initialized());
    let err = plugin
        .new_user(new_user_request("reader", &[]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ElastiCacheError::NotInitialized));

    let err = plugin
        .delete_user(DeleteUserRequest::new("v_token_reader_x_1"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ElastiCacheError::NotInitialized));
}

#[tokio::test]
async fn test_type_name() {
    let plugin = RedisElastiCache::with_connector(Arc::new(directory()));
    assert_eq!(plugin.type_name(), "redisElastiCache");
    assert_eq!(elasticache_rbac::TYPE_NAME, plugin.type_name());
}

#[tokio::test]
async fn test_initialize_echoes_config() {
    let directory = directory();
    let plugin = RedisElastiCache::with_connector(Arc::new(directory.clone()));

    let response = plugin
        .initialize(
            InitializeRequest {
                config: config(),
                verify_connection: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.config, config());
    assert!(plugin.is_initialized());
    assert_eq!(directory.calls(Operation::DescribeUsers), 0);
}

#[tokio::test]
async fn test_initialize_accepts_deprecated_aliases() {
    let directory = directory();
    let plugin = initialized_with(
        &directory,
        config_map(json!({
            "username": "AKIAOLD",
            "password": "old-secret",
            "url": URL,
            "region": "eu-west-1",
            "poll_max_attempts": "10",
            "poll_interval": 2,
        })),
    )
    .await;

    let config = plugin.config().unwrap();
    config.access_key_id.expose_secret(|s| assert_eq!(s, "AKIAOLD"));
    config.secret_access_key.expose_secret(|s| assert_eq!(s, "old-secret"));
    assert_eq!(
        config.poll_policy(),
        PollPolicy {
            max_attempts: 10,
            interval: Duration::from_secs(2),
        }
    );
}

#[tokio::test]
async fn test_initialize_rejects_incomplete_config() {
    let plugin = RedisElastiCache::with_connector(Arc::new(directory()));
    let mut config = config();
    config.remove("region");

    let err = plugin
        .initialize(
            InitializeRequest {
                config,
                verify_connection: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ElastiCacheError::Config(ConfigError::MissingRequired { field: "region" })
    ));
    assert!(!plugin.is_initialized());
}

#[tokio::test]
async fn test_initialize_rejects_url_without_cluster_label() {
    let plugin = RedisElastiCache::with_connector(Arc::new(directory()));
    let mut config = config();
    config.insert("url".into(), json!("localhost:6379"));

    let err = plugin
        .initialize(
            InitializeRequest {
                config,
                verify_connection: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ElastiCacheError::Config(ConfigError::InvalidValue { field: "url", .. })
    ));
}

#[tokio::test]
async fn test_verify_connection_failure() {
    let directory = directory();
    directory.fail_next(
        Operation::DescribeUsers,
        ErrorCode::from_code("InvalidClientTokenId"),
    );
    let plugin = RedisElastiCache::with_connector(Arc::new(directory.clone()));

    let err = plugin
        .initialize(
            InitializeRequest {
                config: config(),
                verify_connection: true,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ElastiCacheError::Config(ConfigError::Connect(remote)) => {
            assert_eq!(remote.code.as_str(), "InvalidClientTokenId");
        }
        other => panic!("expected a connection failure, got {other:?}"),
    }
    assert!(!plugin.is_initialized());
}

#[tokio::test]
async fn test_reinitialize_rebinds_config() {
    let directory = directory();
    let plugin = initialized(&directory).await;

    let mut config = config();
    config.insert(
        "url".into(),
        json!("master.other-cluster.abc123.use1.cache.amazonaws.com:6379"),
    );
    plugin
        .initialize(
            InitializeRequest {
                config,
                verify_connection: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(plugin.config().unwrap().url.contains("other-cluster"));
}

#[tokio::test]
async fn test_close_drops_session() {
    let plugin = initialized(&directory()).await;
    assert!(plugin.is_initialized());

    plugin.close().await.unwrap();
    assert!(!plugin.is_initialized());

    let err = plugin
        .new_user(new_user_request("reader", &[]), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ElastiCacheError::NotInitialized));
}
