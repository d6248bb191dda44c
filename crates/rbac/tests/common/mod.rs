//! Shared fixtures for plugin integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use elasticache_rbac::prelude::*;
use elasticache_rbac::testing::InMemoryElastiCache;
use serde_json::{Map, Value, json};

pub const URL: &str = "master.my-cluster.abc123.use1.cache.amazonaws.com:6379";
pub const REPLICATION_GROUP: &str = "my-cluster";

pub fn config_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

pub fn config() -> Map<String, Value> {
    config_map(json!({
        "access_key_id": "AKIAEXAMPLE",
        "secret_access_key": "wJalrXUtnFEMI/K7MDENG",
        "url": URL,
        "region": "us-east-1",
    }))
}

static LOGGING: Once = Once::new();

/// Install the subscriber once per test binary; `ELASTICACHE_LOG=debug`
/// shows the lifecycle events.
pub fn init_logging() {
    LOGGING.call_once(|| {
        // The subscriber stays installed globally once the guard is dropped.
        let _ = elasticache_rbac_log::init_with(elasticache_rbac_log::Config::from_env());
    });
}

pub fn directory() -> InMemoryElastiCache {
    InMemoryElastiCache::new().with_replication_group(REPLICATION_GROUP)
}

pub async fn initialized_with(
    directory: &InMemoryElastiCache,
    config: Map<String, Value>,
) -> RedisElastiCache {
    init_logging();
    let plugin = RedisElastiCache::with_connector(Arc::new(directory.clone()));
    plugin
        .initialize(
            InitializeRequest {
                config,
                verify_connection: true,
            },
            &CancellationToken::new(),
        )
        .await
        .expect("initialize");
    plugin
}

pub async fn initialized(directory: &InMemoryElastiCache) -> RedisElastiCache {
    initialized_with(directory, config()).await
}

pub fn new_user_request(role: &str, commands: &[&str]) -> NewUserRequest {
    NewUserRequest {
        username_config: UsernameMetadata {
            display_name: "token".to_string(),
            role_name: role.to_string(),
        },
        statements: Statements {
            commands: commands.iter().map(|c| c.to_string()).collect(),
        },
        password: SecretString::new("initial-password-0123456789"),
        expiration: None,
    }
}
