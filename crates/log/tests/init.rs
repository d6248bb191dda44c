//! Global subscriber installation
//!
//! Kept as a single test: the subscriber is process-global and each file under
//! `tests/` runs in its own process.

use elasticache_rbac_log::{Config, Format, LogError, info};

#[test]
fn test_install_once_then_reject() {
    let config = Config {
        level: "debug".to_string(),
        format: Format::Json,
        ..Config::default()
    }
    .with_service("elasticache-rbac");

    let guard = elasticache_rbac_log::init_with(config).expect("first install succeeds");
    info!(user_id = "vdisplrole", "logger installed");

    let second = elasticache_rbac_log::init();
    assert!(matches!(second, Err(LogError::AlreadyInitialized)));

    drop(guard);
}
