//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 乐观切换集成测试

#[path = "../common/mod.rs"]
mod common;

use carecache::config::ConflictPolicy;
use carecache::model::{CachedValue, DirectoryEntry, DirectoryListing};
use carecache::{
    CacheError, Config, MutationOutcome, QueryCache, QueryCacheExt, RemoteError, RemoteErrorKind,
    Scope,
};
use common::{login_directory, setup_manager, unique_principal, MockResidentService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn residents() -> Vec<DirectoryEntry> {
    vec![
        DirectoryEntry::new("A", true).with_field("name", "Ada"),
        DirectoryEntry::new("B", true).with_field("name", "Bo"),
    ]
}

async fn cached_listing(cache: &Arc<dyn QueryCache>, key: &str) -> Option<DirectoryListing> {
    cache
        .get::<CachedValue>(key)
        .await
        .unwrap()
        .and_then(CachedValue::into_listing)
}

/// 成功切换：服务端确认后失效，下一次读取拿到服务端真值
#[tokio::test]
async fn test_toggle_success_converges_to_server() {
    let manager = setup_manager(Config::default());
    let service = MockResidentService::with_residents(residents());
    let principal = unique_principal("alice");
    let (directory, _identity) = login_directory(&manager, service.clone(), Some(&principal));

    let before = directory.directory().await.unwrap();
    assert!(before.find("A").unwrap().active);

    let confirmed = directory.toggle_resident_status("A").await.unwrap();
    assert!(!confirmed.active);

    let key = manager
        .coordinator()
        .namespace_for(Some(&principal), Scope::Directory, None)
        .key();
    assert!(manager.cache().is_stale(&key).await.unwrap());

    let after = directory.directory().await.unwrap();
    assert!(!after.find("A").unwrap().active);
    assert!(after.find("B").unwrap().active);
    assert_eq!(service.directory_calls.load(Ordering::SeqCst), 2);
}

/// 失败切换：回滚到切换前的值，并把原始远程错误交给调用方
#[tokio::test]
async fn test_toggle_failure_rolls_back_and_propagates() {
    let manager = setup_manager(Config::default());
    let service = MockResidentService::with_residents(residents());
    let principal = unique_principal("alice");
    let (directory, _identity) = login_directory(&manager, service.clone(), Some(&principal));

    directory.directory().await.unwrap();
    let key = manager
        .coordinator()
        .namespace_for(Some(&principal), Scope::Directory, None)
        .key();
    let before = cached_listing(manager.cache(), &key).await;

    service.fail_writes_with(Some(RemoteError::unauthorized("not permitted")));
    let err = directory.toggle_resident_status("A").await.unwrap_err();

    match err {
        CacheError::MutationFailed(remote) => {
            assert_eq!(remote.kind, RemoteErrorKind::Unauthorized);
            assert_eq!(remote.message, "not permitted");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(cached_listing(manager.cache(), &key).await, before);
    assert!(manager.cache().is_stale(&key).await.unwrap());
    assert!(service.server_entry("A").unwrap().active);
}

/// 切换进行中，缓存里已经是修补后的值
#[tokio::test]
async fn test_patch_visible_while_call_in_flight() {
    let manager = setup_manager(Config::default());
    let service = MockResidentService::with_residents(residents());
    let principal = unique_principal("alice");
    let (directory, _identity) = login_directory(&manager, service.clone(), Some(&principal));
    let directory = Arc::new(directory);

    directory.directory().await.unwrap();
    service.set_toggle_delay(Duration::from_millis(200));

    let task = {
        let directory = directory.clone();
        tokio::spawn(async move { directory.toggle_resident_status("A").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let key = manager
        .coordinator()
        .namespace_for(Some(&principal), Scope::Directory, None)
        .key();
    let patched = cached_listing(manager.cache(), &key).await.unwrap();
    assert!(!patched.find("A").unwrap().active);
    assert!(patched.find("B").unwrap().active);

    task.await.unwrap().unwrap();
}

/// 缓存未命中：空快照，不修补也不回滚
#[tokio::test]
async fn test_cache_miss_is_noop() {
    let manager = setup_manager(Config::default());
    let coordinator = manager.coordinator();
    let ns = coordinator.namespace_for(Some("nobody"), Scope::Directory, None);

    let snapshot = coordinator.begin_optimistic_toggle(&ns, "A").await.unwrap();
    assert!(snapshot.is_empty());
    coordinator
        .commit_or_rollback(snapshot, MutationOutcome::Failure)
        .await
        .unwrap();

    let value: Option<CachedValue> = manager.cache().get(&ns.key()).await.unwrap();
    assert!(value.is_none());
}

/// 开始后立即以失败结算，缓存值与开始前完全相同
#[tokio::test]
async fn test_begin_then_rollback_restores_exact_value() {
    let manager = setup_manager(Config::default());
    let coordinator = manager.coordinator();
    let ns = coordinator.namespace_for(Some(&unique_principal("p")), Scope::Directory, None);
    let original = CachedValue::Listing(DirectoryListing::new(residents()));
    manager.cache().set(&ns.key(), &original).await.unwrap();

    let snapshot = coordinator.begin_optimistic_toggle(&ns, "B").await.unwrap();
    assert_eq!(snapshot.previous_value(), Some(&original));
    coordinator
        .commit_or_rollback(snapshot, MutationOutcome::Failure)
        .await
        .unwrap();

    let restored: Option<CachedValue> = manager.cache().get(&ns.key()).await.unwrap();
    assert_eq!(restored, Some(original));
}

/// 默认策略下，同一实体的第二个并发切换被拒绝
#[tokio::test]
async fn test_concurrent_toggle_rejected() {
    let manager = setup_manager(Config::default());
    let service = MockResidentService::with_residents(residents());
    let principal = unique_principal("alice");
    let (directory, _identity) = login_directory(&manager, service.clone(), Some(&principal));
    let directory = Arc::new(directory);

    directory.directory().await.unwrap();
    service.set_toggle_delay(Duration::from_millis(200));

    let first = {
        let directory = directory.clone();
        tokio::spawn(async move { directory.toggle_resident_status("A").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = directory.toggle_resident_status("A").await;
    assert!(matches!(second, Err(CacheError::MutationInProgress(ref id)) if id == "A"));

    // 其他实体不受影响
    service.set_toggle_delay(Duration::ZERO);
    directory.toggle_resident_status("B").await.unwrap();

    first.await.unwrap().unwrap();
    assert_eq!(service.toggle_calls.load(Ordering::SeqCst), 2);
}

/// 排队策略下，第二个切换等待第一个结算后执行
#[tokio::test]
async fn test_concurrent_toggle_queued() {
    let mut config = Config::default();
    config.mutation.conflict_policy = ConflictPolicy::Queue;
    let manager = setup_manager(config);
    let service = MockResidentService::with_residents(residents());
    let principal = unique_principal("alice");
    let (directory, _identity) = login_directory(&manager, service.clone(), Some(&principal));
    let directory = Arc::new(directory);

    directory.directory().await.unwrap();
    service.set_toggle_delay(Duration::from_millis(100));

    let first = {
        let directory = directory.clone();
        tokio::spawn(async move { directory.toggle_resident_status("A").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = directory.toggle_resident_status("A").await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert!(!first.active);
    assert!(second.active);
    assert_eq!(service.toggle_calls.load(Ordering::SeqCst), 2);

    let listing = directory.directory().await.unwrap();
    assert!(listing.find("A").unwrap().active);
}
