//! Offline deletion flows through the coordinator and the file store

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

use balloonpop_sync::client::offline::{DeletionOutcome, DrainReport, PendingDeletion};
use balloonpop_sync::client::sync::overlay::ToastKind;
use balloonpop_sync::client::{ConnectionStatus, OfflineCoordinator};
use balloonpop_sync::shared::config::{SyncConfig, DEFAULT_QUEUE_KEY};
use balloonpop_sync::shared::storage::FileStore;
use balloonpop_sync::shared::{Capabilities, Platform};

use crate::common::{download_url, eventually, Harness};

fn config_in(dir: &Path) -> SyncConfig {
    SyncConfig::builder()
        .storage_dir(dir)
        .build()
        .expect("valid test configuration")
}

async fn start(harness: &Harness, dir: &Path, capabilities: Capabilities) -> OfflineCoordinator {
    let store = Arc::new(FileStore::open(dir).await.unwrap());
    OfflineCoordinator::start(config_in(dir), capabilities, harness.parts(store))
        .await
        .unwrap()
}

fn persisted(dir: &Path) -> Vec<PendingDeletion> {
    let raw = std::fs::read_to_string(dir.join(format!("{}.json", DEFAULT_QUEUE_KEY))).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_deletion_survives_restart_and_drains() {
    let dir = TempDir::new().unwrap();

    let offline = Harness::new(false, false);
    let coordinator = start(&offline, dir.path(), Capabilities::default()).await;
    assert_eq!(coordinator.status().status(), ConnectionStatus::Offline);

    let outcome = coordinator.delete_image(&download_url("imgs/a.png")).await;
    assert_eq!(outcome, DeletionOutcome::Queued);
    assert_eq!(persisted(dir.path()).len(), 1);
    assert_eq!(offline.objects.calls(), 0);
    coordinator.shutdown();
    drop(coordinator);

    let online = Harness::new(true, true);
    let coordinator = start(&online, dir.path(), Capabilities::default()).await;

    let queue = coordinator.queue().clone();
    assert!(eventually(|| {
        let queue = queue.clone();
        async move { queue.is_empty().await }
    })
    .await);
    assert_eq!(online.objects.deleted(), vec!["imgs/a.png".to_string()]);
    assert!(persisted(dir.path()).is_empty());
}

#[tokio::test]
async fn test_reconnect_drains_queue() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(false, false);
    let coordinator = start(&harness, dir.path(), Capabilities::default()).await;

    coordinator.delete_image(&download_url("imgs/a.png")).await;
    coordinator.delete_image(&download_url("imgs/b.png")).await;
    assert_eq!(harness.overlay.shown.load(Ordering::SeqCst), 1);

    harness.transport.set(true);
    coordinator.host_online();

    let objects = harness.objects.clone();
    assert!(eventually(|| {
        let objects = objects.clone();
        async move { objects.deleted().len() == 2 }
    })
    .await);
    assert_eq!(
        harness.objects.deleted(),
        vec!["imgs/a.png".to_string(), "imgs/b.png".to_string()]
    );
    assert_eq!(harness.overlay.hidden.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manual_retry_on_unreliable_host() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(false, true);
    let capabilities = Capabilities::for_platform(Platform::NativeShell);
    let coordinator = start(&harness, dir.path(), capabilities).await;
    coordinator.delete_image(&download_url("imgs/a.png")).await;

    assert!(coordinator.retry_connection().await);
    assert!(coordinator.status().is_online());

    let toasts = harness.overlay.toasts.lock().unwrap().clone();
    assert_eq!(toasts, vec![("Connection restored!".to_string(), ToastKind::Success)]);

    let queue = coordinator.queue().clone();
    assert!(eventually(|| {
        let queue = queue.clone();
        async move { queue.is_empty().await }
    })
    .await);
}

#[tokio::test]
async fn test_persistent_failure_is_dropped_after_five_attempts() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(true, true);
    harness.objects.set_failing(true);
    let coordinator = start(&harness, dir.path(), Capabilities::default()).await;

    let outcome = coordinator.delete_image(&download_url("imgs/a.png")).await;
    assert_eq!(outcome, DeletionOutcome::Queued);

    for attempt in 1..5 {
        let report = coordinator.queue().drain().await;
        assert_eq!(report.retained, 1);
        assert_eq!(persisted(dir.path())[0].attempts, attempt);
    }

    let report = coordinator.queue().drain().await;
    assert_eq!(
        report,
        DrainReport {
            attempted: 1,
            deleted: 0,
            retained: 0,
            dropped: 1,
        }
    );
    assert!(persisted(dir.path()).is_empty());
}

#[tokio::test]
async fn test_already_deleted_object_leaves_queue() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(false, false);
    harness.objects.mark_missing("imgs/gone.png");
    let coordinator = start(&harness, dir.path(), Capabilities::default()).await;
    coordinator.delete_image(&download_url("imgs/gone.png")).await;

    harness.transport.set(true);
    coordinator.host_online();

    let queue = coordinator.queue().clone();
    assert!(eventually(|| {
        let queue = queue.clone();
        async move { queue.is_empty().await }
    })
    .await);
    assert!(harness.objects.deleted().is_empty());
    assert_eq!(harness.objects.calls(), 1);
}

#[tokio::test]
async fn test_non_storage_url_is_ignored() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(true, true);
    let coordinator = start(&harness, dir.path(), Capabilities::default()).await;

    let outcome = coordinator.delete_image("data:image/png;base64,AAAA").await;

    assert_eq!(outcome, DeletionOutcome::NotApplicable);
    assert!(coordinator.queue().is_empty().await);
    assert_eq!(harness.objects.calls(), 0);
}
