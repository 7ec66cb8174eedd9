//! Cache worker actor against a live mock origin

use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

use balloonpop_sync::client::OfflineCoordinator;
use balloonpop_sync::shared::config::{SyncConfig, DEFAULT_SYNC_TAG};
use balloonpop_sync::shared::message::{ClientMessage, WorkerMessage};
use balloonpop_sync::shared::storage::MemoryStore;
use balloonpop_sync::shared::Capabilities;
use balloonpop_sync::worker::{
    self, CacheManager, CacheStorage, HttpFetcher, Request, StaticAssetManifest, WorkerHandle,
    WorkerState,
};

use crate::common::{config_for, download_url, eventually, mount_asset, Harness};

const ASSETS: [(&str, &str); 4] = [
    ("/", "<html>root</html>"),
    ("/index.html", "<html>shell</html>"),
    ("/404.html", "<html>not found</html>"),
    ("/js/game.js", "startGame()"),
];

async fn origin() -> MockServer {
    let server = MockServer::builder().start().await;
    for (route, body) in ASSETS {
        mount_asset(&server, route, body).await;
    }
    server
}

fn spawn_worker(config: &SyncConfig) -> WorkerHandle {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    let manifest = StaticAssetManifest::new(
        ASSETS.iter().map(|(route, _)| route.to_string()).collect(),
        Vec::new(),
    );
    let manager = CacheManager::new(
        config,
        manifest,
        Arc::new(HttpFetcher::new(client, Duration::from_secs(2))),
        Arc::new(CacheStorage::new()),
    )
    .unwrap();
    worker::spawn(manager)
}

/// Stop the origin and wait until it refuses connections
async fn take_offline(server: MockServer) {
    let uri = server.uri();
    drop(server);
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    assert!(eventually(|| {
        let client = client.clone();
        let uri = uri.clone();
        async move { client.get(&uri).send().await.is_err() }
    })
    .await);
}

fn at(config: &SyncConfig, path: &str) -> String {
    format!("{}{}", config.app_scope.trim_end_matches('/'), path)
}

#[tokio::test]
async fn test_installed_worker_serves_offline() {
    let server = origin().await;
    let config = config_for(&server);
    let handle = spawn_worker(&config);
    assert_eq!(handle.state().await.unwrap(), WorkerState::Activated);

    let online = handle
        .fetch(Request::get(&at(&config, "/js/game.js")).unwrap())
        .await
        .unwrap();
    assert_eq!(online.text(), "startGame()");

    take_offline(server).await;

    let script = handle
        .fetch(Request::get(&at(&config, "/js/game.js")).unwrap())
        .await
        .unwrap();
    assert_eq!(script.text(), "startGame()");

    let play = handle
        .fetch(Request::navigate(&at(&config, "/play")).unwrap())
        .await
        .unwrap();
    assert_eq!(play.text(), "<html>shell</html>");

    let nested = handle
        .fetch(Request::navigate(&at(&config, "/levels/3")).unwrap())
        .await
        .unwrap();
    assert_eq!(nested.text(), "<html>not found</html>");

    let uncached = handle
        .fetch(Request::get(&at(&config, "/js/extra.js")).unwrap())
        .await
        .unwrap();
    assert_eq!(uncached.status(), 503);
}

#[tokio::test]
async fn test_cache_urls_message_stores_for_offline_use() {
    let server = origin().await;
    mount_asset(&server, "/levels.json", "[1,2,3]").await;
    let config = config_for(&server);
    let handle = spawn_worker(&config);

    handle
        .post_message(WorkerMessage::CacheUrls {
            urls: vec!["/levels.json".to_string()],
        })
        .await
        .unwrap();
    // The actor handles events in order, so this waits for the message.
    handle.state().await.unwrap();

    take_offline(server).await;

    let levels = handle
        .fetch(Request::get(&at(&config, "/levels.json")).unwrap())
        .await
        .unwrap();
    assert_eq!(levels.text(), "[1,2,3]");
}

#[tokio::test]
async fn test_failed_install_leaves_worker_redundant() {
    let server = MockServer::builder().start().await;
    mount_asset(&server, "/index.html", "<html>shell</html>").await;
    let config = config_for(&server);
    let handle = spawn_worker(&config);

    assert_eq!(handle.state().await.unwrap(), WorkerState::Redundant);
}

#[tokio::test]
async fn test_background_sync_drains_page_queue() {
    let server = origin().await;
    let config = config_for(&server);
    let handle = spawn_worker(&config);

    let harness = Harness::new(true, true);
    let coordinator = OfflineCoordinator::start(
        config.clone(),
        Capabilities::default(),
        harness.parts(Arc::new(MemoryStore::new())),
    )
    .await
    .unwrap();
    coordinator.attach_worker(handle.subscribe());
    coordinator
        .queue()
        .enqueue(&download_url("imgs/a.png"), "imgs/a.png")
        .await;

    assert_eq!(handle.fire_sync(DEFAULT_SYNC_TAG).await.unwrap(), 1);

    let objects = harness.objects.clone();
    assert!(eventually(|| {
        let objects = objects.clone();
        async move { objects.deleted() == vec!["imgs/a.png".to_string()] }
    })
    .await);
    assert!(coordinator.queue().is_empty().await);
}

#[tokio::test]
async fn test_reconnect_fires_background_sync() {
    let server = origin().await;
    let config = config_for(&server);
    let handle = spawn_worker(&config);
    let mut page = handle.subscribe();

    let harness = Harness::new(false, false);
    let coordinator = OfflineCoordinator::start(
        config.clone(),
        Capabilities::default(),
        harness.parts(Arc::new(MemoryStore::new())),
    )
    .await
    .unwrap();
    assert!(coordinator.register_background_sync(handle.clone()));

    coordinator.host_online();

    let message = tokio::time::timeout(Duration::from_secs(2), page.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message, ClientMessage::ProcessPendingDeletions);
}
