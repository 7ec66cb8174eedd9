//! Property tests for pending deletion persistence

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use balloonpop_sync::client::offline::{
    storage_path_from_url, PendingDeletion, PendingDeletionQueue, RemoteDeletionClient,
};
use balloonpop_sync::client::sync::network_monitor::{HostLink, NetworkProbe};
use balloonpop_sync::client::StatusBroadcaster;
use balloonpop_sync::shared::config::SyncConfig;
use balloonpop_sync::shared::storage::{KeyValueStore, MemoryStore};

use crate::common::{CountingOverlay, InMemoryConnector, InMemoryObjectStore, SwitchTransport};

async fn load(config: &SyncConfig, store: Arc<MemoryStore>) -> PendingDeletionQueue {
    let probe = NetworkProbe::new(
        config,
        true,
        Arc::new(SwitchTransport::new(false)),
        Arc::new(HostLink::new(false)),
    );
    let status = Arc::new(StatusBroadcaster::new(
        Arc::new(probe),
        Arc::new(CountingOverlay::default()),
    ));
    let remote = Arc::new(RemoteDeletionClient::new(Arc::new(InMemoryConnector(
        InMemoryObjectStore::new(),
    ))));
    PendingDeletionQueue::load(config, store, remote, status).await
}

fn arb_item() -> impl Strategy<Value = PendingDeletion> {
    (
        "[a-z0-9]{1,12}",
        0u32..5,
        0i64..4_102_444_800_000,
    )
        .prop_map(|(name, attempts, millis)| {
            let path = format!("images/{}.png", name);
            PendingDeletion {
                id: Uuid::new_v4(),
                source_reference: format!(
                    "https://firebasestorage.googleapis.com/v0/b/app/o/images%2F{}.png?alt=media",
                    name
                ),
                remote_target: path,
                queued_at: Utc.timestamp_millis_opt(millis).unwrap(),
                attempts,
            }
        })
}

proptest! {
    #[test]
    fn prop_reload_preserves_order_and_attempts(items in prop::collection::vec(arb_item(), 0..16)) {
        tokio_test::block_on(async {
            let config = SyncConfig::default();
            let store = Arc::new(MemoryStore::new());
            store
                .set(&config.queue_storage_key, &serde_json::to_string(&items).unwrap())
                .await
                .unwrap();

            let first = load(&config, store.clone()).await;
            assert_eq!(first.snapshot().await, items);

            first.enqueue("https://example.com/extra.png", "extra.png").await;
            let second = load(&config, store).await;
            let reloaded = second.snapshot().await;

            assert_eq!(reloaded.len(), items.len() + 1);
            assert_eq!(&reloaded[..items.len()], &items[..]);
            assert_eq!(reloaded[items.len()].remote_target, "extra.png");
            assert_eq!(reloaded[items.len()].attempts, 0);
        });
    }

    #[test]
    fn prop_storage_path_decodes_object_name(segments in prop::collection::vec("[a-zA-Z0-9_-]{1,8}", 1..4)) {
        let path = segments.join("/");
        let url = format!(
            "https://firebasestorage.googleapis.com/v0/b/app/o/{}?alt=media&token=t",
            segments.join("%2F")
        );

        prop_assert_eq!(storage_path_from_url(&url), Some(path));
    }

    #[test]
    fn prop_foreign_urls_are_not_storage_paths(host in "[a-z]{1,10}\\.(com|net|org)", name in "[a-z]{1,10}") {
        let url = format!("https://{}/o/{}.png", host, name);

        prop_assert_eq!(storage_path_from_url(&url), None);
    }
}
