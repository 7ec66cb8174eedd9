//! Remote deletion against a mock object store REST API

use assert_matches::assert_matches;
use std::sync::Arc;

use balloonpop_sync::client::offline::{DeleteOutcome, FirebaseConnector, RemoteDeletionClient};
use balloonpop_sync::shared::config::SyncConfig;
use balloonpop_sync::shared::error::SyncError;

use crate::common::{config_for, mount_delete, start_server};

fn client_for(config: &SyncConfig) -> RemoteDeletionClient {
    RemoteDeletionClient::new(Arc::new(FirebaseConnector::new(config)))
}

#[tokio::test]
async fn test_delete_existing_object() {
    let server = start_server().await;
    mount_delete(&server, "imgs%2Fa.png", 204).await;

    let client = client_for(&config_for(&server));
    let outcome = client.delete_remote("imgs/a.png").await;

    assert_matches!(outcome, Ok(DeleteOutcome::Deleted));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_object_counts_as_deleted() {
    let server = start_server().await;
    mount_delete(&server, "imgs%2Fgone.png", 404).await;

    let client = client_for(&config_for(&server));
    let outcome = client.delete_remote("imgs/gone.png").await;

    assert_matches!(outcome, Ok(DeleteOutcome::AlreadyAbsent));
}

#[tokio::test]
async fn test_forbidden_is_an_error() {
    let server = start_server().await;
    mount_delete(&server, "imgs%2Fa.png", 403).await;

    let client = client_for(&config_for(&server));
    let outcome = client.delete_remote("imgs/a.png").await;

    assert_matches!(outcome, Err(SyncError::Remote { code, .. }) if code == "storage/unauthorized");
}

#[tokio::test]
async fn test_server_error_is_an_error() {
    let server = start_server().await;
    mount_delete(&server, "imgs%2Fa.png", 500).await;

    let client = client_for(&config_for(&server));
    let outcome = client.delete_remote("imgs/a.png").await;

    assert_matches!(outcome, Err(SyncError::Remote { code, .. }) if code == "storage/unknown");
}

#[tokio::test]
async fn test_connection_is_reused() {
    let server = start_server().await;
    mount_delete(&server, "a.png", 204).await;
    mount_delete(&server, "b.png", 204).await;

    let client = client_for(&config_for(&server));
    assert!(client.delete_remote("a.png").await.is_ok());
    assert!(client.delete_remote("b.png").await.is_ok());

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_bucket_fails_to_connect() {
    let config = SyncConfig::default();
    let client = client_for(&config);

    let outcome = client.delete_remote("imgs/a.png").await;

    assert_matches!(outcome, Err(SyncError::NotConfigured { .. }));
}
