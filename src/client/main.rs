/**
 * Balloon Pop Sync Entry Point
 *
 * Runs the offline layer headless: the page-side coordinator and, where the
 * host supports it, the background cache worker. Stops on Ctrl-C.
 *
 * Usage: balloonpop-sync [config.toml]
 */
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use balloonpop_sync::client::offline::FirebaseConnector;
use balloonpop_sync::client::sync::network_monitor::{
    HostLink, HttpProbeTransport, ProbeTransport, WorkerProbeTransport,
};
use balloonpop_sync::client::sync::overlay::TracingOverlay;
use balloonpop_sync::client::sync::{CoordinatorParts, OfflineCoordinator};
use balloonpop_sync::shared::{Capabilities, FileStore, SyncConfig};
use balloonpop_sync::worker::{self, CacheManager, CacheStorage, HttpFetcher, StaticAssetManifest};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SyncConfig::load(config_path.as_deref())?;
    let capabilities = Capabilities::detect();
    tracing::info!(
        "[Startup] Platform {:?}, storage at {}",
        capabilities.platform,
        config.storage_dir.display()
    );

    let client = reqwest::Client::builder().build()?;
    let worker = if capabilities.service_worker && capabilities.cache_storage {
        let fetcher = Arc::new(HttpFetcher::new(client.clone(), FETCH_TIMEOUT));
        let manager = CacheManager::new(
            &config,
            StaticAssetManifest::balloon_pop(),
            fetcher,
            Arc::new(CacheStorage::new()),
        )?;
        Some(worker::spawn(manager))
    } else {
        tracing::info!("[Startup] Host has no cache worker support, running page side only");
        None
    };

    let transport: Arc<dyn ProbeTransport> = match &worker {
        Some(handle) => Arc::new(WorkerProbeTransport::new(handle.clone())),
        None => Arc::new(HttpProbeTransport::new(client)),
    };
    let parts = CoordinatorParts {
        store: Arc::new(FileStore::open(&config.storage_dir).await?),
        transport,
        link: Arc::new(HostLink::new(true)),
        connector: Arc::new(FirebaseConnector::new(&config)),
        overlay: Arc::new(TracingOverlay),
    };
    let coordinator = OfflineCoordinator::start(config.clone(), capabilities, parts).await?;
    coordinator.confirm_connectivity().await;

    if let Some(handle) = &worker {
        coordinator.attach_worker(handle.subscribe());
        coordinator.register_background_sync(handle.clone());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("[Startup] Shutting down");

    coordinator.shutdown();
    if let Some(worker) = worker {
        worker.shutdown().await;
    }
    Ok(())
}
