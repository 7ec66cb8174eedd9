//! Custom assertion helpers for tests

use std::future::Future;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const POLL_LIMIT: usize = 300;

/// Poll `check` until it holds or roughly three seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..POLL_LIMIT {
        if check().await {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}
