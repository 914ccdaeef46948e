//! Async testing utilities

#![allow(clippy::missing_panics_doc)]

use std::future::Future;
use std::time::Duration;

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns whether the condition was observed to hold.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    condition().await
}
