//! Bounded polling waits

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::errors::WaitTimeout;

/// Pause between two evaluations of a wait condition.
pub const POLL_STEP: Duration = Duration::from_millis(100);

/// Polls `condition` until it reports `true` or `timeout` elapses.
///
/// The condition is evaluated at least once, so a zero timeout still
/// observes the current state.
pub async fn wait_until<F, Fut>(
    what: &str,
    timeout: Duration,
    mut condition: F,
) -> Result<(), WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            debug!(what, ?timeout, "wait timed out");
            return Err(WaitTimeout {
                what: what.to_string(),
                timeout,
            });
        }
        sleep(POLL_STEP.min(deadline - now)).await;
    }
}
