//! Background sweep worker.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, trace};

use super::store::Shared;

/// Drive periodic sweeps for one cache instance.
///
/// The worker parks on the cache's wake signal for as long as the cache is
/// empty, so an idle cache costs nothing. Once woken it sweeps every
/// `sweep_interval` until a pass leaves the map empty, then parks again.
/// The task runs until the owning [`Cache`](super::Cache) aborts it on drop.
pub(super) async fn run<V>(shared: Arc<Shared<V>>) {
    loop {
        while !shared.is_active() {
            trace!("Cache empty, sweeper parked");
            shared.wake.notified().await;
        }

        tokio::time::sleep(shared.sweep_interval).await;

        let (removed, left) = shared.sweep(Instant::now());
        if removed > 0 {
            debug!(removed = removed, remaining = left, "Swept expired cache entries");
        }
    }
}
