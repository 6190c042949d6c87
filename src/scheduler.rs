//! Fixed-cadence loops with cooperative shutdown

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Run `cycle` every `period` until `shutdown` flips (or its sender goes away)
///
/// Shutdown is only observed between cycles: a cycle that has started always
/// runs to completion. Late ticks are skipped rather than bunched up.
pub async fn run_every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut cycle: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        cycle().await;
    }
}
