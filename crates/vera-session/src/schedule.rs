//! Recurring timers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Run `tick` every `period`, first one period from now, until the returned
/// task is aborted.
///
/// Late ticks are delayed rather than bunched up. Must be called inside a
/// tokio runtime.
pub(crate) fn spawn_every<F>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let first_tick = Instant::now() + period;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tick();
        }
    })
}
