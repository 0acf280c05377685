//! The wait state: polling for new jobs once the queue has drained.

use super::Shared;
use crate::error::{WaterfallError, WaterfallResult};
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

enum Tick {
    Check,
    Deadline,
}

/// Periodic timer owned by the wait state.
///
/// Created when the run starts waiting and dropped on every way out of it,
/// which also clears the run's "waiting since" marker.
struct WaitTimer<'a, T> {
    shared: &'a Shared<T>,
    ticker: Interval,
    started: Instant,
    deadline: Option<Instant>,
}

impl<'a, T> WaitTimer<'a, T> {
    fn start(
        shared: &'a Shared<T>,
        check_interval: Duration,
        wait_timeout: Option<Duration>,
    ) -> Self {
        let started = Instant::now();
        // First check happens one full interval after entering the wait state.
        let mut ticker = time::interval_at(started + check_interval, check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        shared.lock().waiting_since = Some(started);

        Self {
            shared,
            ticker,
            started,
            deadline: wait_timeout.map(|timeout| started + timeout),
        }
    }

    async fn tick(&mut self) -> Tick {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.ticker.tick() => Tick::Check,
                _ = time::sleep_until(deadline) => Tick::Deadline,
            },
            None => {
                self.ticker.tick().await;
                Tick::Check
            }
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl<T> Drop for WaitTimer<'_, T> {
    fn drop(&mut self) {
        self.shared.lock().waiting_since = None;
    }
}

/// Poll until the queue has work again or waiting was disabled.
///
/// Fails with [`WaterfallError::TimedOut`] once `wait_timeout` elapses with
/// neither condition met.
pub(super) async fn wait_for_jobs<T>(shared: &Shared<T>, run_id: Uuid) -> WaterfallResult<()> {
    let (check_interval, wait_timeout) = {
        let state = shared.lock();
        (state.options.check_interval, state.options.wait_timeout)
    };
    debug!(
        "Run {}: queue drained, waiting for new jobs (check every {} ms)",
        run_id,
        check_interval.as_millis()
    );

    let mut timer = WaitTimer::start(shared, check_interval, wait_timeout);
    loop {
        let tick = timer.tick().await;

        if shared.has_work_or_stopped() {
            debug!(
                "Run {}: leaving wait state after {} ms",
                run_id,
                timer.elapsed().as_millis()
            );
            return Ok(());
        }

        if let Tick::Deadline = tick {
            let waited = timer.elapsed();
            warn!("Run {}: no new jobs within {} ms", run_id, waited.as_millis());
            return Err(WaterfallError::TimedOut { waited });
        }
    }
}
