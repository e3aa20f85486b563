//! Poll loop
//!
//! Drives polling cycles at the configured period. One cycle runs at a time:
//! the cycle is awaited inline, so a tick can never start a second cycle,
//! and ticks that would have fired mid-cycle are skipped rather than queued.
//! Interval changes arrive over the settings watch channel and replace the
//! timer between cycles; the replaced timer can never fire again.

use std::time::Duration;

use sea_orm::DbErr;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{notify::NotificationSink, settings::RuntimeSettings};

use super::{StatusPoller, StatusSource, StatusStore};

pub struct PollLoop<C, S, N> {
    poller: StatusPoller<C, S, N>,
    settings: RuntimeSettings,
}

impl<C, S, N> PollLoop<C, S, N>
where
    C: StatusSource,
    S: StatusStore,
    N: NotificationSink,
{
    pub fn new(poller: StatusPoller<C, S, N>, settings: RuntimeSettings) -> Self {
        Self { poller, settings }
    }

    /// Run until cancelled. Returns early only on a storage error, which is
    /// fatal to the process.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), DbErr> {
        let mut interval_rx = self.settings.subscribe_interval();
        let hours = *interval_rx.borrow_and_update();
        let mut ticker = make_ticker(hours);
        info!("Status poller started (interval: {hours} hours)");

        loop {
            // Shutdown and reconfiguration outrank an overdue tick: after a
            // cycle that outlasted the period, a pending interval change must
            // replace the ticker before the old-period tick can run a cycle.
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Status poller shutting down");
                    return Ok(());
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        info!("Settings closed, status poller shutting down");
                        return Ok(());
                    }
                    let hours = *interval_rx.borrow_and_update();
                    debug!("Check interval set to {hours} hours");
                    ticker = make_ticker(hours);
                }
                _ = ticker.tick() => {
                    self.poller.run_cycle().await?;
                }
            }
        }
    }
}

/// One year, in seconds. `Duration::from_secs_f64` panics on values past
/// the `Duration` range, and a hand-edited settings file bypasses the admin
/// API's validation.
const MAX_PERIOD_SECS: f64 = 3600.0 * 24.0 * 365.0;

/// The first tick fires immediately; later ticks at the period. The period
/// is clamped to one second so a bad interval value can never busy-loop,
/// and to a year so it can never panic the loop.
fn make_ticker(hours: f64) -> Interval {
    // NaN falls through `max` to the lower bound.
    let secs = (hours * 3600.0).max(1.0).min(MAX_PERIOD_SECS);
    let mut ticker = interval(Duration::from_secs_f64(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::poller::test_support::*;
    use crate::settings::SettingsData;
    use crate::testflight::{client::FetchError, AppStatus};

    const HOUR: Duration = Duration::from_secs(3600);

    fn settings(check_interval_hours: f64) -> RuntimeSettings {
        RuntimeSettings::detached(SettingsData {
            watched_apps: vec!["a".to_string()],
            notification_channel_id: Some(1),
            check_interval_hours,
        })
    }

    fn spawn_loop(
        settings: RuntimeSettings,
    ) -> (
        FakeSource,
        CancellationToken,
        tokio::task::JoinHandle<Result<(), DbErr>>,
    ) {
        let source = FakeSource::default();
        source.set_ok("a", false);
        let poller = StatusPoller::new(
            source.clone(),
            MemoryStore::default(),
            RecordingSink::default(),
            settings.clone(),
            false,
            true,
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(PollLoop::new(poller, settings).run(shutdown.clone()));
        (source, shutdown, handle)
    }

    /// A source whose fetches take `delay` of (paused) clock time, so a
    /// cycle can outlast the polling period.
    #[derive(Clone)]
    struct SlowSource {
        inner: FakeSource,
        delay: Duration,
    }

    #[async_trait]
    impl StatusSource for SlowSource {
        async fn fetch_status(&self, app_id: &str) -> Result<AppStatus, FetchError> {
            tokio::time::sleep(self.delay).await;
            self.inner.fetch_status(app_id).await
        }
    }

    fn spawn_slow_loop(
        settings: RuntimeSettings,
        delay: Duration,
    ) -> (
        FakeSource,
        CancellationToken,
        tokio::task::JoinHandle<Result<(), DbErr>>,
    ) {
        let inner = FakeSource::default();
        inner.set_ok("a", false);
        let source = SlowSource {
            inner: inner.clone(),
            delay,
        };
        let poller = StatusPoller::new(
            source,
            MemoryStore::default(),
            RecordingSink::default(),
            settings.clone(),
            false,
            true,
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(PollLoop::new(poller, settings).run(shutdown.clone()));
        (inner, shutdown, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_runs_immediately_then_on_the_period() {
        let (source, shutdown, handle) = spawn_loop(settings(1.0));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.call_count(), 1, "startup cycle");

        tokio::time::sleep(HOUR).await;
        assert_eq!(source.call_count(), 2);

        tokio::time::sleep(2 * HOUR).await;
        assert_eq!(source.call_count(), 4);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconfiguration_replaces_the_period() {
        let settings = settings(2.0);
        let (source, shutdown, handle) = spawn_loop(settings.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.call_count(), 1);

        // New timer starts with an immediate cycle, like startup does.
        settings.set_check_interval(0.5).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.call_count(), 2);

        // Two hours at the new period: four more cycles, and none from the
        // replaced two-hour timer.
        tokio::time::sleep(2 * HOUR).await;
        assert_eq!(source.call_count(), 6);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    // The watched-source counter increments when the 90-minute fetch
    // completes, so counts here are asserted at cycle completion times.
    #[tokio::test(start_paused = true)]
    async fn mid_cycle_reconfiguration_silences_the_old_period() {
        let settings = settings(1.0);
        let (source, shutdown, handle) =
            spawn_slow_loop(settings.clone(), Duration::from_secs(5400));

        // The first cycle runs from 0:00 to 1:30; the interval change lands
        // while it is still in flight, with the old-period tick already
        // overdue. The change must win: one immediate cycle on the new
        // timer (1:30 to 3:00), then nothing for a hundred hours.
        tokio::time::sleep(Duration::from_secs(1800)).await;
        settings.set_check_interval(100.0).unwrap();

        tokio::time::sleep(20 * HOUR).await;
        assert_eq!(
            source.call_count(),
            2,
            "old-period ticker fired after reconfiguration"
        );

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn a_cycle_that_outlasts_the_period_skips_ticks_without_bursting() {
        let (source, shutdown, handle) =
            spawn_slow_loop(settings(1.0), Duration::from_secs(5400));

        // One-hour period, 90-minute cycles: cycles run back to back,
        // completing at 1:30, 3:00, 4:30 and 6:00. Ticks missed mid-cycle
        // are dropped, so seven hours hold four cycles, not seven.
        tokio::time::sleep(7 * HOUR).await;
        assert_eq!(source.call_count(), 4);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn extreme_intervals_are_clamped() {
        assert_eq!(
            make_ticker(f64::MAX).period(),
            Duration::from_secs(31_536_000)
        );
        assert_eq!(make_ticker(f64::NAN).period(), Duration::from_secs(1));
        assert_eq!(make_ticker(-5.0).period(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let (source, shutdown, handle) = spawn_loop(settings(1.0));

        tokio::time::sleep(Duration::from_millis(1)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let calls = source.call_count();
        tokio::time::sleep(3 * HOUR).await;
        assert_eq!(source.call_count(), calls, "no cycles after cancellation");
    }
}
