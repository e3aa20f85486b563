//! Status polling
//!
//! One cycle walks the watched apps in order: fetch the join page, compare
//! against the last recorded status, notify on a flip, then record the fresh
//! value. Per-app failures are isolated; only storage errors abort, since the
//! process cannot run safely without its state.

pub mod scheduler;

use async_trait::async_trait;
use sea_orm::DbErr;
use tracing::{debug, info, warn};

use crate::{
    notify::NotificationSink,
    settings::RuntimeSettings,
    testflight::{client::FetchError, AppStatus},
};

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, app_id: &str) -> Result<AppStatus, FetchError>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn last_known(&self, app_id: &str) -> Result<Option<bool>, DbErr>;
    async fn record(&self, app_id: &str, is_full: bool) -> Result<(), DbErr>;
}

pub struct StatusPoller<C, S, N> {
    source: C,
    store: S,
    sink: N,
    settings: RuntimeSettings,
    send_errors: bool,
    /// True only until the first cycle completes after a cold start where
    /// the status table did not pre-exist. Suppresses notifications while
    /// the store is initially populated.
    fresh_start: bool,
}

impl<C, S, N> StatusPoller<C, S, N>
where
    C: StatusSource,
    S: StatusStore,
    N: NotificationSink,
{
    pub fn new(
        source: C,
        store: S,
        sink: N,
        settings: RuntimeSettings,
        fresh_start: bool,
        send_errors: bool,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            settings,
            send_errors,
            fresh_start,
        }
    }

    /// Run one polling cycle over a snapshot of the watched set.
    pub async fn run_cycle(&mut self) -> Result<(), DbErr> {
        let watched = self.settings.watched_apps();
        debug!("Checking {} watched TestFlight apps", watched.len());

        for app_id in watched {
            self.check_app(&app_id).await?;
        }

        if self.fresh_start {
            self.fresh_start = false;
            info!("Initial population complete, change notifications enabled");
        }
        Ok(())
    }

    async fn check_app(&self, app_id: &str) -> Result<(), DbErr> {
        let status = match self.source.fetch_status(app_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to fetch app info for app {}: {}", app_id, e);
                if self.send_errors {
                    self.sink.notify_error(app_id).await;
                }
                return Ok(());
            }
        };

        if !self.fresh_start {
            if let Some(was_full) = self.store.last_known(app_id).await? {
                if was_full != status.is_full {
                    info!(
                        "App {} ({}) is now {}",
                        status.name,
                        app_id,
                        if status.is_full { "full" } else { "not full" }
                    );
                    self.sink.notify_change(&status).await;
                }
            }
        }

        self.store.record(app_id, status.is_full).await
    }
}


#[cfg(test)]
mod tests {
    use super::{test_support::*, *};
    use crate::settings::SettingsData;

    fn watching(apps: &[&str]) -> RuntimeSettings {
        RuntimeSettings::detached(SettingsData {
            watched_apps: apps.iter().map(|id| id.to_string()).collect(),
            notification_channel_id: Some(1),
            check_interval_hours: 1.0,
        })
    }

    fn poller(
        apps: &[&str],
        fresh_start: bool,
        send_errors: bool,
    ) -> (
        StatusPoller<FakeSource, MemoryStore, RecordingSink>,
        FakeSource,
        MemoryStore,
        RecordingSink,
    ) {
        let source = FakeSource::default();
        let store = MemoryStore::default();
        let sink = RecordingSink::default();
        let poller = StatusPoller::new(
            source.clone(),
            store.clone(),
            sink.clone(),
            watching(apps),
            fresh_start,
            send_errors,
        );
        (poller, source, store, sink)
    }

    #[tokio::test]
    async fn status_flip_notifies_exactly_once() {
        let (mut poller, source, store, sink) = poller(&["a"], false, true);
        store.seed("a", true);
        source.set_ok("a", false);

        poller.run_cycle().await.unwrap();
        assert_eq!(
            sink.events(),
            vec![Notification::Change {
                app_id: "a".to_string(),
                is_full: false
            }]
        );
        assert_eq!(store.get("a"), Some(false));

        // The new value is now the recorded one, so a second cycle is quiet.
        poller.run_cycle().await.unwrap();
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn unchanged_status_still_writes_the_store() {
        let (mut poller, source, store, sink) = poller(&["a"], false, true);
        store.seed("a", true);
        source.set_ok("a", true);

        poller.run_cycle().await.unwrap();

        assert!(sink.events().is_empty());
        assert_eq!(store.get("a"), Some(true));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn no_notification_without_a_prior_status() {
        let (mut poller, source, store, sink) = poller(&["a"], false, true);
        source.set_ok("a", true);

        poller.run_cycle().await.unwrap();

        assert!(sink.events().is_empty());
        assert_eq!(store.get("a"), Some(true));
    }

    #[tokio::test]
    async fn fresh_start_suppresses_only_the_first_cycle() {
        let (mut poller, source, store, sink) = poller(&["a", "b"], true, true);
        source.set_ok("a", true);
        source.set_ok("b", false);

        poller.run_cycle().await.unwrap();
        assert!(sink.events().is_empty(), "first cycle must stay quiet");
        assert_eq!(store.get("a"), Some(true));
        assert_eq!(store.get("b"), Some(false));

        source.set_ok("a", false);
        poller.run_cycle().await.unwrap();
        assert_eq!(
            sink.events(),
            vec![Notification::Change {
                app_id: "a".to_string(),
                is_full: false
            }]
        );
    }

    #[tokio::test]
    async fn fetch_failure_leaves_the_store_untouched() {
        let (mut poller, source, store, sink) = poller(&["a"], false, true);
        store.seed("a", true);
        source.set_err("a");

        poller.run_cycle().await.unwrap();

        assert_eq!(
            sink.events(),
            vec![Notification::Error {
                app_id: "a".to_string()
            }]
        );
        assert_eq!(store.get("a"), Some(true));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn error_notifications_can_be_disabled() {
        let (mut poller, source, _store, sink) = poller(&["a"], false, false);
        source.set_err("a");

        poller.run_cycle().await.unwrap();

        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn one_failing_app_does_not_block_the_rest() {
        let (mut poller, source, store, sink) = poller(&["a", "b"], false, true);
        store.seed("a", true);
        store.seed("b", false);
        source.set_ok("a", false);
        source.set_err("b");

        poller.run_cycle().await.unwrap();

        assert_eq!(
            sink.events(),
            vec![
                Notification::Change {
                    app_id: "a".to_string(),
                    is_full: false
                },
                Notification::Error {
                    app_id: "b".to_string()
                },
            ]
        );
        assert_eq!(store.get("a"), Some(false));
        assert_eq!(store.get("b"), Some(false));
        assert_eq!(store.write_count(), 1);
    }
}
