//! Notifications
//!
//! The sink the polling engine talks to. Delivery is fire-and-forget: a
//! failed send is logged by the implementation and never surfaces back into
//! a polling cycle.

pub mod discord;

use async_trait::async_trait;

use crate::testflight::AppStatus;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Announce that an app's fullness flipped. `status` is the fresh record.
    async fn notify_change(&self, status: &AppStatus);

    /// Announce that fetching an app's page failed this cycle.
    async fn notify_error(&self, app_id: &str);
}
