//! Notification adapter that writes to the log
//!
//! Headless deployments (the daemon, the CLI) have no notification area;
//! user-visible notices are emitted as tracing events instead.

use tracing::{info, warn};

use phototag_core::ports::{INotificationService, Notification, NotificationPriority};

/// `INotificationService` implementation backed by `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl INotificationService for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        match notification.priority {
            NotificationPriority::High => warn!(
                category = %notification.category,
                body = %notification.body,
                "{}",
                notification.title
            ),
            _ => info!(
                category = %notification.category,
                body = %notification.body,
                "{}",
                notification.title
            ),
        }
        Ok(())
    }
}
