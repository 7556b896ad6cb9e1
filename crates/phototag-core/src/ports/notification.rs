//! Notification service port (driven/secondary port)
//!
//! This module defines the interface for surfacing user-visible notices,
//! such as a post that the server refused. Connectivity failures are never
//! reported through this port; they are handled silently by queuing.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because notification delivery is adapter-specific.
//! - Notifications are fire-and-forget; callers log and ignore failures.

use serde::{Deserialize, Serialize};

// ============================================================================
// Notification
// ============================================================================

/// Priority level for a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Shown in the notification area
    #[default]
    Normal,
    /// Something the user asked for did not happen
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A notice to display to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short text shown to the user
    pub title: String,
    /// Details, may be empty
    pub body: String,
    /// Priority level affecting how the notice is displayed
    pub priority: NotificationPriority,
    /// Category for grouping/filtering (e.g., "sync", "error")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    /// Sets the priority level
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates an error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }
}

// ============================================================================
// INotificationService
// ============================================================================

/// Port trait for user-visible notices
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Sends a notification to the user
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_notification() {
        let n = Notification::error("Could not upload post", "status 500");
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.category, "error");
        assert_eq!(n.title, "Could not upload post");
    }

    #[test]
    fn test_default_priority() {
        let n = Notification::new("Synced", "").with_category("sync");
        assert_eq!(n.priority, NotificationPriority::Normal);
        assert_eq!(n.category, "sync");
        assert_eq!(n.priority.to_string(), "normal");
        assert_eq!(NotificationPriority::default(), NotificationPriority::Normal);
    }
}
