// ── Standing issues and notifications ──
//
// Operator-visible conditions that are not errors of any one call: a
// missing callback URL, a pending setup step. Keyed by id so raising the
// same issue twice keeps a single entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A persistent, non-fatal configuration problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// A message shown until dismissed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Shared store of issues and notifications.
#[derive(Debug, Clone, Default)]
pub struct IssueRegistry {
    issues: Arc<DashMap<String, Issue>>,
    notifications: Arc<DashMap<String, Notification>>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise (or refresh) an issue.
    pub fn raise(&self, id: &str, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        if !self.issues.contains_key(id) {
            warn!(issue = id, %severity, "{message}");
        }
        self.issues.insert(
            id.to_owned(),
            Issue {
                id: id.to_owned(),
                severity,
                message,
                raised_at: Utc::now(),
            },
        );
    }

    /// Returns `true` if the issue was present.
    pub fn clear(&self, id: &str) -> bool {
        let cleared = self.issues.remove(id).is_some();
        if cleared {
            info!(issue = id, "issue resolved");
        }
        cleared
    }

    pub fn get(&self, id: &str) -> Option<Issue> {
        self.issues.get(id).map(|issue| issue.clone())
    }

    pub fn issues(&self) -> Vec<Issue> {
        let mut all: Vec<Issue> = self.issues.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn notify(&self, id: &str, title: impl Into<String>, message: impl Into<String>) {
        self.notifications.insert(
            id.to_owned(),
            Notification {
                id: id.to_owned(),
                title: title.into(),
                message: message.into(),
                created_at: Utc::now(),
            },
        );
    }

    /// Returns `true` if the notification was present.
    pub fn dismiss(&self, id: &str) -> bool {
        self.notifications.remove(id).is_some()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self
            .notifications
            .iter()
            .map(|e| e.value().clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_twice_keeps_one_entry() {
        let registry = IssueRegistry::new();
        registry.raise("no_webhook_url", Severity::Warning, "first");
        registry.raise("no_webhook_url", Severity::Warning, "second");

        let issues = registry.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "second");
        assert!(registry.clear("no_webhook_url"));
        assert!(!registry.clear("no_webhook_url"));
    }

    #[test]
    fn notifications_persist_until_dismissed() {
        let registry = IssueRegistry::new();
        registry.notify("setup", "Webhook", "waiting for first event");
        assert_eq!(registry.notifications().len(), 1);
        assert!(registry.dismiss("setup"));
        assert!(registry.notifications().is_empty());
    }
}
