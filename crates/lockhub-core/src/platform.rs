// ── Host platform ──
//
// The pieces of the surrounding runtime the core relies on: a lifecycle
// signal, an inbound webhook binding table, and standing issues.

use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use crate::issues::IssueRegistry;
use crate::webhook::WebhookRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Lifecycle {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Cheaply cloneable handle to the host runtime.
#[derive(Clone)]
pub struct Platform {
    inner: Arc<PlatformInner>,
}

struct PlatformInner {
    lifecycle: watch::Sender<Lifecycle>,
    external_url: Option<Url>,
    webhooks: WebhookRegistry,
    issues: IssueRegistry,
}

impl Platform {
    /// `external_url` is the base the outside world reaches us at, if any.
    pub fn new(external_url: Option<Url>) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Starting);
        Self {
            inner: Arc::new(PlatformInner {
                lifecycle,
                external_url,
                webhooks: WebhookRegistry::new(),
                issues: IssueRegistry::new(),
            }),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.borrow()
    }

    pub fn set_lifecycle(&self, next: Lifecycle) {
        self.inner.lifecycle.send_replace(next);
    }

    pub fn watch_lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.inner.lifecycle.subscribe()
    }

    pub fn external_url(&self) -> Option<&Url> {
        self.inner.external_url.as_ref()
    }

    /// `{external}/api/webhook/{id}`, if an external URL is known.
    pub fn webhook_url(&self, webhook_id: &str) -> Option<Url> {
        let base = self.inner.external_url.as_ref()?;
        let base = base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/api/webhook/{webhook_id}")).ok()
    }

    pub fn webhooks(&self) -> &WebhookRegistry {
        &self.inner.webhooks
    }

    pub fn issues(&self) -> &IssueRegistry {
        &self.inner.issues
    }
}
