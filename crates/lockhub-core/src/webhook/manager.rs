use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use url::Url;

use lockhub_api::LockApi;

use crate::config::WebhookConfig;
use crate::error::CoreError;
use crate::hub::Hub;
use crate::issues::Severity;
use crate::platform::{Lifecycle, Platform};
use crate::webhook::handler::{EventSink, WebhookHandler};

/// Standing issue raised while no callback URL can be derived.
pub const NO_URL_ISSUE: &str = "no_webhook_url";
/// Notification shown until the first event arrives.
pub const SETUP_NOTIFICATION: &str = "webhook_setup";

/// Result of one registration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Bound locally and announced to the bridge.
    Registered { callback: Url },
    /// Bound locally; the bridge call failed.
    LocalOnly { callback: Url, reason: String },
    /// No reachable callback URL; nothing bound.
    NoUrl,
}

/// Registers the push callback with the bridge and binds it locally.
pub struct WebhookManager {
    api: Arc<LockApi>,
    platform: Platform,
    config: WebhookConfig,
    handler: Arc<WebhookHandler>,
    webhook_id: String,
}

impl WebhookManager {
    pub fn new(
        api: Arc<LockApi>,
        platform: Platform,
        config: WebhookConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let webhook_id = config
            .webhook_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let handler = Arc::new(WebhookHandler::new(sink, platform.clone()));

        Self {
            api,
            platform,
            config,
            handler,
            webhook_id,
        }
    }

    /// Manager delivering into `hub`.
    pub fn for_hub(hub: &Hub, platform: Platform) -> Self {
        Self::new(
            Arc::clone(hub.api()),
            platform,
            hub.config().webhook.clone(),
            Arc::new(hub.clone()),
        )
    }

    pub fn webhook_id(&self) -> &str {
        &self.webhook_id
    }

    pub fn handler(&self) -> &Arc<WebhookHandler> {
        &self.handler
    }

    /// URL the bridge should post to, if one can be derived.
    ///
    /// With both a cloud host and a node id the URL is routed through the
    /// relay: `https://{node_id}.{cloud_host}/api/webhook/{id}`.
    pub fn callback_url(&self) -> Option<Url> {
        if let (Some(host), Some(node)) = (&self.config.cloud_host, &self.config.node_id) {
            return Url::parse(&format!(
                "https://{node}.{host}/api/webhook/{}",
                self.webhook_id
            ))
            .ok();
        }
        match &self.config.public_base_url {
            Some(base) => Url::parse(&format!(
                "{}/api/webhook/{}",
                base.as_str().trim_end_matches('/'),
                self.webhook_id
            ))
            .ok(),
            None => self.platform.webhook_url(&self.webhook_id),
        }
    }

    /// One registration pass.
    ///
    /// Without a callback URL a standing issue is raised and the rest of
    /// setup carries on. A failing bridge call is logged; the local binding
    /// is still made so events pushed by an earlier registration arrive.
    pub async fn register(&self) -> Result<RegistrationOutcome, CoreError> {
        let Some(callback) = self.callback_url() else {
            self.platform.issues().raise(
                NO_URL_ISSUE,
                Severity::Error,
                "Could not find a reachable URL for this installation; push updates are disabled.",
            );
            return Ok(RegistrationOutcome::NoUrl);
        };
        self.platform.issues().clear(NO_URL_ISSUE);

        let remote = self.announce(&callback).await;

        if !self.handler.has_delivered() {
            self.platform.issues().notify(
                SETUP_NOTIFICATION,
                "Lock webhook setup",
                format!("Webhook url: {callback}"),
            );
        }

        self.platform.webhooks().unregister(&self.webhook_id);
        self.platform
            .webhooks()
            .register(&self.webhook_id, self.handler.clone())?;
        info!(webhook_id = %self.webhook_id, url = %callback, "webhook bound");

        Ok(match remote {
            Ok(locks) => {
                info!(locks, "webhook registered with the bridge");
                RegistrationOutcome::Registered { callback }
            }
            Err(e) => {
                error!(error = %e, "webhook registration failed");
                RegistrationOutcome::LocalOnly {
                    callback,
                    reason: CoreError::from(e).to_string(),
                }
            }
        })
    }

    async fn announce(&self, callback: &Url) -> Result<usize, lockhub_api::Error> {
        let lock_ids = self.api.connectable_lock_ids().await?;
        let node = self.config.node_id.as_deref().unwrap_or(&self.webhook_id);
        self.api.register_webhook(callback, node, &lock_ids).await?;
        Ok(lock_ids.len())
    }

    /// Remove the local binding.
    pub fn unregister(&self) -> bool {
        info!(webhook_id = %self.webhook_id, "unregistering webhook");
        self.platform.webhooks().unregister(&self.webhook_id)
    }

    /// Register once the platform is running and unbind when it stops.
    pub async fn run(&self) -> Result<(), CoreError> {
        let mut lifecycle = self.platform.watch_lifecycle();

        if !wait_for(&mut lifecycle, |l| l >= Lifecycle::Running).await {
            return Ok(());
        }
        if *lifecycle.borrow() == Lifecycle::Running {
            if let Err(e) = self.register().await {
                warn!(error = %e, "webhook setup failed");
            }
        }

        wait_for(&mut lifecycle, |l| l >= Lifecycle::Stopping).await;
        self.unregister();
        Ok(())
    }
}

/// Wait until the lifecycle satisfies `reached`. `false` if the sender is gone.
async fn wait_for(
    lifecycle: &mut watch::Receiver<Lifecycle>,
    reached: impl Fn(Lifecycle) -> bool,
) -> bool {
    lifecycle.wait_for(|l| reached(*l)).await.is_ok()
}
