// Webhook self-registration
//
// A control-plane call on the bridge itself: no access token, no errcode
// envelope guarantees, one attempt. Re-registering the same URL is
// idempotent upstream, so callers simply try again on the next start.

use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::client::{LockApi, check_errcode};
use crate::error::Error;
use crate::models::LockId;

#[derive(Debug, Serialize)]
struct AddWebhook<'a> {
    webhook_url: &'a str,
    mac: &'a str,
    lock_ids: &'a [LockId],
}

impl LockApi {
    /// Tell the bridge where to push events for `lock_ids`.
    ///
    /// `node_id` identifies this installation to the bridge.
    pub async fn register_webhook(
        &self,
        webhook_url: &Url,
        node_id: &str,
        lock_ids: &[LockId],
    ) -> Result<(), Error> {
        let url = self.api_url("add_webhook")?;
        debug!("POST {}", url);

        let body = AddWebhook {
            webhook_url: webhook_url.as_str(),
            mac: node_id,
            lock_ids,
        };
        let resp = self.http().post(url).json(&body).send().await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        // Body is optional; when it is JSON, honour a non-zero errcode.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
            check_errcode(value)?;
        }

        info!(%webhook_url, locks = lock_ids.len(), "webhook registered");
        Ok(())
    }
}
