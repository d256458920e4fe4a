use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use lockhub_api::WebhookEvent;

use crate::error::CoreError;
use crate::platform::Platform;
use crate::webhook::SETUP_NOTIFICATION;
use crate::webhook::registry::InboundWebhook;

/// Consumer of parsed push events.
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: WebhookEvent);
}

/// Parse the `records` fields of a form-encoded push body.
///
/// Each field must hold a JSON array. Elements that do not parse as an
/// event are skipped; a field that is not an array fails the whole body.
pub fn parse_records(body: &[u8]) -> Result<Vec<WebhookEvent>, CoreError> {
    let mut events = Vec::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        if key != "records" {
            continue;
        }
        let elements: Vec<serde_json::Value> =
            serde_json::from_str(&value).map_err(|e| CoreError::InvalidResponse {
                message: format!("records field is not a JSON array: {e}"),
            })?;
        for element in elements {
            match serde_json::from_value::<WebhookEvent>(element) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "skipping malformed webhook record"),
            }
        }
    }

    Ok(events)
}

/// Turns inbound bodies into events for a sink.
pub struct WebhookHandler {
    sink: Arc<dyn EventSink>,
    platform: Platform,
    delivered: AtomicBool,
}

impl WebhookHandler {
    pub fn new(sink: Arc<dyn EventSink>, platform: Platform) -> Self {
        Self {
            sink,
            platform,
            delivered: AtomicBool::new(false),
        }
    }

    /// Whether at least one event has come through.
    pub fn has_delivered(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }
}

impl InboundWebhook for WebhookHandler {
    fn handle(&self, body: &[u8]) -> usize {
        if body.iter().all(u8::is_ascii_whitespace) {
            debug!("webhook called with an empty payload");
            return 0;
        }

        let events = match parse_records(body) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "could not parse webhook payload");
                return 0;
            }
        };
        if events.is_empty() {
            debug!("webhook payload carried no records");
            return 0;
        }

        let count = events.len();
        for event in events {
            debug!(lock_id = event.lock_id, record_type = event.record_type.0, "webhook event");
            self.sink.dispatch(event);
        }

        if !self.delivered.swap(true, Ordering::AcqRel) {
            info!("first webhook event received");
            self.platform.issues().dismiss(SETUP_NOTIFICATION);
        }
        count
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<WebhookEvent>>);

    impl EventSink for Recorder {
        fn dispatch(&self, event: WebhookEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn form(records: &str) -> Vec<u8> {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("lockId", "7252408")
            .append_pair("notifyType", "1")
            .append_pair("records", records)
            .append_pair("admin", "owner@example.com")
            .finish()
            .into_bytes()
    }

    #[test]
    fn two_records_dispatch_two_events() {
        let recorder = Arc::new(Recorder::default());
        let handler = WebhookHandler::new(recorder.clone(), Platform::new(None));

        let body = form(
            r#"[{"lockId":7252408,"recordType":7,"serverDate":1680810180029,"success":1,"username":"Jonas"},
                {"lockId":7252408,"recordType":45,"serverDate":1680810190000}]"#,
        );
        assert_eq!(handler.handle(&body), 2);

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].username.as_deref(), Some("Jonas"));
        assert_eq!(seen[1].record_type.0, 45);
        assert!(handler.has_delivered());
    }

    #[test]
    fn empty_or_missing_records_dispatch_nothing() {
        let recorder = Arc::new(Recorder::default());
        let handler = WebhookHandler::new(recorder.clone(), Platform::new(None));

        assert_eq!(handler.handle(b""), 0);
        assert_eq!(handler.handle(b"lockId=1&notifyType=1"), 0);
        assert_eq!(handler.handle(&form("[]")), 0);
        assert!(recorder.0.lock().unwrap().is_empty());
        assert!(!handler.has_delivered());
    }

    #[test]
    fn malformed_body_is_absorbed() {
        let recorder = Arc::new(Recorder::default());
        let handler = WebhookHandler::new(recorder.clone(), Platform::new(None));

        assert_eq!(handler.handle(&form("not json")), 0);
        assert!(parse_records(&form("{\"lockId\":1}")).is_err());
    }

    #[test]
    fn bad_elements_are_skipped() {
        let events = parse_records(&form(
            r#"[{"lockId":"12","recordType":1,"serverDate":"5"},{"recordType":1}]"#,
        ))
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lock_id, 12);
    }

    #[test]
    fn first_delivery_dismisses_setup_notification() {
        let platform = Platform::new(None);
        platform
            .issues()
            .notify(SETUP_NOTIFICATION, "Lock webhook", "waiting");
        let handler = WebhookHandler::new(Arc::new(Recorder::default()), platform.clone());

        handler.handle(&form(r#"[{"lockId":1,"recordType":1,"serverDate":1}]"#));
        assert!(platform.issues().notifications().is_empty());
    }
}
