// ── Webhook ingestion ──
//
// Inbound push notifications: the binding table the HTTP server
// dispatches into, the form-body handler, and the registration lifecycle.

mod handler;
mod manager;
mod registry;

pub use handler::{EventSink, WebhookHandler, parse_records};
pub use manager::{NO_URL_ISSUE, RegistrationOutcome, SETUP_NOTIFICATION, WebhookManager};
pub use registry::{InboundWebhook, WebhookRegistry};
