// lockhub-core: Reactive lock state between lockhub-api and consumers (CLI, webhook server).

pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod issues;
pub mod model;
pub mod platform;
pub mod services;
pub mod stream;
pub mod webhook;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{HubConfig, TlsVerification, WebhookConfig};
pub use coordinator::LockCoordinator;
pub use error::CoreError;
pub use hub::{Hub, LockRef};
pub use issues::{Issue, IssueRegistry, Notification, Severity};
pub use model::{CoordinatorState, Health, LockState, LockUpdate, RefreshOutcome, UpdateSource};
pub use platform::{Lifecycle, Platform};
pub use services::{CreatePasscodeRequest, ServiceResponse, Services, passcode_window};
pub use stream::{LockStateStream, LockWatchStream};
pub use webhook::{
    EventSink, InboundWebhook, NO_URL_ISSUE, RegistrationOutcome, SETUP_NOTIFICATION,
    WebhookHandler, WebhookManager, WebhookRegistry, parse_records,
};

// Re-export the API types consumers need without depending on lockhub-api.
pub use lockhub_api::{
    CreatedPasscode, ErrorKind, LockId, NewPasscode, OpenState, PassageModeConfig, Passcode,
    PasscodeChange, PasscodeId, PasscodeType, RecordPage, UnlockRecord, WebhookEvent,
};
