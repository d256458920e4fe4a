// lockhub-api: Async Rust client for the smart-lock cloud bridge API
//
// Session lifecycle, retry policy, the gateway serialization lock, and
// typed endpoint methods. Everything above raw HTTP lives in lockhub-core.

pub mod client;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod models;
pub mod passcodes;
pub mod records;
pub mod session;
pub mod transport;
pub mod webhook;

pub use client::{Credentials, LockApi};
pub use error::{Error, ErrorKind};
pub use gateway::GatewayLock;
pub use models::{
    CreatedPasscode, Features, Lock, LockId, LockSummary, NewPasscode, OpenState,
    PassageModeConfig, Passcode, PasscodeChange, PasscodeId, PasscodeType, RecordEffect,
    RecordPage, RecordType, UnlockRecord, WebhookEvent,
};
pub use session::Session;
pub use transport::{Backoff, RetryPolicy, StatusFilter, TlsMode, TransportConfig};
