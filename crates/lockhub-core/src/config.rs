// ── Runtime hub configuration ──
//
// Describes how to reach one cloud account and how to run its locks.
// Carries credentials and tuning, never touches disk: the CLI builds a
// `HubConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use lockhub_api::{RetryPolicy, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification.
    DangerAcceptInvalid,
}

/// How the bridge reaches us with push events.
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    /// Stable binding identifier; generated when absent.
    pub webhook_id: Option<String>,
    /// Externally reachable base URL of the webhook server.
    pub public_base_url: Option<Url>,
    /// Relay domain. When set together with `node_id`, the callback becomes
    /// `https://{node_id}.{cloud_host}/api/webhook/{id}`.
    pub cloud_host: Option<String>,
    /// Identifier of this installation as the bridge knows it.
    pub node_id: Option<String>,
}

/// Configuration for one cloud account.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bridge base URL (e.g. `https://lock-api.example.com`).
    pub server: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bound on a read across all its retries.
    pub read_budget: Duration,
    pub read_retry: RetryPolicy,
    pub write_retry: RetryPolicy,
    /// How often each lock is polled (seconds). 0 = never.
    pub poll_interval_secs: u64,
    /// Consecutive refresh failures before a lock is marked failed.
    pub failure_threshold: u32,
    pub webhook: WebhookConfig,
}

impl HubConfig {
    pub fn new(server: Url, username: impl Into<String>, password: SecretString) -> Self {
        let transport = TransportConfig::default();
        Self {
            server,
            username: username.into(),
            password,
            tls: TlsVerification::default(),
            timeout: transport.timeout,
            read_budget: transport.read_budget,
            read_retry: transport.read_retry,
            write_retry: transport.write_retry,
            poll_interval_secs: 300,
            failure_threshold: 2,
            webhook: WebhookConfig::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
            read_budget: self.read_budget,
            read_retry: self.read_retry.clone(),
            write_retry: self.write_retry.clone(),
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
