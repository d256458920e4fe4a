// Shared transport configuration for building reqwest::Client instances
// and for deciding when a failed request is worth another attempt.
//
// Reads and writes carry separate retry policies: reads are idempotent and
// retried on a known set of statuses plus transient network errors; writes
// are only retried when the failure proves the server acted on nothing.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (test servers, self-signed bridges).
    DangerAcceptInvalid,
}

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Doubles after every failed attempt.
    Exponential,
    /// Same delay between every attempt.
    Fixed,
}

/// Which HTTP statuses a policy treats as retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    /// Only the listed statuses.
    Only(Vec<u16>),
    /// Any status >= 400.
    AnyFailure,
}

impl StatusFilter {
    fn matches(&self, status: u16) -> bool {
        match self {
            Self::Only(list) => list.contains(&status),
            Self::AnyFailure => status >= 400,
        }
    }
}

/// Bounded retry policy for one class of upstream calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub attempts: u32,
    pub initial_delay: Duration,
    pub backoff: Backoff,
    pub statuses: StatusFilter,
    /// Retry transport failures where the request may already have been
    /// received upstream (timeouts, dropped responses).
    pub retry_ambiguous: bool,
}

impl RetryPolicy {
    /// Reads: 3 attempts, 2s doubling, retry HTTP 400 and transient errors.
    pub fn read_default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff: Backoff::Exponential,
            statuses: StatusFilter::Only(vec![400]),
            retry_ambiguous: true,
        }
    }

    /// Writes: 3 attempts, fixed 2s, retry any HTTP failure status and
    /// connection failures, never an ambiguous post-send failure.
    pub fn write_default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
            statuses: StatusFilter::AnyFailure,
            retry_ambiguous: false,
        }
    }

    /// Same policy with a different starting delay (tests, tuning).
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.initial_delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.initial_delay.saturating_mul(factor)
            }
        }
    }

    /// Whether this error qualifies for another attempt under this policy.
    ///
    /// Application errors (`errcode != 0`) and malformed bodies are
    /// definite answers and never retried.
    pub fn should_retry(&self, error: &Error) -> bool {
        match error {
            Error::Http { status, .. } => self.statuses.matches(*status),
            Error::Transport(e) if e.is_connect() => true,
            Error::Transport(_) => self.retry_ambiguous && error.is_ambiguous(),
            _ => false,
        }
    }
}

/// Shared transport configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Overall bound on a read, summed across every retry.
    pub read_budget: Duration,
    pub read_retry: RetryPolicy,
    pub write_retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            read_budget: Duration::from_secs(180),
            read_retry: RetryPolicy::read_default(),
            write_retry: RetryPolicy::write_default(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("lockhub/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Shrink every retry delay to `delay`. Handy for tests and for one-shot
    /// CLI usage where waiting seconds between attempts is pointless.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.read_retry = self.read_retry.with_initial_delay(delay);
        self.write_retry = self.write_retry.with_initial_delay(delay);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delay_doubles() {
        let policy = RetryPolicy::read_default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn fixed_delay_stays_put() {
        let policy = RetryPolicy::write_default();
        assert_eq!(policy.delay_after(1), policy.delay_after(3));
    }

    #[test]
    fn read_policy_retries_only_listed_statuses() {
        let policy = RetryPolicy::read_default();
        let bad_request = Error::Http {
            status: 400,
            body: String::new(),
        };
        let server_error = Error::Http {
            status: 500,
            body: String::new(),
        };
        assert!(policy.should_retry(&bad_request));
        assert!(!policy.should_retry(&server_error));
    }

    #[test]
    fn write_policy_retries_any_status_but_not_application_errors() {
        let policy = RetryPolicy::write_default();
        let server_error = Error::Http {
            status: 503,
            body: String::new(),
        };
        let refused = Error::Api {
            code: 1,
            message: "failed".into(),
            payload: serde_json::Value::Null,
        };
        assert!(policy.should_retry(&server_error));
        assert!(!policy.should_retry(&refused));
    }
}
