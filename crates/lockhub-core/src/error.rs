// ── Core error types ──
//
// User-facing errors from lockhub-core. Consumers never see raw HTTP
// statuses or JSON parse failures; the `From<lockhub_api::Error>` impl
// folds transport-layer errors into the taxonomy callers act on.

use thiserror::Error;

use lockhub_api::{ErrorKind, LockId};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the lock cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Lock cloud returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// No answer within the retry or time budget.
    #[error("Lock cloud unavailable: {reason}")]
    Unavailable { reason: String },

    // ── Upstream refusals ────────────────────────────────────────────
    #[error("Request rejected by the lock cloud: {message}")]
    Rejected { code: i64, message: String },

    #[error("Unexpected response from the lock cloud: {message}")]
    InvalidResponse { message: String },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("No coordinator found for the given entity: {identifier}")]
    LockNotFound { identifier: String },

    #[error("Lock {lock_id} has no state yet")]
    NotReady { lock_id: LockId },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Webhook {id} is already bound")]
    WebhookInUse { id: String },

    #[error("Hub is shut down")]
    ShutDown,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// `true` when the failure means "no answer", not "wrong answer".
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Which taxonomy bucket this error belongs to, if it came from upstream.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ConnectionFailed { .. } | Self::Upstream { .. } => Some(ErrorKind::Transport),
            Self::AuthenticationFailed { .. } => Some(ErrorKind::Auth),
            Self::Rejected { .. } => Some(ErrorKind::Application),
            Self::InvalidResponse { .. } => Some(ErrorKind::Validation),
            Self::Unavailable { .. } => Some(ErrorKind::Absent),
            _ => None,
        }
    }

    /// Message suitable for an `{error: ...}` service response.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } | Self::ValidationFailed { message } => message.clone(),
            Self::LockNotFound { .. } => "No coordinator found for the given entity.".into(),
            other => other.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lockhub_api::Error> for CoreError {
    fn from(err: lockhub_api::Error) -> Self {
        match err {
            lockhub_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            lockhub_api::Error::Transport(e) => CoreError::ConnectionFailed {
                reason: e.to_string(),
            },
            lockhub_api::Error::Http { status, body } => CoreError::Upstream {
                status,
                message: body,
            },
            lockhub_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            lockhub_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            lockhub_api::Error::Api { code, message, .. } => CoreError::Rejected {
                code,
                message: if message.is_empty() {
                    format!("errcode {code}")
                } else {
                    message
                },
            },
            lockhub_api::Error::Deserialization { message, body: _ } => {
                CoreError::InvalidResponse { message }
            }
            lockhub_api::Error::Validation { message } => CoreError::ValidationFailed { message },
            lockhub_api::Error::RetriesExhausted { attempts, last } => CoreError::Unavailable {
                reason: format!("no answer after {attempts} attempts ({last})"),
            },
            lockhub_api::Error::BudgetExhausted { budget_secs } => CoreError::Unavailable {
                reason: format!("no answer within {budget_secs}s"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_onto_taxonomy() {
        let rejected = CoreError::from(lockhub_api::Error::Api {
            code: -3,
            message: "Invalid Parameter".into(),
            payload: serde_json::Value::Null,
        });
        assert_eq!(rejected.kind(), Some(ErrorKind::Application));
        assert_eq!(rejected.user_message(), "Invalid Parameter");

        let absent = CoreError::from(lockhub_api::Error::BudgetExhausted { budget_secs: 180 });
        assert!(absent.is_absence());
    }

    #[test]
    fn missing_lock_message_is_stable() {
        let err = CoreError::LockNotFound {
            identifier: "front".into(),
        };
        assert_eq!(
            err.user_message(),
            "No coordinator found for the given entity."
        );
    }
}
