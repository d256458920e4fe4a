use thiserror::Error;

/// Top-level error type for the `lockhub-api` crate.
///
/// Every failure falls into one of the [`ErrorKind`] classes so callers can
/// branch on what happened instead of on which variant carried it.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (bad credentials, server refused, token missing).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with HTTP status >= 400.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Application ─────────────────────────────────────────────────
    /// HTTP success with a non-zero `errcode` in the body.
    #[error("API error {code}: {message}")]
    Api {
        code: i64,
        message: String,
        payload: serde_json::Value,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A value parsed but violates its domain rules.
    #[error("Invalid value: {message}")]
    Validation { message: String },

    // ── Absence ─────────────────────────────────────────────────────
    /// Every allowed attempt failed with a retryable error.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    /// The overall time budget of a read ran out across its retries.
    #[error("Gave up after {budget_secs}s without a response")]
    BudgetExhausted { budget_secs: u64 },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Network or HTTP-level failure. Session untouched.
    Transport,
    /// Login failed; the session is stale or absent.
    Auth,
    /// The server understood the request and refused it.
    Application,
    /// The response did not have the expected shape.
    Validation,
    /// The operation could not complete within its retry/time budget.
    Absent,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::Transport(_) | Self::Http { .. } | Self::InvalidUrl(_) | Self::Tls(_) => {
                ErrorKind::Transport
            }
            Self::Api { .. } => ErrorKind::Application,
            Self::Deserialization { .. } | Self::Validation { .. } => ErrorKind::Validation,
            Self::RetriesExhausted { .. } | Self::BudgetExhausted { .. } => ErrorKind::Absent,
        }
    }

    /// Returns `true` if the call produced no answer at all (retries or
    /// time budget exhausted), as opposed to a definite failure.
    pub fn is_absence(&self) -> bool {
        self.kind() == ErrorKind::Absent
    }

    /// Returns `true` if this error indicates the session is no longer usable.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Http { status: 401, .. })
    }

    /// Returns `true` if the request may have reached the server before the
    /// failure was observed (timeouts, truncated bodies).
    pub fn is_ambiguous(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_connect() && !e.is_builder(),
            _ => false,
        }
    }

    /// Extract the upstream `errcode`, if available.
    pub fn api_error_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            Self::RetriesExhausted { last, .. } => last.api_error_code(),
            _ => None,
        }
    }

    /// Short message suitable for a service response or notification.
    pub fn summary(&self) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::RetriesExhausted { last, .. } => last.summary(),
            other => other.to_string(),
        }
    }
}
