//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use lockhub_config::ConfigError;
use lockhub_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the lock cloud")]
    #[diagnostic(
        code(lockhub::connection_failed),
        help(
            "Check the server URL in your profile and your network.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("The lock cloud did not answer in time")]
    #[diagnostic(
        code(lockhub::unavailable),
        help("{reason}\nIncrease the timeout with --timeout or try again later.")
    )]
    Unavailable { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(lockhub::auth_failed),
        help(
            "Verify the account username and password.\n\
             Run: lockhub config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(lockhub::no_credentials),
        help(
            "Configure credentials with: lockhub config init\n\
             Or set LOCKHUB_USERNAME and LOCKHUB_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(lockhub::not_found),
        help("Run: lockhub {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Lock cloud error ({code}): {message}")]
    #[diagnostic(code(lockhub::api_error))]
    ApiError { code: String, message: String },

    /// A service call answered with an error map.
    #[error("{message}")]
    #[diagnostic(code(lockhub::service))]
    Service { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lockhub::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(lockhub::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: lockhub config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(lockhub::no_config),
        help(
            "Create one with: lockhub config init\n\
             Expected at: {path}\n\
             Or pass --server with LOCKHUB_USERNAME and LOCKHUB_PASSWORD."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(lockhub::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(lockhub::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Daemon ───────────────────────────────────────────────────────
    #[error("Webhook server failed: {message}")]
    #[diagnostic(code(lockhub::server))]
    Server { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(lockhub::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Unavailable { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::Upstream { status, message } => CliError::ConnectionFailed {
                reason: format!("HTTP {status}: {message}"),
            },

            CoreError::Unavailable { reason } => CliError::Unavailable { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Rejected { code, message } => CliError::ApiError {
                code: code.to_string(),
                message,
            },

            CoreError::InvalidResponse { message } => CliError::ApiError {
                code: "invalid_response".into(),
                message,
            },

            CoreError::LockNotFound { identifier } => CliError::NotFound {
                resource_type: "lock".into(),
                identifier,
                list_command: "locks list".into(),
            },

            CoreError::NotReady { lock_id } => CliError::Service {
                message: format!("lock {lock_id} has no state yet"),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Config { message },

            other @ (CoreError::WebhookInUse { .. } | CoreError::ShutDown) => CliError::Server {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(see lockhub config profiles)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
