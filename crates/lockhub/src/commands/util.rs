//! Shared helpers for command handlers.

use std::io::IsTerminal;

use chrono::{DateTime, Local};
use serde_json::Value;

use lockhub_core::ServiceResponse;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Unwrap a service answer; an error map becomes `CliError::Service`.
pub fn service_data(response: ServiceResponse) -> Result<Value, CliError> {
    match response {
        ServiceResponse::Data(value) => Ok(value),
        ServiceResponse::Error { error } => Err(CliError::Service { message: error }),
    }
}

/// Epoch milliseconds as local time; 0 means unset.
pub fn format_millis(ms: i64) -> String {
    if ms == 0 {
        return "-".into();
    }
    DateTime::from_timestamp_millis(ms).map_or_else(
        || "-".into(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_maps_become_service_errors() {
        let err = service_data(ServiceResponse::error("Start time must be less than end time."))
            .unwrap_err();
        assert_eq!(err.to_string(), "Start time must be less than end time.");

        let data = service_data(ServiceResponse::Data(json!({"success": true}))).unwrap();
        assert_eq!(data["success"], true);
    }

    #[test]
    fn zero_millis_is_unset() {
        assert_eq!(format_millis(0), "-");
        assert_ne!(format_millis(1_680_810_180_029), "-");
    }
}
