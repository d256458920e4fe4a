// ── Service surface ──
//
// Operator-facing operations over a hub. Every call answers with a
// `ServiceResponse`: data on success, `{"error": "..."}` otherwise. Nothing
// here returns `Err`.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use lockhub_api::{NewPasscode, PassageModeConfig, PasscodeChange, PasscodeId, PasscodeType};

use crate::command::{Command, CommandResult};
use crate::error::CoreError;
use crate::hub::{Hub, LockRef};

/// Structured answer of a service call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServiceResponse {
    Data(Value),
    Error { error: String },
}

impl ServiceResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    fn from_result(result: Result<Value, CoreError>) -> Self {
        match result {
            Ok(v) => Self::Data(v),
            Err(e) => {
                warn!(error = %e, "service call failed");
                Self::error(e.user_message())
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Data(v) => v,
            Self::Error { error } => json!({ "error": error }),
        }
    }
}

/// Parameters of [`Services::create_passcode`].
#[derive(Debug, Clone)]
pub struct CreatePasscodeRequest {
    pub lock: LockRef,
    pub name: String,
    /// `keyboardPwdType` code.
    pub kind: i64,
    pub start: Option<DateTime<Local>>,
    pub end: Option<DateTime<Local>>,
    /// Program this exact code instead of letting the cloud generate one.
    pub passcode: Option<String>,
}

/// Service handlers over one hub.
#[derive(Clone)]
pub struct Services {
    hub: Hub,
}

impl Services {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    pub async fn create_passcode(&self, request: CreatePasscodeRequest) -> ServiceResponse {
        let today = Local::now().date_naive();
        let (start_date, end_date) =
            match passcode_window(request.kind, request.start, request.end, today) {
                Ok(window) => window,
                Err(message) => return ServiceResponse::error(message),
            };
        let kind = match PasscodeType::try_from(request.kind) {
            Ok(kind) => kind,
            Err(e) => return ServiceResponse::error(e.to_string()),
        };
        info!(lock = %request.lock, name = %request.name, kind = kind.label(), "creating passcode");

        let passcode = NewPasscode {
            name: request.name,
            kind,
            start_date,
            end_date,
            code: request.passcode.filter(|c| !c.trim().is_empty()),
        };
        let result = self
            .hub
            .execute(Command::CreatePasscode {
                lock: request.lock,
                passcode,
            })
            .await
            .and_then(|r| match r {
                CommandResult::PasscodeCreated(created) => encode(&created),
                other => unexpected(&other),
            });
        ServiceResponse::from_result(result)
    }

    /// `{list: [...]}`, each entry carrying an `expired` flag.
    pub async fn list_passcodes(&self, lock: &LockRef) -> ServiceResponse {
        ServiceResponse::from_result(self.passcodes_with_expiry(lock).await)
    }

    /// Delete every expired passcode. `{removed: [names]}`, plus `failed`
    /// when some deletions did not go through.
    pub async fn cleanup_expired_passcodes(&self, lock: &LockRef) -> ServiceResponse {
        ServiceResponse::from_result(self.remove_expired(lock).await)
    }

    pub async fn list_unlock_records(
        &self,
        lock: &LockRef,
        page_no: u32,
        page_size: u32,
    ) -> ServiceResponse {
        ServiceResponse::from_result(self.record_page(lock, page_no, page_size).await)
    }

    pub async fn delete_passcode(&self, lock: &LockRef, id: PasscodeId) -> ServiceResponse {
        self.acknowledge(Command::DeletePasscode {
            lock: lock.clone(),
            id,
        })
        .await
    }

    pub async fn change_passcode(
        &self,
        lock: &LockRef,
        id: PasscodeId,
        new_code: Option<String>,
        new_name: Option<String>,
    ) -> ServiceResponse {
        let change = PasscodeChange { new_code, new_name };
        if change.is_empty() {
            return ServiceResponse::error("New passcode or passcode name is required.");
        }
        self.acknowledge(Command::ChangePasscode {
            lock: lock.clone(),
            id,
            change,
        })
        .await
    }

    pub async fn configure_passage_mode(
        &self,
        lock: &LockRef,
        config: PassageModeConfig,
    ) -> ServiceResponse {
        self.state_change(Command::SetPassageMode {
            lock: lock.clone(),
            config,
        })
        .await
    }

    pub async fn lock(&self, lock: &LockRef) -> ServiceResponse {
        self.state_change(Command::Lock { lock: lock.clone() }).await
    }

    pub async fn unlock(&self, lock: &LockRef) -> ServiceResponse {
        self.state_change(Command::Unlock { lock: lock.clone() }).await
    }

    async fn passcodes_with_expiry(&self, lock: &LockRef) -> Result<Value, CoreError> {
        let coordinator = self.hub.resolve(lock)?;
        let codes = self
            .hub
            .api()
            .list_passcodes(coordinator.lock_id())
            .await?;

        let now = Utc::now();
        let mut list = Vec::with_capacity(codes.len());
        for code in &codes {
            let mut entry = encode(code)?;
            entry["expired"] = json!(code.is_expired_at(now));
            list.push(entry);
        }
        Ok(json!({ "list": list }))
    }

    async fn remove_expired(&self, lock: &LockRef) -> Result<Value, CoreError> {
        let coordinator = self.hub.resolve(lock)?;
        let lock_id = coordinator.lock_id();
        let codes = self.hub.api().list_passcodes(lock_id).await?;

        let now = Utc::now();
        let mut removed = Vec::new();
        let mut failed = Vec::new();
        for code in codes.iter().filter(|c| c.is_expired_at(now)) {
            match self.hub.api().delete_passcode(lock_id, code.id).await {
                Ok(()) => removed.push(code.display_name()),
                Err(e) => {
                    warn!(lock_id = %lock_id, passcode_id = %code.id, error = %e, "could not delete expired passcode");
                    failed.push(json!({
                        "name": code.display_name(),
                        "error": CoreError::from(e).user_message(),
                    }));
                }
            }
        }
        info!(lock_id = %lock_id, removed = removed.len(), "expired passcodes cleaned up");

        let mut body = json!({ "removed": removed });
        if !failed.is_empty() {
            body["failed"] = Value::Array(failed);
        }
        Ok(body)
    }

    async fn record_page(
        &self,
        lock: &LockRef,
        page_no: u32,
        page_size: u32,
    ) -> Result<Value, CoreError> {
        let coordinator = self.hub.resolve(lock)?;
        let page = self
            .hub
            .api()
            .list_unlock_records(coordinator.lock_id(), page_no, page_size)
            .await?;
        encode(&page)
    }

    async fn acknowledge(&self, cmd: Command) -> ServiceResponse {
        let result = self.hub.execute(cmd).await.and_then(|r| match r {
            CommandResult::Ok => Ok(json!({ "success": true })),
            other => unexpected(&other),
        });
        ServiceResponse::from_result(result)
    }

    async fn state_change(&self, cmd: Command) -> ServiceResponse {
        let result = self.hub.execute(cmd).await.and_then(|r| match r {
            CommandResult::State(state) => encode(&*state),
            other => unexpected(&other),
        });
        ServiceResponse::from_result(result)
    }
}

impl From<ServiceResponse> for Value {
    fn from(response: ServiceResponse) -> Self {
        response.into_value()
    }
}

fn encode(value: &impl Serialize) -> Result<Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::InvalidResponse {
        message: e.to_string(),
    })
}

fn unexpected(result: &CommandResult) -> Result<Value, CoreError> {
    Err(CoreError::InvalidResponse {
        message: format!("unexpected command result {result:?}"),
    })
}

// ── Passcode validity window ─────────────────────────────────────────

/// Epoch-millisecond `(start, end)` for a passcode of type `kind`.
///
/// One-time and permanent codes take no window. Period codes use the given
/// instants; cyclic codes take only the time of day, applied to `today`.
/// Both are truncated to the hour. Errors are operator-facing messages.
pub fn passcode_window(
    kind: i64,
    start: Option<DateTime<Local>>,
    end: Option<DateTime<Local>>,
    today: NaiveDate,
) -> Result<(i64, i64), String> {
    if kind <= 2 {
        return Ok((0, 0));
    }

    let (start, end) = if kind == 3 {
        let (Some(start), Some(end)) = (start, end) else {
            return Err("Need start time and end time with period passcode.".into());
        };
        (start.with_timezone(&Utc), end.with_timezone(&Utc))
    } else {
        let (Some(start), Some(end)) = (start, end) else {
            return Err("Need start time and end time with cyclic passcode.".into());
        };
        (on_day(today, start.time())?, on_day(today, end.time())?)
    };

    let start = hour_floor_millis(start);
    let end = hour_floor_millis(end);
    if start >= end {
        return Err("Start time must be less than end time.".into());
    }
    Ok((start, end))
}

fn on_day(day: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    let time = time.with_nanosecond(0).unwrap_or(time);
    Local
        .from_local_datetime(&day.and_time(time))
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| format!("{day} {time} does not exist in the local time zone"))
}

fn hour_floor_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp().div_euclid(3600) * 3600 * 1000
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).earliest().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn one_time_and_permanent_take_no_window() {
        assert_eq!(passcode_window(1, None, None, today()), Ok((0, 0)));
        assert_eq!(
            passcode_window(2, Some(local(2024, 3, 1, 9, 0)), None, today()),
            Ok((0, 0))
        );
    }

    #[test]
    fn period_requires_both_ends() {
        assert_eq!(
            passcode_window(3, Some(local(2024, 3, 1, 9, 0)), None, today()),
            Err("Need start time and end time with period passcode.".into())
        );
        assert_eq!(
            passcode_window(5, None, None, today()),
            Err("Need start time and end time with cyclic passcode.".into())
        );
    }

    #[test]
    fn period_truncates_to_the_hour() {
        let start = local(2024, 3, 1, 9, 45);
        let end = local(2024, 3, 2, 17, 10);
        let (s, e) = passcode_window(3, Some(start), Some(end), today()).unwrap();
        assert_eq!(s % 3_600_000, 0);
        assert_eq!(e % 3_600_000, 0);
        assert!(s <= start.timestamp_millis());
        assert!(start.timestamp_millis() - s < 3_600_000);
        assert!(e < end.timestamp_millis());
    }

    #[test]
    fn start_must_precede_end() {
        let start = local(2024, 3, 1, 10, 0);
        let end = local(2024, 3, 1, 9, 0);
        assert_eq!(
            passcode_window(3, Some(start), Some(end), today()),
            Err("Start time must be less than end time.".into())
        );
        assert_eq!(
            passcode_window(3, Some(start), Some(start), today()),
            Err("Start time must be less than end time.".into())
        );
    }

    #[test]
    fn cyclic_applies_time_of_day_to_today() {
        let start = local(2020, 1, 5, 8, 30);
        let end = local(2020, 1, 5, 18, 0);
        let (s, e) = passcode_window(6, Some(start), Some(end), today()).unwrap();

        let at = |h, m| {
            let t = NaiveTime::from_hms_opt(h, m, 0).unwrap();
            hour_floor_millis(on_day(today(), t).unwrap())
        };
        assert_eq!(s, at(8, 30));
        assert_eq!(e, at(18, 0));
        let day_start = on_day(today(), NaiveTime::MIN).unwrap().timestamp_millis();
        assert!(s >= day_start - 3_600_000);
    }

    #[test]
    fn error_response_serializes_as_error_map() {
        let value = serde_json::to_value(ServiceResponse::error("boom")).unwrap();
        assert_eq!(value, json!({ "error": "boom" }));
    }
}
