// Cloud bridge response and request types
//
// Every wire shape is parsed strictly: required fields are required, flag
// codes must be 1 or 2, open-state codes must be 0..=2. The places where the
// wire is tolerated rather than trusted are called out on the field.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::Error;

// ── Identifiers ──────────────────────────────────────────────────────

/// Cloud-assigned lock identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(pub i64);

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloud-assigned passcode (`keyboardPwdId`) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasscodeId(pub i64);

impl fmt::Display for PasscodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Features ─────────────────────────────────────────────────────────

/// Capability bitmask decoded from the hexadecimal `featureValue` string.
///
/// Only the low 128 bits are kept; every capability we act on sits well
/// below that, however long the string the cloud sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Features(u128);

impl Features {
    pub const PASSAGE_MODE: u32 = 22;
    pub const WIFI: u32 = 56;

    /// Decode a `featureValue` hex string, least significant digit last.
    /// Anything unparseable yields no capabilities rather than an error:
    /// the field is advisory.
    pub fn from_hex(value: &str) -> Self {
        let mut bits = 0u128;
        for (index, c) in value.trim().chars().rev().enumerate() {
            let Some(nibble) = c.to_digit(16) else {
                return Self::default();
            };
            let shift = index * 4;
            if shift < 128 {
                bits |= u128::from(nibble) << shift;
            }
        }
        Self(bits)
    }

    pub fn has(self, bit: u32) -> bool {
        bit < 128 && self.0 & (1u128 << bit) != 0
    }

    pub fn has_wifi(self) -> bool {
        self.has(Self::WIFI)
    }
}

fn features_from_hex<'de, D>(deserializer: D) -> Result<Features, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Features::from_hex).unwrap_or_default())
}

/// Accept an integer sent either as a JSON number or a numeric string.
/// Push payloads are not consistent about this.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("not an integer: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not an integer: {s:?}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {other}"
        ))),
    }
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => lenient_i64(v).map(Some).map_err(serde::de::Error::custom),
    }
}

// ── Locks ────────────────────────────────────────────────────────────

/// One entry of `lock/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSummary {
    pub lock_id: LockId,
    #[serde(default)]
    pub lock_name: Option<String>,
    #[serde(default)]
    pub lock_alias: Option<String>,
    #[serde(default)]
    pub lock_mac: Option<String>,
    /// Absent on some accounts; only an explicit 0 means "no gateway".
    #[serde(default)]
    pub has_gateway: Option<i64>,
    #[serde(default, deserialize_with = "features_from_hex", rename = "featureValue")]
    pub features: Features,
    #[serde(default)]
    pub electric_quantity: Option<i64>,
}

impl LockSummary {
    /// Reachable from the cloud: behind a gateway or Wi-Fi capable.
    pub fn is_connectable(&self) -> bool {
        self.has_gateway != Some(0) || self.features.has_wifi()
    }

    pub fn display_name(&self) -> String {
        self.lock_alias
            .clone()
            .or_else(|| self.lock_name.clone())
            .unwrap_or_else(|| format!("Lock {}", self.lock_id))
    }
}

/// Pure filter over a lock listing.
pub fn connectable_ids(locks: &[LockSummary]) -> Vec<LockId> {
    locks
        .iter()
        .filter(|l| l.is_connectable())
        .map(|l| l.lock_id)
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct LockList {
    pub list: Vec<LockSummary>,
}

/// `lock/detail` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub lock_id: LockId,
    /// Hardware name (e.g. `S31_c3a1f0`).
    pub lock_name: String,
    #[serde(default)]
    pub lock_alias: Option<String>,
    pub lock_mac: String,
    #[serde(default)]
    pub electric_quantity: Option<i64>,
    #[serde(default, deserialize_with = "features_from_hex", rename = "featureValue")]
    pub features: Features,
    #[serde(default)]
    pub has_gateway: i64,
    #[serde(default)]
    pub model_num: Option<String>,
    #[serde(default)]
    pub hardware_revision: Option<String>,
    #[serde(default)]
    pub firmware_revision: Option<String>,
    /// Seconds; negative means disabled or unknown.
    #[serde(default = "auto_lock_unknown")]
    pub auto_lock_time: i64,
}

fn auto_lock_unknown() -> i64 {
    -1
}

impl Lock {
    pub fn display_name(&self) -> &str {
        self.lock_alias.as_deref().unwrap_or(&self.lock_name)
    }

    /// Battery percentage, clamped to 0..=100.
    pub fn battery(&self) -> Option<u8> {
        self.electric_quantity.and_then(battery_percent)
    }
}

fn battery_percent(raw: i64) -> Option<u8> {
    u8::try_from(raw.clamp(0, 100)).ok()
}

// ── Open state ───────────────────────────────────────────────────────

/// Bolt position as reported by `lock/queryOpenState` (`state`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpenState {
    Locked,
    Unlocked,
    Unknown,
}

impl TryFrom<i64> for OpenState {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::Locked),
            1 => Ok(Self::Unlocked),
            2 => Ok(Self::Unknown),
            other => Err(Error::Validation {
                message: format!("unknown open state code {other}"),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenStateResponse {
    pub state: i64,
}

// ── Passage mode ─────────────────────────────────────────────────────

/// Passage mode schedule: the lock stays open inside the window.
///
/// Deserializes from the integer-coded wire shape; serializes the logical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PassageModeWire")]
pub struct PassageModeConfig {
    pub enabled: bool,
    pub auto_unlock: bool,
    pub all_day: bool,
    /// Minute of day, 0..=1440.
    pub start_minute: u16,
    /// Minute of day, 0..=1440.
    pub end_minute: u16,
    /// ISO weekdays, 1 = Monday .. 7 = Sunday.
    pub week_days: Vec<u8>,
}

impl PassageModeConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.start_minute > 1440 || self.end_minute > 1440 {
            return Err(Error::Validation {
                message: "passage mode minutes must be within 0..=1440".into(),
            });
        }
        if let Some(day) = self.week_days.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(Error::Validation {
                message: format!("weekday {day} is outside 1..=7"),
            });
        }
        Ok(())
    }

    /// Wire parameters for `lock/configPassageMode` (without `lockId`/`type`).
    pub fn to_params(&self) -> Value {
        let days: Vec<String> = self.week_days.iter().map(ToString::to_string).collect();
        json!({
            "passageMode": flag_code(self.enabled),
            "autoUnlock": flag_code(self.auto_unlock),
            "isAllDay": flag_code(self.all_day),
            "startDate": self.start_minute,
            "endDate": self.end_minute,
            "weekDays": format!("[{}]", days.join(",")),
        })
    }
}

fn flag_code(on: bool) -> u8 {
    if on { 1 } else { 2 }
}

fn flag_from_code(name: &str, code: i64) -> Result<bool, Error> {
    match code {
        1 => Ok(true),
        2 => Ok(false),
        other => Err(Error::Validation {
            message: format!("{name} must be 1 or 2, got {other}"),
        }),
    }
}

/// `weekDays` arrives either as a JSON array or as a JSON-encoded string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeekDaysWire {
    List(Vec<u8>),
    Encoded(String),
}

impl WeekDaysWire {
    fn into_days(self) -> Result<Vec<u8>, Error> {
        match self {
            Self::List(days) => Ok(days),
            Self::Encoded(s) if s.trim().is_empty() => Ok(Vec::new()),
            Self::Encoded(s) => serde_json::from_str(&s).map_err(|e| Error::Validation {
                message: format!("weekDays {s:?} is not a day list: {e}"),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PassageModeWire {
    passage_mode: i64,
    auto_unlock: i64,
    is_all_day: i64,
    #[serde(default)]
    start_date: Option<u16>,
    #[serde(default)]
    end_date: Option<u16>,
    #[serde(default)]
    week_days: Option<WeekDaysWire>,
}

impl TryFrom<PassageModeWire> for PassageModeConfig {
    type Error = Error;

    fn try_from(wire: PassageModeWire) -> Result<Self, Error> {
        let config = Self {
            enabled: flag_from_code("passageMode", wire.passage_mode)?,
            auto_unlock: flag_from_code("autoUnlock", wire.auto_unlock)?,
            all_day: flag_from_code("isAllDay", wire.is_all_day)?,
            start_minute: wire.start_date.unwrap_or(0),
            end_minute: wire.end_date.unwrap_or(0),
            week_days: wire
                .week_days
                .map(WeekDaysWire::into_days)
                .transpose()?
                .unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Passcodes ────────────────────────────────────────────────────────

/// `keyboardPwdType` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PasscodeType {
    /// Single use, valid for a short window after its start date.
    OneTime,
    Permanent,
    /// Valid between start and end date.
    Period,
    /// Clears every passcode on the lock when entered.
    Erase,
    /// Recurring window; the code (5..=14) selects the recurrence.
    Cyclic(u8),
}

impl PasscodeType {
    pub fn code(self) -> i64 {
        match self {
            Self::OneTime => 1,
            Self::Permanent => 2,
            Self::Period => 3,
            Self::Erase => 4,
            Self::Cyclic(code) => i64::from(code),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Permanent => "permanent",
            Self::Period => "period",
            Self::Erase => "erase",
            Self::Cyclic(_) => "cyclic",
        }
    }
}

impl TryFrom<i64> for PasscodeType {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self, Error> {
        match code {
            1 => Ok(Self::OneTime),
            2 => Ok(Self::Permanent),
            3 => Ok(Self::Period),
            4 => Ok(Self::Erase),
            5..=14 => Ok(Self::Cyclic(u8::try_from(code).map_err(|_| {
                Error::Validation {
                    message: format!("passcode type {code} out of range"),
                }
            })?)),
            other => Err(Error::Validation {
                message: format!("unknown passcode type {other}"),
            }),
        }
    }
}

impl From<PasscodeType> for i64 {
    fn from(kind: PasscodeType) -> Self {
        kind.code()
    }
}

/// One entry of `lock/listKeyboardPwd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passcode {
    #[serde(rename = "keyboardPwdId")]
    pub id: PasscodeId,
    #[serde(rename = "keyboardPwd", default)]
    pub code: Option<String>,
    #[serde(rename = "keyboardPwdName", default)]
    pub name: Option<String>,
    #[serde(rename = "keyboardPwdType")]
    pub kind: PasscodeType,
    /// Epoch milliseconds.
    #[serde(rename = "startDate", default)]
    pub start_date: Option<i64>,
    /// Epoch milliseconds. Absent means no known end.
    #[serde(rename = "endDate", default)]
    pub end_date: Option<i64>,
}

impl Passcode {
    /// Permanent codes never expire; everything else expires once its end
    /// date is strictly in the past. A code without an end date is kept.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.kind != PasscodeType::Permanent
            && self.end_date.is_some_and(|end| end < now.timestamp_millis())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PasscodeList {
    pub list: Vec<Passcode>,
}

/// Request to create a passcode.
///
/// Without an explicit `code` the cloud generates one (`keyboardPwd/get`);
/// with one it is programmed as given (`keyboardPwd/add`).
#[derive(Debug, Clone)]
pub struct NewPasscode {
    pub name: String,
    pub kind: PasscodeType,
    /// Epoch milliseconds, 0 when the type takes no window.
    pub start_date: i64,
    /// Epoch milliseconds, 0 when the type takes no window.
    pub end_date: i64,
    pub code: Option<String>,
}

impl NewPasscode {
    pub(crate) fn endpoint(&self) -> &'static str {
        if self.code.is_some() {
            "keyboardPwd/add"
        } else {
            "keyboardPwd/get"
        }
    }

    pub(crate) fn to_params(&self, lock_id: LockId) -> Value {
        match &self.code {
            Some(code) => json!({
                "lockId": lock_id,
                "keyboardPwd": code,
                "keyboardPwdName": self.name,
                "startDate": self.start_date,
                "endDate": self.end_date,
                "addType": 2,
            }),
            None => json!({
                "lockId": lock_id,
                "keyboardPwdName": self.name,
                "keyboardPwdType": self.kind.code(),
                "startDate": self.start_date,
                "endDate": self.end_date,
            }),
        }
    }
}

/// Result of `keyboardPwd/get` or `keyboardPwd/add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPasscode {
    #[serde(rename = "keyboardPwdId")]
    pub id: PasscodeId,
    /// Present when the cloud generated the code.
    #[serde(rename = "keyboardPwd", default)]
    pub code: Option<String>,
}

/// Partial update of a passcode. `None` or blank fields stay unchanged.
#[derive(Debug, Clone, Default)]
pub struct PasscodeChange {
    pub new_code: Option<String>,
    pub new_name: Option<String>,
}

impl PasscodeChange {
    fn code(&self) -> Option<&str> {
        self.new_code.as_deref().filter(|s| !s.trim().is_empty())
    }

    fn name(&self) -> Option<&str> {
        self.new_name.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.code().is_none() && self.name().is_none()
    }

    pub(crate) fn to_params(&self, lock_id: LockId, id: PasscodeId) -> Value {
        let mut params = json!({
            "lockId": lock_id,
            "keyboardPwdId": id,
            "changeType": 2,
        });
        if let Some(code) = self.code() {
            params["newKeyboardPwd"] = json!(code);
        }
        if let Some(name) = self.name() {
            params["keyboardPwdName"] = json!(name);
        }
        params
    }
}

// ── Records & events ─────────────────────────────────────────────────

/// Effect a record type has on the bolt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEffect {
    Unlock,
    Lock,
    Other,
}

/// `recordType` code shared by unlock history and push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordType(pub i64);

impl RecordType {
    pub fn effect(self) -> RecordEffect {
        match self.0 {
            // app, passcode, IC card, fingerprint, wristband, mechanical key,
            // gateway, remote, lock key
            1 | 4 | 7 | 8 | 9 | 10 | 12 | 28 | 46 => RecordEffect::Unlock,
            // app, fingerprint, passcode, IC card, mechanical key, auto,
            // lock key
            11 | 33 | 34 | 35 | 36 | 45 | 47 => RecordEffect::Lock,
            _ => RecordEffect::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "app unlock",
            4 => "passcode unlock",
            7 => "IC card unlock",
            8 => "fingerprint unlock",
            9 => "wristband unlock",
            10 => "mechanical key unlock",
            11 => "app lock",
            12 => "gateway unlock",
            28 => "remote unlock",
            33 => "fingerprint lock",
            34 => "passcode lock",
            35 => "IC card lock",
            36 => "mechanical key lock",
            45 => "auto lock",
            46 => "lock key unlock",
            47 => "lock key lock",
            _ => "other",
        }
    }
}

/// One entry of `lockRecord/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRecord {
    #[serde(default)]
    pub record_id: Option<i64>,
    pub lock_id: LockId,
    pub record_type: RecordType,
    #[serde(default)]
    pub success: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub keyboard_pwd: Option<String>,
    /// Epoch milliseconds (lock clock).
    #[serde(default)]
    pub lock_date: Option<i64>,
    /// Epoch milliseconds (cloud clock).
    #[serde(default)]
    pub server_date: Option<i64>,
}

/// A page of `lockRecord/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub list: Vec<UnlockRecord>,
    #[serde(default)]
    pub page_no: i64,
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub pages: i64,
    #[serde(default)]
    pub total: i64,
}

/// One element of the `records` array in a push notification.
///
/// Integers are accepted as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(deserialize_with = "lenient_i64")]
    pub lock_id: i64,
    pub record_type: RecordType,
    /// Epoch milliseconds (cloud clock).
    #[serde(deserialize_with = "lenient_i64")]
    pub server_date: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub lock_date: Option<i64>,
    #[serde(default)]
    pub lock_mac: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub electric_quantity: Option<i64>,
    #[serde(default)]
    pub keyboard_pwd: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub success: Option<i64>,
}

impl WebhookEvent {
    pub fn lock(&self) -> LockId {
        LockId(self.lock_id)
    }

    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.server_date)
    }

    pub fn succeeded(&self) -> bool {
        self.success != Some(0)
    }

    /// Bolt position this event implies, if any.
    pub fn open_state(&self) -> Option<OpenState> {
        if !self.succeeded() {
            return None;
        }
        match self.record_type.effect() {
            RecordEffect::Unlock => Some(OpenState::Unlocked),
            RecordEffect::Lock => Some(OpenState::Locked),
            RecordEffect::Other => None,
        }
    }

    pub fn battery(&self) -> Option<u8> {
        self.electric_quantity.and_then(battery_percent)
    }
}
