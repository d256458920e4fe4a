// ── Coordinator-facing domain model ──
//
// What consumers observe about a lock: a wholesale-replaced snapshot plus
// the coordinator's health.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use lockhub_api::{Lock, LockId, OpenState, PassageModeConfig};

/// Point-in-time view of one lock. Replaced wholesale on every commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockState {
    pub lock_id: LockId,
    pub name: String,
    pub mac: String,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub battery: Option<u8>,
    pub open_state: OpenState,
    pub passage_mode: Option<PassageModeConfig>,
    pub last_seen: DateTime<Utc>,
    /// Actor of the most recent pushed event.
    pub last_user: Option<String>,
    /// Label of the most recent pushed event.
    pub last_event: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl LockState {
    pub(crate) fn from_poll(
        detail: &Lock,
        open_state: OpenState,
        passage_mode: Option<PassageModeConfig>,
    ) -> Self {
        Self {
            lock_id: detail.lock_id,
            name: detail.display_name().to_owned(),
            mac: detail.lock_mac.clone(),
            model: detail.model_num.clone(),
            firmware: detail.firmware_revision.clone(),
            battery: detail.battery(),
            open_state,
            passage_mode,
            last_seen: Utc::now(),
            last_user: None,
            last_event: None,
            last_event_at: None,
        }
    }
}

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CoordinatorState {
    Uninitialized,
    Refreshing,
    Ready,
    Failed,
}

/// Observable health of a coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub state: CoordinatorState,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            state: CoordinatorState::Uninitialized,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
        }
    }
}

impl Health {
    /// Serving cached data after at least one failed refresh.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Where a committed state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateSource {
    Poll,
    Webhook,
    Command,
}

/// One committed state change, broadcast exactly once.
#[derive(Debug, Clone)]
pub struct LockUpdate {
    pub state: Arc<LockState>,
    pub source: UpdateSource,
}

/// Result of a non-escalating refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New data committed.
    Fresh,
    /// Upstream could not be read; the previous snapshot stays visible.
    Stale { reason: String },
}
