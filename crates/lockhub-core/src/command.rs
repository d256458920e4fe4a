// ── Command API ──
//
// Every mutating operation against a lock flows through `Command`.
// The hub resolves the target and routes each variant to the lock's
// coordinator (state-changing commands) or straight to the API.

use std::sync::Arc;

use lockhub_api::{CreatedPasscode, NewPasscode, PassageModeConfig, PasscodeChange, PasscodeId};

use crate::hub::LockRef;
use crate::model::{LockState, RefreshOutcome};

/// All possible write operations against a lock.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Bolt ─────────────────────────────────────────────────────────
    Lock {
        lock: LockRef,
    },
    Unlock {
        lock: LockRef,
    },
    Refresh {
        lock: LockRef,
    },
    SetPassageMode {
        lock: LockRef,
        config: PassageModeConfig,
    },

    // ── Passcodes ────────────────────────────────────────────────────
    CreatePasscode {
        lock: LockRef,
        passcode: NewPasscode,
    },
    DeletePasscode {
        lock: LockRef,
        id: PasscodeId,
    },
    ChangePasscode {
        lock: LockRef,
        id: PasscodeId,
        change: PasscodeChange,
    },
}

impl Command {
    pub fn target(&self) -> &LockRef {
        match self {
            Self::Lock { lock }
            | Self::Unlock { lock }
            | Self::Refresh { lock }
            | Self::SetPassageMode { lock, .. }
            | Self::CreatePasscode { lock, .. }
            | Self::DeletePasscode { lock, .. }
            | Self::ChangePasscode { lock, .. } => lock,
        }
    }
}

/// Result of a command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    /// The optimistically updated lock state.
    State(Arc<LockState>),
    Refreshed(RefreshOutcome),
    PasscodeCreated(CreatedPasscode),
}
