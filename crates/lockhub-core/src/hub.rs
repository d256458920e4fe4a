// ── Account hub ──
//
// Owns the API client for one cloud account and one coordinator per
// connectable lock. Routes commands and pushed events to coordinators.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use lockhub_api::{Credentials, LockApi, LockId, WebhookEvent};

use crate::command::{Command, CommandResult};
use crate::config::HubConfig;
use crate::coordinator::LockCoordinator;
use crate::error::CoreError;
use crate::model::LockState;
use crate::webhook::EventSink;

const EVENT_CHANNEL_SIZE: usize = 256;

// ── LockRef ──────────────────────────────────────────────────────────

/// How callers name a lock: by cloud id or by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockRef {
    Id(LockId),
    Name(String),
}

impl From<&str> for LockRef {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(id) => Self::Id(LockId(id)),
            Err(_) => Self::Name(s.to_owned()),
        }
    }
}

impl FromStr for LockRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for LockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<LockId> for LockRef {
    fn from(id: LockId) -> Self {
        Self::Id(id)
    }
}

// ── Hub ──────────────────────────────────────────────────────────────

/// Entry point for consumers. Cheaply cloneable via `Arc<HubInner>`.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    api: Arc<LockApi>,
    coordinators: DashMap<LockId, LockCoordinator>,
    /// Locks whose first refresh failed, with the reason.
    failed: DashMap<LockId, String>,
    event_tx: broadcast::Sender<Arc<WebhookEvent>>,
    cancel: CancellationToken,
}

impl Hub {
    /// Build the API client for `config`. Does not touch the network.
    pub fn new(config: HubConfig) -> Result<Self, CoreError> {
        let credentials = Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
        };
        let api = LockApi::new(&config.server, credentials, &config.transport())?;
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Use an existing client (shared gateway, tests).
    pub fn with_api(config: HubConfig, api: Arc<LockApi>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(HubInner {
                config,
                api,
                coordinators: DashMap::new(),
                failed: DashMap::new(),
                event_tx,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &Arc<LockApi> {
        &self.inner.api
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Discover connectable locks and bring up their coordinators.
    ///
    /// Every first refresh runs concurrently. A lock whose first refresh
    /// fails is logged and left out; the rest start polling.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        let ids = self.inner.api.connectable_lock_ids().await?;
        info!(count = ids.len(), "discovered connectable locks");

        let threshold = self.inner.config.failure_threshold;
        let candidates: Vec<LockCoordinator> = ids
            .into_iter()
            .map(|id| {
                LockCoordinator::new(
                    id,
                    Arc::clone(&self.inner.api),
                    threshold,
                    &self.inner.cancel,
                )
            })
            .collect();

        let results = join_all(candidates.iter().map(|c| async move {
            let result = c.first_refresh().await;
            (c, result)
        }))
        .await;

        let mut ready = Vec::new();
        for (coordinator, result) in results {
            let lock_id = coordinator.lock_id();
            match result {
                Ok(state) => {
                    debug!(lock_id = %lock_id, name = %state.name, "lock ready");
                    self.inner.failed.remove(&lock_id);
                    self.inner.coordinators.insert(lock_id, coordinator.clone());
                    ready.push(coordinator.clone());
                }
                Err(e) => {
                    error!(lock_id = %lock_id, error = %e, "initial refresh failed, lock not exposed");
                    self.inner.failed.insert(lock_id, e.to_string());
                }
            }
        }

        let every = self.inner.config.poll_interval();
        for coordinator in &ready {
            coordinator.spawn_polling(every).await;
        }

        info!(ready = ready.len(), failed = self.inner.failed.len(), "hub running");
        Ok(())
    }

    /// Cancel polling and wait for every coordinator's task.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for coordinator in self.coordinators() {
            coordinator.shutdown().await;
        }
        debug!("hub stopped");
    }

    /// Start without polling, run `f`, shut down.
    ///
    /// Intended for one-shot CLI commands.
    pub async fn oneshot<F, Fut, T>(config: HubConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Hub) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval_secs = 0;

        let hub = Hub::new(cfg)?;
        hub.start().await?;
        let result = f(hub.clone()).await;
        hub.shutdown().await;
        result
    }

    /// Every pushed event, whether or not a coordinator claimed it.
    pub fn events(&self) -> broadcast::Receiver<Arc<WebhookEvent>> {
        self.inner.event_tx.subscribe()
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn coordinator(&self, lock_id: LockId) -> Option<LockCoordinator> {
        self.inner.coordinators.get(&lock_id).map(|c| c.clone())
    }

    /// All exposed coordinators, ordered by lock id.
    pub fn coordinators(&self) -> Vec<LockCoordinator> {
        let mut all: Vec<LockCoordinator> = self
            .inner
            .coordinators
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(LockCoordinator::lock_id);
        all
    }

    pub fn lock_ids(&self) -> Vec<LockId> {
        self.coordinators().iter().map(LockCoordinator::lock_id).collect()
    }

    /// Current snapshots, ordered by lock id.
    pub fn locks(&self) -> Vec<Arc<LockState>> {
        self.coordinators()
            .iter()
            .filter_map(LockCoordinator::snapshot)
            .collect()
    }

    /// Locks left out at start, with the reason.
    pub fn failed_locks(&self) -> Vec<(LockId, String)> {
        let mut failed: Vec<(LockId, String)> = self
            .inner
            .failed
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        failed.sort_by_key(|(id, _)| *id);
        failed
    }

    /// Find the coordinator a reference names. Names match case-insensitively.
    pub fn resolve(&self, lock: &LockRef) -> Result<LockCoordinator, CoreError> {
        let found = match lock {
            LockRef::Id(id) => self.coordinator(*id),
            LockRef::Name(name) => self.coordinators().into_iter().find(|c| {
                c.snapshot()
                    .is_some_and(|s| s.name.eq_ignore_ascii_case(name))
            }),
        };
        found.ok_or_else(|| CoreError::LockNotFound {
            identifier: lock.to_string(),
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }
        route_command(self, cmd).await
    }
}

impl EventSink for Hub {
    fn dispatch(&self, event: WebhookEvent) {
        let event = Arc::new(event);
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(Arc::clone(&event));

        match self.coordinator(event.lock()) {
            Some(coordinator) => {
                coordinator.apply_webhook_event(&event);
            }
            None => debug!(lock_id = event.lock_id, "event for a lock without coordinator"),
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

async fn route_command(hub: &Hub, cmd: Command) -> Result<CommandResult, CoreError> {
    let coordinator = hub.resolve(cmd.target())?;
    let lock_id = coordinator.lock_id();
    let api = hub.api();

    match cmd {
        Command::Lock { .. } => Ok(CommandResult::State(coordinator.lock().await?)),
        Command::Unlock { .. } => Ok(CommandResult::State(coordinator.unlock().await?)),
        Command::Refresh { .. } => Ok(CommandResult::Refreshed(coordinator.refresh().await)),
        Command::SetPassageMode { config, .. } => Ok(CommandResult::State(
            coordinator.set_passage_mode(&config).await?,
        )),
        Command::CreatePasscode { passcode, .. } => {
            let created = api.add_passcode(lock_id, &passcode).await?;
            info!(lock_id = %lock_id, passcode_id = %created.id, "passcode created");
            Ok(CommandResult::PasscodeCreated(created))
        }
        Command::DeletePasscode { id, .. } => {
            api.delete_passcode(lock_id, id).await?;
            Ok(CommandResult::Ok)
        }
        Command::ChangePasscode { id, change, .. } => {
            api.change_passcode(lock_id, id, &change).await?;
            Ok(CommandResult::Ok)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_ref_parses_ids_and_names() {
        assert_eq!("42".parse::<LockRef>(), Ok(LockRef::Id(LockId(42))));
        assert_eq!(
            " Front door ".parse::<LockRef>(),
            Ok(LockRef::Name("Front door".into()))
        );
    }
}
