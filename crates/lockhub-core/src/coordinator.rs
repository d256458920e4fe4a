// ── Per-lock update coordinator ──
//
// Owns one lock's cached state and refresh scheduling. Polls, pushed
// events and command results all commit through the same `watch` slot, so
// consumers see whole snapshots and every commit is announced once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockhub_api::{Features, Lock, LockApi, LockId, OpenState, PassageModeConfig, WebhookEvent};

use crate::error::CoreError;
use crate::model::{CoordinatorState, Health, LockState, LockUpdate, RefreshOutcome, UpdateSource};
use crate::stream::LockStateStream;

const UPDATE_CHANNEL_SIZE: usize = 64;

/// Cached state and refresh lifecycle for one lock.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct LockCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    lock_id: LockId,
    api: Arc<LockApi>,
    state: watch::Sender<Option<Arc<LockState>>>,
    health: watch::Sender<Health>,
    updates: broadcast::Sender<LockUpdate>,
    /// Serializes refreshes of this lock.
    refresh_gate: Mutex<()>,
    /// Bumped whenever a push or a lock/unlock command sets the open state.
    /// A poll that sees it move keeps the newer open state.
    open_state_revision: AtomicU64,
    failure_threshold: u32,
    cancel: CancellationToken,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

struct Fetched {
    detail: Lock,
    open_state: OpenState,
    passage_mode: Option<PassageModeConfig>,
}

impl LockCoordinator {
    /// Create an uninitialized coordinator. `parent` cancels its polling.
    pub fn new(
        lock_id: LockId,
        api: Arc<LockApi>,
        failure_threshold: u32,
        parent: &CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(None);
        let (health, _) = watch::channel(Health::default());
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);

        Self {
            inner: Arc::new(CoordinatorInner {
                lock_id,
                api,
                state,
                health,
                updates,
                refresh_gate: Mutex::new(()),
                open_state_revision: AtomicU64::new(0),
                failure_threshold: failure_threshold.max(1),
                cancel: parent.child_token(),
                poll_handle: Mutex::new(None),
            }),
        }
    }

    pub fn lock_id(&self) -> LockId {
        self.inner.lock_id
    }

    pub fn api(&self) -> &Arc<LockApi> {
        &self.inner.api
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Initial load. Failure is returned to the caller, which should not
    /// expose this lock.
    pub async fn first_refresh(&self) -> Result<Arc<LockState>, CoreError> {
        self.run_refresh().await?;
        self.snapshot().ok_or(CoreError::NotReady {
            lock_id: self.inner.lock_id,
        })
    }

    /// Scheduled or manual refresh. Failure keeps the cached snapshot and
    /// degrades health instead of propagating.
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.run_refresh().await {
            Ok(()) => RefreshOutcome::Fresh,
            Err(e) => {
                warn!(lock_id = %self.inner.lock_id, error = %e, "refresh failed, keeping cached state");
                RefreshOutcome::Stale {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run_refresh(&self) -> Result<(), CoreError> {
        let _gate = self.inner.refresh_gate.lock().await;

        let previous = self.inner.health.borrow().clone();
        self.inner
            .health
            .send_modify(|h| h.state = CoordinatorState::Refreshing);
        let mut restore = HealthRestore {
            health: &self.inner.health,
            previous: Some(previous),
        };

        let revision = self.inner.open_state_revision.load(Ordering::Acquire);
        let result = self.fetch().await;
        restore.disarm();

        match result {
            Ok(fetched) => {
                let state = self.commit_poll(fetched, revision);
                self.inner.health.send_modify(|h| {
                    if h.consecutive_failures > 0 {
                        info!(lock_id = %self.inner.lock_id, "lock recovered");
                    }
                    h.state = CoordinatorState::Ready;
                    h.consecutive_failures = 0;
                    h.last_error = None;
                    h.last_success = Some(state.last_seen);
                });
                self.announce(state, UpdateSource::Poll);
                Ok(())
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<Fetched, CoreError> {
        let api = &self.inner.api;
        let id = self.inner.lock_id;

        let detail = api.lock_detail(id).await?;
        let open_state = api.query_open_state(id).await?;
        let passage_mode = if detail.features.has(Features::PASSAGE_MODE) {
            match api.passage_mode_config(id).await {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!(lock_id = %id, error = %e, "passage mode unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(Fetched {
            detail,
            open_state,
            passage_mode,
        })
    }

    fn commit_poll(&self, fetched: Fetched, revision: u64) -> Arc<LockState> {
        let mut state = Arc::new(LockState::from_poll(
            &fetched.detail,
            fetched.open_state,
            fetched.passage_mode,
        ));

        self.inner.state.send_modify(|slot| {
            if let Some(prev) = slot.as_deref() {
                let next = Arc::make_mut(&mut state);
                next.last_user.clone_from(&prev.last_user);
                next.last_event.clone_from(&prev.last_event);
                next.last_event_at = prev.last_event_at;
                if next.passage_mode.is_none() {
                    next.passage_mode.clone_from(&prev.passage_mode);
                }
                // Open state set while we were fetching: that value is newer.
                if self.inner.open_state_revision.load(Ordering::Acquire) != revision {
                    next.open_state = prev.open_state;
                }
            }
            *slot = Some(Arc::clone(&state));
        });

        state
    }

    fn record_failure(&self, err: &CoreError) {
        let has_snapshot = self.inner.state.borrow().is_some();
        let threshold = self.inner.failure_threshold;
        self.inner.health.send_modify(|h| {
            h.consecutive_failures += 1;
            h.last_error = Some(err.to_string());
            h.state = if !has_snapshot || h.consecutive_failures >= threshold {
                CoordinatorState::Failed
            } else {
                CoordinatorState::Ready
            };
        });
    }

    // ── Pushed events ────────────────────────────────────────────────

    /// Merge a pushed event into the cached state.
    ///
    /// Returns `true` when the event was committed and announced. Events
    /// for another lock, or arriving before the first refresh, are ignored.
    pub fn apply_webhook_event(&self, event: &WebhookEvent) -> bool {
        if event.lock() != self.inner.lock_id {
            return false;
        }

        let mut committed = None;
        self.inner.state.send_if_modified(|slot| {
            let Some(prev) = slot.as_deref() else {
                return false;
            };
            let mut next = prev.clone();
            if let Some(open_state) = event.open_state() {
                next.open_state = open_state;
                self.inner.open_state_revision.fetch_add(1, Ordering::AcqRel);
            }
            if let Some(battery) = event.battery() {
                next.battery = Some(battery);
            }
            next.last_user.clone_from(&event.username);
            next.last_event = Some(event.record_type.label().to_owned());
            next.last_event_at = event.server_time();
            next.last_seen = Utc::now();

            let state = Arc::new(next);
            *slot = Some(Arc::clone(&state));
            committed = Some(state);
            true
        });

        match committed {
            Some(state) => {
                debug!(lock_id = %self.inner.lock_id, record_type = event.record_type.0, "applied pushed event");
                self.announce(state, UpdateSource::Webhook);
                true
            }
            None => {
                debug!(lock_id = %self.inner.lock_id, "ignoring pushed event before first refresh");
                false
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn lock(&self) -> Result<Arc<LockState>, CoreError> {
        self.require_ready()?;
        self.inner.api.lock(self.inner.lock_id).await?;
        self.apply_command(|s| s.open_state = OpenState::Locked, true)
    }

    pub async fn unlock(&self) -> Result<Arc<LockState>, CoreError> {
        self.require_ready()?;
        self.inner.api.unlock(self.inner.lock_id).await?;
        self.apply_command(|s| s.open_state = OpenState::Unlocked, true)
    }

    pub async fn set_passage_mode(
        &self,
        config: &PassageModeConfig,
    ) -> Result<Arc<LockState>, CoreError> {
        self.require_ready()?;
        self.inner
            .api
            .set_passage_mode(self.inner.lock_id, config)
            .await?;
        let config = config.clone();
        self.apply_command(move |s| s.passage_mode = Some(config), false)
    }

    fn require_ready(&self) -> Result<Arc<LockState>, CoreError> {
        self.snapshot().ok_or(CoreError::NotReady {
            lock_id: self.inner.lock_id,
        })
    }

    fn apply_command(
        &self,
        change: impl FnOnce(&mut LockState),
        sets_open_state: bool,
    ) -> Result<Arc<LockState>, CoreError> {
        let mut committed = None;
        self.inner.state.send_if_modified(|slot| {
            let Some(prev) = slot.as_deref() else {
                return false;
            };
            let mut next = prev.clone();
            change(&mut next);
            next.last_seen = Utc::now();

            if sets_open_state {
                self.inner.open_state_revision.fetch_add(1, Ordering::AcqRel);
            }
            let state = Arc::new(next);
            *slot = Some(Arc::clone(&state));
            committed = Some(state);
            true
        });

        let state = committed.ok_or(CoreError::NotReady {
            lock_id: self.inner.lock_id,
        })?;
        self.announce(Arc::clone(&state), UpdateSource::Command);
        Ok(state)
    }

    fn announce(&self, state: Arc<LockState>, source: UpdateSource) {
        // No receivers is fine.
        let _ = self.inner.updates.send(LockUpdate { state, source });
    }

    // ── Polling lifecycle ────────────────────────────────────────────

    /// Start the background poll. A zero interval disables polling.
    pub async fn spawn_polling(&self, every: Duration) {
        if every.is_zero() {
            return;
        }
        let mut handle = self.inner.poll_handle.lock().await;
        if handle.is_some() {
            return;
        }
        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();
        *handle = Some(tokio::spawn(poll_task(coordinator, every, cancel)));
    }

    /// Stop polling and wait for the task. An in-flight refresh is dropped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.poll_handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!(lock_id = %self.inner.lock_id, "coordinator stopped");
    }

    // ── State observation ────────────────────────────────────────────

    pub fn snapshot(&self) -> Option<Arc<LockState>> {
        self.inner.state.borrow().clone()
    }

    pub fn health(&self) -> Health {
        self.inner.health.borrow().clone()
    }

    pub fn subscribe(&self) -> LockStateStream {
        LockStateStream::new(self.inner.state.subscribe())
    }

    /// One message per committed update.
    pub fn updates(&self) -> broadcast::Receiver<LockUpdate> {
        self.inner.updates.subscribe()
    }
}

/// Puts health back if a refresh is dropped mid-flight.
struct HealthRestore<'a> {
    health: &'a watch::Sender<Health>,
    previous: Option<Health>,
}

impl HealthRestore<'_> {
    fn disarm(&mut self) {
        self.previous = None;
    }
}

impl Drop for HealthRestore<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.health.send_replace(previous);
        }
    }
}

/// Periodically refresh one lock until cancelled.
async fn poll_task(coordinator: LockCoordinator, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = coordinator.refresh() => {}
                }
            }
        }
    }
}
