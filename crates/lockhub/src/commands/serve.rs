//! `serve`: the long-running daemon.
//!
//! Starts the hub with polling, binds the webhook endpoint, and drives the
//! platform lifecycle so the webhook manager registers on start and unbinds
//! on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use url::Url;

use lockhub_core::{Hub, Lifecycle, Platform, WebhookManager};

use crate::cli::{GlobalOpts, ServeArgs};
use crate::config;
use crate::error::CliError;

/// Shared state for the webhook router.
#[derive(Clone)]
pub struct AppState {
    pub platform: Platform,
    pub hub: Hub,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    lifecycle: String,
    locks: usize,
    failed: usize,
    webhooks: usize,
    issues: Vec<String>,
}

/// `POST /api/webhook/{id}` and `GET /health`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/webhook/{id}", post(receive_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Always answers 200 so the bridge never retries or disables the callback.
async fn receive_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> StatusCode {
    match state.platform.webhooks().dispatch(&id, &body) {
        Some(events) => debug!(webhook_id = %id, events, "webhook delivered"),
        None => debug!(webhook_id = %id, "no binding for webhook"),
    }
    StatusCode::OK
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let failed = state.hub.failed_locks().len();
    let degraded = state
        .hub
        .coordinators()
        .iter()
        .any(|c| c.health().is_degraded());
    Json(HealthResponse {
        status: if failed > 0 || degraded {
            "degraded"
        } else {
            "ok"
        },
        version: env!("CARGO_PKG_VERSION"),
        lifecycle: state.platform.lifecycle().to_string(),
        locks: state.hub.lock_ids().len(),
        failed,
        webhooks: state.platform.webhooks().len(),
        issues: state
            .platform
            .issues()
            .issues()
            .into_iter()
            .map(|issue| issue.message)
            .collect(),
    })
}

/// Give the profile a stable webhook id, persisting it on first use.
fn ensure_webhook_id(global: &GlobalOpts) -> Option<String> {
    let mut cfg = config::load_config_or_default();
    let name = config::active_profile_name(global, &cfg);
    let profile = cfg.profiles.get_mut(&name)?;
    if let Some(ref id) = profile.webhook_id {
        return Some(id.clone());
    }

    let id = uuid::Uuid::new_v4().simple().to_string();
    profile.webhook_id = Some(id.clone());
    match config::save_config(&cfg) {
        Ok(()) => info!(profile = %name, webhook_id = %id, "generated webhook id"),
        Err(e) => warn!(error = %e, "could not persist the generated webhook id"),
    }
    Some(id)
}

/// Log every committed lock state until the task is aborted.
fn log_state_changes(hub: &Hub) -> Vec<JoinHandle<()>> {
    hub.coordinators()
        .into_iter()
        .map(|coordinator| {
            let lock_id = coordinator.lock_id();
            // Skip the start-up snapshot.
            let mut states = coordinator.subscribe().into_stream().skip(1);
            tokio::spawn(async move {
                while let Some(state) = states.next().await {
                    let Some(state) = state else { continue };
                    info!(
                        %lock_id,
                        open_state = %state.open_state,
                        battery = ?state.battery,
                        last_user = ?state.last_user,
                        "lock state changed"
                    );
                }
            })
        })
        .collect()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let webhook_id = ensure_webhook_id(global);
    let mut hub_config = config::build_hub_config(global)?;
    if hub_config.webhook.webhook_id.is_none() {
        hub_config.webhook.webhook_id = webhook_id;
    }
    if let Some(raw) = args.public_url {
        let url: Url = raw.parse().map_err(|_| CliError::Validation {
            field: "public-url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        hub_config.webhook.public_base_url = Some(url);
    }
    if let Some(every) = args.poll_interval {
        hub_config.poll_interval_secs = every;
    }

    let bind: SocketAddr = match args.bind {
        Some(addr) => addr,
        None => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.get(&name).cloned().unwrap_or_default();
            profile.bind_addr(&cfg.defaults)?
        }
    };

    let platform = Platform::new(hub_config.webhook.public_base_url.clone());
    let hub = Hub::new(hub_config)?;
    hub.start().await?;
    let loggers = log_state_changes(&hub);

    let manager = Arc::new(WebhookManager::for_hub(&hub, platform.clone()));
    let registration = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run().await })
    };

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| CliError::Server {
            message: format!("failed to bind {bind}: {e}"),
        })?;
    info!(%bind, webhook_id = %manager.webhook_id(), "webhook server listening");

    platform.set_lifecycle(Lifecycle::Running);
    let served = axum::serve(
        listener,
        router(AppState {
            platform: platform.clone(),
            hub: hub.clone(),
        }),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    platform.set_lifecycle(Lifecycle::Stopping);
    match registration.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "webhook manager stopped with an error"),
        Err(e) => warn!(error = %e, "webhook manager task failed"),
    }
    for logger in loggers {
        logger.abort();
    }
    hub.shutdown().await;
    platform.set_lifecycle(Lifecycle::Stopped);
    info!("stopped");

    served.map_err(|e| CliError::Server {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::Request;
    use lockhub_core::{HubConfig, InboundWebhook};
    use tower::ServiceExt;

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl InboundWebhook for Counter {
        fn handle(&self, body: &[u8]) -> usize {
            self.0.fetch_add(body.len(), Ordering::SeqCst);
            1
        }
    }

    fn state() -> AppState {
        let config = HubConfig::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            "owner@example.com",
            "hunter2".to_string().into(),
        );
        AppState {
            platform: Platform::new(None),
            hub: Hub::new(config).unwrap(),
        }
    }

    fn post_to(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn bound_webhook_receives_the_raw_body() {
        let state = state();
        let counter = Arc::new(Counter::default());
        state
            .platform
            .webhooks()
            .register("abc123", counter.clone())
            .unwrap();

        let response = router(state)
            .oneshot(post_to("/api/webhook/abc123", "records=%5B%5D"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(counter.0.load(Ordering::SeqCst), "records=%5B%5D".len());
    }

    #[tokio::test]
    async fn unknown_webhook_still_answers_ok() {
        let response = router(state())
            .oneshot(post_to("/api/webhook/nope", "records=%5B%5D"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_lifecycle() {
        let response = router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["lifecycle"], "starting");
        assert_eq!(body["locks"], 0);
    }
}
