//! Lock command handlers.

use std::sync::Arc;

use chrono::Local;
use tabled::Tabled;

use lockhub_core::{
    Command as CoreCommand, CommandResult, CoreError, Health, Hub, LockRef, LockState,
    RefreshOutcome, ServiceResponse, Services,
};

use crate::cli::{GlobalOpts, LocksArgs, LocksCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LockRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Passage")]
    passage: String,
    #[tabled(rename = "Last event")]
    last_event: String,
}

impl From<&Arc<LockState>> for LockRow {
    fn from(s: &Arc<LockState>) -> Self {
        Self {
            id: s.lock_id.to_string(),
            name: s.name.clone(),
            state: s.open_state.to_string(),
            battery: s.battery.map(|b| format!("{b}%")).unwrap_or_default(),
            passage: passage_label(s),
            last_event: match (&s.last_event, &s.last_user) {
                (Some(event), Some(user)) => format!("{event} ({user})"),
                (Some(event), None) => event.clone(),
                _ => String::new(),
            },
        }
    }
}

fn passage_label(s: &LockState) -> String {
    match &s.passage_mode {
        Some(p) if p.enabled && p.all_day => "all day".into(),
        Some(p) if p.enabled => format!(
            "{:02}:{:02}-{:02}:{:02}",
            p.start_minute / 60,
            p.start_minute % 60,
            p.end_minute / 60,
            p.end_minute % 60
        ),
        Some(_) => "off".into(),
        None => "-".into(),
    }
}

fn detail(s: &LockState, health: &Health, color: bool) -> String {
    let mut lines = vec![
        format!("ID:        {}", s.lock_id),
        format!("Name:      {}", s.name),
        format!("MAC:       {}", s.mac),
        format!("Model:     {}", s.model.as_deref().unwrap_or("-")),
        format!("Firmware:  {}", s.firmware.as_deref().unwrap_or("-")),
        format!(
            "Battery:   {}",
            s.battery.map_or_else(|| "-".into(), |b| format!("{b}%"))
        ),
        format!("State:     {}", output::paint_open_state(s.open_state, color)),
        format!("Passage:   {}", passage_label(s)),
        format!(
            "Seen:      {}",
            s.last_seen.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
    ];
    if let Some(ref event) = s.last_event {
        lines.push(format!(
            "Event:     {event} by {}",
            s.last_user.as_deref().unwrap_or("-")
        ));
    }
    lines.push(format!("Health:    {}", health.state));
    if let Some(ref error) = health.last_error {
        lines.push(format!("Error:     {error}"));
    }
    lines.join("\n")
}

fn print_state_change(response: ServiceResponse, global: &GlobalOpts) -> Result<(), CliError> {
    let value = util::service_data(response)?;
    let out = output::render_single(&global.output, &value, output::detail_value, |v| {
        v["open_state"].as_str().unwrap_or_default().to_owned()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(hub: &Hub, args: LocksArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match args.command {
        LocksCommand::List => {
            let locks = hub.locks();
            let out = output::render_list(
                &global.output,
                &locks,
                |s| LockRow::from(s),
                |s| s.lock_id.to_string(),
            );
            output::print_output(&out, global.quiet);
            if !global.quiet {
                for (lock_id, reason) in hub.failed_locks() {
                    eprintln!("warning: lock {lock_id} unavailable: {reason}");
                }
            }
            Ok(())
        }

        LocksCommand::Show { lock } => {
            let coordinator = hub.resolve(&LockRef::from(lock.as_str()))?;
            let state = coordinator.snapshot().ok_or(CoreError::NotReady {
                lock_id: coordinator.lock_id(),
            })?;
            let health = coordinator.health();
            let out = output::render_single(
                &global.output,
                state.as_ref(),
                |s| detail(s, &health, color),
                |s| s.lock_id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LocksCommand::Lock { lock } => {
            let services = Services::new(hub.clone());
            let response = services.lock(&LockRef::from(lock.as_str())).await;
            print_state_change(response, global)
        }

        LocksCommand::Unlock { lock } => {
            let services = Services::new(hub.clone());
            let response = services.unlock(&LockRef::from(lock.as_str())).await;
            print_state_change(response, global)
        }

        LocksCommand::Refresh { lock } => {
            let lock = LockRef::from(lock.as_str());
            let outcome = match hub.execute(CoreCommand::Refresh { lock: lock.clone() }).await? {
                CommandResult::Refreshed(outcome) => outcome,
                _ => RefreshOutcome::Fresh,
            };
            let coordinator = hub.resolve(&lock)?;
            if let Some(state) = coordinator.snapshot() {
                let health = coordinator.health();
                let out = output::render_single(
                    &global.output,
                    state.as_ref(),
                    |s| detail(s, &health, color),
                    |s| s.lock_id.to_string(),
                );
                output::print_output(&out, global.quiet);
            }
            match outcome {
                RefreshOutcome::Fresh => Ok(()),
                RefreshOutcome::Stale { reason } => Err(CliError::Unavailable {
                    reason: format!("showing the last known state: {reason}"),
                }),
            }
        }
    }
}
