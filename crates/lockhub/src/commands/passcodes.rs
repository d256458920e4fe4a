//! Passcode command handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

use lockhub_core::{CreatePasscodeRequest, Hub, LockRef, Passcode, PasscodeId, Services};

use crate::cli::{GlobalOpts, PasscodesArgs, PasscodesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// One entry of the passcode listing.
#[derive(Debug, Serialize, Deserialize)]
struct Listed {
    #[serde(flatten)]
    passcode: Passcode,
    #[serde(default)]
    expired: bool,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PasscodeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "From")]
    start: String,
    #[tabled(rename = "Until")]
    end: String,
    #[tabled(rename = "Expired")]
    expired: String,
}

impl From<&Listed> for PasscodeRow {
    fn from(l: &Listed) -> Self {
        let p = &l.passcode;
        Self {
            id: p.id.to_string(),
            name: p.name.clone().unwrap_or_default(),
            code: p.code.clone().unwrap_or_default(),
            kind: p.kind.label().into(),
            start: p.start_date.map(util::format_millis).unwrap_or_default(),
            end: p.end_date.map(util::format_millis).unwrap_or_default(),
            expired: if l.expired { "yes".into() } else { String::new() },
        }
    }
}

/// Entries of a cleanup answer: plain names, or `{name, error}` objects.
fn names(value: &Value, key: &str) -> Vec<String> {
    let Some(items) = value[key].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|v| match (v.as_str(), v["name"].as_str(), v["error"].as_str()) {
            (Some(name), _, _) => name.to_owned(),
            (None, Some(name), Some(error)) => format!("{name} ({error})"),
            _ => v.to_string(),
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(hub: &Hub, args: PasscodesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let services = Services::new(hub.clone());

    match args.command {
        PasscodesCommand::List { lock } => {
            let value =
                util::service_data(services.list_passcodes(&LockRef::from(lock.as_str())).await)?;
            let listed: Vec<Listed> = serde_json::from_value(value["list"].clone())?;
            let out = output::render_list(&global.output, &listed, |l| PasscodeRow::from(l), |l| {
                l.passcode.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PasscodesCommand::Create {
            lock,
            name,
            kind,
            start,
            end,
            code,
        } => {
            let request = CreatePasscodeRequest {
                lock: LockRef::from(lock.as_str()),
                name,
                kind,
                start,
                end,
                passcode: code,
            };
            let value = util::service_data(services.create_passcode(request).await)?;
            let out = output::render_single(&global.output, &value, output::detail_value, |v| {
                v["keyboardPwd"].as_str().unwrap_or_default().to_owned()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PasscodesCommand::Delete { lock, id } => {
            if !util::confirm(
                &format!("Delete passcode {id} from {lock}?"),
                "passcodes delete",
                global.yes,
            )? {
                return Ok(());
            }
            util::service_data(
                services
                    .delete_passcode(&LockRef::from(lock.as_str()), PasscodeId(id))
                    .await,
            )?;
            if !global.quiet {
                eprintln!("Passcode {id} deleted");
            }
            Ok(())
        }

        PasscodesCommand::Change {
            lock,
            id,
            code,
            name,
        } => {
            util::service_data(
                services
                    .change_passcode(&LockRef::from(lock.as_str()), PasscodeId(id), code, name)
                    .await,
            )?;
            if !global.quiet {
                eprintln!("Passcode {id} updated");
            }
            Ok(())
        }

        PasscodesCommand::Cleanup { lock } => {
            if !util::confirm(
                &format!("Delete every expired passcode from {lock}?"),
                "passcodes cleanup",
                global.yes,
            )? {
                return Ok(());
            }
            let value = util::service_data(
                services
                    .cleanup_expired_passcodes(&LockRef::from(lock.as_str()))
                    .await,
            )?;
            let removed = names(&value, "removed");
            let out = output::render_single(
                &global.output,
                &value,
                |_| {
                    if removed.is_empty() {
                        "No expired passcodes".into()
                    } else {
                        format!("Removed: {}", removed.join(", "))
                    }
                },
                |_| removed.join("\n"),
            );
            output::print_output(&out, global.quiet);

            let failed = names(&value, "failed");
            if failed.is_empty() {
                Ok(())
            } else {
                Err(CliError::Service {
                    message: format!("could not delete: {}", failed.join(", ")),
                })
            }
        }
    }
}
