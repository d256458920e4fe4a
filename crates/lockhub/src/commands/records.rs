//! Unlock record command handlers.

use tabled::Tabled;

use lockhub_core::{Hub, LockRef, RecordPage, Services, UnlockRecord};

use crate::cli::{GlobalOpts, RecordsArgs, RecordsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "OK")]
    success: String,
}

impl From<&UnlockRecord> for RecordRow {
    fn from(r: &UnlockRecord) -> Self {
        Self {
            time: util::format_millis(r.lock_date.or(r.server_date).unwrap_or(0)),
            event: r.record_type.label().into(),
            user: r.username.clone().unwrap_or_default(),
            code: r.keyboard_pwd.clone().unwrap_or_default(),
            success: match r.success {
                Some(1) => "yes".into(),
                Some(_) => "no".into(),
                None => String::new(),
            },
        }
    }
}

pub async fn handle(hub: &Hub, args: RecordsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RecordsCommand::List {
            lock,
            page,
            page_size,
        } => {
            let services = Services::new(hub.clone());
            let value = util::service_data(
                services
                    .list_unlock_records(&LockRef::from(lock.as_str()), page, page_size)
                    .await,
            )?;
            let page: RecordPage = serde_json::from_value(value)?;

            let out = output::render_list(&global.output, &page.list, |r| RecordRow::from(r), |r| {
                r.record_id.map(|id| id.to_string()).unwrap_or_default()
            });
            output::print_output(&out, global.quiet);
            if !global.quiet && matches!(global.output, crate::cli::OutputFormat::Table) {
                eprintln!("page {}/{} ({} records)", page.page_no, page.pages, page.total);
            }
            Ok(())
        }
    }
}
