//! Passage mode command handlers.

use lockhub_core::{Hub, LockRef, PassageModeConfig, Services};

use crate::cli::{GlobalOpts, PassageModeArgs, PassageModeCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    hub: &Hub,
    args: PassageModeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PassageModeCommand::Set {
            lock,
            off,
            auto_unlock,
            all_day,
            start,
            end,
            days,
        } => {
            let config = PassageModeConfig {
                enabled: !off,
                auto_unlock,
                all_day,
                start_minute: start,
                end_minute: end,
                week_days: days,
            };
            let services = Services::new(hub.clone());
            let value = util::service_data(
                services
                    .configure_passage_mode(&LockRef::from(lock.as_str()), config)
                    .await,
            )?;
            let out = output::render_single(&global.output, &value, output::detail_value, |v| {
                v["lock_id"].to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
