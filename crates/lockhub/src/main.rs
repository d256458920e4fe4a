mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lockhub_core::Hub;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.log_json);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;
    match cli.command {
        // Config commands don't need the cloud
        Command::Config(args) => commands::config_cmd::handle(args, global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "lockhub", &mut std::io::stdout());
            Ok(())
        }

        Command::Serve(args) => commands::serve::handle(args, global).await,

        // Everything else is a one-shot call against the account
        Command::Locks(args) => {
            oneshot(global, |hub| async move {
                commands::locks::handle(&hub, args, global).await
            })
            .await
        }
        Command::Passcodes(args) => {
            oneshot(global, |hub| async move {
                commands::passcodes::handle(&hub, args, global).await
            })
            .await
        }
        Command::Records(args) => {
            oneshot(global, |hub| async move {
                commands::records::handle(&hub, args, global).await
            })
            .await
        }
        Command::PassageMode(args) => {
            oneshot(global, |hub| async move {
                commands::passage::handle(&hub, args, global).await
            })
            .await
        }
    }
}

/// Start a hub without polling, run `f`, shut the hub down.
async fn oneshot<F, Fut>(global: &GlobalOpts, f: F) -> Result<(), CliError>
where
    F: FnOnce(Hub) -> Fut,
    Fut: Future<Output = Result<(), CliError>>,
{
    let config = config::build_hub_config(global)?;
    tracing::debug!(server = %config.server, "starting one-shot hub");
    Hub::oneshot(config, |hub| async move { Ok(f(hub).await) }).await?
}
