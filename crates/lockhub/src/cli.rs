//! Clap derive structures for the `lockhub` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::net::SocketAddr;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lockhub -- bridge daemon and CLI for cloud-connected smart locks
#[derive(Debug, Parser)]
#[command(
    name = "lockhub",
    version,
    about = "Operate cloud-connected smart locks from the command line",
    long_about = "Polls and controls smart locks through their cloud bridge.\n\n\
        `lockhub serve` runs the long-lived daemon that receives push events;\n\
        every other command is a one-shot call against the same account.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "LOCKHUB_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge URL (overrides profile)
    #[arg(long, short = 's', env = "LOCKHUB_SERVER", global = true)]
    pub server: Option<String>,

    /// Account username (overrides profile)
    #[arg(long, short = 'u', env = "LOCKHUB_USERNAME", global = true, hide_env = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LOCKHUB_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOCKHUB_LOG_JSON", global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "LOCKHUB_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "LOCKHUB_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon: poll locks and receive push events
    Serve(ServeArgs),

    /// Inspect and operate locks
    #[command(alias = "l")]
    Locks(LocksArgs),

    /// Manage keypad passcodes
    #[command(alias = "pc")]
    Passcodes(PasscodesArgs),

    /// Browse unlock records
    Records(RecordsArgs),

    /// Configure passage mode
    PassageMode(PassageModeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SERVE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (overrides profile)
    #[arg(long, short = 'b', env = "LOCKHUB_BIND")]
    pub bind: Option<SocketAddr>,

    /// Externally reachable base URL for the webhook callback
    #[arg(long, env = "LOCKHUB_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Poll interval in seconds; 0 disables polling
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LOCKS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LocksArgs {
    #[command(subcommand)]
    pub command: LocksCommand,
}

#[derive(Debug, Subcommand)]
pub enum LocksCommand {
    /// List connectable locks
    #[command(alias = "ls")]
    List,

    /// Show one lock in detail
    Show {
        /// Lock id or name
        lock: String,
    },

    /// Lock a lock
    Lock {
        /// Lock id or name
        lock: String,
    },

    /// Unlock a lock
    Unlock {
        /// Lock id or name
        lock: String,
    },

    /// Re-read a lock's state from the cloud
    Refresh {
        /// Lock id or name
        lock: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PASSCODES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PasscodesArgs {
    #[command(subcommand)]
    pub command: PasscodesCommand,
}

#[derive(Debug, Subcommand)]
pub enum PasscodesCommand {
    /// List passcodes with their expiry
    #[command(alias = "ls")]
    List {
        /// Lock id or name
        lock: String,
    },

    /// Create a passcode
    Create {
        /// Lock id or name
        lock: String,

        /// Passcode name
        #[arg(long, short = 'n')]
        name: String,

        /// Type code: 1 one-time, 2 permanent, 3 period, 4 erase, 5-14 cyclic
        #[arg(long = "type", short = 't', default_value = "3")]
        kind: i64,

        /// Start, local time ("YYYY-MM-DD HH:MM", or "HH:MM" for cyclic codes)
        #[arg(long, value_parser = parse_local_datetime)]
        start: Option<DateTime<Local>>,

        /// End, local time ("YYYY-MM-DD HH:MM", or "HH:MM" for cyclic codes)
        #[arg(long, value_parser = parse_local_datetime)]
        end: Option<DateTime<Local>>,

        /// Exact code to program; the cloud generates one when omitted
        #[arg(long)]
        code: Option<String>,
    },

    /// Delete a passcode
    #[command(alias = "rm")]
    Delete {
        /// Lock id or name
        lock: String,
        /// Passcode id
        id: i64,
    },

    /// Change a passcode's code and/or name
    Change {
        /// Lock id or name
        lock: String,
        /// Passcode id
        id: i64,
        /// New code
        #[arg(long)]
        code: Option<String>,
        /// New name
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Delete every expired passcode
    Cleanup {
        /// Lock id or name
        lock: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RECORDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RecordsArgs {
    #[command(subcommand)]
    pub command: RecordsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RecordsCommand {
    /// List one page of unlock records
    #[command(alias = "ls")]
    List {
        /// Lock id or name
        lock: String,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,

        /// Records per page
        #[arg(long, short = 'l', default_value = "20")]
        page_size: u32,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PASSAGE MODE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PassageModeArgs {
    #[command(subcommand)]
    pub command: PassageModeCommand,
}

#[derive(Debug, Subcommand)]
pub enum PassageModeCommand {
    /// Replace the passage mode schedule
    Set {
        /// Lock id or name
        lock: String,

        /// Turn passage mode off
        #[arg(long)]
        off: bool,

        /// Unlock automatically when the window opens
        #[arg(long)]
        auto_unlock: bool,

        /// Apply all day
        #[arg(long, conflicts_with_all = ["start", "end"])]
        all_day: bool,

        /// Window start, "HH:MM"
        #[arg(long, value_parser = parse_minute_of_day, default_value = "00:00")]
        start: u16,

        /// Window end, "HH:MM"
        #[arg(long, value_parser = parse_minute_of_day, default_value = "24:00")]
        end: u16,

        /// ISO weekdays, 1 = Monday .. 7 = Sunday
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7")]
        days: Vec<u8>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g., "server", "poll_interval", "public_url")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

/// "YYYY-MM-DD HH:MM" or bare "HH:MM" (today), in local time.
fn parse_local_datetime(raw: &str) -> Result<DateTime<Local>, String> {
    let raw = raw.trim();
    let naive = match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        Ok(naive) => naive,
        Err(_) => {
            let time = NaiveTime::parse_from_str(raw, "%H:%M")
                .map_err(|_| format!("expected \"YYYY-MM-DD HH:MM\" or \"HH:MM\", got \"{raw}\""))?;
            Local::now().date_naive().and_time(time)
        }
    };
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("\"{raw}\" does not exist in the local time zone"))
}

/// "HH:MM" to minute of day; "24:00" is the end of the day.
fn parse_minute_of_day(raw: &str) -> Result<u16, String> {
    let invalid = || format!("expected \"HH:MM\", got \"{raw}\"");
    let (hours, minutes) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
    if minutes > 59 || hours > 24 || (hours == 24 && minutes > 0) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}
