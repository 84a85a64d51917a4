use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::env;

pub const DEFAULT_BASE_URL: &str = "https://graph.tractive.com/3";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

const AFTER_HELP: &str = "\
Environment Variables:
  PETWATCH_EMAIL        Email for the tracker account
  PETWATCH_PASSWORD     Password for the tracker account
  PETWATCH_MAX_RETRIES  Maximum number of retries (default: 3)
  PETWATCH_BACKOFF_MS   Base backoff time in ms (default: 1000)
  PETWATCH_BASE_URL     Override API base URL

Exit Codes:
  0   Success
  1   General error
  2   Authentication error
  3   Network error
  4   Rate limit exceeded
  130 Interrupted";

#[derive(Debug, Parser)]
#[command(name = "petwatch")]
#[command(about = "Minimal CLI for pet tracker data (unofficial vendor API)")]
#[command(after_help = AFTER_HELP)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[arg(long, global = true, help = "Enable debug output")]
    pub debug: bool,

    #[arg(long, global = true, help = "Override API base URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Test login credentials
    #[command(name = "login-test")]
    LoginTest,

    /// List trackers on the account
    Trackers {
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(long, help = "Show only battery percentages")]
        battery_only: bool,
    },

    /// Get the latest position for a tracker
    Latest {
        #[arg(long, help = "Tracker ID")]
        tracker: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Get position history for a tracker
    History {
        #[arg(long, help = "Tracker ID")]
        tracker: String,

        #[arg(long = "from", help = "Start time (ISO8601)")]
        from_time: String,

        #[arg(long = "to", help = "End time (ISO8601)")]
        to_time: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(long, help = "Maximum number of points to return")]
        max_points: Option<usize>,
    },

    /// List geofences for a tracker
    Geofences {
        #[arg(long, help = "Tracker ID")]
        tracker: String,
    },

    /// Toggle live tracking
    #[command(group(ArgGroup::new("state").required(true).multiple(false)))]
    Live {
        #[arg(long, help = "Tracker ID")]
        tracker: String,

        #[arg(long, group = "state", help = "Enable live tracking")]
        on: bool,

        #[arg(long, group = "state", help = "Disable live tracking")]
        off: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

/// Runtime settings resolved from the environment. CLI flags override the
/// fields they cover after construction.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("PETWATCH_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            max_retries: env_parse("PETWATCH_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            base_backoff_ms: env_parse("PETWATCH_BACKOFF_MS", DEFAULT_BACKOFF_MS),
            email: env::var("PETWATCH_EMAIL").ok().filter(|s| !s.is_empty()),
            password: env::var("PETWATCH_PASSWORD").ok().filter(|s| !s.is_empty()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
