//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "toolsync", about = "Tool checkout and robot travel client")]
pub struct Cli {
    /// TOML config file
    #[arg(long, short = 'c', global = true, env = "TOOLSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "TOOLSYNC_API_URL")]
    pub api_url: Option<String>,

    /// Act as this user id instead of the stored identity
    #[arg(long, global = true, env = "TOOLSYNC_USER_ID")]
    pub user_id: Option<String>,

    /// Credential file (default: $XDG_CONFIG_HOME/toolsync/credentials.json)
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stay connected and print a line on every snapshot change
    Watch,
    /// Show robot status
    Status,
    /// List tools
    Tools,
    /// List jobs and whether their tools are available
    Jobs,
    /// Show checkout history, most recent first
    History(HistoryOpts),
    /// Check out a tool
    CheckoutTool(TargetOpts),
    /// Check a tool back in
    CheckinTool(TargetOpts),
    /// Check out every tool of a job
    CheckoutJob(TargetOpts),
    /// Send the robot to a station
    Travel(TravelOpts),
    /// Emergency stop: cancel travel immediately
    Estop,
    /// Store the identity used for checkouts
    LoginAs(LoginOpts),
}

#[derive(clap::Args, Default)]
pub struct HistoryOpts {
    /// Case-insensitive filter on tool or user name
    #[arg(long, short = 's')]
    pub search: Option<String>,
}

#[derive(clap::Args)]
pub struct TargetOpts {
    /// Tool or job id
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args)]
pub struct TravelOpts {
    /// Destination station, e.g. "Station B"
    pub station: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args)]
pub struct LoginOpts {
    #[arg(long)]
    pub user_id: String,

    #[arg(long)]
    pub name: Option<String>,
}

/// Default credential file location, per user.
pub fn default_credentials_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(dir).join("toolsync/credentials.json");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/toolsync/credentials.json")
}
