pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::document::{AiProvider, DEFAULT_RULE_NAME};
use crate::reconcile::SubToggle;

#[derive(Parser)]
#[command(
    name = "relaybell",
    version,
    about = "Edit and inspect AI notification routing configuration"
)]
pub struct Cli {
    /// Settings file (default: relaybell.{json,yaml,yml,toml} or ~/.relaybell/config.json)
    #[arg(short, long, global = true)]
    pub settings: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Whole-document operations
    Config(ConfigOpts),
    /// Edit the destination list as YAML
    Destinations(ListOpts),
    /// Edit the rule list (without the default rule) as YAML
    Rules(ListOpts),
    /// Switch a delivery toggle of a rule
    Toggle(ToggleOpts),
    /// Select the AI provider
    Provider(ProviderOpts),
    /// Show recent notifications
    Notifications(NotificationsOpts),
    /// Show backend log lines
    Logs(LogsOpts),
    /// Keep refreshing a read-only view
    Watch(WatchOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the backend's document
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Download the document to a YAML file
    Pull { file: PathBuf },
    /// Validate a document file and upload it
    Push { file: PathBuf },
    /// Check a document file without contacting the backend
    Validate { file: PathBuf },
    /// Write a default document (or, with --settings-file, default settings)
    Init {
        file: Option<PathBuf>,
        #[arg(long)]
        settings_file: bool,
    },
}

#[derive(clap::Args)]
pub struct ListOpts {
    #[command(subcommand)]
    pub action: ListAction,
}

#[derive(Subcommand)]
pub enum ListAction {
    /// Print the list as YAML, or write it to a file
    Get { file: Option<PathBuf> },
    /// Replace the list with the YAML in a file and save
    Set { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

#[derive(clap::Args)]
pub struct ToggleOpts {
    /// original | ai-summary
    pub which: SubToggle,
    #[arg(value_enum)]
    pub state: Switch,
    #[arg(long, default_value = DEFAULT_RULE_NAME)]
    pub rule: String,
    /// Keep the rule's enabled flag as is instead of deriving it
    #[arg(long)]
    pub direct: bool,
}

#[derive(clap::Args)]
pub struct ProviderOpts {
    /// meta-ai | ollama
    pub provider: AiProvider,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(clap::Args)]
pub struct NotificationsOpts {
    #[arg(short, long)]
    pub limit: Option<u32>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,
}

#[derive(clap::Args)]
pub struct LogsOpts {
    /// DEBUG, INFO, WARNING, ERROR or ALL
    #[arg(short, long)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchView {
    Notifications,
    Logs,
}

#[derive(clap::Args)]
pub struct WatchOpts {
    #[arg(value_enum)]
    pub view: WatchView,
    #[arg(short, long)]
    pub level: Option<String>,
    #[arg(long)]
    pub limit: Option<u32>,
    /// Seconds between refreshes
    #[arg(short, long)]
    pub interval: Option<u64>,
}
