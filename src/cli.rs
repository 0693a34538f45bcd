use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;
use crate::remote::SshOptions;

/// nas-dr - SnapMirror failover/failback console for a two-site NAS estate
#[derive(Parser, Debug)]
#[command(name = "nas-dr")]
#[command(about = "Inspect SnapMirror replication and run DR procedures across PROD and DR clusters")]
#[command(version)]
pub struct Cli {
    /// Application inventory (YAML list of applications)
    #[arg(long, global = true, default_value = "snapmirror_input.yaml")]
    pub config: PathBuf,

    /// Action history file, read and written on every refresh
    #[arg(long, global = true, default_value = "recent_actions_log.yaml")]
    pub history: PathBuf,

    /// Login user on the clusters (defaults to ssh_config)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Name recorded in the action history (defaults to $USER)
    #[arg(long, global = true)]
    pub operator: Option<String>,

    /// Seconds between two status polls while waiting for convergence
    #[arg(long, global = true, default_value_t = 5)]
    pub poll_interval_secs: u64,

    /// Give up waiting for a status after this many seconds
    #[arg(long, global = true, default_value_t = 1800)]
    pub poll_timeout_secs: u64,

    /// Concurrent inspection workers during a refresh
    #[arg(long, global = true, default_value_t = 8)]
    pub workers: usize,

    /// Extra ssh option (`Key=Value`), may be repeated
    #[arg(long = "ssh-option", global = true)]
    pub ssh_options: Vec<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactive session: tables, application menu, procedures
    Session,
    /// Print the current replication tables once and exit
    Status {
        /// Emit JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Load and check the inventory file
    Validate,
    /// Show the configured details of one application
    Details {
        /// Application name as written in the inventory
        app: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// The subcommand to run; a bare invocation starts a session.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Session)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_timeout: Duration::from_secs(self.poll_timeout_secs),
            max_workers: self.workers.max(1),
            ..Settings::default()
        }
    }

    pub fn ssh_options(&self, settings: &Settings) -> SshOptions {
        SshOptions {
            user: self.user.clone(),
            extra_options: self.ssh_options.clone(),
            quiet_period: settings.prompt_quiet_period,
            ..SshOptions::default()
        }
    }
}
