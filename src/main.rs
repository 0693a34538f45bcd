//! nas-dr - Main entry point
//!
//! Parses the command line, sets up logging and child-process cleanup, then
//! hands over to the session loop or one of the one-shot subcommands.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use nasdr::cli::{Cli, Commands};
use nasdr::config::Inventory;
use nasdr::console::{Console, Terminal};
use nasdr::display::{self, AppColors};
use nasdr::history::{HistoryStore, Operator};
use nasdr::process_guard::{self, ProcessGuard};
use nasdr::remote::{ConnectionPool, SshConnector};
use nasdr::session::{self, Session};

/// Initialise tracing; `RUST_LOG` overrides the default `info` level.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.log_file.as_deref())?;
    info!("nas-dr starting up");

    // Kill stray ssh clients and close masters on SIGINT/SIGTERM/SIGHUP
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();
    debug!("Signal handlers initialized");

    let inventory = Inventory::load_from_file(&cli.config)?;
    let mut terminal = Terminal;

    match cli.command() {
        Commands::Validate => {
            inventory
                .validate()
                .with_context(|| format!("Inventory {:?} is invalid", cli.config))?;
            info!(applications = inventory.applications.len(), "Inventory validation successful");
            terminal.print(&format!(
                "✓ Inventory is valid: {} application(s), {} cluster(s)",
                inventory.applications.len(),
                inventory.clusters().len()
            ));
        }
        Commands::Details { app } => {
            let Some(app) = inventory.find(&app) else {
                bail!("App '{}' not found in input data.", app);
            };
            for line in display::render_details(app) {
                terminal.print(&line);
            }
        }
        Commands::Status { json } => {
            inventory.validate().context("Refusing to contact clusters")?;
            let settings = cli.settings();
            let pool = ConnectionPool::new(SshConnector::new(cli.ssh_options(&settings)));
            let snapshot = session::refresh(&pool, &inventory, settings.max_workers);
            if json {
                terminal.print(
                    &serde_json::to_string_pretty(&snapshot).context("Failed to encode status")?,
                );
            } else {
                let history = HistoryStore::new(&cli.history).load();
                for line in session::render_snapshot(&snapshot, &history, &mut AppColors::default()) {
                    terminal.print(&line);
                }
            }
            pool.close_all();
        }
        Commands::Session => {
            inventory.validate().context("Refusing to contact clusters")?;
            let settings = cli.settings();
            let operator = Operator::detect(cli.operator.clone());
            let history = HistoryStore::new(&cli.history);
            let pool = ConnectionPool::new(SshConnector::new(cli.ssh_options(&settings)));

            // Open every master up front so password prompts come one at a time
            for cluster in inventory.clusters() {
                if let Err(e) = pool.channel(cluster) {
                    warn!(cluster, error = %e, "Cluster unreachable");
                }
            }
            info!(connections = pool.open_count(), "Cluster connections open");

            Session::new(&inventory, &pool, &history, &operator, &settings).run(&mut terminal);
            pool.close_all();
        }
    }

    info!("nas-dr exiting");
    Ok(())
}
