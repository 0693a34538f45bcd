//! The interactive session loop.
//!
//! Each pass re-reads the history file, inspects every application in
//! parallel, prints both replication tables and waits for the operator to pick
//! an application (or `reload`, or leave).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::actions::{self, PollPolicy};
use crate::config::{Application, Inventory, Settings, cluster_label};
use crate::console::Console;
use crate::display::{self, AppColors, ReplicationRow};
use crate::engine::{self, EngineContext, SiteChannels};
use crate::history::{ActionHistory, HistoryStore, Operator};
use crate::inspector::{self, ReplicationRecord};
use crate::remote::ConnectionPool;
use crate::theme::{Tone, banner, paint};
use crate::types::{Direction, MenuChoice, is_recognized_action};

pub const APP_PROMPT: &str = "Enter the app name to action (or type 'reload' to refresh): ";
pub const ACTION_PROMPT: &str = "Choose the action (case sensitive): ";

// ============================================================================
// Refresh
// ============================================================================

/// Both replication tables, filtered and sorted by (application, volume).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub prod_to_dr: Vec<ReplicationRow>,
    pub dr_to_prod: Vec<ReplicationRow>,
}

impl Snapshot {
    /// Drop forward rows with no relationship and sort both lists.
    pub fn assemble(mut forward: Vec<ReplicationRow>, mut reverse: Vec<ReplicationRow>) -> Self {
        forward.retain(|row| !row.record.is_absent());
        let by_key = |a: &ReplicationRow, b: &ReplicationRow| {
            (a.app.as_str(), a.volume.as_str()).cmp(&(b.app.as_str(), b.volume.as_str()))
        };
        forward.sort_by(by_key);
        reverse.sort_by(by_key);
        Self {
            prod_to_dr: forward,
            dr_to_prod: reverse,
        }
    }
}

/// Rows gathered for one application.
#[derive(Debug, Default)]
struct AppRows {
    forward: Vec<ReplicationRow>,
    reverse: Vec<ReplicationRow>,
}

impl AppRows {
    /// Every volume of `app` as an `Error` forward row.
    fn unreadable(app: &Application) -> Self {
        Self {
            forward: app
                .volumes
                .iter()
                .map(|v| ReplicationRow::new(&app.name, v.name(), ReplicationRecord::error()))
                .collect(),
            reverse: Vec::new(),
        }
    }
}

/// Inspect both directions of every volume of `app`.
///
/// When a cluster cannot be reached every forward row is `Error`.
fn inspect_application(pool: &ConnectionPool, app: &Application) -> AppRows {
    let channels = match SiteChannels::open(pool, app) {
        Ok(channels) => channels,
        Err(e) => {
            warn!(app = %app.name, error = %e, "Cannot reach clusters");
            return AppRows::unreadable(app);
        }
    };

    let mut rows = AppRows::default();
    for volume in &app.volumes {
        let name = volume.name();
        let forward_site = Direction::ProdToDr.destination();
        let forward = inspector::inspect_forward(channels.get(forward_site), app.vserver(forward_site), name);
        rows.forward.push(ReplicationRow::new(&app.name, name, forward));
        let reverse_site = Direction::DrToProd.destination();
        if let Some(reverse) = inspector::inspect_reverse(channels.get(reverse_site), app.vserver(reverse_site), name) {
            rows.reverse.push(ReplicationRow::new(&app.name, name, reverse));
        }
    }
    rows
}

/// Inspect every application on up to `max_workers` threads.
///
/// Workers pull application indices from a shared counter and keep their
/// own row buffers; buffers are merged once every worker has finished. An
/// application whose inspection panics is reported with `Error` rows.
pub fn refresh(pool: &ConnectionPool, inventory: &Inventory, max_workers: usize) -> Snapshot {
    let apps = &inventory.applications;
    let workers = max_workers.max(1).min(apps.len().max(1));
    let next = AtomicUsize::new(0);
    debug!(apps = apps.len(), workers, "Refreshing replication state");

    let buffers: Vec<AppRows> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = AppRows::default();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(app) = apps.get(i) else { break };
                        let rows = panic::catch_unwind(AssertUnwindSafe(|| inspect_application(pool, app)))
                            .unwrap_or_else(|_| {
                                warn!(app = %app.name, "Inspection panicked, showing volumes as Error");
                                AppRows::unreadable(app)
                            });
                        local.forward.extend(rows.forward);
                        local.reverse.extend(rows.reverse);
                    }
                    local
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(rows) => Some(rows),
                Err(_) => {
                    warn!("Refresh worker panicked, its applications are missing from this snapshot");
                    None
                }
            })
            .collect()
    });

    let (forward, reverse) = buffers.into_iter().fold(
        (Vec::new(), Vec::new()),
        |(mut forward, mut reverse), rows| {
            forward.extend(rows.forward);
            reverse.extend(rows.reverse);
            (forward, reverse)
        },
    );
    Snapshot::assemble(forward, reverse)
}

/// Both tables as printable lines.
pub fn render_snapshot(snapshot: &Snapshot, history: &ActionHistory, colors: &mut AppColors) -> Vec<String> {
    let mut lines =
        display::render_replication_table(Direction::ProdToDr, &snapshot.prod_to_dr, history, colors);
    lines.extend(display::render_replication_table(
        Direction::DrToProd,
        &snapshot.dr_to_prod,
        history,
        colors,
    ));
    lines
}

// ============================================================================
// Pass-through verbs
// ============================================================================

/// A verb typed at the menu may only be a single plain token.
pub fn is_safe_verb(verb: &str) -> bool {
    !verb.is_empty()
        && verb
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// Session
// ============================================================================

/// State shared by every pass of the loop.
pub struct Session<'a> {
    inventory: &'a Inventory,
    pool: &'a ConnectionPool,
    history: &'a HistoryStore,
    operator: &'a Operator,
    settings: &'a Settings,
    colors: AppColors,
}

impl<'a> Session<'a> {
    pub fn new(
        inventory: &'a Inventory,
        pool: &'a ConnectionPool,
        history: &'a HistoryStore,
        operator: &'a Operator,
        settings: &'a Settings,
    ) -> Self {
        Self {
            inventory,
            pool,
            history,
            operator,
            settings,
            colors: AppColors::default(),
        }
    }

    /// Run until end of input, `quit` or `exit`.
    pub fn run(&mut self, console: &mut dyn Console) {
        info!(user = %self.operator.user, timezone = %self.operator.timezone, "Session started");
        loop {
            let history = self.history.load();
            let snapshot = refresh(self.pool, self.inventory, self.settings.max_workers);
            for line in render_snapshot(&snapshot, &history, &mut self.colors) {
                console.print(&line);
            }

            let Some(input) = console.prompt(&paint(APP_PROMPT, Tone::Info)) else {
                break;
            };
            match input.trim() {
                "" | "reload" => continue,
                "quit" | "exit" => break,
                name => match self.inventory.find(name) {
                    Some(app) => self.handle_application(app, console),
                    None => console.print(&paint(
                        &format!("App '{}' not found in input data.", name),
                        Tone::Error,
                    )),
                },
            }
        }
        info!("Session ended");
    }

    /// Show the menu for `app` and dispatch the operator's choice.
    pub fn handle_application(&mut self, app: &Application, console: &mut dyn Console) {
        for line in display::render_menu() {
            console.print(&line);
        }
        let Some(answer) = console.prompt(&paint(ACTION_PROMPT, Tone::Info)) else {
            return;
        };

        match MenuChoice::parse(answer.trim()) {
            MenuChoice::ShowDetails => {
                for line in display::render_details(app) {
                    console.print(&line);
                }
            }
            MenuChoice::Run(procedure) => {
                let channels = match SiteChannels::open(self.pool, app) {
                    Ok(channels) => channels,
                    Err(e) => {
                        console.print(&paint(&format!("Cannot reach clusters: {}", e), Tone::Error));
                        return;
                    }
                };
                let ctx = EngineContext {
                    channels: &channels,
                    history: self.history,
                    operator: self.operator,
                    poll: PollPolicy::from(self.settings),
                };
                engine::run_procedure(procedure, app, &ctx, console);
            }
            MenuChoice::PassThrough(verb) => self.pass_through(app, &verb, console),
        }
    }

    /// Apply an operator-typed verb to every volume on the DR cluster.
    fn pass_through(&mut self, app: &Application, verb: &str, console: &mut dyn Console) {
        if !is_safe_verb(verb) {
            console.print(&paint(
                &format!("Refusing '{}': an action must be a single word.", verb),
                Tone::Error,
            ));
            return;
        }
        let channels = match SiteChannels::open(self.pool, app) {
            Ok(channels) => channels,
            Err(e) => {
                console.print(&paint(&format!("Cannot reach clusters: {}", e), Tone::Error));
                return;
            }
        };

        warn!(app = %app.name, verb, "Applying unrecognised verb");
        console.print(&banner(
            &format!(
                "WARNING: '{}' is not a known procedure; sending 'snapmirror {}' for every volume",
                verb, verb
            ),
            Tone::Error,
        ));

        let label = cluster_label(&app.dr_cluster);
        for volume in &app.volumes {
            match actions::apply(channels.dr.as_ref(), &app.dr_vserver, volume.name(), verb) {
                Ok(output) => match output.success_line() {
                    Some(line) => console.print(&paint(&format!("{}: {}", label, line), Tone::Success)),
                    None => console.print(&paint(
                        &format!("{}: no success marker for {}; verify manually", label, volume.name()),
                        Tone::Warning,
                    )),
                },
                Err(e) => console.print(&paint(
                    &format!("Error performing '{}' on {}: {}", verb, volume.name(), e),
                    Tone::Error,
                )),
            }
        }

        if is_recognized_action(verb) {
            if let Err(e) = self.history.append(&app.name, self.operator.entry(verb)) {
                console.print(&paint(&format!("Could not record action: {}", e), Tone::Error));
            }
        } else {
            console.print(&paint(
                &format!("Invalid action '{}' specified. It will not be recorded.", verb),
                Tone::Error,
            ));
        }
    }
}
