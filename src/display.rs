//! Table, detail and menu rendering.
//!
//! Replication tables are laid out by ratatui's `Table` widget into an
//! off-screen buffer sized to fit, then printed inline with crossterm colours,
//! so the console stays a plain scrolling terminal.

use std::collections::HashMap;

use crossterm::style::Stylize;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Row, Table, Widget};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::config::Application;
use crate::history::{ActionHistory, NO_ACTION};
use crate::inspector::ReplicationRecord;
use crate::theme::{Styles, Tone, banner, paint, to_crossterm};
use crate::types::{Direction, Procedure, SHOW_DETAILS};

pub const HEADERS: [&str; 10] = [
    "App Name",
    "Volume Name",
    "State",
    "Status",
    "Lag Time",
    "Schedule",
    "Policy",
    "Recent Action",
    "User",
    "Timestamp",
];

/// One volume's relationship in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationRow {
    pub app: String,
    pub volume: String,
    #[serde(flatten)]
    pub record: ReplicationRecord,
}

impl ReplicationRow {
    pub fn new(app: &str, volume: &str, record: ReplicationRecord) -> Self {
        Self {
            app: app.to_string(),
            volume: volume.to_string(),
            record,
        }
    }
}

/// Stable per-application colour, assigned in first-seen order for the
/// whole session.
#[derive(Debug, Default)]
pub struct AppColors {
    assigned: HashMap<String, usize>,
}

impl AppColors {
    pub fn index(&mut self, app: &str) -> usize {
        let next = self.assigned.len();
        *self.assigned.entry(app.to_string()).or_insert(next)
    }
}

fn cells_for(row: &ReplicationRow, history: &ActionHistory) -> [String; 10] {
    let (action, user, timestamp) = match history.latest(&row.app) {
        Some(entry) => (entry.action.clone(), entry.user.clone(), entry.timestamp.clone()),
        None => (NO_ACTION.into(), NO_ACTION.into(), NO_ACTION.into()),
    };
    let r = &row.record;
    [
        row.app.clone(),
        row.volume.clone(),
        r.state.clone(),
        r.status.clone(),
        r.lag_time.clone(),
        r.schedule.clone(),
        r.policy.clone(),
        action,
        user,
        timestamp,
    ]
}

/// Render the table for `direction`, or its "none found" banner.
pub fn render_replication_table(
    direction: Direction,
    rows: &[ReplicationRow],
    history: &ActionHistory,
    colors: &mut AppColors,
) -> Vec<String> {
    if rows.is_empty() {
        return vec![
            String::new(),
            banner(
                &format!("===== NO ACTIVE {} REPLICATION FOUND =====", direction.heading()),
                Tone::Warning,
            ),
        ];
    }

    let body: Vec<[String; 10]> = rows.iter().map(|row| cells_for(row, history)).collect();
    let mut widths: Vec<u16> = HEADERS.iter().map(|h| h.len() as u16).collect();
    for cells in &body {
        for (w, cell) in widths.iter_mut().zip(cells.iter()) {
            *w = (*w).max(cell.chars().count() as u16);
        }
    }

    let table_rows: Vec<Row> = rows
        .iter()
        .zip(body)
        .map(|(row, cells)| {
            let app_style = Styles::app_name(colors.index(&row.app));
            let mut cells = cells.into_iter();
            let first = Cell::from(cells.next().unwrap_or_default()).style(app_style);
            Row::new(std::iter::once(first).chain(cells.map(Cell::from)))
        })
        .collect();

    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h)))
        .style(Styles::header())
        .bottom_margin(1);
    let table = Table::new(table_rows, widths.iter().map(|w| Constraint::Length(*w)))
        .header(header)
        .style(Styles::table())
        .column_spacing(3)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );

    let width = widths.iter().sum::<u16>() + 3 * (widths.len() as u16 - 1) + 2;
    let height = rows.len() as u16 + 4;
    let area = Rect::new(0, 0, width, height);
    let mut buffer = Buffer::empty(area);
    table.render(area, &mut buffer);

    let mut lines = vec![
        String::new(),
        banner(
            &format!("===== CURRENT {} REPLICATION =====", direction.heading()),
            Tone::Info,
        ),
        String::new(),
    ];
    lines.extend(buffer_lines(&buffer));
    lines
}

/// Print a rendered buffer row by row, colouring runs of equal style.
fn buffer_lines(buffer: &Buffer) -> Vec<String> {
    let area = buffer.area;
    let mut lines = Vec::with_capacity(area.height as usize);
    for y in area.top()..area.bottom() {
        let mut line = String::new();
        let mut run = String::new();
        let mut run_style: Option<(Color, bool)> = None;
        for x in area.left()..area.right() {
            let Some(cell) = buffer.cell((x, y)) else {
                continue;
            };
            let style = (cell.fg, cell.modifier.contains(Modifier::BOLD));
            if run_style != Some(style) {
                flush_run(&mut line, &mut run, run_style);
                run_style = Some(style);
            }
            run.push_str(cell.symbol());
        }
        flush_run(&mut line, &mut run, run_style);
        lines.push(line.trim_end().to_string());
    }
    lines
}

fn flush_run(line: &mut String, run: &mut String, style: Option<(Color, bool)>) {
    if run.is_empty() {
        return;
    }
    match style {
        Some((fg, bold)) if fg != Color::Reset || bold => {
            let mut styled = run.as_str().with(to_crossterm(fg));
            if bold {
                styled = styled.bold();
            }
            line.push_str(&styled.to_string());
        }
        _ => line.push_str(run),
    }
    run.clear();
}

/// The `show details` view of one application.
pub fn render_details(app: &Application) -> Vec<String> {
    let rule = "=".repeat(40);
    let mut plain = vec![
        format!("Prod Cluster      : {}", app.prod_cluster),
        format!("DR Cluster        : {}", app.dr_cluster),
        format!("Prod Vserver      : {}", app.prod_vserver),
        format!("DR Vserver        : {}", app.dr_vserver),
    ];
    if let Some(details) = app.details.as_deref().filter(|d| !d.trim().is_empty()) {
        plain.push(String::new());
        plain.push("Details:".to_string());
        plain.extend(details.lines().map(str::to_string));
    }
    for volume in &app.volumes {
        let name = volume.name();
        plain.push(String::new());
        plain.push(format!("Volume Name       : {}", name));
        plain.push(format!("  Source Path     : {}:{}", app.prod_vserver, name));
        plain.push(format!("  Destination Path: {}:{}", app.dr_vserver, name));
        for target in volume.share_targets() {
            match target.qtree {
                Some(qtree) => {
                    plain.push(format!("    Qtree         : {}", qtree));
                    plain.push(format!("    CIFS Share    : {}", target.share));
                }
                None => plain.push(format!("  CIFS Share      : {}", target.share)),
            }
        }
    }

    let mut lines = vec![
        String::new(),
        format!(
            "{} {}:",
            "App Details for".with(to_crossterm(Color::Cyan)).bold(),
            app.name
        ),
        paint(&rule, Tone::Warning),
    ];
    lines.extend(plain.iter().map(|l| paint(l, Tone::Warning)));
    lines.push(paint(&rule, Tone::Warning));
    lines
}

/// The action menu shown after an application is selected.
pub fn render_menu() -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "What action would you like to perform on the app?"
            .with(to_crossterm(Color::Magenta))
            .bold()
            .to_string(),
        String::new(),
        format!("1. {}", SHOW_DETAILS),
    ];
    for (i, procedure) in Procedure::iter().enumerate() {
        let hint = procedure.menu_hint().map(|h| format!(" {}", h)).unwrap_or_default();
        lines.push(format!("{}. {}{}", i + 2, procedure, hint));
    }
    lines
}
