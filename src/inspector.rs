//! Replication state inspection.
//!
//! Queries one direction of a volume's SnapMirror relationship and extracts
//! the five fields the console cares about. The CLI's field table is read
//! from the tail of the matching line, so leading columns (and their count)
//! never matter.

use serde::Serialize;
use tracing::warn;

use crate::remote::ControlChannel;

/// Field value when no relationship matched.
pub const NOT_AVAILABLE: &str = "N/A";
/// Field value when the query itself failed.
pub const ERROR: &str = "Error";
/// What the cluster prints for a query with no results.
pub const NO_ENTRIES: &str = "There are no entries matching your query.";

/// Columns requested from `snapmirror show`.
const FIELDS: &str = "lag-time,state,status,schedule,policy";

/// One direction of a volume's replication relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationRecord {
    pub lag_time: String,
    pub state: String,
    pub status: String,
    pub schedule: String,
    pub policy: String,
}

impl ReplicationRecord {
    fn filled(value: &str) -> Self {
        Self {
            lag_time: value.to_string(),
            state: value.to_string(),
            status: value.to_string(),
            schedule: value.to_string(),
            policy: value.to_string(),
        }
    }

    /// Every field `N/A`.
    pub fn not_available() -> Self {
        Self::filled(NOT_AVAILABLE)
    }

    /// Every field `Error`.
    pub fn error() -> Self {
        Self::filled(ERROR)
    }

    /// No relationship: state, status, lag and schedule are all `N/A`.
    pub fn is_absent(&self) -> bool {
        [&self.state, &self.status, &self.lag_time, &self.schedule]
            .iter()
            .all(|v| v.as_str() == NOT_AVAILABLE)
    }

    pub fn is_error(&self) -> bool {
        self.state == ERROR
    }

    /// Policy and schedule, when both are real values.
    pub fn link_metadata(&self) -> Option<(&str, &str)> {
        let concrete = |v: &str| !v.is_empty() && v != NOT_AVAILABLE && v != ERROR;
        (concrete(&self.policy) && concrete(&self.schedule))
            .then(|| (self.policy.as_str(), self.schedule.as_str()))
    }
}

/// Outcome of scanning `snapmirror show` output for one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(ReplicationRecord),
    /// The cluster said there are no entries.
    NoEntries,
    /// Nothing mentioned both the vserver and the volume.
    NoMatch,
    /// A line matched but had fewer than five fields.
    Malformed(String),
}

/// `snapmirror show` for the relationship whose destination is `vserver:volume`.
pub fn show_command(vserver: &str, volume: &str) -> String {
    format!(
        "snapmirror show -destination-path {}:{} -fields {}",
        vserver, volume, FIELDS
    )
}

/// Read the five fields off the tail of a whitespace-split line.
///
/// Returns `None` when the line has fewer than five fields.
pub fn parse_fields(line: &str) -> Option<ReplicationRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let n = fields.len();
    if n < 5 {
        return None;
    }
    Some(ReplicationRecord {
        lag_time: fields[n - 1].to_string(),
        status: fields[n - 2].to_string(),
        state: fields[n - 3].to_string(),
        policy: fields[n - 4].to_string(),
        schedule: fields[n - 5].to_string(),
    })
}

/// Scan `stdout` for the first line naming both `vserver` and `volume`.
pub fn parse_show_output(stdout: &str, vserver: &str, volume: &str) -> Lookup {
    if stdout.contains(NO_ENTRIES) {
        return Lookup::NoEntries;
    }
    match stdout
        .lines()
        .find(|line| line.contains(vserver) && line.contains(volume))
    {
        Some(line) => match parse_fields(line) {
            Some(record) => Lookup::Found(record),
            None => Lookup::Malformed(line.trim().to_string()),
        },
        None => Lookup::NoMatch,
    }
}

/// Inspect the prod→DR relationship of `volume` (issued on the DR cluster).
///
/// Never fails: a query error yields an all-`Error` record and no match
/// yields all-`N/A`.
pub fn inspect_forward(channel: &dyn ControlChannel, vserver: &str, volume: &str) -> ReplicationRecord {
    let output = match channel.run(&show_command(vserver, volume)) {
        Ok(output) => output,
        Err(e) => {
            warn!(cluster = channel.cluster(), volume, error = %e, "snapmirror show failed");
            return ReplicationRecord::error();
        }
    };
    if output.has_error() {
        warn!(
            cluster = channel.cluster(),
            volume,
            error = output.first_error_line().unwrap_or_default(),
            "Error executing snapmirror show"
        );
        return ReplicationRecord::error();
    }
    match parse_show_output(&output.stdout, vserver, volume) {
        Lookup::Found(record) => record,
        Lookup::NoEntries | Lookup::NoMatch => ReplicationRecord::not_available(),
        Lookup::Malformed(line) => {
            warn!(cluster = channel.cluster(), volume, line = %line, "Malformed snapmirror show line");
            ReplicationRecord::error()
        }
    }
}

/// Inspect the DR→prod relationship of `volume` (issued on the prod cluster).
///
/// Any outcome other than a well-formed match is `None`.
pub fn inspect_reverse(
    channel: &dyn ControlChannel,
    vserver: &str,
    volume: &str,
) -> Option<ReplicationRecord> {
    let output = match channel.run(&show_command(vserver, volume)) {
        Ok(output) => output,
        Err(e) => {
            warn!(cluster = channel.cluster(), volume, error = %e, "Reverse snapmirror show failed");
            return None;
        }
    };
    if output.has_error() {
        warn!(
            cluster = channel.cluster(),
            volume,
            error = output.first_error_line().unwrap_or_default(),
            "Error executing reverse snapmirror show"
        );
        return None;
    }
    match parse_show_output(&output.stdout, vserver, volume) {
        Lookup::Found(record) => Some(record),
        Lookup::Malformed(line) => {
            warn!(cluster = channel.cluster(), volume, line = %line, "Malformed snapmirror show line");
            None
        }
        Lookup::NoEntries | Lookup::NoMatch => None,
    }
}
