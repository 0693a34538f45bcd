//! Persisted action history.
//!
//! A YAML map of application name to the list of actions performed on it,
//! oldest first. The file usually sits on a shared path and is read and
//! rewritten whole by every console that records an action; there is no
//! locking, so two consoles recording at the same moment can lose one entry.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NasDrError, Result};

/// `Monday 07-Oct-2024 02:15:09 PM`
pub const TIMESTAMP_FORMAT: &str = "%A %d-%b-%Y %I:%M:%S %p";

/// Placeholder shown when an application has no recorded action.
pub const NO_ACTION: &str = "-";

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub action: String,
    pub user: String,
    pub timestamp: String,
}

/// Older files stored a single entry per application instead of a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntries {
    Many(Vec<ActionLogEntry>),
    One(ActionLogEntry),
}

impl From<StoredEntries> for Vec<ActionLogEntry> {
    fn from(stored: StoredEntries) -> Self {
        match stored {
            StoredEntries::Many(entries) => entries,
            StoredEntries::One(entry) => vec![entry],
        }
    }
}

/// In-memory view of the history file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionHistory {
    entries: BTreeMap<String, Vec<ActionLogEntry>>,
}

impl ActionHistory {
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let stored: Option<BTreeMap<String, StoredEntries>> = serde_yaml::from_str(content)?;
        let entries = stored
            .unwrap_or_default()
            .into_iter()
            .map(|(app, stored)| (app, stored.into()))
            .collect();
        Ok(Self { entries })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.entries)?)
    }

    /// All actions for `app`, oldest first.
    pub fn entries(&self, app: &str) -> &[ActionLogEntry] {
        self.entries.get(app).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn latest(&self, app: &str) -> Option<&ActionLogEntry> {
        self.entries(app).last()
    }

    pub fn push(&mut self, app: &str, entry: ActionLogEntry) {
        self.entries.entry(app.to_string()).or_default().push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where timestamps take their UTC offset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// The machine's local zone, resolved per timestamp so DST changes
    /// during a long session are honoured.
    Local,
    Fixed(FixedOffset),
}

/// Who is running the console and in which time zone.
///
/// Resolved once at start-up and handed to everything that records history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub user: String,
    pub clock: Clock,
    /// Free-form label such as `Europe/London` or `+01:00`.
    pub timezone: String,
}

impl Operator {
    /// An operator whose timestamps always use `offset`.
    pub fn new(user: impl Into<String>, offset: FixedOffset, timezone: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            clock: Clock::Fixed(offset),
            timezone: timezone.into(),
        }
    }

    /// Login name from the environment (unless overridden) and the local
    /// zone of this machine.
    pub fn detect(user_override: Option<String>) -> Self {
        let user = user_override
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("LOGNAME").ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let timezone = std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| Local::now().offset().fix().to_string());
        Self {
            user,
            clock: Clock::Local,
            timezone,
        }
    }

    /// Format `at` in this operator's zone.
    pub fn timestamp(&self, at: DateTime<Utc>) -> String {
        match self.clock {
            Clock::Local => at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
            Clock::Fixed(offset) => at.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// A history entry for `action` performed now.
    pub fn entry(&self, action: &str) -> ActionLogEntry {
        ActionLogEntry {
            action: action.to_string(),
            user: self.user.clone(),
            timestamp: self.timestamp(Utc::now()),
        }
    }
}

/// The history file on disk.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file; a missing file is an empty history.
    pub fn try_load(&self) -> Result<ActionHistory> {
        match fs::read_to_string(&self.path) {
            Ok(content) => ActionHistory::from_yaml(&content).map_err(|e| {
                NasDrError::history(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No history file yet");
                Ok(ActionHistory::default())
            }
            Err(e) => Err(NasDrError::history(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Read the file for display; unreadable history is logged and treated
    /// as empty.
    pub fn load(&self) -> ActionHistory {
        self.try_load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load recent actions");
            ActionHistory::default()
        })
    }

    /// Append one entry for `app` and rewrite the file.
    ///
    /// Refuses to overwrite a file it cannot parse.
    pub fn append(&self, app: &str, entry: ActionLogEntry) -> Result<()> {
        let mut history = self.try_load()?;
        history.push(app, entry.clone());
        let yaml = history.to_yaml()?;
        fs::write(&self.path, yaml).map_err(|e| {
            NasDrError::history(format!("failed to write {}: {}", self.path.display(), e))
        })?;
        info!(app, action = %entry.action, user = %entry.user, "Recorded action");
        Ok(())
    }
}
