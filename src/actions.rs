//! Single remote operations and the convergence poller.
//!
//! Every mutation the console performs is one call in this module. An
//! operation fails only when the cluster writes to the error stream; a
//! SnapMirror verb without the "Operation succeeded" line (queued transfers
//! print "Operation is queued") still counts as done and is flagged for
//! manual verification.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::inspector::{self, NO_ENTRIES};
use crate::remote::{CommandOutput, ControlChannel};
use crate::types::SnapmirrorVerb;

/// Printed by the cluster before it discards data newer than the last
/// common snapshot; the command then waits for a y/n answer.
pub const STALE_SNAPSHOT_WARNING: &str = "Warning: All data newer than Snapshot copy";
/// Success marker of SnapMirror verbs.
pub const OPERATION_SUCCEEDED: &str = "Operation succeeded";

/// Why a single remote operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The cluster rejected the command; first line of its error stream.
    #[error("{0}")]
    Rejected(String),

    /// The stale-snapshot prompt arrived after the answer window closed, so
    /// the cluster read end of input as "no".
    #[error("stale snapshot prompt arrived too late to be confirmed; re-run {verb} on {volume}")]
    LatePrompt { verb: String, volume: String },

    /// The command never completed on the channel.
    #[error("channel failure: {0}")]
    Channel(String),

    /// A status wait hit its deadline.
    #[error("timed out waiting for status {target} (last seen {last_status})")]
    TimedOut { target: String, last_status: String },
}

impl ActionError {
    fn from_output(output: &CommandOutput) -> Self {
        Self::Rejected(output.first_error_line().unwrap_or_default().to_string())
    }
}

/// Result of a successful SnapMirror verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub stdout: String,
    /// The stale-snapshot prompt was answered.
    pub confirmed_warning: bool,
}

impl ActionOutput {
    /// The line carrying the success marker.
    pub fn success_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .find(|line| line.contains(OPERATION_SUCCEEDED))
    }

    /// Whether the cluster printed the success marker.
    pub fn is_marked_succeeded(&self) -> bool {
        self.success_line().is_some()
    }
}

/// `snapmirror {verb} -destination-path {vserver}:{volume}`
pub fn snapmirror_command(verb: &str, vserver: &str, volume: &str) -> String {
    format!("snapmirror {} -destination-path {}:{}", verb, vserver, volume)
}

pub fn share_create_command(vserver: &str, share: &str, path: &str) -> String {
    format!(
        "cifs share create -vserver {} -share-name {} -path {}",
        vserver, share, path
    )
}

pub fn share_show_command(vserver: &str, share: &str) -> String {
    format!("cifs share show -vserver {} -share-name {}", vserver, share)
}

/// Apply a SnapMirror verb to the relationship whose destination is
/// `vserver:volume`.
///
/// `verb` is normally a [`SnapmirrorVerb`], but the session also passes
/// operator-typed verbs through.
pub fn apply(
    channel: &dyn ControlChannel,
    vserver: &str,
    volume: &str,
    verb: &str,
) -> Result<ActionOutput, ActionError> {
    let command = snapmirror_command(verb, vserver, volume);
    debug!(cluster = channel.cluster(), command = %command, "Applying SnapMirror verb");

    let mut pending = channel
        .start(&command)
        .map_err(|e| ActionError::Channel(e.to_string()))?;

    let confirmed_warning = pending.output().contains(STALE_SNAPSHOT_WARNING);
    if confirmed_warning {
        warn!(volume, verb, "Stale snapshot warning, confirming to proceed");
        pending
            .send_line("y")
            .map_err(|e| ActionError::Channel(e.to_string()))?;
    }

    let output = pending
        .finish()
        .map_err(|e| ActionError::Channel(e.to_string()))?;
    if !confirmed_warning && output.stdout.contains(STALE_SNAPSHOT_WARNING) {
        warn!(volume, verb, "Stale snapshot prompt arrived after the answer window");
        return Err(ActionError::LatePrompt {
            verb: verb.to_string(),
            volume: volume.to_string(),
        });
    }
    if output.has_error() {
        return Err(ActionError::from_output(&output));
    }
    if !output.stdout.contains(OPERATION_SUCCEEDED) {
        warn!(volume, verb, "No success marker in SnapMirror output");
    }
    Ok(ActionOutput {
        stdout: output.stdout,
        confirmed_warning,
    })
}

/// [`apply`] for one of the known verbs.
pub fn apply_verb(
    channel: &dyn ControlChannel,
    vserver: &str,
    volume: &str,
    verb: SnapmirrorVerb,
) -> Result<ActionOutput, ActionError> {
    apply(channel, vserver, volume, &verb.to_string())
}

/// Run a command that succeeds when its error stream stays empty.
pub fn run_checked(channel: &dyn ControlChannel, command: &str) -> Result<String, ActionError> {
    debug!(cluster = channel.cluster(), command, "Running command");
    let output = channel
        .run(command)
        .map_err(|e| ActionError::Channel(e.to_string()))?;
    if output.has_error() {
        return Err(ActionError::from_output(&output));
    }
    Ok(output.stdout)
}

/// What `cifs share create` reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareCreated {
    Created,
    AlreadyExisted,
}

/// Create a share; an existing share with that name counts as success.
pub fn create_share(
    channel: &dyn ControlChannel,
    vserver: &str,
    share: &str,
    path: &str,
) -> Result<ShareCreated, ActionError> {
    let output = channel
        .run(&share_create_command(vserver, share, path))
        .map_err(|e| ActionError::Channel(e.to_string()))?;

    let already = |text: &str| text.to_lowercase().contains("already exists");
    if already(&output.stdout) || already(&output.stderr) {
        warn!(cluster = channel.cluster(), share, "CIFS share already exists");
        return Ok(ShareCreated::AlreadyExisted);
    }
    if output.has_error() {
        return Err(ActionError::from_output(&output));
    }
    Ok(ShareCreated::Created)
}

/// Whether `share` exists on `vserver`.
pub fn share_exists(
    channel: &dyn ControlChannel,
    vserver: &str,
    share: &str,
) -> Result<bool, ActionError> {
    let output = channel
        .run(&share_show_command(vserver, share))
        .map_err(|e| ActionError::Channel(e.to_string()))?;
    if output.stdout.contains(NO_ENTRIES) || output.stderr.contains(NO_ENTRIES) {
        return Ok(false);
    }
    if output.has_error() {
        return Err(ActionError::from_output(&output));
    }
    Ok(!output.stdout.trim().is_empty())
}

/// Polling cadence for [`await_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&Settings> for PollPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.poll_interval,
            timeout: settings.poll_timeout,
        }
    }
}

/// Outcome of waiting for a relationship status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    Reached,
    TimedOut { last_status: String },
}

/// Re-inspect the prod→DR-style relationship at `vserver:volume` until its
/// status equals `target` (case-insensitive) or the deadline passes.
///
/// N non-matching polls followed by a match cost exactly N+1 inspections.
pub fn await_status(
    channel: &dyn ControlChannel,
    vserver: &str,
    volume: &str,
    target: &str,
    policy: &PollPolicy,
) -> Convergence {
    let started = Instant::now();
    loop {
        let record = inspector::inspect_forward(channel, vserver, volume);
        if record.status.eq_ignore_ascii_case(target) {
            info!(cluster = channel.cluster(), volume, status = %record.status, "Reached target status");
            return Convergence::Reached;
        }
        if started.elapsed() >= policy.timeout {
            warn!(
                cluster = channel.cluster(),
                volume,
                target,
                last_status = %record.status,
                "Timed out waiting for status"
            );
            return Convergence::TimedOut {
                last_status: record.status,
            };
        }
        info!(
            cluster = channel.cluster(),
            volume,
            status = %record.status,
            "Waiting for status {}", target
        );
        thread::sleep(policy.interval);
    }
}
