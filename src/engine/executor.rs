//! Plan execution.
//!
//! Steps run in order and, within a step, volumes run in inventory order. A
//! volume whose operation fails is dropped from every later step; the other
//! volumes carry on. Nothing is rolled back.

use std::collections::HashMap;
use std::fmt;

use tracing::{error, info, warn};

use super::SiteChannels;
use super::plan::{ProcedurePlan, RemoteOp, StepAction};
use crate::actions::{self, ActionError, Convergence, PollPolicy, ShareCreated};
use crate::config::cluster_label;
use crate::console::Console;
use crate::remote::ControlChannel;
use crate::theme::{Tone, paint};

/// Final state of one volume after the plan was walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeStatus {
    /// Every planned operation succeeded.
    Succeeded,
    /// The plan had nothing to run for this volume.
    Skipped,
    /// An operation failed; later operations were not attempted.
    Failed { step: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeOutcome {
    pub volume: String,
    pub status: VolumeStatus,
    /// Skips and warnings collected along the way.
    pub notes: Vec<String>,
}

/// Per-volume outcomes, in inventory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcomes: Vec<VolumeOutcome>,
}

impl ExecutionReport {
    pub fn outcome(&self, volume: &str) -> Option<&VolumeOutcome> {
        self.outcomes.iter().find(|o| o.volume == volume)
    }

    pub fn failed(&self) -> impl Iterator<Item = &VolumeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, VolumeStatus::Failed { .. }))
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.status {
                VolumeStatus::Succeeded => writeln!(f, "{}: completed", outcome.volume)?,
                VolumeStatus::Skipped => writeln!(f, "{}: skipped", outcome.volume)?,
                VolumeStatus::Failed { step, error } => {
                    writeln!(f, "{}: FAILED at \"{}\": {}", outcome.volume, step, error)?
                }
            }
        }
        Ok(())
    }
}

struct Tracker {
    failed: Option<(String, String)>,
    ran_anything: bool,
    notes: Vec<String>,
}

/// Walk `plan` against the two sites, reporting progress on `console`.
pub fn execute(
    plan: &ProcedurePlan,
    channels: &SiteChannels,
    poll: &PollPolicy,
    console: &mut dyn Console,
) -> ExecutionReport {
    let mut order: Vec<String> = Vec::new();
    let mut trackers: HashMap<String, Tracker> = HashMap::new();
    for step in &plan.steps {
        for entry in &step.entries {
            if !trackers.contains_key(&entry.volume) {
                order.push(entry.volume.clone());
                trackers.insert(
                    entry.volume.clone(),
                    Tracker { failed: None, ran_anything: false, notes: Vec::new() },
                );
            }
        }
    }

    for (i, step) in plan.steps.iter().enumerate() {
        let label = cluster_label(plan.cluster(step.site));
        console.print("");
        console.print(&paint(
            &format!("Step {}: {} @ {}", i + 1, step.title, label),
            Tone::Info,
        ));
        let channel = channels.get(step.site);

        for entry in &step.entries {
            let Some(tracker) = trackers.get_mut(&entry.volume) else {
                continue;
            };
            if let Some((failed_step, _)) = &tracker.failed {
                console.print(&paint(
                    &format!("{}: skipped, failed earlier at \"{}\"", entry.volume, failed_step),
                    Tone::Warning,
                ));
                continue;
            }

            let ops = match &entry.action {
                StepAction::Skip(reason) => {
                    console.print(&paint(&format!("{}: {}", entry.volume, reason), Tone::Warning));
                    tracker.notes.push(format!("{}: {}", step.title, reason));
                    continue;
                }
                StepAction::Run(ops) => ops,
            };

            tracker.ran_anything = true;
            for op in ops {
                console.print(&format!("{}: {}", label, op.command()));
                match perform(op, channel, poll) {
                    Ok(note) => {
                        if let Some(note) = note {
                            console.print(&paint(&format!("{}: {}", label, note), Tone::Warning));
                            tracker.notes.push(note);
                        }
                    }
                    Err(e) => {
                        error!(
                            app = %plan.application,
                            volume = %entry.volume,
                            step = %step.title,
                            error = %e,
                            "Operation failed"
                        );
                        console.print(&paint(
                            &format!("{}: {} failed: {}", label, entry.volume, e),
                            Tone::Error,
                        ));
                        tracker.failed = Some((step.title.clone(), e.to_string()));
                        break;
                    }
                }
            }
            if tracker.failed.is_none() {
                console.print(&paint(&format!("{}: {} done", label, entry.volume), Tone::Success));
            }
        }
    }

    let outcomes = order
        .into_iter()
        .filter_map(|volume| {
            let tracker = trackers.remove(&volume)?;
            let status = match tracker.failed {
                Some((step, error)) => VolumeStatus::Failed { step, error },
                None if tracker.ran_anything => VolumeStatus::Succeeded,
                None => VolumeStatus::Skipped,
            };
            Some(VolumeOutcome { volume, status, notes: tracker.notes })
        })
        .collect();
    let report = ExecutionReport { outcomes };
    info!(
        app = %plan.application,
        procedure = %plan.procedure,
        failed = report.failed().count(),
        "Procedure executed"
    );
    report
}

/// Perform one operation. `Ok(Some(note))` is a success worth mentioning.
fn perform(
    op: &RemoteOp,
    channel: &dyn ControlChannel,
    poll: &PollPolicy,
) -> Result<Option<String>, ActionError> {
    match op {
        RemoteOp::Snapmirror { verb, vserver, volume } => {
            let output = actions::apply_verb(channel, vserver, volume, *verb)?;
            let mut notes = Vec::new();
            if output.confirmed_warning {
                notes.push(format!("stale snapshot warning on {} confirmed", volume));
            }
            if !output.is_marked_succeeded() {
                notes.push(format!("no success marker for {} on {}; verify manually", verb, volume));
            }
            Ok((!notes.is_empty()).then(|| notes.join("; ")))
        }
        RemoteOp::AwaitStatus { vserver, volume, status } => {
            match actions::await_status(channel, vserver, volume, status, poll) {
                Convergence::Reached => Ok(None),
                Convergence::TimedOut { last_status } => Err(ActionError::TimedOut {
                    target: status.clone(),
                    last_status,
                }),
            }
        }
        RemoteOp::CreateShare { vserver, share, path } => {
            match actions::create_share(channel, vserver, share, path)? {
                ShareCreated::Created => Ok(None),
                ShareCreated::AlreadyExisted => Ok(Some(format!("CIFS share '{}' already exists", share))),
            }
        }
        RemoteOp::EnsureShare { vserver, share, path } => {
            if actions::share_exists(channel, vserver, share)? {
                return Ok(Some(format!("CIFS share '{}' already present", share)));
            }
            warn!(share = %share, "CIFS share missing, creating it");
            match actions::create_share(channel, vserver, share, path)? {
                ShareCreated::Created => Ok(None),
                ShareCreated::AlreadyExisted => Ok(Some(format!("CIFS share '{}' already exists", share))),
            }
        }
        _ => actions::run_checked(channel, &op.command()).map(|_| None),
    }
}
