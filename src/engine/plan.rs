//! Procedure plans.
//!
//! A plan is the literal list of remote operations a procedure will perform,
//! grouped into steps. It is built once, shown to the operator in full and
//! then executed exactly as shown.

use std::fmt;

use crate::actions;
use crate::config::cluster_label;
use crate::inspector;
use crate::types::{Procedure, Site, SnapmirrorVerb};

// ============================================================================
// Remote Operation Types
// ============================================================================

/// A single remote operation.
///
/// `Display` renders the exact command text sent to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    /// `snapmirror {verb}` on the relationship whose destination is `vserver:volume`.
    Snapmirror {
        verb: SnapmirrorVerb,
        vserver: String,
        volume: String,
    },

    /// Poll the relationship until its status is `status`.
    AwaitStatus {
        vserver: String,
        volume: String,
        status: String,
    },

    VolumeOnline { vserver: String, volume: String },
    VolumeOffline { vserver: String, volume: String },
    VolumeUnmount { vserver: String, volume: String },

    /// Mount at the `/{volume}` junction.
    VolumeMount { vserver: String, volume: String },

    CreateShare {
        vserver: String,
        share: String,
        path: String,
    },

    /// Probe the share and create it only when missing.
    EnsureShare {
        vserver: String,
        share: String,
        path: String,
    },

    DeleteShare { vserver: String, share: String },

    /// `snapmirror create` from `source_vserver:volume` to `destination_vserver:volume`.
    CreateLink {
        source_vserver: String,
        destination_vserver: String,
        volume: String,
        policy: String,
        schedule: String,
    },

    DeleteLink { vserver: String, volume: String },
}

impl RemoteOp {
    /// The command text submitted for this operation.
    ///
    /// For [`RemoteOp::AwaitStatus`] this is the query that gets repeated and
    /// for [`RemoteOp::EnsureShare`] the conditional create.
    pub fn command(&self) -> String {
        match self {
            Self::Snapmirror { verb, vserver, volume } => {
                actions::snapmirror_command(&verb.to_string(), vserver, volume)
            }
            Self::AwaitStatus { vserver, volume, .. } => inspector::show_command(vserver, volume),
            Self::VolumeOnline { vserver, volume } => {
                format!("volume online -vserver {} -volume {}", vserver, volume)
            }
            Self::VolumeOffline { vserver, volume } => {
                format!("volume offline -vserver {} -volume {}", vserver, volume)
            }
            Self::VolumeUnmount { vserver, volume } => {
                format!("volume unmount -vserver {} -volume {}", vserver, volume)
            }
            Self::VolumeMount { vserver, volume } => format!(
                "volume mount -vserver {} -volume {} -junction-path /{}",
                vserver, volume, volume
            ),
            Self::CreateShare { vserver, share, path } | Self::EnsureShare { vserver, share, path } => {
                actions::share_create_command(vserver, share, path)
            }
            Self::DeleteShare { vserver, share } => {
                format!("cifs share delete -vserver {} -share-name {}", vserver, share)
            }
            Self::CreateLink {
                source_vserver,
                destination_vserver,
                volume,
                policy,
                schedule,
            } => format!(
                "snapmirror create -source-path {}:{} -destination-path {}:{} -policy {} -schedule {}",
                source_vserver, volume, destination_vserver, volume, policy, schedule
            ),
            Self::DeleteLink { vserver, volume } => {
                format!("snapmirror delete -destination-path {}:{}", vserver, volume)
            }
        }
    }

    /// Whether performing this operation changes anything on the cluster.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::AwaitStatus { .. })
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitStatus { status, .. } => {
                write!(f, "{}  (repeat until status is {})", self.command(), status)
            }
            Self::EnsureShare { vserver, share, .. } => write!(
                f,
                "{}  (only if `{}` finds nothing)",
                self.command(),
                actions::share_show_command(vserver, share)
            ),
            _ => f.write_str(&self.command()),
        }
    }
}

// ============================================================================
// Plan Types
// ============================================================================

/// What one step does for one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Operations performed in order; the first failure stops the volume.
    Run(Vec<RemoteOp>),
    /// Nothing to do, with the reason shown in the plan.
    Skip(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEntry {
    pub volume: String,
    pub action: StepAction,
}

impl StepEntry {
    pub fn run(volume: &str, ops: Vec<RemoteOp>) -> Self {
        Self {
            volume: volume.to_string(),
            action: StepAction::Run(ops),
        }
    }

    pub fn skip(volume: &str, reason: impl Into<String>) -> Self {
        Self {
            volume: volume.to_string(),
            action: StepAction::Skip(reason.into()),
        }
    }
}

/// A group of operations sent to one site, in volume order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub title: String,
    pub site: Site,
    pub entries: Vec<StepEntry>,
}

impl Step {
    pub fn new(title: impl Into<String>, site: Site) -> Self {
        Self {
            title: title.into(),
            site,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: StepEntry) {
        self.entries.push(entry);
    }
}

/// The complete plan for one procedure on one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedurePlan {
    pub procedure: Procedure,
    pub application: String,
    pub prod_cluster: String,
    pub dr_cluster: String,
    pub steps: Vec<Step>,
}

impl ProcedurePlan {
    pub fn cluster(&self, site: Site) -> &str {
        match site {
            Site::Prod => &self.prod_cluster,
            Site::Dr => &self.dr_cluster,
        }
    }

    /// Every operation in execution order, with the site it is sent to.
    pub fn operations(&self) -> Vec<(Site, &RemoteOp)> {
        let mut ops = Vec::new();
        for step in &self.steps {
            for entry in &step.entries {
                if let StepAction::Run(run) = &entry.action {
                    ops.extend(run.iter().map(|op| (step.site, op)));
                }
            }
        }
        ops
    }

    /// Number of mutating operations the plan would perform.
    pub fn mutation_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|(_, op)| op.is_mutating())
            .count()
    }

    /// Human-readable rendering shown before confirmation.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Starting {} for all volumes in {}.",
            self.procedure, self.application
        )];
        if let Some(hint) = self.procedure.menu_hint() {
            lines[0] = format!("{} {}", lines[0], hint);
        }
        lines.push(String::new());
        lines.push("The following steps will be performed:".to_string());

        for (i, step) in self.steps.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!(
                "Step {}: {} @ {}",
                i + 1,
                step.title,
                cluster_label(self.cluster(step.site))
            ));
            for entry in &step.entries {
                match &entry.action {
                    StepAction::Run(ops) => {
                        lines.extend(ops.iter().map(|op| format!("  {}", op)));
                    }
                    StepAction::Skip(reason) => {
                        lines.push(format!("  # {}: {}", entry.volume, reason));
                    }
                }
            }
        }
        lines.join("\n")
    }
}
