//! Plan builders for every procedure.
//!
//! Builders may issue read-only queries (relationship state for `update` and
//! the link decisions), but never mutate anything. Whatever they learn is
//! baked into the plan, so execution never re-queries to decide what to do.
//!
//! | Procedure             | Steps |
//! |-----------------------|-------|
//! | recovery              | update → idle → quiesce → quiesced → break @DR, unmount+offline @PROD, mount+shares @DR |
//! | recovery-extended     | online @PROD, create DR→PROD link @PROD, resync @PROD |
//! | restoration-extended  | delete shares @DR, update → idle → quiesce → quiesced → break @PROD, mount+ensure shares @PROD, create PROD→DR link @DR, delete DR→PROD link @PROD, unmount+offline @DR |
//! | restoration-flip-flop | online @PROD, mount @PROD, ensure shares @PROD, unmount+offline @DR |
//! | restoration-post-tvt  | online @DR, create PROD→DR link @DR, delete shares @DR, resync @DR |
//! | update                | per volume, whichever direction is Snapmirrored |
//! | quiesce/break/resync  | the verb @DR |

use tracing::info;

use super::SiteChannels;
use super::plan::{ProcedurePlan, RemoteOp, Step, StepEntry};
use crate::config::{Application, Volume};
use crate::inspector::{self, NOT_AVAILABLE, ReplicationRecord};
use crate::types::{Procedure, Site, SnapmirrorVerb};

/// Relationship state meaning "replicating normally".
pub const SNAPMIRRORED: &str = "Snapmirrored";

const IDLE: &str = "Idle";
const QUIESCED: &str = "Quiesced";

/// Build the plan for `procedure` on `app`.
pub fn build_plan(procedure: Procedure, app: &Application, channels: &SiteChannels) -> ProcedurePlan {
    let steps = match procedure {
        Procedure::Update => plan_update(app, channels),
        Procedure::Quiesce => plan_single_verb(app, SnapmirrorVerb::Quiesce),
        Procedure::Break => plan_single_verb(app, SnapmirrorVerb::Break),
        Procedure::Resync => plan_single_verb(app, SnapmirrorVerb::Resync),
        Procedure::Recovery => plan_recovery(app),
        Procedure::RecoveryExtended => plan_recovery_extended(app, channels),
        Procedure::RestorationExtended => plan_restoration_extended(app, channels),
        Procedure::RestorationFlipFlop => plan_restoration_flip_flop(app),
        Procedure::RestorationPostTvt => plan_restoration_post_tvt(app, channels),
    };
    ProcedurePlan {
        procedure,
        application: app.name.clone(),
        prod_cluster: app.prod_cluster.clone(),
        dr_cluster: app.dr_cluster.clone(),
        steps,
    }
}

// ============================================================================
// Link decisions
// ============================================================================

/// Whether a PROD→DR link has to be created for a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    Create { policy: String, schedule: String },
    /// The forward relationship already exists.
    Exists,
    /// Its state could not be determined.
    Unknown,
    /// No usable policy/schedule in either direction.
    MissingMetadata,
}

/// Decide from the forward record, borrowing policy/schedule from the reverse
/// record when the forward one has none.
pub fn decide_link(forward: &ReplicationRecord, reverse: Option<&ReplicationRecord>) -> LinkDecision {
    if forward.is_error() {
        return LinkDecision::Unknown;
    }
    if forward.state != NOT_AVAILABLE {
        return LinkDecision::Exists;
    }
    match forward
        .link_metadata()
        .or_else(|| reverse.and_then(ReplicationRecord::link_metadata))
    {
        Some((policy, schedule)) => LinkDecision::Create {
            policy: policy.to_string(),
            schedule: schedule.to_string(),
        },
        None => LinkDecision::MissingMetadata,
    }
}

/// Step entry creating the PROD→DR link for `volume` when needed.
fn forward_link_entry(app: &Application, channels: &SiteChannels, volume: &str) -> StepEntry {
    let forward = inspector::inspect_forward(channels.get(Site::Dr), &app.dr_vserver, volume);
    let reverse = if forward.link_metadata().is_none() {
        inspector::inspect_reverse(channels.get(Site::Prod), &app.prod_vserver, volume)
    } else {
        None
    };

    match decide_link(&forward, reverse.as_ref()) {
        LinkDecision::Create { policy, schedule } => StepEntry::run(
            volume,
            vec![RemoteOp::CreateLink {
                source_vserver: app.prod_vserver.clone(),
                destination_vserver: app.dr_vserver.clone(),
                volume: volume.to_string(),
                policy,
                schedule,
            }],
        ),
        LinkDecision::Exists => StepEntry::skip(volume, "PROD to DR replication link already exists"),
        LinkDecision::Unknown => {
            StepEntry::skip(volume, "PROD to DR replication state could not be read, not creating a link")
        }
        LinkDecision::MissingMetadata => {
            StepEntry::skip(volume, "policy/schedule details are missing, skipping link creation")
        }
    }
}

// ============================================================================
// Step helpers
// ============================================================================

fn per_volume(
    title: &str,
    site: Site,
    app: &Application,
    mut entry: impl FnMut(&Volume) -> StepEntry,
) -> Step {
    let mut step = Step::new(title, site);
    for volume in &app.volumes {
        step.push(entry(volume));
    }
    step
}

fn verb_step(title: &str, site: Site, app: &Application, verb: SnapmirrorVerb) -> Step {
    let vserver = app.vserver(site);
    per_volume(title, site, app, |v| {
        StepEntry::run(
            v.name(),
            vec![RemoteOp::Snapmirror {
                verb,
                vserver: vserver.to_string(),
                volume: v.name().to_string(),
            }],
        )
    })
}

fn wait_step(title: &str, site: Site, app: &Application, status: &str) -> Step {
    let vserver = app.vserver(site);
    per_volume(title, site, app, |v| {
        StepEntry::run(
            v.name(),
            vec![RemoteOp::AwaitStatus {
                vserver: vserver.to_string(),
                volume: v.name().to_string(),
                status: status.to_string(),
            }],
        )
    })
}

/// Update, quiesce and break the relationships whose destination is `site`.
fn cutover_steps(site: Site, app: &Application) -> Vec<Step> {
    vec![
        verb_step("SnapMirror update", site, app, SnapmirrorVerb::Update),
        wait_step("Wait for Idle status", site, app, IDLE),
        verb_step("SnapMirror quiesce", site, app, SnapmirrorVerb::Quiesce),
        wait_step("Wait for Quiesced status", site, app, QUIESCED),
        verb_step("SnapMirror break", site, app, SnapmirrorVerb::Break),
    ]
}

fn online_step(title: &str, site: Site, app: &Application) -> Step {
    let vserver = app.vserver(site);
    per_volume(title, site, app, |v| {
        StepEntry::run(
            v.name(),
            vec![RemoteOp::VolumeOnline {
                vserver: vserver.to_string(),
                volume: v.name().to_string(),
            }],
        )
    })
}

fn unmount_offline_step(title: &str, site: Site, app: &Application) -> Step {
    let vserver = app.vserver(site);
    per_volume(title, site, app, |v| {
        StepEntry::run(
            v.name(),
            vec![
                RemoteOp::VolumeUnmount {
                    vserver: vserver.to_string(),
                    volume: v.name().to_string(),
                },
                RemoteOp::VolumeOffline {
                    vserver: vserver.to_string(),
                    volume: v.name().to_string(),
                },
            ],
        )
    })
}

fn delete_shares_step(title: &str, site: Site, app: &Application) -> Step {
    let vserver = app.vserver(site);
    per_volume(title, site, app, |v| {
        let targets = v.share_targets();
        if targets.is_empty() {
            return StepEntry::skip(v.name(), "no share associated, skipping share deletion");
        }
        StepEntry::run(
            v.name(),
            targets
                .into_iter()
                .map(|t| RemoteOp::DeleteShare {
                    vserver: vserver.to_string(),
                    share: t.share,
                })
                .collect(),
        )
    })
}

/// Mount (optionally) and then create or ensure every share of the volume.
fn share_ops(vserver: &str, volume: &Volume, mount: bool, ensure: bool) -> Vec<RemoteOp> {
    let mut ops = Vec::new();
    if mount {
        ops.push(RemoteOp::VolumeMount {
            vserver: vserver.to_string(),
            volume: volume.name().to_string(),
        });
    }
    for target in volume.share_targets() {
        let (vserver, share, path) = (vserver.to_string(), target.share, target.path);
        ops.push(if ensure {
            RemoteOp::EnsureShare { vserver, share, path }
        } else {
            RemoteOp::CreateShare { vserver, share, path }
        });
    }
    ops
}

// ============================================================================
// Procedures
// ============================================================================

fn plan_single_verb(app: &Application, verb: SnapmirrorVerb) -> Vec<Step> {
    vec![verb_step(&format!("SnapMirror {}", verb), Site::Dr, app, verb)]
}

fn plan_update(app: &Application, channels: &SiteChannels) -> Vec<Step> {
    let mut forward_step = Step::new("Update PROD to DR replication", Site::Dr);
    let mut reverse_step = Step::new("Update DR to PROD replication", Site::Prod);

    for volume in &app.volumes {
        let name = volume.name();
        let forward = inspector::inspect_forward(channels.get(Site::Dr), &app.dr_vserver, name);
        if forward.state == SNAPMIRRORED {
            forward_step.push(StepEntry::run(
                name,
                vec![RemoteOp::Snapmirror {
                    verb: SnapmirrorVerb::Update,
                    vserver: app.dr_vserver.clone(),
                    volume: name.to_string(),
                }],
            ));
            continue;
        }

        let reverse = inspector::inspect_reverse(channels.get(Site::Prod), &app.prod_vserver, name);
        if reverse.is_some_and(|r| r.state == SNAPMIRRORED) {
            reverse_step.push(StepEntry::run(
                name,
                vec![RemoteOp::Snapmirror {
                    verb: SnapmirrorVerb::Update,
                    vserver: app.prod_vserver.clone(),
                    volume: name.to_string(),
                }],
            ));
        } else {
            info!(app = %app.name, volume = name, "No active SnapMirror link, skipping update");
            forward_step.push(StepEntry::skip(name, "no active SnapMirror link found, skipping update"));
        }
    }

    vec![forward_step, reverse_step]
        .into_iter()
        .filter(|step| !step.entries.is_empty())
        .collect()
}

fn plan_recovery(app: &Application) -> Vec<Step> {
    let mut steps = cutover_steps(Site::Dr, app);
    steps.push(unmount_offline_step("Unmount and offline volumes", Site::Prod, app));
    steps.push(per_volume("Mount and CIFS share creation", Site::Dr, app, |v| {
        StepEntry::run(v.name(), share_ops(&app.dr_vserver, v, true, false))
    }));
    steps
}

fn plan_recovery_extended(app: &Application, channels: &SiteChannels) -> Vec<Step> {
    let mut steps = vec![online_step("Bring PROD volumes online", Site::Prod, app)];

    steps.push(per_volume("Create SnapMirror link at new destination", Site::Prod, app, |v| {
        let forward = inspector::inspect_forward(channels.get(Site::Dr), &app.dr_vserver, v.name());
        match forward.link_metadata() {
            Some((policy, schedule)) => StepEntry::run(
                v.name(),
                vec![RemoteOp::CreateLink {
                    source_vserver: app.dr_vserver.clone(),
                    destination_vserver: app.prod_vserver.clone(),
                    volume: v.name().to_string(),
                    policy: policy.to_string(),
                    schedule: schedule.to_string(),
                }],
            ),
            None => StepEntry::skip(v.name(), "no policy/schedule on the PROD to DR relationship"),
        }
    }));

    steps.push(verb_step("Resync DR to PROD", Site::Prod, app, SnapmirrorVerb::Resync));
    steps
}

fn plan_restoration_extended(app: &Application, channels: &SiteChannels) -> Vec<Step> {
    let mut steps = vec![delete_shares_step("Delete CIFS shares in DR", Site::Dr, app)];
    steps.extend(cutover_steps(Site::Prod, app));
    steps.push(per_volume("Mount PROD volumes and create CIFS shares if missing", Site::Prod, app, |v| {
        StepEntry::run(v.name(), share_ops(&app.prod_vserver, v, true, true))
    }));
    steps.push(per_volume("Create PROD to DR replication link if missing", Site::Dr, app, |v| {
        forward_link_entry(app, channels, v.name())
    }));
    steps.push(per_volume("Delete DR to PROD replication", Site::Prod, app, |v| {
        StepEntry::run(
            v.name(),
            vec![RemoteOp::DeleteLink {
                vserver: app.prod_vserver.clone(),
                volume: v.name().to_string(),
            }],
        )
    }));
    steps.push(unmount_offline_step("Unmount and offline DR volumes", Site::Dr, app));
    steps
}

fn plan_restoration_flip_flop(app: &Application) -> Vec<Step> {
    let vserver = &app.prod_vserver;
    vec![
        online_step("Bring PROD volumes online", Site::Prod, app),
        per_volume("Mount PROD volumes", Site::Prod, app, |v| {
            StepEntry::run(
                v.name(),
                vec![RemoteOp::VolumeMount {
                    vserver: vserver.clone(),
                    volume: v.name().to_string(),
                }],
            )
        }),
        per_volume("Verify or create CIFS shares", Site::Prod, app, |v| {
            let ops = share_ops(vserver, v, false, true);
            if ops.is_empty() {
                StepEntry::skip(v.name(), "no share associated, skipping share verification")
            } else {
                StepEntry::run(v.name(), ops)
            }
        }),
        unmount_offline_step("Unmount and offline DR volumes", Site::Dr, app),
    ]
}

fn plan_restoration_post_tvt(app: &Application, channels: &SiteChannels) -> Vec<Step> {
    vec![
        online_step("Bring DR volumes online", Site::Dr, app),
        per_volume("Create PROD to DR replication link if missing", Site::Dr, app, |v| {
            forward_link_entry(app, channels, v.name())
        }),
        delete_shares_step("Delete CIFS shares in DR", Site::Dr, app),
        verb_step("Resync SnapMirror from PROD to DR", Site::Dr, app, SnapmirrorVerb::Resync),
    ]
}
